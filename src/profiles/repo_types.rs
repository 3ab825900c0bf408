use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::mealplans::repo_types::{DietTag, GoalType};

/// Raw `profiles` row joined with the owner's gender.
#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub dietary_preferences: Vec<String>,
    pub goal: Option<String>,
    pub unit_system: String,
    pub calorie_target: Option<i32>,
    pub allergies: Vec<String>,
    pub gender: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub weight: Option<f64>, // kg or lb, see unit_system
    pub height: Option<f64>, // cm or in
    pub dietary_preferences: Vec<DietTag>,
    pub goal: Option<GoalType>,
    pub unit_system: UnitSystem,
    pub calorie_target: Option<i32>,
    pub allergies: Vec<String>,
    pub gender: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = anyhow::Error;

    fn try_from(r: ProfileRow) -> Result<Self, Self::Error> {
        let dietary_preferences = r
            .dietary_preferences
            .iter()
            .map(|t| t.parse())
            .collect::<anyhow::Result<Vec<DietTag>>>()?;
        let unit_system = match r.unit_system.as_str() {
            "imperial" => UnitSystem::Imperial,
            _ => UnitSystem::Metric,
        };
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            age: r.age,
            weight: r.weight,
            height: r.height,
            dietary_preferences,
            goal: r.goal.as_deref().map(str::parse).transpose()?,
            unit_system,
            calorie_target: r.calorie_target,
            allergies: r.allergies,
            gender: r.gender,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
