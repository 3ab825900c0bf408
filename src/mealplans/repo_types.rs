use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Dietary label. Closed set shared by meal plans and profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietTag {
    Vegetarian,
    Vegan,
    GlutenFree,
    DairyFree,
    NutFree,
    Halal,
    Kosher,
}

impl DietTag {
    pub const ALL: [DietTag; 7] = [
        DietTag::Vegetarian,
        DietTag::Vegan,
        DietTag::GlutenFree,
        DietTag::DairyFree,
        DietTag::NutFree,
        DietTag::Halal,
        DietTag::Kosher,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DietTag::Vegetarian => "vegetarian",
            DietTag::Vegan => "vegan",
            DietTag::GlutenFree => "gluten_free",
            DietTag::DairyFree => "dairy_free",
            DietTag::NutFree => "nut_free",
            DietTag::Halal => "halal",
            DietTag::Kosher => "kosher",
        }
    }
}

impl FromStr for DietTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DietTag::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown diet tag: {s}"))
    }
}

impl fmt::Display for DietTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitness objective a plan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    LoseWeight,
    Maintain,
    GainMuscle,
}

impl GoalType {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalType::LoseWeight => "lose_weight",
            GoalType::Maintain => "maintain",
            GoalType::GainMuscle => "gain_muscle",
        }
    }
}

impl FromStr for GoalType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lose_weight" => Ok(GoalType::LoseWeight),
            "maintain" => Ok(GoalType::Maintain),
            "gain_muscle" => Ok(GoalType::GainMuscle),
            other => anyhow::bail!("unknown goal type: {other}"),
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `meal_plans` row; tags and goal are stored as text.
#[derive(Debug, FromRow)]
pub struct MealPlanRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub diet_tags: Vec<String>,
    pub goal_type: String,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub calories: f64,
    pub protein: f64, // grams
    pub fat: f64,     // grams
    pub carbs: f64,   // grams
    pub diet_tags: Vec<DietTag>,
    pub goal_type: GoalType,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<MealPlanRow> for MealPlan {
    type Error = anyhow::Error;

    fn try_from(r: MealPlanRow) -> Result<Self, Self::Error> {
        let diet_tags = r
            .diet_tags
            .iter()
            .map(|t| t.parse())
            .collect::<anyhow::Result<Vec<DietTag>>>()?;
        Ok(Self {
            id: r.id,
            title: r.title,
            description: r.description,
            calories: r.calories,
            protein: r.protein,
            fat: r.fat,
            carbs: r.carbs,
            diet_tags,
            goal_type: r.goal_type.parse()?,
            is_active: r.is_active,
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Tags in first-seen order with repeats removed.
pub fn distinct_tags(tags: &[DietTag]) -> Vec<DietTag> {
    let mut seen = HashSet::new();
    tags.iter().copied().filter(|t| seen.insert(*t)).collect()
}

pub(crate) fn tags_to_strings(tags: &[DietTag]) -> Vec<String> {
    tags.iter().map(|t| t.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_text() {
        for tag in DietTag::ALL {
            assert_eq!(tag.as_str().parse::<DietTag>().unwrap(), tag);
        }
        assert!("paleo".parse::<DietTag>().is_err());
        assert_eq!(
            serde_json::to_string(&DietTag::GlutenFree).unwrap(),
            "\"gluten_free\""
        );
    }

    #[test]
    fn distinct_tags_keeps_first_seen_order() {
        let tags = [DietTag::Vegan, DietTag::Halal, DietTag::Vegan, DietTag::Kosher, DietTag::Halal];
        assert_eq!(
            distinct_tags(&tags),
            vec![DietTag::Vegan, DietTag::Halal, DietTag::Kosher]
        );
    }

    #[test]
    fn row_with_unknown_goal_is_rejected() {
        let row = MealPlanRow {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            calories: 0.0,
            protein: 0.0,
            fat: 0.0,
            carbs: 0.0,
            diet_tags: vec!["vegan".into()],
            goal_type: "bulk".into(),
            is_active: true,
            created_by: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let err = MealPlan::try_from(row).unwrap_err();
        assert!(err.to_string().contains("bulk"));
    }
}
