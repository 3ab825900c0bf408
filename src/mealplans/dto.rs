use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{DietTag, GoalType, MealPlan};

/// One entry of the suggestion list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSuggestion {
    #[serde(flatten)]
    pub meal_plan: MealPlan,
    pub ai_rationale: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSignals {
    pub dietary_preferences: Vec<String>,
    pub goal: Option<GoalType>,
    pub profile_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AiStatus {
    pub used: bool,
    pub error: Option<String>,
}

/// GET /mealplans/suggested
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResponse {
    pub items: Vec<RankedSuggestion>,
    pub profile_signals: ProfileSignals,
    pub ai: AiStatus,
}

/// GET /mealplans?q=&diet=&goal=&page=&limit=
///
/// `diet` is a comma-separated list of tags.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub diet: Option<String>,
    pub goal: Option<GoalType>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Validated listing parameters handed to the repository.
#[derive(Debug, Clone)]
pub struct PlanListFilter {
    pub q: Option<String>,
    pub diet: Vec<DietTag>,
    pub goal: Option<GoalType>,
    pub limit: i64,
    pub offset: i64,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn to_filter(&self) -> Result<PlanListFilter, String> {
        let diet = self
            .diet
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<DietTag>().map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        let offset = (self.page() - 1)
            .checked_mul(self.page_size())
            .ok_or_else(|| "page is out of range".to_string())?;
        Ok(PlanListFilter {
            q: self.q.clone(),
            diet,
            goal: self.goal,
            limit: self.page_size(),
            offset,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MealPlanPage {
    pub items: Vec<MealPlan>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMealPlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub diet_tags: Vec<DietTag>,
    pub goal_type: GoalType,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    pub diet_tags: Option<Vec<DietTag>>,
    pub goal_type: Option<GoalType>,
    pub is_active: Option<bool>,
}

fn check_macros(values: &[(&str, Option<f64>)]) -> Result<(), String> {
    for (name, v) in values {
        if let Some(v) = v {
            if !v.is_finite() || *v < 0.0 {
                return Err(format!("{name} must be a non-negative number"));
            }
        }
    }
    Ok(())
}

fn dedup_tags(tags: &mut Vec<DietTag>) {
    tags.sort();
    tags.dedup();
}

impl NewMealPlan {
    pub fn validate(&mut self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".into());
        }
        check_macros(&[
            ("calories", Some(self.calories)),
            ("protein", Some(self.protein)),
            ("fat", Some(self.fat)),
            ("carbs", Some(self.carbs)),
        ])?;
        dedup_tags(&mut self.diet_tags);
        Ok(())
    }
}

impl MealPlanPatch {
    pub fn validate(&mut self) -> Result<(), String> {
        if matches!(self.title.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err("title must not be empty".into());
        }
        check_macros(&[
            ("calories", self.calories),
            ("protein", self.protein),
            ("fat", self.fat),
            ("carbs", self.carbs),
        ])?;
        if let Some(tags) = self.diet_tags.as_mut() {
            dedup_tags(tags);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanMessage {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_plan: Option<MealPlan>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_parses_diet_and_paging() {
        let q = ListQuery {
            diet: Some("vegan, gluten_free,,".into()),
            page: Some(3),
            limit: Some(500),
            ..Default::default()
        };
        let f = q.to_filter().unwrap();
        assert_eq!(f.diet, vec![DietTag::Vegan, DietTag::GlutenFree]);
        assert_eq!(f.limit, 100);
        assert_eq!(f.offset, 200);
    }

    #[test]
    fn huge_page_is_rejected_instead_of_overflowing() {
        let q = ListQuery {
            page: Some(i64::MAX),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(q.to_filter().unwrap_err(), "page is out of range");

        let q = ListQuery {
            page: Some(i64::MAX / 100),
            limit: Some(100),
            ..Default::default()
        };
        assert!(q.to_filter().is_ok());
    }

    #[test]
    fn list_query_rejects_unknown_tag() {
        let q = ListQuery {
            diet: Some("carnivore".into()),
            ..Default::default()
        };
        assert!(q.to_filter().unwrap_err().contains("carnivore"));
    }

    #[test]
    fn new_plan_rejects_negative_macros_and_blank_title() {
        let mut plan: NewMealPlan = serde_json::from_value(serde_json::json!({
            "title": "Tofu bowl",
            "protein": -1,
            "goalType": "maintain"
        }))
        .unwrap();
        assert!(plan.validate().unwrap_err().contains("protein"));

        plan.protein = 20.0;
        plan.title = "  ".into();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn patch_dedupes_tags() {
        let mut patch = MealPlanPatch {
            diet_tags: Some(vec![DietTag::Vegan, DietTag::Halal, DietTag::Vegan]),
            ..Default::default()
        };
        patch.validate().unwrap();
        assert_eq!(patch.diet_tags.unwrap(), vec![DietTag::Vegan, DietTag::Halal]);
    }
}
