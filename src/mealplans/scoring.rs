//! Deterministic fallback ordering for suggestions.
//!
//! Three stages run in order and the first one that yields anything wins:
//! hard match (plan carries every preferred tag), soft overlap (plan carries
//! at least one), and plain recency.

use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use super::repo::MealPlanStore;
use super::repo_types::{DietTag, GoalType, MealPlan};

const OVERLAP_WEIGHT: i64 = 2;
const GOAL_WEIGHT: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HardMatch,
    SoftOverlap,
    Recency,
}

/// Tag predicate handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    ContainsAll(Vec<DietTag>),
    ContainsAny(Vec<DietTag>),
    Any,
}

impl TagFilter {
    pub fn matches(&self, plan: &MealPlan) -> bool {
        match self {
            TagFilter::ContainsAll(tags) => tags.iter().all(|t| plan.diet_tags.contains(t)),
            TagFilter::ContainsAny(tags) => tags.iter().any(|t| plan.diet_tags.contains(t)),
            TagFilter::Any => true,
        }
    }
}

/// A plan together with its ranking fields. Never serialized.
#[derive(Debug, Clone)]
pub struct ScoredPlan {
    pub plan: MealPlan,
    pub goal_match: i64,
    pub diet_matches: bool,
    pub diet_overlap: i64,
    pub score: i64,
}

/// Predicate for a stage, or `None` when the stage does not apply.
pub fn stage_filter(stage: Stage, prefs: &[DietTag]) -> Option<TagFilter> {
    match stage {
        Stage::HardMatch if !prefs.is_empty() => Some(TagFilter::ContainsAll(prefs.to_vec())),
        Stage::SoftOverlap if !prefs.is_empty() => Some(TagFilter::ContainsAny(prefs.to_vec())),
        Stage::Recency => Some(TagFilter::Any),
        _ => None,
    }
}

pub fn score_plan(plan: MealPlan, prefs: &[DietTag], goal: Option<GoalType>) -> ScoredPlan {
    let goal_match = i64::from(goal.is_some_and(|g| g == plan.goal_type));
    let diet_overlap = prefs.iter().filter(|t| plan.diet_tags.contains(t)).count() as i64;
    let diet_matches = prefs.iter().all(|t| plan.diet_tags.contains(t));
    ScoredPlan {
        plan,
        goal_match,
        diet_matches,
        diet_overlap,
        score: OVERLAP_WEIGHT * diet_overlap + GOAL_WEIGHT * goal_match,
    }
}

/// Orders a stage's results; creation time (newest first) breaks ties everywhere.
pub fn sort_for_stage(stage: Stage, plans: &mut [ScoredPlan]) {
    match stage {
        Stage::HardMatch => plans.sort_by(|a, b| {
            b.goal_match
                .cmp(&a.goal_match)
                .then(b.plan.created_at.cmp(&a.plan.created_at))
        }),
        Stage::SoftOverlap => plans.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.plan.created_at.cmp(&a.plan.created_at))
        }),
        Stage::Recency => plans.sort_by(|a, b| b.plan.created_at.cmp(&a.plan.created_at)),
    }
}

/// Scores, filters, sorts, dedupes and truncates one stage's raw rows.
pub fn rank_stage(
    stage: Stage,
    rows: Vec<MealPlan>,
    prefs: &[DietTag],
    goal: Option<GoalType>,
    limit: usize,
) -> Vec<MealPlan> {
    let Some(filter) = stage_filter(stage, prefs) else {
        return Vec::new();
    };
    let mut scored: Vec<ScoredPlan> = rows
        .into_iter()
        .filter(|p| p.is_active && filter.matches(p))
        .map(|p| score_plan(p, prefs, goal))
        .collect();
    sort_for_stage(stage, &mut scored);

    let mut seen: HashSet<Uuid> = HashSet::new();
    scored
        .into_iter()
        .filter(|s| seen.insert(s.plan.id))
        .take(limit)
        .map(|s| s.plan)
        .collect()
}

/// Runs the staged fallback against the store. Store errors propagate.
///
/// The store orders and caps each stage; `rank_stage` is reapplied to its rows.
pub async fn fallback_suggestions(
    store: &dyn MealPlanStore,
    prefs: &[DietTag],
    goal: Option<GoalType>,
    limit: i64,
) -> anyhow::Result<Vec<MealPlan>> {
    let cap = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

    for stage in [Stage::HardMatch, Stage::SoftOverlap, Stage::Recency] {
        if stage_filter(stage, prefs).is_none() {
            continue;
        }
        let rows = store.stage_plans(stage, prefs, goal, limit).await?;
        let ranked = rank_stage(stage, rows, prefs, goal, cap);
        if !ranked.is_empty() {
            debug!(?stage, count = ranked.len(), "fallback stage produced suggestions");
            return Ok(ranked);
        }
    }

    debug!("no active meal plans for fallback");
    Ok(Vec::new())
}
