use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{AiStatus, ProfileSignals, RankedSuggestion, SuggestionResponse};
use super::repo::MealPlanStore;
use super::repo_types::{distinct_tags, MealPlan};
use super::scoring::fallback_suggestions;
use crate::config::SuggestionConfig;
use crate::profiles::repo::ProfileStore;
use crate::profiles::services::resolve_active_profile;
use crate::ranker::{MealPlanRanker, Ranking};

const NO_USABLE_RANKINGS: &str = "AI ranking did not reference any candidate meal plans.";

/// Loads the AI candidate pool. Store failures degrade to an empty pool.
pub async fn load_candidates(store: &dyn MealPlanStore, limit: i64) -> Vec<MealPlan> {
    match store.recent_active(limit).await {
        Ok(plans) => plans,
        Err(e) => {
            warn!(error = %e, "failed to load AI ranking candidates, continuing without AI");
            Vec::new()
        }
    }
}

/// Maps ranked ids back onto candidates. Unknown and repeated ids are dropped.
pub fn apply_rankings(
    candidates: Vec<MealPlan>,
    rankings: Vec<Ranking>,
    limit: usize,
) -> Vec<RankedSuggestion> {
    let mut by_id: HashMap<Uuid, MealPlan> = candidates.into_iter().map(|p| (p.id, p)).collect();
    let mut seen = HashSet::new();

    rankings
        .into_iter()
        .filter(|r| seen.insert(r.id))
        .filter_map(|r| {
            by_id.remove(&r.id).map(|meal_plan| RankedSuggestion {
                meal_plan,
                ai_rationale: r.rationale,
            })
        })
        .take(limit)
        .collect()
}

/// Builds the suggestion list for a user: AI ranking when it works, the
/// staged fallback otherwise.
pub struct Suggester {
    profiles: Arc<dyn ProfileStore>,
    plans: Arc<dyn MealPlanStore>,
    ranker: Arc<dyn MealPlanRanker>,
    limits: SuggestionConfig,
}

impl Suggester {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        plans: Arc<dyn MealPlanStore>,
        ranker: Arc<dyn MealPlanRanker>,
        limits: SuggestionConfig,
    ) -> Self {
        Self {
            profiles,
            plans,
            ranker,
            limits,
        }
    }

    #[instrument(skip(self))]
    pub async fn suggest(&self, user_id: Uuid) -> anyhow::Result<SuggestionResponse> {
        let profile = resolve_active_profile(self.profiles.as_ref(), user_id).await?;
        let prefs = profile
            .as_ref()
            .map(|p| distinct_tags(&p.dietary_preferences))
            .unwrap_or_default();
        let goal = profile.as_ref().and_then(|p| p.goal);
        let limit = usize::try_from(self.limits.suggestion_limit).unwrap_or(usize::MAX);

        let candidates = load_candidates(self.plans.as_ref(), self.limits.candidate_limit).await;

        let mut ai = AiStatus {
            used: false,
            error: None,
        };
        let mut items = Vec::new();

        if !candidates.is_empty() {
            match self.ranker.rank(profile.as_ref(), &candidates).await {
                Ok(rankings) => {
                    items = apply_rankings(candidates, rankings, limit);
                    if items.is_empty() {
                        warn!(%user_id, "AI ranking referenced no candidate plans");
                        ai.error = Some(NO_USABLE_RANKINGS.to_string());
                    } else {
                        ai.used = true;
                    }
                }
                Err(e) => {
                    warn!(%user_id, error = %e, "AI ranking unavailable, using fallback");
                    ai.error = Some(e.to_string());
                }
            }
        }

        if !ai.used {
            items = fallback_suggestions(self.plans.as_ref(), &prefs, goal, self.limits.suggestion_limit)
                .await?
                .into_iter()
                .map(|meal_plan| RankedSuggestion {
                    meal_plan,
                    ai_rationale: None,
                })
                .collect();
        }

        info!(%user_id, count = items.len(), ai_used = ai.used, "meal plan suggestions built");
        Ok(SuggestionResponse {
            items,
            profile_signals: ProfileSignals {
                dietary_preferences: prefs.iter().map(|t| t.as_str().to_string()).collect(),
                goal,
                profile_id: profile.as_ref().map(|p| p.id),
            },
            ai,
        })
    }
}
