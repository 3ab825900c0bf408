//! AI re-ranking of candidate meal plans.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::mealplans::repo_types::MealPlan;
use crate::profiles::repo_types::Profile;

pub mod client;
pub mod parse;
pub mod prompt;

pub use client::OpenAiRanker;

/// A plan id the model placed in its ranking, with its reason if given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    pub id: Uuid,
    pub rationale: Option<String>,
}

#[derive(Debug, Error)]
pub enum RankerError {
    #[error("AI ranking is not configured: missing API key")]
    MissingApiKey,

    #[error("failed to build AI ranking client: {0}")]
    Client(String),

    #[error("AI ranking service unreachable: {0}")]
    Unreachable(String),

    #[error("AI ranking request timed out after {0}s")]
    Timeout(u64),

    #[error("AI ranking service returned {status}")]
    Status { status: u16 },

    #[error("AI ranking response could not be read: {0}")]
    Response(String),

    #[error("AI response did not contain any rankings.")]
    EmptyRankings,
}

#[async_trait]
pub trait MealPlanRanker: Send + Sync {
    /// Orders `candidates` for `profile`.
    ///
    /// Empty `candidates` yield `Ok(vec![])` without contacting the service;
    /// a live call that produces nothing usable is `Err(EmptyRankings)`.
    async fn rank(
        &self,
        profile: Option<&Profile>,
        candidates: &[MealPlan],
    ) -> Result<Vec<Ranking>, RankerError>;
}
