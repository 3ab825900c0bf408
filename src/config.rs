use std::{fmt::Display, str::FromStr};

use tracing::warn;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Settings for the external ranking service.
#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SuggestionConfig {
    pub candidate_limit: i64,
    pub suggestion_limit: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub ranker: RankerConfig,
    pub suggestions: SuggestionConfig,
}

pub const DEFAULT_CANDIDATE_LIMIT: i64 = 40;
pub const DEFAULT_SUGGESTION_LIMIT: i64 = 12;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mealplanner".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "mealplanner-users".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            ranker: RankerConfig::from_env(),
            suggestions: SuggestionConfig::from_env(),
        })
    }
}

impl RankerConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: first_var(&["OPENAI_API_KEY", "AI_OPENAI_API_KEY", "AI_API_KEY"]),
            base_url: first_var(&["OPENAI_BASE_URL", "AI_OPENAI_BASE_URL", "AI_API_BASE_URL"])
                .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            model: first_var(&["AI_MEAL_PLAN_MODEL", "OPENAI_MODEL"])
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
            temperature: env_or("AI_MEAL_PLAN_TEMPERATURE", 0.2),
            max_output_tokens: env_or("AI_MEAL_PLAN_MAX_OUTPUT", 600),
            timeout_secs: env_or("AI_RANKER_TIMEOUT_SECS", 8),
        }
    }
}

impl SuggestionConfig {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("AI_RANKER_CANDIDATE_LIMIT").ok(),
            std::env::var("SUGGESTED_MEALPLAN_LIMIT").ok(),
        )
    }

    fn from_values(candidate: Option<String>, suggestion: Option<String>) -> Self {
        Self {
            candidate_limit: parse_or("AI_RANKER_CANDIDATE_LIMIT", candidate, DEFAULT_CANDIDATE_LIMIT)
                .max(1),
            suggestion_limit: parse_or("SUGGESTED_MEALPLAN_LIMIT", suggestion, DEFAULT_SUGGESTION_LIMIT)
                .max(1),
        }
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

/// First non-blank value among `keys`.
fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    parse_or(key, std::env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => default,
        Some(v) => v.parse().unwrap_or_else(|e| {
            warn!(key, value = v, error = %e, %default, "invalid config value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_limits_default_when_unset() {
        let cfg = SuggestionConfig::from_values(None, None);
        assert_eq!(cfg.candidate_limit, 40);
        assert_eq!(cfg.suggestion_limit, 12);
    }

    #[test]
    fn suggestion_limits_parse_and_clamp() {
        let cfg = SuggestionConfig::from_values(Some(" 5 ".into()), Some("0".into()));
        assert_eq!(cfg.candidate_limit, 5);
        assert_eq!(cfg.suggestion_limit, 1);
    }

    #[test]
    fn invalid_numbers_fall_back_to_default() {
        let cfg = SuggestionConfig::from_values(Some("lots".into()), Some("".into()));
        assert_eq!(cfg.candidate_limit, DEFAULT_CANDIDATE_LIMIT);
        assert_eq!(cfg.suggestion_limit, DEFAULT_SUGGESTION_LIMIT);
        let t: f32 = parse_or("T", Some("warm".into()), 0.2);
        assert!((t - 0.2).abs() < f32::EPSILON);
    }
}
