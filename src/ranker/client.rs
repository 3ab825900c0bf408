use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::parse::{extract_text, parse_rankings};
use super::prompt::{build_prompt, SYSTEM_PROMPT};
use super::{MealPlanRanker, RankerError, Ranking};
use crate::config::RankerConfig;
use crate::mealplans::repo_types::MealPlan;
use crate::profiles::repo_types::Profile;

/// Ranks meal plans through an OpenAI-compatible `/responses` endpoint.
///
/// The HTTP client is built on first use and reused for the life of the
/// ranker; concurrent first calls race on `OnceCell`, only one build wins.
pub struct OpenAiRanker {
    config: RankerConfig,
    client: OnceCell<reqwest::Client>,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: [InputMessage<'a>; 2],
    temperature: f32,
    max_output_tokens: u32,
}

impl OpenAiRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&reqwest::Client, RankerError> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()
                    .map_err(|e| RankerError::Client(e.to_string()))
            })
            .await
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(&self, api_key: &str, prompt: &str) -> Result<Value, RankerError> {
        let client = self.client().await?;
        let body = ResponsesRequest {
            model: &self.config.model,
            input: [
                InputMessage { role: "system", content: SYSTEM_PROMPT },
                InputMessage { role: "user", content: prompt },
            ],
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
        };

        let response = client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %truncate(&body, 300), "AI ranking service rejected the request");
            return Err(RankerError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| match self.transport_error(e) {
                RankerError::Unreachable(msg) => RankerError::Response(msg),
                other => other,
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> RankerError {
        if e.is_timeout() {
            RankerError::Timeout(self.config.timeout_secs)
        } else {
            RankerError::Unreachable(e.to_string())
        }
    }
}

#[async_trait]
impl MealPlanRanker for OpenAiRanker {
    async fn rank(
        &self,
        profile: Option<&Profile>,
        candidates: &[MealPlan],
    ) -> Result<Vec<Ranking>, RankerError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(RankerError::MissingApiKey)?;

        let prompt = build_prompt(profile, candidates);
        debug!(model = %self.config.model, candidates = candidates.len(), "requesting AI ranking");

        let response = self.request(api_key, &prompt).await?;
        let rankings = parse_rankings(&extract_text(&response));
        if rankings.is_empty() {
            warn!(model = %self.config.model, "AI response contained no usable rankings");
            return Err(RankerError::EmptyRankings);
        }
        Ok(rankings)
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::mealplans::repo_types::{DietTag, GoalType};
    use crate::mealplans::scoring::tests::plan;

    fn config(api_key: Option<&str>) -> RankerConfig {
        RankerConfig {
            api_key: api_key.map(String::from),
            // Nothing listens here; any real request fails fast.
            base_url: "http://127.0.0.1:9/v1/".into(),
            model: "test-model".into(),
            temperature: 0.2,
            max_output_tokens: 600,
            timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_service() {
        let ranker = OpenAiRanker::new(config(None));
        let out = ranker.rank(None, &[]).await.unwrap();
        assert!(out.is_empty());
        assert!(ranker.client.get().is_none(), "client must not be built");
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_any_request() {
        let ranker = OpenAiRanker::new(config(None));
        let candidates = [plan("a", &[DietTag::Vegan], GoalType::Maintain, 0)];
        let err = ranker.rank(None, &candidates).await.unwrap_err();
        assert!(matches!(err, RankerError::MissingApiKey));
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let ranker = OpenAiRanker::new(config(Some("sk-test")));
        let candidates = [plan("a", &[DietTag::Vegan], GoalType::Maintain, 0)];
        let err = ranker.rank(None, &candidates).await.unwrap_err();
        assert!(matches!(
            err,
            RankerError::Unreachable(_) | RankerError::Timeout(_)
        ));
        assert!(ranker.client.get().is_some());
    }

    /// Serves one canned HTTP response on a loopback port and returns its base URL.
    async fn reply_once(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/v1")
    }

    /// Reads headers plus a `content-length` body.
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let body_len = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + body_len {
                    return;
                }
            }
        }
    }

    fn ranker_at(base_url: String, timeout_secs: u64) -> OpenAiRanker {
        OpenAiRanker::new(RankerConfig {
            base_url,
            timeout_secs,
            ..config(Some("sk-test"))
        })
    }

    #[tokio::test]
    async fn rejected_request_reports_status_without_body() {
        let base = reply_once(
            "401 Unauthorized",
            r#"{"error":{"message":"Incorrect API key provided: sk-live-SECRET123"}}"#.into(),
        )
        .await;
        let candidates = [plan("a", &[DietTag::Vegan], GoalType::Maintain, 0)];

        let err = ranker_at(base, 5).rank(None, &candidates).await.unwrap_err();

        assert!(matches!(err, RankerError::Status { status: 401 }));
        assert_eq!(err.to_string(), "AI ranking service returned 401");
    }

    #[tokio::test]
    async fn silent_service_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });
        let candidates = [plan("a", &[DietTag::Vegan], GoalType::Maintain, 0)];

        let err = ranker_at(format!("http://{addr}/v1"), 1)
            .rank(None, &candidates)
            .await
            .unwrap_err();

        assert!(matches!(err, RankerError::Timeout(1)), "got {err:?}");
    }

    #[tokio::test]
    async fn reply_without_rankings_is_empty_rankings() {
        let base = reply_once("200 OK", r#"{"output_text":"I cannot rank these."}"#.into()).await;
        let candidates = [plan("a", &[DietTag::Vegan], GoalType::Maintain, 0)];

        let err = ranker_at(base, 5).rank(None, &candidates).await.unwrap_err();

        assert!(matches!(err, RankerError::EmptyRankings));
    }

    #[tokio::test]
    async fn reply_with_rankings_is_parsed() {
        let a = plan("a", &[DietTag::Vegan], GoalType::Maintain, 0);
        let text = serde_json::json!({
            "rankings": [{ "id": a.id.to_string(), "rationale": "Plant protein." }]
        });
        let body = serde_json::json!({ "output_text": text.to_string() }).to_string();
        let base = reply_once("200 OK", body).await;

        let out = ranker_at(base, 5).rank(None, &[a.clone()]).await.unwrap();

        assert_eq!(
            out,
            vec![Ranking {
                id: a.id,
                rationale: Some("Plant protein.".into())
            }]
        );
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let ranker = OpenAiRanker::new(config(None));
        assert_eq!(ranker.endpoint(), "http://127.0.0.1:9/v1/responses");
    }

    #[test]
    fn request_body_shape() {
        let body = ResponsesRequest {
            model: "m",
            input: [
                InputMessage { role: "system", content: SYSTEM_PROMPT },
                InputMessage { role: "user", content: "rank these" },
            ],
            temperature: 0.5,
            max_output_tokens: 10,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["model"], "m");
        assert_eq!(v["input"][1]["role"], "user");
        assert_eq!(v["input"][1]["content"], "rank these");
        assert_eq!(v["max_output_tokens"], 10);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
