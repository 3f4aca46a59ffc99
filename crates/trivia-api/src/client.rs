//! Game REST API.
//!
//! Two endpoints matter to a session:
//! - `POST /api/game/create` records a participant's final score
//! - `GET /api/game/list/{code}` returns everyone's scores for a game
//!
//! Every request carries `Authorization: Bearer <token>` from the
//! [`CredentialStore`]. Failed responses carry `{"error": "<message>"}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, warn};
use trivia_core::{FinalResult, GameCode, RankingEntry};

use crate::credentials::CredentialStore;
use crate::errors::{ApiError, UNKNOWN_ERROR};

/// Path of the score submission endpoint.
pub const SUBMIT_PATH: &str = "/api/game/create";
/// Path prefix of the participant list endpoint.
pub const LIST_PATH: &str = "/api/game/list";

/// The request/response operations a session needs.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Record a final score.
    async fn submit_result(&self, result: &FinalResult) -> Result<(), ApiError>;

    /// Fetch the ranked participant list for a game.
    async fn list_participants(&self, game_code: &GameCode) -> Result<Vec<RankingEntry>, ApiError>;
}

/// [`GameApi`] over HTTP using `reqwest`.
pub struct HttpGameApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpGameApi {
    /// Client for the API at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("trivia-client/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.token() {
            Some(token) => request.header(AUTHORIZATION, bearer_value(&token)),
            None => {
                warn!("no auth token stored, sending request unauthenticated");
                request
            }
        }
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn submit_result(&self, result: &FinalResult) -> Result<(), ApiError> {
        debug!(game_code = %result.game_code, score = result.player_score, "submitting result");
        let response = self
            .authorize(self.client.post(self.url(SUBMIT_PATH)))
            .json(result)
            .send()
            .await?;
        let _ = check_status(response).await?;
        Ok(())
    }

    async fn list_participants(&self, game_code: &GameCode) -> Result<Vec<RankingEntry>, ApiError> {
        let url = self.url(&format!("{LIST_PATH}/{game_code}"));
        let response = self.authorize(self.client.get(url)).send().await?;
        let body = check_status(response).await?.text().await?;
        parse_ranking(&body)
    }
}

/// `Authorization` header value for `token`.
///
/// Tokens already carrying the `Bearer ` scheme are used as-is.
pub fn bearer_value(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Extract the message from an `{"error": "..."}` body.
pub fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

/// Decode a participant list body. `null` and empty bodies are an empty list.
pub fn parse_ranking(body: &str) -> Result<Vec<RankingEntry>, ApiError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Option<Vec<RankingEntry>>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: parse_error_message(&body),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer, token: &str) -> HttpGameApi {
        HttpGameApi::new(
            server.uri(),
            Duration::from_secs(5),
            Arc::new(MemoryCredentialStore::with_token(token)),
        )
    }

    fn result() -> FinalResult {
        FinalResult {
            topic_id: "1".into(),
            game_code: "HTESXE".into(),
            player_score: 10,
            player_name: "Olajide".into(),
        }
    }

    #[test]
    fn bearer_is_not_double_prefixed() {
        assert_eq!(bearer_value("abc"), "Bearer abc");
        assert_eq!(bearer_value("Bearer abc"), "Bearer abc");
    }

    #[test]
    fn error_message_parsing() {
        assert_eq!(parse_error_message(r#"{"error":"Game not found"}"#), "Game not found");
        assert_eq!(parse_error_message(r#"{"detail":"nope"}"#), "Unknown error");
        assert_eq!(parse_error_message(r#"{"error":""}"#), "Unknown error");
        assert_eq!(parse_error_message("<html>"), "Unknown error");
        assert_eq!(parse_error_message(""), "Unknown error");
    }

    #[test]
    fn ranking_parsing() {
        assert!(parse_ranking("").unwrap().is_empty());
        assert!(parse_ranking("null").unwrap().is_empty());
        assert!(parse_ranking("[]").unwrap().is_empty());
        let list = parse_ranking(r#"[{"player_name":"Olajide","player_score":"10"}]"#).unwrap();
        assert_eq!(list[0].player_score, 10);
        assert_matches!(parse_ranking(r#"{"a":1}"#), Err(ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn submit_posts_result_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/game/create"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({
                "topic_id": "1",
                "code": "HTESXE",
                "player_score": "10",
                "player_name": "Olajide"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        api(&server, "tok").submit_result(&result()).await.unwrap();
    }

    #[tokio::test]
    async fn submit_surfaces_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/game/create"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "Game already closed"})),
            )
            .mount(&server)
            .await;

        let err = api(&server, "tok").submit_result(&result()).await.unwrap_err();
        assert_matches!(err, ApiError::Status { status: 400, ref message } if message == "Game already closed");
    }

    #[tokio::test]
    async fn submit_unknown_error_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/game/create"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = api(&server, "tok").submit_result(&result()).await.unwrap_err();
        assert_eq!(err.user_message(), "Unknown error");
    }

    #[tokio::test]
    async fn list_fetches_by_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/HTESXE"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"topic_id": "1", "code": "HTESXE", "player_score": "20", "player_name": "Ada"},
                {"topic_id": "1", "code": "HTESXE", "player_score": "10", "player_name": "Olajide"}
            ])))
            .mount(&server)
            .await;

        let list = api(&server, "Bearer tok")
            .list_participants(&"HTESXE".into())
            .await
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].player_name, "Ada");
        assert_eq!(list[1].player_score, 10);
    }

    #[tokio::test]
    async fn list_treats_null_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/HTESXE"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let list = api(&server, "tok")
            .list_participants(&"HTESXE".into())
            .await
            .unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/ABC123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpGameApi::new(
            format!("{}/", server.uri()),
            Duration::from_secs(5),
            Arc::new(MemoryCredentialStore::default()),
        );
        let list = api.list_participants(&"ABC123".into()).await.unwrap();
        assert!(list.is_empty());
    }
}
