//! End-of-game result reporting.
//!
//! Submission is a single request; a failure is handed back for display and
//! never retried here. Ranking retrieval starts right after a successful
//! submission and re-fetches on a fixed interval while the list is empty,
//! up to the policy's attempt ceiling.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trivia_core::{FinalResult, GameCode, PollPolicy, RankingEntry, SubmissionError};

use crate::client::GameApi;

/// Outcome of [`ResultReporter::submit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server recorded the score.
    Success,
    /// The request failed; the error carries display text.
    Error(SubmissionError),
}

/// Outcome of [`ResultReporter::poll_ranking`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RankingOutcome {
    /// A non-empty ranking arrived.
    Ready(Vec<RankingEntry>),
    /// The attempt ceiling was reached without a non-empty ranking.
    Unavailable {
        /// Fetches made.
        attempts: u32,
    },
    /// Polling was cancelled.
    Cancelled,
}

/// Submits final results and polls for the ranking.
#[derive(Clone)]
pub struct ResultReporter {
    api: Arc<dyn GameApi>,
}

impl ResultReporter {
    /// Reporter backed by `api`.
    pub fn new(api: Arc<dyn GameApi>) -> Self {
        Self { api }
    }

    /// Submit `result` once.
    pub async fn submit(&self, result: &FinalResult) -> SubmitOutcome {
        match self.api.submit_result(result).await {
            Ok(()) => {
                info!(game_code = %result.game_code, score = result.player_score, "result submitted");
                SubmitOutcome::Success
            }
            Err(error) => {
                warn!(game_code = %result.game_code, %error, "result submission failed");
                SubmitOutcome::Error(SubmissionError::new(error.user_message()))
            }
        }
    }

    /// Fetch the ranking now, then every `policy.interval()` while empty.
    ///
    /// Fetch errors count as attempts and are only logged.
    pub async fn poll_ranking(
        &self,
        game_code: &GameCode,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> RankingOutcome {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let fetched = tokio::select! {
                result = self.api.list_participants(game_code) => result,
                () = cancel.cancelled() => return RankingOutcome::Cancelled,
            };

            match fetched {
                Ok(entries) if !entries.is_empty() => {
                    info!(%game_code, attempt = attempts, count = entries.len(), "ranking ready");
                    return RankingOutcome::Ready(entries);
                }
                Ok(_) => debug!(%game_code, attempt = attempts, "ranking still empty"),
                Err(error) => debug!(%game_code, attempt = attempts, %error, "ranking fetch failed"),
            }

            if !policy.allows(attempts) {
                warn!(%game_code, attempts, "ranking unavailable, giving up");
                return RankingOutcome::Unavailable { attempts };
            }

            tokio::select! {
                () = tokio::time::sleep(policy.interval()) => {}
                () = cancel.cancelled() => return RankingOutcome::Cancelled,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpGameApi;
    use crate::credentials::MemoryCredentialStore;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reporter(server: &MockServer) -> ResultReporter {
        ResultReporter::new(Arc::new(HttpGameApi::new(
            server.uri(),
            Duration::from_secs(5),
            Arc::new(MemoryCredentialStore::with_token("tok")),
        )))
    }

    fn fast(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval_ms: 10,
            max_attempts,
        }
    }

    fn result() -> FinalResult {
        FinalResult {
            topic_id: "1".into(),
            game_code: "HTESXE".into(),
            player_score: 10,
            player_name: "Olajide".into(),
        }
    }

    #[tokio::test]
    async fn submit_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/game/create"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(reporter(&server).submit(&result()).await, SubmitOutcome::Success);
    }

    #[tokio::test]
    async fn submit_error_carries_server_message_and_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/game/create"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"error": "Invalid score"})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = reporter(&server).submit(&result()).await;
        assert_eq!(outcome, SubmitOutcome::Error(SubmissionError::new("Invalid score")));
    }

    #[tokio::test]
    async fn ranking_stops_after_first_non_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/HTESXE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/HTESXE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"player_name": "Olajide", "player_score": "10"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = reporter(&server)
            .poll_ranking(&"HTESXE".into(), &fast(30), &CancellationToken::new())
            .await;

        assert_matches!(outcome, RankingOutcome::Ready(entries) => {
            assert_eq!(entries, vec![RankingEntry { player_name: "Olajide".into(), player_score: 10 }]);
        });
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn ranking_gives_up_at_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/HTESXE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(3)
            .mount(&server)
            .await;

        let outcome = reporter(&server)
            .poll_ranking(&"HTESXE".into(), &fast(3), &CancellationToken::new())
            .await;
        assert_eq!(outcome, RankingOutcome::Unavailable { attempts: 3 });
    }

    #[tokio::test]
    async fn ranking_errors_count_as_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/HTESXE"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/HTESXE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"player_name": "Ada", "player_score": 20}
            ])))
            .mount(&server)
            .await;

        let outcome = reporter(&server)
            .poll_ranking(&"HTESXE".into(), &fast(5), &CancellationToken::new())
            .await;
        assert_matches!(outcome, RankingOutcome::Ready(entries) if entries[0].player_name == "Ada");
    }

    #[tokio::test]
    async fn ranking_cancel_stops_polling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/game/list/HTESXE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let reporter = reporter(&server);
        let slow = PollPolicy {
            interval_ms: 60_000,
            max_attempts: 30,
        };
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { reporter.poll_ranking(&"HTESXE".into(), &slow, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, RankingOutcome::Cancelled);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
