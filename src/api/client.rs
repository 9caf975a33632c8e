use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::backend::MatchBackend;
use super::models::{
    ApiEnvelope, CompleteBallRequest, CreateMatchRequest, DismissalRequest, InningsOvers,
    MatchHeader, MatchSnapshot, StartBatterRequest, StartInningsRequest, StartOverRequest,
    TeamPlayers,
};
use crate::db::SessionStore;
use crate::notify::{Alert, Notifier};

/// Message used when neither the backend nor the transport says anything useful.
pub const FALLBACK_MESSAGE: &str = "Unexpected error occurred";

/// A failed backend call. `Display` is the single human-readable message shown to the scorer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The backend answered and explained the failure (`success: false` or an error body).
    #[error("{message}")]
    Backend {
        status: Option<u16>,
        message: String,
    },

    /// The request never produced a usable answer (network, timeout, bare error status).
    #[error("{0}")]
    Transport(String),

    /// The answer arrived but did not have the expected shape.
    #[error("{0}")]
    Decode(String),
}

impl ApiError {
    fn backend(status: Option<u16>, message: Option<&str>) -> Self {
        ApiError::Backend {
            status,
            message: non_empty(message).unwrap_or(FALLBACK_MESSAGE).to_string(),
        }
    }

    fn transport(message: &str) -> Self {
        ApiError::Transport(non_empty(Some(message)).unwrap_or(FALLBACK_MESSAGE).to_string())
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Backend { message, .. } => message,
            ApiError::Transport(message) | ApiError::Decode(message) => message,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// HTTP client for the match backend.
///
/// Every request carries the bearer token from the session store (when one is
/// stored), and every failure is reported to the injected notifier exactly once.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Option<SessionStore>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: Option<SessionStore>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("bypass-tunnel-reminder", HeaderValue::from_static("true"));

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            notifier,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);
        self.execute(self.http.get(&url)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("POST {}", url);
        self.execute(self.http.post(&url).json(body)).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let result = self.send(request).await;
        if let Err(e) = &result {
            warn!("Backend call failed: {}", e);
            if let Some(notifier) = &self.notifier {
                notifier.notify(Alert::error(e.message()));
            }
        }
        result
    }

    async fn send<T: DeserializeOwned>(&self, mut request: RequestBuilder) -> Result<T, ApiError> {
        if let Some(token) = self.bearer_token() {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ApiError::transport(&e.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::transport(&e.to_string()))?;

        // Empty or non-JSON bodies are treated as "no body"
        let body = serde_json::from_slice::<serde_json::Value>(&bytes).ok();
        decode_response(status, body)
    }

    fn bearer_token(&self) -> Option<String> {
        let session = self.session.as_ref()?;
        match session.auth_token() {
            Ok(token) => token,
            Err(e) => {
                warn!("Could not read auth token from session store: {}", e);
                None
            }
        }
    }
}

/// Turn a status code and optional JSON body into a typed result.
///
/// Bodies that are objects with a boolean `success` field are unwrapped as
/// envelopes; anything else is decoded directly as `T`.
pub fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    body: Option<serde_json::Value>,
) -> Result<T, ApiError> {
    if !status.is_success() {
        let message = body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(|m| m.as_str());
        return match non_empty(message) {
            Some(m) => Err(ApiError::backend(Some(status.as_u16()), Some(m))),
            None => Err(ApiError::transport(&format!(
                "Request failed with status code {}",
                status.as_u16()
            ))),
        };
    }

    let body = body.unwrap_or(serde_json::Value::Null);
    let is_envelope = body
        .get("success")
        .map(|s| s.is_boolean())
        .unwrap_or(false);

    if is_envelope {
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_value(body)
            .map_err(|e| ApiError::Decode(format!("Malformed response envelope: {}", e)))?;
        if !envelope.success {
            return Err(ApiError::backend(None, envelope.message.as_deref()));
        }
        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        return serde_json::from_value(data)
            .map_err(|e| ApiError::Decode(format!("Failed to parse response data: {}", e)));
    }

    serde_json::from_value(body)
        .map_err(|e| ApiError::Decode(format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl MatchBackend for ApiClient {
    async fn match_header(&self, match_id: &str) -> Result<MatchHeader, ApiError> {
        self.get(&format!("/match/getMatchScoreById/{}", match_id))
            .await
    }

    async fn live_match(&self, match_id: &str) -> Result<MatchSnapshot, ApiError> {
        self.get(&format!("/matches/live/{}", match_id)).await
    }

    async fn overs(&self, match_id: &str) -> Result<Vec<InningsOvers>, ApiError> {
        self.get(&format!("/matches/live/{}/getOvers", match_id))
            .await
    }

    async fn players(&self, match_id: &str) -> Result<TeamPlayers, ApiError> {
        self.get(&format!("/matches/live/{}/players", match_id))
            .await
    }

    async fn create_live_match(&self, request: &CreateMatchRequest) -> Result<(), ApiError> {
        let _: IgnoredAny = self.post("/matches/live/start", request).await?;
        Ok(())
    }

    async fn start_innings(&self, match_id: &str, team_id: i64) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .post(
                &format!("/matches/live/{}/startInnings", match_id),
                &StartInningsRequest { team_id },
            )
            .await?;
        Ok(())
    }

    async fn start_over(&self, match_id: &str, bowler_id: i64) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .post(
                &format!("/matches/live/{}/start-over", match_id),
                &StartOverRequest { bowler_id },
            )
            .await?;
        Ok(())
    }

    async fn start_batter(&self, match_id: &str, batter_id: i64) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .post(
                &format!("/matches/live/{}/start-batter", match_id),
                &StartBatterRequest { batter: batter_id },
            )
            .await?;
        Ok(())
    }

    async fn complete_ball(&self, match_id: &str, outcome: &str) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .post(
                &format!("/matches/live/{}/complete-ball", match_id),
                &CompleteBallRequest {
                    outcome: outcome.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    async fn complete_ball_dismissal(
        &self,
        match_id: &str,
        request: &DismissalRequest,
    ) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .post(
                &format!("/matches/live/{}/complete-ball-dismissal", match_id),
                request,
            )
            .await?;
        Ok(())
    }

    async fn undo(&self, match_id: &str) -> Result<(), ApiError> {
        let _: IgnoredAny = self.get(&format!("/matches/live/{}/undo", match_id)).await?;
        Ok(())
    }
}
