//! HTTP client for the agents backend.
//!
//! Streaming endpoints return an [`EventStream`]; ack endpoints resolve to
//! `()` once the backend confirms. Non-OK responses map into
//! [`ApiError::http_status`] with the body preserved in the details.

use futures_util::StreamExt;
use serde::Serialize;

use crate::api::error::{ApiError, ApiErrorKind, ApiResult};
use crate::api::sse::SseParser;
use crate::api::types::{
    CreateSessionRequest, PostMessageRequest, RenameSessionRequest, RunPlanningRequest,
};
use crate::api::{EventStream, HistoryPair, SessionSummary};
use crate::config::Config;

/// Standard User-Agent header for agentboard API requests.
pub const USER_AGENT: &str = concat!("agentboard/", env!("CARGO_PKG_VERSION"));

/// Default backend when neither env nor config names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8787";

/// Resolves the backend base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the operation fails.
pub fn resolve_base_url(config_base_url: Option<&str>) -> ApiResult<String> {
    if let Ok(env_url) = std::env::var("AGENTBOARD_BASE_URL") {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(DEFAULT_BASE_URL.to_string())
}

fn validate_url(raw: &str) -> ApiResult<()> {
    let parsed = url::Url::parse(raw).map_err(|err| {
        ApiError::with_details(
            ApiErrorKind::Transport,
            format!("Invalid base URL: {raw}"),
            err.to_string(),
        )
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::transport(format!(
            "Unsupported URL scheme for backend: {raw}"
        )));
    }
    Ok(())
}

/// Connection settings for [`BoardClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ClientConfig {
    /// Creates a config pointing at the given base URL, no auth.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Builds connection settings from the loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn from_config(config: &Config) -> ApiResult<Self> {
        Ok(Self {
            base_url: resolve_base_url(config.base_url.as_deref())?,
            api_key: config.api_key.clone(),
        })
    }
}

/// Client for the agents backend.
#[derive(Clone)]
pub struct BoardClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl BoardClient {
    /// Creates a new client with the given connection settings.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header("accept", "application/json")
            .header("user-agent", USER_AGENT);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Requests a new agent session; the returned stream announces the
    /// session id before any conversation events.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn create_session(
        &self,
        skill_id: &str,
        prompt: &str,
        board: Option<&str>,
    ) -> ApiResult<EventStream> {
        let body = CreateSessionRequest {
            skill_id,
            prompt,
            board,
        };
        self.send_streaming_request(&self.url("/sessions"), &body)
            .await
    }

    /// Posts a user message to an existing session and streams the turn.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn post_message(&self, session_id: &str, text: &str) -> ApiResult<EventStream> {
        let body = PostMessageRequest { text };
        self.send_streaming_request(&self.url(&format!("/sessions/{session_id}/messages")), &body)
            .await
    }

    /// Asks the backend to stop a running session's execution.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn kill_session(&self, session_id: &str) -> ApiResult<()> {
        self.send_ack_request(
            reqwest::Method::POST,
            &self.url(&format!("/sessions/{session_id}/kill")),
        )
        .await
    }

    /// Lists persisted session summaries.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn list_sessions(&self) -> ApiResult<Vec<SessionSummary>> {
        let response = self
            .request(reqwest::Method::GET, &self.url("/sessions"))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &body));
        }

        response.json().await.map_err(|err| {
            ApiError::new(
                ApiErrorKind::Protocol,
                format!("Failed to parse session list: {err}"),
            )
        })
    }

    /// Renames a session record.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn rename_session(&self, session_id: &str, title: &str) -> ApiResult<()> {
        let url = self.url(&format!("/sessions/{session_id}"));
        let response = self
            .request(reqwest::Method::PATCH, &url)
            .json(&RenameSessionRequest { title })
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        check_ack(response).await
    }

    /// Deletes a session record.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn delete_session(&self, session_id: &str) -> ApiResult<()> {
        self.send_ack_request(
            reqwest::Method::DELETE,
            &self.url(&format!("/sessions/{session_id}")),
        )
        .await
    }

    /// Starts (or continues) a task planning conversation.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn run_planning(
        &self,
        skill_id: &str,
        message: &str,
        history: &[HistoryPair],
        model: &str,
    ) -> ApiResult<EventStream> {
        let body = RunPlanningRequest {
            skill_id,
            message,
            history,
            model,
        };
        self.send_streaming_request(&self.url("/tasks/planning"), &body)
            .await
    }

    /// Starts the real execution of a task.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn run_execution(&self, task_id: &str) -> ApiResult<EventStream> {
        let body = serde_json::json!({});
        self.send_streaming_request(&self.url(&format!("/tasks/{task_id}/execute")), &body)
            .await
    }

    async fn send_streaming_request<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> ApiResult<EventStream> {
        let response = self
            .request(reqwest::Method::POST, url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &error_body));
        }

        Ok(SseParser::new(response.bytes_stream().boxed()).boxed())
    }

    async fn send_ack_request(&self, method: reqwest::Method, url: &str) -> ApiResult<()> {
        let response = self
            .request(method, url)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        check_ack(response).await
    }
}

async fn check_ack(response: reqwest::Response) -> ApiResult<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::http_status(status.as_u16(), &body))
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::with_details(ApiErrorKind::Transport, "Request timed out", err.to_string())
    } else {
        ApiError::transport(format!("Request failed: {err}"))
    }
}
