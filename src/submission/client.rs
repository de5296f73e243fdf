//! Account service client: the remote account-creation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::reconcile::MergedSubmission;
use crate::config::OnboardingConfig;
use crate::error::SubmissionError;

/// Successful account creation.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountCreated {
    pub token: String,
    #[serde(default)]
    pub user: serde_json::Value,
}

/// The remote account service, as seen by the submission pipeline.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Create an account from the merged payload. Exactly one request per call.
    async fn register(&self, payload: &MergedSubmission) -> Result<AccountCreated, SubmissionError>;
}

/// reqwest-backed account service.
pub struct HttpAccountService {
    client: reqwest::Client,
    register_url: String,
    timeout: Duration,
}

impl HttpAccountService {
    pub fn new(register_url: impl Into<String>, timeout: Duration) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmissionError::Transport {
                reason: format!("Failed to build HTTP client: {e}"),
                timeout: None,
            })?;
        Ok(Self {
            client,
            register_url: register_url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &OnboardingConfig) -> Result<Self, SubmissionError> {
        Self::new(config.register_url(), config.http_timeout)
    }
}

#[async_trait]
impl AccountService for HttpAccountService {
    async fn register(&self, payload: &MergedSubmission) -> Result<AccountCreated, SubmissionError> {
        let resp = self
            .client
            .post(&self.register_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport {
                reason: e.to_string(),
                timeout: e.is_timeout().then_some(self.timeout),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| SubmissionError::Transport {
            reason: format!("Failed to read response body: {e}"),
            timeout: e.is_timeout().then_some(self.timeout),
        })?;

        if is_transient(status) {
            warn!(status = status.as_u16(), "Account service unavailable");
            return Err(SubmissionError::Transport {
                reason: format!("HTTP {status}: {}", error_message(&body, status)),
                timeout: None,
            });
        }

        if !status.is_success() {
            let message = error_message(&body, status);
            warn!(status = status.as_u16(), %message, "Registration rejected");
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let created: AccountCreated = serde_json::from_str(&body)
            .map_err(|e| SubmissionError::InvalidResponse(format!("{e}")))?;
        if created.token.is_empty() {
            return Err(SubmissionError::InvalidResponse("empty token".to_string()));
        }
        info!(email = %payload.email, "Account created");
        Ok(created)
    }
}

/// Statuses that say nothing about the payload: server failures, request
/// timeouts and rate limiting.
fn is_transient(status: reqwest::StatusCode) -> bool {
    status.is_server_error()
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Pull a human-readable message out of an error body.
///
/// Looks at `message`, `detail` and `error`, then at the first entry of a
/// field-error map such as `{"email": ["already exists"]}`.
pub fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    };

    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() || trimmed.len() > 200 {
            fallback()
        } else {
            trimmed.to_string()
        };
    };

    for key in ["message", "detail", "error"] {
        if let Some(msg) = map.get(key).and_then(first_text) {
            return msg;
        }
    }
    map.iter()
        .find_map(|(field, value)| first_text(value).map(|msg| format!("{field}: {msg}")))
        .unwrap_or_else(fallback)
}

fn first_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}
