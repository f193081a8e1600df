//! Prediction backend client
//!
//! Three endpoints are used:
//! - `GET {base}/health` (bounded timeout)
//! - `GET {base}/models` returning `{ "models": [...] }`
//! - `POST {base}/predict/{model}` with a multipart `file` field

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("aerisk/", env!("CARGO_PKG_VERSION"));

/// Backend call failure
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// A response arrived with an unexpected status
    #[error("Status {status}: {reason}")]
    Status {
        status: u16,
        reason: String,
        /// Decoded JSON error body, when the server sent one
        body: Option<Value>,
    },

    /// No response (connection refused, DNS, timeout, ...)
    #[error("{0}")]
    Transport(String),

    /// Response arrived but could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    /// String field from the decoded error body
    pub fn body_field(&self, key: &str) -> Option<&str> {
        match self {
            BackendError::Status { body: Some(body), .. } => body
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty()),
            _ => None,
        }
    }

    /// Client-side message analogous to an HTTP library's error message
    pub fn transport_message(&self) -> String {
        match self {
            BackendError::Status { status, .. } => {
                format!("Request failed with status code {}", status)
            }
            BackendError::Transport(message) | BackendError::Decode(message) => message.clone(),
        }
    }

    /// Probe diagnostic: `Status <code>: <reason>`, else the transport
    /// message, else "Connection timeout"
    pub fn probe_detail(&self) -> String {
        match self {
            BackendError::Status { .. } => self.to_string(),
            BackendError::Transport(message) | BackendError::Decode(message)
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            _ => "Connection timeout".to_string(),
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Transport("Connection timeout".to_string())
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// CSV payload sent to the predict endpoint
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub file_name: String,
    pub media_type: Option<String>,
    pub content: Vec<u8>,
}

/// Prediction backend operations
#[async_trait]
pub trait Backend: Send + Sync {
    /// Base URL used in diagnostics
    fn base_url(&self) -> &str;

    /// `Ok` only for a 200 response
    async fn health(&self) -> Result<(), BackendError>;

    async fn list_models(&self) -> Result<Vec<String>, BackendError>;

    /// Decoded JSON response body of a successful prediction
    async fn predict(&self, model_id: &str, upload: CsvUpload) -> Result<Value, BackendError>;
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Option<Vec<String>>,
}

/// reqwest-backed implementation
pub struct HttpBackend {
    http_client: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        health_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            health_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into `BackendError::Status`
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok());

        Err(BackendError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn health(&self) -> Result<(), BackendError> {
        let response = self
            .http_client
            .get(self.url("/health"))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        if response.status() == reqwest::StatusCode::OK {
            return Ok(());
        }

        let status = response.status();
        Err(BackendError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body: None,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .http_client
            .get(self.url("/models"))
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        let parsed: ModelsResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        Ok(parsed.models.unwrap_or_default())
    }

    async fn predict(&self, model_id: &str, upload: CsvUpload) -> Result<Value, BackendError> {
        let mut part = reqwest::multipart::Part::bytes(upload.content).file_name(upload.file_name);
        if let Some(media_type) = upload.media_type.as_deref() {
            part = part
                .mime_str(media_type)
                .map_err(|e| BackendError::Transport(e.to_string()))?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::debug!(model_id, "POST predict");

        let response = self
            .http_client
            .post(self.url(&format!("/predict/{}", model_id)))
            .multipart(form)
            .send()
            .await
            .map_err(BackendError::from_reqwest)?;

        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_probe_detail_for_status() {
        let err = BackendError::Status {
            status: 503,
            reason: "Service Unavailable".to_string(),
            body: None,
        };
        assert_eq!(err.probe_detail(), "Status 503: Service Unavailable");
        assert_eq!(err.transport_message(), "Request failed with status code 503");
    }

    #[test]
    fn test_probe_detail_empty_transport_message() {
        assert_eq!(
            BackendError::Transport(String::new()).probe_detail(),
            "Connection timeout"
        );
        assert_eq!(
            BackendError::Transport("connection refused".to_string()).probe_detail(),
            "connection refused"
        );
    }

    #[test]
    fn test_body_field_ignores_non_strings() {
        let err = BackendError::Status {
            status: 422,
            reason: "Unprocessable Entity".to_string(),
            body: Some(json!({"detail": [{"loc": ["file"]}], "message": "bad columns"})),
        };
        assert_eq!(err.body_field("message"), Some("bad columns"));
        assert_eq!(err.body_field("detail"), None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/", Duration::from_secs(8)).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url("/health"), "http://localhost:8000/health");
    }
}
