//! REST client for the task, delegation and agent endpoints.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use lanfinitas_protocol::{
    check_success, decode_body, delegation_revoke_path, Agent, CreateTaskRequest, Delegation,
    ProtocolError, Task, AGENTS_PATH, DELEGATIONS_PATH, TASKS_PATH,
};

use crate::auth::Session;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("not authorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ClientError {
    fn from_protocol(url: &str, err: ProtocolError) -> Self {
        match err {
            ProtocolError::Api { status, message } => ClientError::Api { status, message },
            ProtocolError::Decode(message) | ProtocolError::Validation(message) => {
                ClientError::Decode {
                    url: url.to_string(),
                    message,
                }
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. })
    }
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        session: Arc<Session>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        self.get_json(TASKS_PATH).await
    }

    pub async fn list_delegations(&self) -> Result<Vec<Delegation>, ClientError> {
        self.get_json(DELEGATIONS_PATH).await
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, ClientError> {
        self.get_json(AGENTS_PATH).await
    }

    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, ClientError> {
        let url = self.url(TASKS_PATH);
        let builder = self.http.post(&url).json(request);
        let (status, body) = self.send(&url, builder).await?;
        let task: Task = decode_body(&body, status.as_u16())
            .map_err(|e| ClientError::from_protocol(&url, e))?;
        tracing::info!(task_id = %task.id, name = %task.name, "Task created");
        Ok(task)
    }

    pub async fn revoke_delegation(&self, delegation_id: &str) -> Result<(), ClientError> {
        let url = self.url(&delegation_revoke_path(delegation_id));
        let builder = self.http.post(&url);
        let (status, body) = self.send(&url, builder).await?;
        check_success(&body, status.as_u16()).map_err(|e| ClientError::from_protocol(&url, e))?;
        tracing::info!(delegation_id, "Delegation revoked");
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        let builder = self.http.get(&url);
        let (status, body) = self.send(&url, builder).await?;
        decode_body(&body, status.as_u16()).map_err(|e| ClientError::from_protocol(&url, e))
    }

    /// Attach auth and request id, send, and map non-2xx statuses to errors.
    async fn send(
        &self,
        url: &str,
        builder: RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), ClientError> {
        let request_id = Uuid::new_v4().to_string();
        let mut builder = builder.header(REQUEST_ID_HEADER, &request_id);
        if let Some(token) = self.session.bearer() {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?
            .to_vec();

        tracing::debug!(
            url,
            request_id = %request_id,
            status = status.as_u16(),
            bytes = body.len(),
            "API response"
        );

        if status.is_success() {
            return Ok((status, body));
        }

        let message = error_message(status, &body);
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(ClientError::Unauthorized {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Best-effort message from an error body: `message`, then `error`, then
/// `detail`, then the raw text, then the status reason.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    status
        .canonical_reason()
        .unwrap_or("unexpected status")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_fields() {
        let msg = error_message(StatusCode::BAD_REQUEST, br#"{"detail": "bad priority"}"#);
        assert_eq!(msg, "bad priority");
        let msg = error_message(StatusCode::BAD_REQUEST, br#"{"message": "m", "error": "e"}"#);
        assert_eq!(msg, "m");
    }

    #[test]
    fn test_error_message_falls_back_to_text_then_reason() {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, b"upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::NOT_FOUND, b""), "Not Found");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new(
            "http://localhost:8000/",
            Arc::new(Session::anonymous()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url(TASKS_PATH), "http://localhost:8000/api/v1/tasks");
    }
}
