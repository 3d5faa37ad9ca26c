//! Response envelope used by the backend.
//!
//! Endpoints answer either with the bare payload or with
//! `{ "success": bool, "data": T, "message": "..." }`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ApiEnvelope<T> {
    Wrapped(Envelope<T>),
    Bare(T),
}

impl<T: DeserializeOwned> ApiEnvelope<T> {
    /// An object with a boolean `success` field is an envelope; anything
    /// else is the bare payload. Deciding up front keeps the payload's own
    /// decode error instead of a generic "no variant matched".
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProtocolError> {
        let wrapped = value.get("success").is_some_and(|v| v.is_boolean());
        if wrapped {
            let envelope: Envelope<T> = serde_json::from_value(value)
                .map_err(|e| ProtocolError::Decode(format!("envelope data: {e}")))?;
            Ok(ApiEnvelope::Wrapped(envelope))
        } else {
            Ok(ApiEnvelope::Bare(serde_json::from_value(value)?))
        }
    }
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload. `status` is the HTTP status the body arrived with.
    pub fn into_data(self, status: u16) -> Result<T, ProtocolError> {
        match self {
            ApiEnvelope::Bare(data) => Ok(data),
            ApiEnvelope::Wrapped(env) if !env.success => Err(ProtocolError::Api {
                status,
                message: env.message.unwrap_or_else(|| "request was not successful".into()),
            }),
            ApiEnvelope::Wrapped(env) => env.data.ok_or_else(|| {
                ProtocolError::Decode("envelope reported success without data".into())
            }),
        }
    }
}

/// Decode a response body and unwrap its envelope.
pub fn decode_body<T: DeserializeOwned>(body: &[u8], status: u16) -> Result<T, ProtocolError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    ApiEnvelope::from_value(value)?.into_data(status)
}

/// Check a body whose payload is not needed, only whether the call succeeded.
/// Empty bodies count as success.
pub fn check_success(body: &[u8], status: u16) -> Result<(), ProtocolError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(());
    }
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if value.get("success").and_then(|v| v.as_bool()) == Some(false) {
        let message = value
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("request was not successful")
            .to_string();
        return Err(ProtocolError::Api { status, message });
    }
    Ok(())
}
