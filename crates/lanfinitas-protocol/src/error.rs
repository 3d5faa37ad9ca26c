use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Decode(e.to_string())
    }
}
