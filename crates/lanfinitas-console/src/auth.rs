//! Authentication session for backend requests.
//!
//! The session is plain state handed to [`crate::client::ApiClient`] at
//! construction; nothing reads credentials from globals at request time.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{data_dir, ApiConfig};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read session token {path}: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into().trim().to_string();
        Self {
            token: (!token.is_empty()).then_some(token),
        }
    }

    /// Resolve the session from config: inline token first, then the
    /// configured token file, then `<data_dir>/lanfinitas/session.token`
    /// if present. No token at all means an anonymous session.
    pub fn from_config(api: &ApiConfig) -> Result<Self, AuthError> {
        if let Some(token) = api.token.as_deref() {
            return Ok(Self::with_token(token));
        }
        if let Some(path) = api.token_file.as_deref() {
            return Self::from_token_file(path);
        }
        let default = default_token_path();
        if default.exists() {
            return Self::from_token_file(&default);
        }
        Ok(Self::anonymous())
    }

    pub fn from_token_file(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AuthError::TokenFile {
            path: path.to_path_buf(),
            source,
        })?;
        let session = Self::with_token(raw);
        tracing::debug!(
            path = %path.display(),
            authenticated = session.is_authenticated(),
            "Loaded session token file"
        );
        Ok(session)
    }

    pub fn bearer(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.to_string())
            .finish()
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show the first 4 chars of the token.
        match &self.token {
            None => write!(f, "anonymous"),
            Some(t) if t.chars().count() > 8 => {
                write!(f, "{}...", t.chars().take(4).collect::<String>())
            }
            Some(_) => write!(f, "****"),
        }
    }
}

pub fn default_token_path() -> PathBuf {
    data_dir().join("session.token")
}
