//! Authentication types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token pair persisted between runs. Either half may be missing, in which
/// case there is no usable session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "access_token", default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(rename = "refresh_token", default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl Credentials {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        }
    }

    /// True when neither token is stored
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

/// Where the in-memory session stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session, or the session was torn down
    #[default]
    Unauthenticated,
    /// Tokens are stored and the profile fetch is in progress
    Authenticating,
    /// Tokens are stored and the profile is known
    Authenticated,
}

/// In-memory session, derived from the stored credentials plus a profile fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub status: SessionStatus,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn authenticating() -> Self {
        Self {
            status: SessionStatus::Authenticating,
            user: None,
        }
    }

    pub fn authenticated(user: UserProfile) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

/// User profile as returned by the identity service.
///
/// Only `id` and `username` are interpreted; every other field is kept in
/// `extra` and written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Notifications published by the session manager
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn(UserProfile),
    LoggedOut,
    /// The session could not be recovered; the user has to sign in again
    Expired,
}

/// Registration payload relayed to the identity service
#[derive(Debug, Clone, Default, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Any additional fields the identity service accepts (password2, names...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Registration {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Response of `POST /token/`
#[derive(Debug, Deserialize)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

/// Response of `POST /token/refresh/`
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Error types for authentication and authorized requests.
///
/// Cloneable so that one refresh outcome can be handed to every request
/// waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Request failed: {status} - {body}")]
    Resource { status: u16, body: String },

    #[error("Identity service error: {status} - {body}")]
    Identity { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}
