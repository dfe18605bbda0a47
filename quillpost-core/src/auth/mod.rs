//! Session and authorization for QuillPost.
//!
//! Tokens come from the identity service, live in a [`TokenStore`], and are
//! attached to blog-service requests by [`ApiClient`]. Expired access tokens
//! are refreshed once per expiry, however many requests hit the 401.

pub mod authorizer;
pub mod client;
pub mod identity;
pub mod manager;
pub mod refresh;
pub mod storage;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ApiClient;
pub use identity::IdentityApi;
pub use manager::SessionManager;
pub use refresh::{Attempt, RefreshCoordinator};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Service, Transport};
pub use types::{
    AuthError, Credentials, Registration, Session, SessionEvent, SessionStatus, UserProfile,
};
