//! Attaches the stored access token to blog-service requests

use super::storage::TokenStore;
use super::transport::ApiRequest;
use std::sync::Arc;

/// A request ready to send, plus the access token it carries (if any).
///
/// The recovery path compares `presented` with the store to tell whether
/// the token a 401 was issued for is still the current one.
#[derive(Debug, Clone)]
pub struct AuthorizedRequest {
    pub request: ApiRequest,
    pub presented: Option<String>,
}

pub struct RequestAuthorizer {
    store: Arc<dyn TokenStore>,
}

impl RequestAuthorizer {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Decorate `request` with the access token stored right now.
    ///
    /// Without a stored token the request goes out untouched; rejecting it
    /// is left to the server.
    pub fn authorize(&self, request: &ApiRequest) -> AuthorizedRequest {
        match self.store.get().access {
            Some(token) => Self::authorize_with(request, &token),
            None => AuthorizedRequest {
                request: request.clone(),
                presented: None,
            },
        }
    }

    /// Decorate `request` with a specific access token
    pub fn authorize_with(request: &ApiRequest, token: &str) -> AuthorizedRequest {
        AuthorizedRequest {
            request: request
                .clone()
                .with_header("Authorization", format!("Bearer {}", token)),
            presented: Some(token.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryTokenStore;
    use crate::auth::types::Credentials;

    #[test]
    fn test_adds_bearer_header_when_token_stored() {
        let store = Arc::new(MemoryTokenStore::with_credentials(Credentials::new("A1", "R1")));
        let authorizer = RequestAuthorizer::new(store);

        let original = ApiRequest::get("/api/posts/42");
        let authorized = authorizer.authorize(&original);

        assert_eq!(
            authorized.request.header("Authorization"),
            Some("Bearer A1")
        );
        assert_eq!(authorized.presented.as_deref(), Some("A1"));
        // the descriptor itself is never mutated
        assert!(original.headers.is_empty());
    }

    #[test]
    fn test_passes_request_through_without_token() {
        let authorizer = RequestAuthorizer::new(Arc::new(MemoryTokenStore::new()));

        let original = ApiRequest::get("/api/posts/").with_header("X-Trace", "1");
        let authorized = authorizer.authorize(&original);

        assert_eq!(authorized.request, original);
        assert!(authorized.presented.is_none());
    }

    #[test]
    fn test_refresh_token_alone_is_not_presented() {
        let store = Arc::new(MemoryTokenStore::with_credentials(Credentials {
            access: None,
            refresh: Some("R1".to_string()),
        }));
        let authorized = RequestAuthorizer::new(store).authorize(&ApiRequest::get("/x"));
        assert!(authorized.request.bearer_token().is_none());
    }

    #[test]
    fn test_reads_store_at_call_time() {
        let store = Arc::new(MemoryTokenStore::with_credentials(Credentials::new("A1", "R1")));
        let authorizer = RequestAuthorizer::new(store.clone());
        let request = ApiRequest::get("/x");

        assert_eq!(authorizer.authorize(&request).request.bearer_token(), Some("A1"));
        store.set(Credentials::new("A2", "R1"));
        assert_eq!(authorizer.authorize(&request).request.bearer_token(), Some("A2"));
    }
}
