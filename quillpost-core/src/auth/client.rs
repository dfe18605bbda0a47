//! Authorized request pipeline for the blog service:
//! authorize, send, and on a 401 refresh once and replay.

use super::authorizer::RequestAuthorizer;
use super::identity::IdentityApi;
use super::refresh::{Attempt, RefreshCoordinator};
use super::storage::TokenStore;
use super::transport::{ApiRequest, ApiResponse, Service, Transport};
use super::types::AuthError;
use log::{debug, warn};
use std::sync::Arc;

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    authorizer: RequestAuthorizer,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        let identity = IdentityApi::new(transport.clone());
        Self {
            authorizer: RequestAuthorizer::new(store.clone()),
            refresh: RefreshCoordinator::new(store, identity),
            transport,
        }
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Send `request` to the blog service with the current credentials.
    ///
    /// A 401 triggers one refresh and one replay; the caller only sees the
    /// final outcome. Other non-2xx answers come back as
    /// [`AuthError::Resource`], and transport failures are never retried.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, AuthError> {
        let mut attempt = Attempt::First;
        let mut outgoing = self.authorizer.authorize(request);

        loop {
            let response = self
                .transport
                .send(Service::Resource, &outgoing.request)
                .await?;

            if response.is_unauthorized() {
                debug!(
                    "{} {} rejected with 401 ({:?} attempt)",
                    request.method, request.path, attempt
                );
                let token = self
                    .refresh
                    .recover(attempt, outgoing.presented.as_deref())
                    .await?;
                attempt = Attempt::Replay;
                outgoing = RequestAuthorizer::authorize_with(request, &token);
                continue;
            }

            if !response.is_success() {
                warn!(
                    "{} {} failed: {} - {}",
                    request.method, request.path, response.status, response.body
                );
                return Err(AuthError::Resource {
                    status: response.status,
                    body: response.body,
                });
            }

            return Ok(response);
        }
    }
}
