//! Session manager - handles login/logout, startup restore and authorized requests

use super::client::ApiClient;
use super::identity::IdentityApi;
use super::storage::{FileTokenStore, TokenStore};
use super::transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
use super::types::{
    AuthError, Credentials, Registration, Session, SessionEvent, SessionStatus, UserProfile,
};
use crate::settings::ClientSettings;
use log::{debug, error, info, warn};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 16;

/// Owns the in-memory session and is the only writer of the token store
/// besides the refresh path.
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    identity: IdentityApi,
    client: ApiClient,
    session: watch::Sender<Session>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Create a manager over explicit collaborators. Starts Unauthenticated;
    /// call [`SessionManager::bootstrap`] to restore a stored session.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        let (session, _) = watch::channel(Session::unauthenticated());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            identity: IdentityApi::new(transport.clone()),
            client: ApiClient::new(transport, store.clone()),
            store,
            session,
            events,
        }
    }

    /// Create a manager talking HTTP to the configured services, with tokens
    /// persisted in the local data directory
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, AuthError> {
        info!("Initializing SessionManager...");
        info!("  Identity service: {}", settings.auth_api_url);
        info!("  Blog service: {}", settings.blog_api_url);

        let transport = ReqwestTransport::new(settings)?;
        let store = FileTokenStore::new()?;
        Ok(Self::new(Arc::new(transport), Arc::new(store)))
    }

    /// Snapshot of the current session
    pub fn current_session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.session.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    /// Receiver that observes every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Receiver of login/logout/expiry notifications
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Restore the session from stored tokens. Run once at startup.
    pub async fn bootstrap(&self) -> Session {
        let Some(access) = self.store.get().access else {
            info!("No stored session found; user needs to log in");
            self.settle(Session::unauthenticated());
            return self.current_session();
        };

        info!("Found stored session (token length: {} chars)", access.len());
        self.settle(Session::authenticating());

        match self.identity.fetch_profile(&access).await {
            Ok(user) => {
                info!("Restored session for user {}", user.username);
                self.settle(Session::authenticated(user));
            }
            Err(e) => {
                warn!("Stored session is unusable ({}); clearing it", e);
                self.store.clear();
                self.settle(Session::unauthenticated());
            }
        }
        self.current_session()
    }

    /// Sign in with username and password.
    ///
    /// The existing session is left alone unless the token exchange succeeds.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, AuthError> {
        info!("Signing in user: {}", username);

        let pair = self.identity.obtain_token_pair(username, password).await?;

        self.store
            .set(Credentials::new(pair.access.clone(), pair.refresh));
        self.settle(Session::authenticating());

        match self.identity.fetch_profile(&pair.access).await {
            Ok(user) => {
                info!("Sign in successful for {} (id: {})", user.username, user.id);
                self.settle(Session::authenticated(user.clone()));
                let _ = self.events.send(SessionEvent::LoggedIn(user.clone()));
                Ok(user)
            }
            Err(e) => {
                error!("Profile fetch after sign in failed: {}", e);
                self.store.clear();
                self.settle(Session::unauthenticated());
                Err(e)
            }
        }
    }

    /// Relay a registration to the identity service. Does not sign in.
    pub async fn register(&self, registration: &Registration) -> Result<Value, AuthError> {
        info!("Registering user: {}", registration.username);
        self.identity.register(registration).await
    }

    /// Clear stored credentials and drop the session. No network call.
    pub fn logout(&self) {
        info!("Logging out");
        self.store.clear();
        let was = self.session.borrow().status;
        self.settle(Session::unauthenticated());
        if was != SessionStatus::Unauthenticated {
            let _ = self.events.send(SessionEvent::LoggedOut);
        }
        info!("Logged out successfully");
    }

    /// Send a request to the blog service on behalf of the current session
    pub async fn authorized_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, AuthError> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        self.send(&request).await
    }

    /// Same as [`SessionManager::authorized_request`], for a prepared request
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, AuthError> {
        let result = self.client.execute(request).await;
        if matches!(result, Err(AuthError::SessionExpired)) {
            self.on_session_expired();
        }
        result
    }

    /// Apply a partial update to the signed-in user's profile
    pub async fn update_profile(&self, changes: &Value) -> Result<UserProfile, AuthError> {
        let access = self.store.get().access.ok_or(AuthError::NotAuthenticated)?;

        let user = self.identity.update_profile(&access, changes).await?;
        if self.is_authenticated() {
            self.settle(Session::authenticated(user.clone()));
        }
        Ok(user)
    }

    /// Number of token refreshes performed by this manager
    pub fn refreshes_started(&self) -> u64 {
        self.client.refresh_coordinator().refreshes_started()
    }

    /// Tear the session down after an unrecoverable authorization failure.
    ///
    /// The refresh path has already cleared the store. If it holds an access
    /// token again, a newer session replaced the failed one and stays.
    fn on_session_expired(&self) {
        if self.store.get().access.is_some() {
            debug!("Session expired for a request, but a newer session is active");
            return;
        }

        let was = self.session.borrow().status;
        self.settle(Session::unauthenticated());
        if was != SessionStatus::Unauthenticated {
            warn!("Session expired; sign-in required");
            let _ = self.events.send(SessionEvent::Expired);
        }
    }

    fn settle(&self, session: Session) {
        debug!("Session status: {:?}", session.status);
        self.session.send_replace(session);
    }
}
