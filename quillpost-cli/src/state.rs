use std::sync::Arc;

use quillpost_core::auth::SessionManager;
use quillpost_core::posts::PostsApi;
use quillpost_core::settings::ClientSettings;

/// Shared state for one CLI invocation
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub posts: PostsApi,
    pub settings: ClientSettings,
}

impl AppState {
    pub fn new(settings: ClientSettings) -> Result<Self, String> {
        let session = SessionManager::from_settings(&settings)
            .map_err(|e| format!("Failed to init session: {}", e))?;
        Ok(Self::with_session(Arc::new(session), settings))
    }

    pub fn with_session(session: Arc<SessionManager>, settings: ClientSettings) -> Self {
        Self {
            posts: PostsApi::new(session.clone()),
            session,
            settings,
        }
    }
}
