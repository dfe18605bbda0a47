//! Recovery from authorization failures
//!
//! When the blog service answers 401, the coordinator trades the stored
//! refresh token for a new access token and tells the caller which token to
//! replay with. Refreshes are single-flight: while one exchange is running,
//! every other 401 waits on the same exchange instead of starting its own,
//! and at most one exchange writes to the token store at a time.

use super::identity::IdentityApi;
use super::storage::TokenStore;
use super::types::{AuthError, Credentials};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which submission of a logical request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    /// The one resubmission after a refresh. Never recovered again.
    Replay,
}

type RefreshHandle = Shared<BoxFuture<'static, Result<String, AuthError>>>;

struct InFlight {
    id: u64,
    handle: RefreshHandle,
}

pub struct RefreshCoordinator {
    store: Arc<dyn TokenStore>,
    identity: IdentityApi,
    in_flight: Mutex<Option<InFlight>>,
    started: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn TokenStore>, identity: IdentityApi) -> Self {
        Self {
            store,
            identity,
            in_flight: Mutex::new(None),
            started: AtomicU64::new(0),
        }
    }

    /// Number of refresh exchanges started so far
    pub fn refreshes_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Recover from a 401 received for a request that presented `presented`.
    ///
    /// Returns the access token to replay the request with. Fails with
    /// [`AuthError::SessionExpired`] when the session cannot be recovered,
    /// clearing the store only if it still holds that session. Transient
    /// refresh failures are passed through and leave the stored tokens alone.
    pub async fn recover(
        &self,
        attempt: Attempt,
        presented: Option<&str>,
    ) -> Result<String, AuthError> {
        if attempt == Attempt::Replay {
            // only the session the replay ran under is ended
            if self.store.get().access.as_deref() == presented {
                warn!("Replayed request was rejected again; ending session");
                self.store.clear();
            } else {
                debug!("Replay rejected for a token that is no longer stored; keeping session");
            }
            return Err(AuthError::SessionExpired);
        }

        let (id, handle) = {
            let mut slot = self.in_flight.lock();

            // a settled handle whose waiters were all dropped before retiring it
            if slot.as_ref().is_some_and(|f| f.handle.peek().is_some()) {
                *slot = None;
            }

            match slot.as_ref() {
                Some(flight) => {
                    debug!("Joining refresh #{} already in flight", flight.id);
                    (flight.id, flight.handle.clone())
                }
                None => {
                    let credentials = self.store.get();

                    // the 401 answered an older token; a newer one has landed since
                    if let Some(current) = credentials.access.as_deref() {
                        if presented != Some(current) {
                            debug!("Access token already refreshed, replaying with current token");
                            return Ok(current.to_string());
                        }
                    }

                    let Some(refresh) = credentials.refresh else {
                        warn!("No refresh token stored; session cannot be recovered");
                        self.store.clear();
                        return Err(AuthError::SessionExpired);
                    };

                    let id = self.started.fetch_add(1, Ordering::Relaxed) + 1;
                    let handle = exchange(self.store.clone(), self.identity.clone(), refresh, id)
                        .boxed()
                        .shared();
                    *slot = Some(InFlight {
                        id,
                        handle: handle.clone(),
                    });
                    (id, handle)
                }
            }
        };

        let outcome = handle.await;

        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|f| f.id == id) {
            *slot = None;
        }

        outcome
    }
}

/// The refresh exchange itself. Runs once per refresh, however many
/// requests are waiting on it.
async fn exchange(
    store: Arc<dyn TokenStore>,
    identity: IdentityApi,
    refresh: String,
    id: u64,
) -> Result<String, AuthError> {
    info!("Starting token refresh #{}", id);

    let result = identity.refresh_access(&refresh).await;

    // logout or a new login may have happened while the exchange was running
    let still_current = store.get().refresh.as_deref() == Some(refresh.as_str());

    match result {
        Ok(access) if still_current => {
            store.set(Credentials {
                access: Some(access.clone()),
                refresh: Some(refresh),
            });
            info!("Refresh #{} stored a new access token ({} chars)", id, access.len());
            Ok(access)
        }
        Ok(_) => {
            warn!("Session changed during refresh #{}; discarding its token", id);
            Err(AuthError::SessionExpired)
        }
        Err(AuthError::SessionExpired) => {
            warn!("Refresh #{} rejected; clearing stored tokens", id);
            if still_current {
                store.clear();
            }
            Err(AuthError::SessionExpired)
        }
        Err(e) => {
            warn!("Refresh #{} failed: {}", id, e);
            Err(e)
        }
    }
}
