use quillpost_core::auth::SessionEvent;
use serde::Serialize;
use tokio::sync::broadcast;

pub const SESSION_EXPIRED_HINT: &str =
    "Your session has expired. Run `quillpost login` to sign in again.";

/// Session state payload printed by `whoami` and after sign-in
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionStateEvent {
    pub state: String,
    pub username: Option<String>,
    pub user_id: Option<i64>,
}

/// Collect the session events published during this invocation
pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                log::warn!("Missed {} session events", skipped);
            }
            Err(_) => break,
        }
    }
    seen
}

/// Print the re-login hint if the session expired while running a command
pub fn report(events: &[SessionEvent]) {
    for event in events {
        match event {
            SessionEvent::Expired => eprintln!("{}", SESSION_EXPIRED_HINT),
            SessionEvent::LoggedIn(user) => {
                log::debug!("Session event: signed in as {}", user.username)
            }
            SessionEvent::LoggedOut => log::debug!("Session event: signed out"),
        }
    }
}
