use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;

use crate::events::SessionStateEvent;
use crate::state::AppState;
use quillpost_core::auth::{Registration, Session, SessionStatus};
use quillpost_core::posts::{NewPost, PostUpdate};
use quillpost_core::settings;

fn map_session_state(session: &Session) -> SessionStateEvent {
    let state = match session.status {
        SessionStatus::Authenticated => "logged_in",
        SessionStatus::Authenticating => "logging_in",
        SessionStatus::Unauthenticated => "logged_out",
    };
    SessionStateEvent {
        state: state.to_string(),
        username: session.user.as_ref().map(|u| u.username.clone()),
        user_id: session.user.as_ref().map(|u| u.id),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to format output")?;
    println!("{}", text);
    Ok(())
}

pub async fn login(state: &AppState, username: &str, password: &str) -> Result<()> {
    state.session.login(username, password).await?;
    print_json(&map_session_state(&state.session.current_session()))
}

pub async fn register(
    state: &AppState,
    username: &str,
    password: &str,
    email: Option<String>,
) -> Result<()> {
    let mut registration = Registration::new(username, password);
    if let Some(email) = email {
        registration = registration.with_email(email);
    }
    let created = state.session.register(&registration).await?;
    print_json(&created)
}

pub fn logout(state: &AppState) -> Result<()> {
    state.session.logout();
    print_json(&map_session_state(&state.session.current_session()))
}

pub fn whoami(state: &AppState) -> Result<()> {
    print_json(&map_session_state(&state.session.current_session()))
}

pub fn configure(state: &AppState) -> Result<()> {
    settings::save_settings(&state.settings).map_err(anyhow::Error::msg)?;
    print_json(&state.settings)
}

pub async fn update_profile(state: &AppState, changes: &str) -> Result<()> {
    let changes: Value =
        serde_json::from_str(changes).context("Profile changes must be a JSON object")?;
    if !changes.is_object() {
        bail!("Profile changes must be a JSON object");
    }
    let user = state.session.update_profile(&changes).await?;
    print_json(&user)
}

pub async fn posts_list(state: &AppState, skip: u32, limit: u32) -> Result<()> {
    print_json(&state.posts.list(skip, limit).await?)
}

pub async fn posts_show(state: &AppState, id: i64) -> Result<()> {
    print_json(&state.posts.get(id).await?)
}

pub async fn posts_create(state: &AppState, title: String, content: String) -> Result<()> {
    print_json(&state.posts.create(&NewPost { title, content }).await?)
}

pub async fn posts_edit(
    state: &AppState,
    id: i64,
    title: Option<String>,
    content: Option<String>,
) -> Result<()> {
    let changes = PostUpdate { title, content };
    if changes.is_empty() {
        bail!("Nothing to change: pass --title and/or --content");
    }
    print_json(&state.posts.update(id, &changes).await?)
}

pub async fn posts_delete(state: &AppState, id: i64) -> Result<()> {
    state.posts.delete(id).await?;
    print_json(&serde_json::json!({ "deleted": id }))
}

pub async fn posts_mine(state: &AppState) -> Result<()> {
    print_json(&state.posts.mine().await?)
}
