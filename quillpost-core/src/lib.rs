//! QuillPost Core Library
//!
//! Session handling, authorized requests and post operations for the
//! QuillPost blog services. Used by the command-line client.

pub mod auth;
pub mod posts;
pub mod settings;

// Re-export commonly used items
pub use auth::{AuthError, Session, SessionEvent, SessionManager, SessionStatus, UserProfile};
pub use posts::{NewPost, Post, PostUpdate, PostsApi};
pub use settings::{ClientSettings, load_settings, save_settings};
