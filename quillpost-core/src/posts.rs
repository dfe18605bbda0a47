//! Blog post operations against the blog service

use crate::auth::{AuthError, SessionManager};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

pub const POSTS_PATH: &str = "/api/posts/";
pub const MY_POSTS_PATH: &str = "/api/posts/user/me";

/// Page size the blog service uses when none is given
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

impl NewPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Partial update; fields left as `None` are not sent
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Timestamps arrive as RFC 3339, or without an offset when the server's
/// database dropped it. Offset-less values are UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// Typed post CRUD. Every call goes through the session's authorized
/// request path, so expired tokens are refreshed transparently.
#[derive(Clone)]
pub struct PostsApi {
    session: Arc<SessionManager>,
}

impl PostsApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn list(&self, skip: u32, limit: u32) -> Result<Vec<Post>, AuthError> {
        debug!("Listing posts (skip: {}, limit: {})", skip, limit);
        let path = format!("{}?skip={}&limit={}", POSTS_PATH, skip, limit);
        let response = self.session.authorized_request(Method::GET, &path, None).await?;
        response.decode()
    }

    pub async fn get(&self, id: i64) -> Result<Post, AuthError> {
        let response = self
            .session
            .authorized_request(Method::GET, &post_path(id), None)
            .await?;
        response.decode()
    }

    pub async fn create(&self, post: &NewPost) -> Result<Post, AuthError> {
        let body = encode(post)?;
        let response = self
            .session
            .authorized_request(Method::POST, POSTS_PATH, Some(body))
            .await?;
        let created: Post = response.decode()?;
        info!("Created post {}", created.id);
        Ok(created)
    }

    pub async fn update(&self, id: i64, changes: &PostUpdate) -> Result<Post, AuthError> {
        let body = encode(changes)?;
        let response = self
            .session
            .authorized_request(Method::PUT, &post_path(id), Some(body))
            .await?;
        info!("Updated post {}", id);
        response.decode()
    }

    pub async fn delete(&self, id: i64) -> Result<(), AuthError> {
        self.session
            .authorized_request(Method::DELETE, &post_path(id), None)
            .await?;
        info!("Deleted post {}", id);
        Ok(())
    }

    /// Posts written by the signed-in user
    pub async fn mine(&self) -> Result<Vec<Post>, AuthError> {
        let response = self
            .session
            .authorized_request(Method::GET, MY_POSTS_PATH, None)
            .await?;
        response.decode()
    }
}

fn post_path(id: i64) -> String {
    format!("{}{}", POSTS_PATH, id)
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, AuthError> {
    serde_json::to_value(value)
        .map_err(|e| AuthError::InvalidResponse(format!("Failed to encode request: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::FakeTransport;
    use crate::auth::{ApiRequest, ApiResponse, Credentials, MemoryTokenStore, Service};
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn post_json(id: i64, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "content": "body",
            "author_id": 7,
            "created_at": "2024-03-01T12:00:00Z",
            "updated_at": "2024-03-01T12:30:00.250000"
        })
    }

    fn posts_api(
        handler: impl Fn(Service, &ApiRequest) -> Result<ApiResponse, AuthError>
        + Send
        + Sync
        + 'static,
    ) -> (Arc<FakeTransport>, PostsApi) {
        let store = Arc::new(MemoryTokenStore::with_credentials(Credentials::new("A1", "R1")));
        let transport = FakeTransport::new(handler);
        let session = Arc::new(SessionManager::new(transport.clone(), store));
        (transport, PostsApi::new(session))
    }

    #[test]
    fn test_timestamps_with_and_without_offset() {
        let post: Post = serde_json::from_value(post_json(1, "t")).unwrap();
        assert_eq!(
            post.created_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(post.updated_at.timestamp_subsec_millis(), 250);

        let mut shifted = post_json(1, "t");
        shifted["created_at"] = json!("2024-03-01T14:00:00+02:00");
        let post: Post = serde_json::from_value(shifted).unwrap();
        assert_eq!(
            post.created_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_update_sends_only_given_fields() {
        let changes = PostUpdate {
            title: Some("new".to_string()),
            content: None,
        };
        assert_eq!(serde_json::to_value(&changes).unwrap(), json!({"title": "new"}));
        assert!(PostUpdate::default().is_empty());
    }

    #[tokio::test]
    async fn test_list_passes_paging() {
        let (transport, api) = posts_api(|_, _| {
            Ok(ApiResponse::json(200, &json!([post_json(1, "a"), post_json(2, "b")])))
        });

        let posts = api.list(20, DEFAULT_PAGE_SIZE).await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].title, "b");
        let sent = transport.calls_to(Service::Resource, "/api/posts/?skip=20&limit=10");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer_token(), Some("A1"));
    }

    #[tokio::test]
    async fn test_create_posts_body() {
        let (transport, api) = posts_api(|_, request| {
            let body = request.body.clone().unwrap_or_default();
            let title = body["title"].as_str().unwrap_or_default().to_string();
            Ok(ApiResponse::json(201, &post_json(5, &title)))
        });

        let created = api.create(&NewPost::new("Hello", "World")).await.unwrap();

        assert_eq!(created.id, 5);
        assert_eq!(created.title, "Hello");
        let sent = transport.calls_to(Service::Resource, POSTS_PATH);
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].body, Some(json!({"title": "Hello", "content": "World"})));
    }

    #[tokio::test]
    async fn test_update_and_delete_target_post() {
        let (transport, api) = posts_api(|_, request| match request.method.as_str() {
            "PUT" => Ok(ApiResponse::json(200, &post_json(3, "edited"))),
            _ => Ok(ApiResponse::new(204, "")),
        });

        let changes = PostUpdate {
            title: Some("edited".to_string()),
            content: None,
        };
        assert_eq!(api.update(3, &changes).await.unwrap().title, "edited");
        api.delete(3).await.unwrap();

        let sent = transport.calls_to(Service::Resource, "/api/posts/3");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].method, Method::DELETE);
    }

    #[tokio::test]
    async fn test_forbidden_and_missing_posts_surface_status() {
        let (_, api) = posts_api(|_, request| {
            if request.path.ends_with("/1") {
                Ok(ApiResponse::json(403, &json!({"detail": "Not authorized to delete this post"})))
            } else {
                Ok(ApiResponse::json(404, &json!({"detail": "Post not found"})))
            }
        });

        assert!(matches!(
            api.delete(1).await.unwrap_err(),
            AuthError::Resource { status: 403, .. }
        ));
        assert!(matches!(
            api.get(2).await.unwrap_err(),
            AuthError::Resource { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn test_mine_uses_user_endpoint() {
        let (transport, api) =
            posts_api(|_, _| Ok(ApiResponse::json(200, &json!([post_json(4, "mine")]))));

        let posts = api.mine().await.unwrap();

        assert_eq!(posts[0].author_id, 7);
        assert_eq!(transport.calls_to(Service::Resource, MY_POSTS_PATH).len(), 1);
    }
}
