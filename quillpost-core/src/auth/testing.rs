//! Scripted transport used by the unit tests

use super::transport::{ApiRequest, ApiResponse, Service, Transport};
use super::types::AuthError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;

type Handler = dyn Fn(Service, &ApiRequest) -> Result<ApiResponse, AuthError> + Send + Sync;

/// Answers every request through a closure and records what was sent.
///
/// Yields to the scheduler once before answering, so requests issued
/// concurrently on one thread all get in flight before any of them resolves.
pub(crate) struct FakeTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<(Service, ApiRequest)>>,
}

impl FakeTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(Service, &ApiRequest) -> Result<ApiResponse, AuthError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<(Service, ApiRequest)> {
        self.calls.lock().clone()
    }

    pub(crate) fn calls_to(&self, service: Service, path: &str) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|(s, r)| *s == service && r.path == path)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.calls_to(Service::Identity, "/token/refresh/").len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, service: Service, request: &ApiRequest) -> Result<ApiResponse, AuthError> {
        self.calls.lock().push((service, request.clone()));
        tokio::task::yield_now().await;
        (self.handler)(service, request)
    }
}

/// Identity service that issues `{A1, R1}` for alice/secret, refreshes R1 to
/// `refreshed_access`, and serves alice's profile for any known token.
/// The blog service accepts only `valid_access`.
pub(crate) fn blog_backend(
    valid_access: &'static str,
    refreshed_access: &'static str,
) -> impl Fn(Service, &ApiRequest) -> Result<ApiResponse, AuthError> + Send + Sync + 'static {
    move |service, request| {
        let body = request.body.clone().unwrap_or(Value::Null);
        match (service, request.method.as_str(), request.path.as_str()) {
            (Service::Identity, "POST", "/token/") => {
                if body["username"] == "alice" && body["password"] == "secret" {
                    Ok(ApiResponse::json(200, &json!({"access": "A1", "refresh": "R1"})))
                } else {
                    Ok(ApiResponse::json(
                        401,
                        &json!({"detail": "No active account found with the given credentials"}),
                    ))
                }
            }
            (Service::Identity, "POST", "/token/refresh/") => {
                if body["refresh"] == "R1" {
                    Ok(ApiResponse::json(200, &json!({"access": refreshed_access})))
                } else {
                    Ok(ApiResponse::json(401, &json!({"detail": "Token is invalid or expired"})))
                }
            }
            (Service::Identity, "GET", "/users/profile/") => match request.bearer_token() {
                Some(_) => Ok(ApiResponse::json(200, &json!({"id": 7, "username": "alice"}))),
                None => Ok(ApiResponse::new(401, "")),
            },
            (Service::Resource, _, _) => {
                if request.bearer_token() == Some(valid_access) {
                    Ok(ApiResponse::json(200, &json!({"id": 42, "title": "Hello"})))
                } else {
                    Ok(ApiResponse::json(401, &json!({"detail": "Invalid token"})))
                }
            }
            _ => Ok(ApiResponse::new(404, "not found")),
        }
    }
}
