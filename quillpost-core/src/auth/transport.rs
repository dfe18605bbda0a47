//! HTTP transport shared by the identity and blog services.
//!
//! A [`Transport`] only moves bytes: it resolves the target service's base
//! URL, sends the request and hands back whatever status the server chose.
//! Non-2xx answers are responses, not errors; only failures that produced no
//! response at all (connect errors, timeouts) come back as `Err`.

use super::types::AuthError;
use crate::settings::ClientSettings;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Which backend a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Token issuing, registration and profile
    Identity,
    /// Blog posts
    Resource,
}

/// Immutable description of one HTTP call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the service base URL, query string included
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header, replacing any existing value (names compare case-insensitively)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Token carried in an `Authorization: Bearer` header, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("Authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The presented access token was missing, invalid or expired
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        serde_json::from_str(&self.body)
            .map_err(|e| AuthError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Body as JSON, with an empty body (204) mapped to `null`
    pub fn json_value(&self) -> Result<Value, AuthError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        self.decode()
    }
}

/// Sends requests to one of the two services. No authentication logic.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, service: Service, request: &ApiRequest) -> Result<ApiResponse, AuthError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: Client,
    auth_api_url: String,
    blog_api_url: String,
}

impl ReqwestTransport {
    pub fn new(settings: &ClientSettings) -> Result<Self, AuthError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            auth_api_url: settings.auth_api_url.trim_end_matches('/').to_string(),
            blog_api_url: settings.blog_api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, service: Service, path: &str) -> String {
        let base = match service {
            Service::Identity => &self.auth_api_url,
            Service::Resource => &self.blog_api_url,
        };
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, service: Service, request: &ApiRequest) -> Result<ApiResponse, AuthError> {
        let url = self.url_for(service, &request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!("{} {} failed: {}", request.method, url, e);
            AuthError::NetworkError(e.to_string())
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Failed to read response body: {}", e)))?;

        debug!("{} {} -> {}", request.method, url, status);
        Ok(ApiResponse { status, body })
    }
}
