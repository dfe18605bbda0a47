//! Client for the identity service

use super::transport::{ApiRequest, ApiResponse, Service, Transport};
use super::types::{
    AuthError, RefreshResponse, Registration, TokenPairResponse, UserProfile,
};
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use std::sync::Arc;

pub const TOKEN_PATH: &str = "/token/";
pub const TOKEN_REFRESH_PATH: &str = "/token/refresh/";
pub const REGISTER_PATH: &str = "/users/register/";
pub const PROFILE_PATH: &str = "/users/profile/";

/// Typed calls against the identity service
#[derive(Clone)]
pub struct IdentityApi {
    transport: Arc<dyn Transport>,
}

impl IdentityApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Exchange username and password for an access/refresh pair
    pub async fn obtain_token_pair(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPairResponse, AuthError> {
        debug!("Requesting token pair for user: {}", username);

        let request = ApiRequest::post(
            TOKEN_PATH,
            json!({
                "username": username,
                "password": password,
            }),
        );
        let response = self.transport.send(Service::Identity, &request).await?;

        if !response.is_success() {
            error!("Sign in failed: {} - {}", response.status, response.body);
            return Err(rejection(&response));
        }

        let pair: TokenPairResponse = response.decode()?;
        info!("Sign in successful for user {}", username);
        Ok(pair)
    }

    /// Trade a refresh token for a new access token.
    ///
    /// Any 4xx means the refresh token is no longer usable and maps to
    /// [`AuthError::SessionExpired`]; 5xx and transport failures are
    /// reported as transient.
    pub async fn refresh_access(&self, refresh_token: &str) -> Result<String, AuthError> {
        debug!("Refreshing access token");

        let request = ApiRequest::post(TOKEN_REFRESH_PATH, json!({ "refresh": refresh_token }));
        let response = self.transport.send(Service::Identity, &request).await?;

        if response.is_client_error() {
            warn!(
                "Refresh token rejected: {} - {}",
                response.status,
                extract_detail(&response.body)
            );
            return Err(AuthError::SessionExpired);
        }
        if !response.is_success() {
            error!("Refresh failed: {} - {}", response.status, response.body);
            return Err(AuthError::Identity {
                status: response.status,
                body: response.body,
            });
        }

        let data: RefreshResponse = response.decode()?;
        info!("Token refresh successful");
        Ok(data.access)
    }

    /// Relay a registration and return the created user record
    pub async fn register(&self, registration: &Registration) -> Result<Value, AuthError> {
        debug!("Registering user: {}", registration.username);

        let body = serde_json::to_value(registration).map_err(|e| {
            AuthError::InvalidResponse(format!("Failed to encode registration: {}", e))
        })?;
        let request = ApiRequest::post(REGISTER_PATH, body);
        let response = self.transport.send(Service::Identity, &request).await?;

        if !response.is_success() {
            error!("Registration failed: {} - {}", response.status, response.body);
            return Err(rejection(&response));
        }

        info!("Registered user {}", registration.username);
        response.json_value()
    }

    /// Fetch the profile of the user owning `access_token`
    pub async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        debug!("Fetching user profile");

        let request = ApiRequest::get(PROFILE_PATH).with_header(
            "Authorization",
            format!("Bearer {}", access_token),
        );
        let response = self.transport.send(Service::Identity, &request).await?;

        if !response.is_success() {
            error!("Fetch user profile failed: {} - {}", response.status, response.body);
            return Err(rejection(&response));
        }

        let profile: UserProfile = response.decode()?;
        info!("Fetched user profile (id: {})", profile.id);
        Ok(profile)
    }

    /// Partially update the profile of the user owning `access_token`
    pub async fn update_profile(
        &self,
        access_token: &str,
        changes: &Value,
    ) -> Result<UserProfile, AuthError> {
        debug!("Updating user profile");

        let request = ApiRequest::put(PROFILE_PATH, changes.clone()).with_header(
            "Authorization",
            format!("Bearer {}", access_token),
        );
        let response = self.transport.send(Service::Identity, &request).await?;

        if !response.is_success() {
            error!("Profile update failed: {} - {}", response.status, response.body);
            return Err(rejection(&response));
        }

        let profile: UserProfile = response.decode()?;
        info!("Updated profile for user {}", profile.id);
        Ok(profile)
    }
}

/// Classify a non-2xx identity response: 4xx is a rejection of what the
/// user supplied, anything else is the service's problem.
fn rejection(response: &ApiResponse) -> AuthError {
    if response.is_client_error() {
        AuthError::Authentication {
            status: response.status,
            message: extract_detail(&response.body),
        }
    } else {
        AuthError::Identity {
            status: response.status,
            body: response.body.clone(),
        }
    }
}

/// Pull a readable message out of an error body.
///
/// Handles `{"detail": "..."}` as well as field-keyed validation errors like
/// `{"username": ["already exists"]}`; anything else is returned as-is.
pub(crate) fn extract_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response".to_string();
    }

    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.to_string();
    };

    if let Some(Value::String(detail)) = map.get("detail") {
        return detail.clone();
    }

    let parts: Vec<String> = map
        .iter()
        .map(|(field, value)| {
            let messages = match value {
                Value::Array(items) => items
                    .iter()
                    .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                    .collect::<Vec<_>>()
                    .join(" "),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}: {}", field, messages)
        })
        .collect();

    if parts.is_empty() {
        trimmed.to_string()
    } else {
        parts.join("; ")
    }
}
