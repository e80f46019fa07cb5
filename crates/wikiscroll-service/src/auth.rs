//! Caller identity. Authentication happens upstream; the gateway forwards the
//! verified user id in `x-user-id`. Anonymous clients may identify their device
//! with `x-device-id` so their client state survives between sessions.

use crate::errors::ApiError;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const DEVICE_ID_HEADER: &str = "x-device-id";

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Whoever is calling, authenticated or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub device_id: Option<String>,
}

impl Identity {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            user_id: header_value(headers, USER_ID_HEADER),
            device_id: header_value(headers, DEVICE_ID_HEADER),
        }
    }

    /// Key under which client state is stored: the user id when signed in,
    /// otherwise the device id.
    pub fn owner_key(&self) -> Option<&str> {
        self.user_id.as_deref().or(self.device_id.as_deref())
    }

    pub fn require_owner(&self) -> Result<&str, ApiError> {
        self.owner_key().ok_or_else(|| {
            ApiError::BadRequest(format!("{USER_ID_HEADER} or {DEVICE_ID_HEADER} header required"))
        })
    }

    pub fn require_user(&self) -> Result<&str, ApiError> {
        self.user_id.as_deref().ok_or(ApiError::AuthenticationRequired)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Identity::from_headers(&parts.headers))
    }
}

/// An authenticated user. Rejects with 401 when the caller is anonymous.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(&parts.headers, USER_ID_HEADER)
            .map(AuthUser)
            .ok_or(ApiError::AuthenticationRequired)
    }
}
