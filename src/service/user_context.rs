//! Caller identity threaded through every handler operation

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::ApiError;

/// Header carrying the caller's user id
pub const USER_HEADER: &str = "User";

/// Caller used when a request carries no identity. There is no authentication
/// in front of this service, so every anonymous request acts as this user.
pub const ANONYMOUS_USER_ID: i64 = 1;

/// User context containing the identity of the caller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: i64,
}

impl UserContext {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }

    /// Build the context from the optional `User` header
    pub fn from_request_headers(req: &HttpRequest) -> Result<Self, ApiError> {
        let context = match req.headers().get(USER_HEADER) {
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .map(Self::new)
                .ok_or_else(|| ApiError::Validation("Invalid User header value".to_string()))?,
            None => Self::default(),
        };

        Ok(context)
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::new(ANONYMOUS_USER_ID)
    }
}

impl FromRequest for UserContext {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_request_headers(req))
    }
}
