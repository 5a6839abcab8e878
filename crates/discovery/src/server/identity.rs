//! Caller identity supplied by the upstream auth layer
//!
//! Token validation happens before requests reach this service; the gateway
//! forwards the authenticated user as `X-User-Id` and their role as
//! `X-User-Role`.

use actix_web::HttpRequest;
use novel_hub_core::{SearchActor, UserId};

use super::error::ApiError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";
const ADMIN_ROLE: &str = "admin";

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Authenticated user id, if the request carries one
pub fn user_id(req: &HttpRequest) -> Option<UserId> {
    header(req, USER_ID_HEADER).and_then(|v| v.parse().ok())
}

pub fn require_user(req: &HttpRequest) -> Result<UserId, ApiError> {
    user_id(req).ok_or(ApiError::Unauthorized)
}

pub fn require_admin(req: &HttpRequest) -> Result<UserId, ApiError> {
    let user = require_user(req)?;
    match header(req, USER_ROLE_HEADER) {
        Some(role) if role.eq_ignore_ascii_case(ADMIN_ROLE) => Ok(user),
        _ => Err(ApiError::Forbidden),
    }
}

/// The user when signed in, otherwise the client address
pub fn search_actor(req: &HttpRequest) -> SearchActor {
    match user_id(req) {
        Some(id) => SearchActor::User(id),
        None => {
            let addr = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();
            SearchActor::Anonymous(addr)
        }
    }
}
