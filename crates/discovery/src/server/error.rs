//! HTTP error mapping and the uniform response envelope

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use novel_hub_core::DiscoveryError;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// `{code, message, data}` body shared by every response
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

/// 200 response carrying `data`
pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        code: StatusCode::OK.as_u16(),
        message: "success".to_string(),
        data,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("authentication required")]
    Unauthorized,

    #[error("admin access required")]
    Forbidden,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Discovery(DiscoveryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Discovery(DiscoveryError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Discovery(DiscoveryError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Discovery(DiscoveryError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = match self {
            ApiError::Discovery(DiscoveryError::Internal(detail)) => {
                error!(detail = %detail, "Internal error while serving request");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(status).json(Envelope {
            code: status.as_u16(),
            message,
            data: Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DiscoveryError::not_found("novel", 1), 404),
            (DiscoveryError::invalid("bad"), 400),
            (DiscoveryError::Timeout(Duration::from_secs(1)), 504),
            (DiscoveryError::internal("boom"), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code().as_u16(), status);
        }
        assert_eq!(ApiError::Unauthorized.status_code().as_u16(), 401);
        assert_eq!(ApiError::Forbidden.status_code().as_u16(), 403);
    }

    #[actix_web::test]
    async fn test_internal_detail_is_hidden() {
        let response = ApiError::from(DiscoveryError::internal("db password leaked")).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 500);
        assert_eq!(json["message"], "internal server error");
        assert!(json["data"].is_null());
    }
}
