use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::responses::JsonResponse;
use crate::services::stripe::StripeServiceError;

/// Request-level error taxonomy. Every handler failure is mapped to one of
/// these at the boundary and serialized as a `JsonResponse` envelope; nothing
/// propagates past the router.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Signature(String),
    #[error("payment provider error: {0}")]
    Upstream(String),
    #[error("storage error")]
    Store(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            // Unknown prices are a client input problem, not a 404 route miss.
            ApiError::Validation(_) | ApiError::NotFound(_) | ApiError::Signature(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let msg = self.to_string();
        match self.status() {
            StatusCode::BAD_REQUEST => JsonResponse::bad_request(&msg).into_response(),
            StatusCode::UNAUTHORIZED => JsonResponse::unauthorized(&msg).into_response(),
            _ => JsonResponse::server_error(&msg).into_response(),
        }
    }
}

impl From<StripeServiceError> for ApiError {
    fn from(err: StripeServiceError) -> Self {
        match err {
            StripeServiceError::Webhook(msg) => ApiError::Signature(msg),
            StripeServiceError::NotFound(msg) => ApiError::NotFound(msg),
            StripeServiceError::Api(msg)
            | StripeServiceError::Config(msg)
            | StripeServiceError::Serde(msg)
            | StripeServiceError::Other(msg) => ApiError::Upstream(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Signature("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Auth("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Upstream("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Store(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn stripe_webhook_errors_map_to_signature_failures() {
        let err: ApiError = StripeServiceError::Webhook("bad signature".into()).into();
        assert!(matches!(err, ApiError::Signature(_)));

        let err: ApiError = StripeServiceError::NotFound("price_x".into()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = StripeServiceError::Api("boom".into()).into();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[test]
    fn store_errors_do_not_leak_details() {
        let err = ApiError::Store(sqlx::Error::PoolClosed);
        assert_eq!(err.to_string(), "storage error");
    }
}
