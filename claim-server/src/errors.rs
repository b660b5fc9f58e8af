use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use claim_ledger::Error;
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error(transparent)]
    Claim(#[from] Error),

    /// Body or path could not be decoded
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Claim(Error::NotFound) => "NOT_FOUND",
            ApiError::Claim(Error::AlreadyRedeemed) => "ALREADY_REDEEMED",
            ApiError::Claim(Error::Expired) => "EXPIRED",
            ApiError::Claim(Error::Validation(_)) | ApiError::BadRequest(_) => "VALIDATION_ERROR",
            ApiError::Claim(Error::RateLimited { .. }) => "RATE_LIMITED",
            ApiError::Claim(Error::MoverUnavailable(_)) => "MOVER_UNAVAILABLE",
            ApiError::Claim(Error::Storage(_)) => "STORAGE_ERROR",
            ApiError::Claim(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Claim(e) if e.is_invalid_link() => "Invalid or expired claim link".to_string(),
            ApiError::Claim(Error::Validation(msg)) => msg.clone(),
            ApiError::Claim(Error::Storage(_))
            | ApiError::Claim(Error::Serialization(_))
            | ApiError::Claim(Error::Config(_))
            | ApiError::Claim(Error::Io(_)) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Claim(Error::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Claim(Error::AlreadyRedeemed)
            | ApiError::Claim(Error::Expired)
            | ApiError::Claim(Error::Validation(_))
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Claim(Error::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Claim(Error::MoverUnavailable(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Claim(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let mut response = HttpResponse::build(status);
        let mut body = serde_json::json!({
            "error": self.code(),
            "message": self.message(),
        });

        if let ApiError::Claim(Error::RateLimited { retry_after }) = self {
            let seconds = retry_after_secs(*retry_after);
            response.insert_header((header::RETRY_AFTER, seconds.to_string()));
            body["retry_after_seconds"] = seconds.into();
        }

        if let ApiError::Claim(e) = self {
            if e.is_retryable() {
                body["retryable"] = true.into();
            }
        }

        response.json(body)
    }
}

/// Whole seconds for the `retry-after` header, rounded up, at least one
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(error: ApiError) -> serde_json::Value {
        let bytes = to_bytes(error.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(Error::NotFound).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(Error::AlreadyRedeemed).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(Error::Expired).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(Error::MoverUnavailable("timeout".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(Error::Storage("disk".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(59_001)), 60);
        assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[actix_web::test]
    async fn test_rate_limited_response() {
        let error = ApiError::from(Error::RateLimited {
            retry_after: Duration::from_millis(1_500),
        });
        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "2");

        let body = body_json(error).await;
        assert_eq!(body["error"], "RATE_LIMITED");
        assert_eq!(body["retry_after_seconds"], 2);
        assert_eq!(body["retryable"], true);
    }

    #[actix_web::test]
    async fn test_invalid_link_message() {
        let body = body_json(ApiError::from(Error::Expired)).await;
        assert_eq!(body["error"], "EXPIRED");
        assert_eq!(body["message"], "Invalid or expired claim link");
    }

    #[actix_web::test]
    async fn test_storage_details_hidden() {
        let body = body_json(ApiError::from(Error::Storage("/var/data: EACCES".into()))).await;
        assert_eq!(body["error"], "STORAGE_ERROR");
        assert_eq!(body["message"], "Internal server error");
    }
}
