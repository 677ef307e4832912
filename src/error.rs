// ============================================================================
// ACTION RESULTS AND ERRORS
// ============================================================================
//
// Two outcome channels:
//   - ActionResponse<T>: expected business outcomes (wrong password, expired
//     token, duplicate email, foreign profile...). Always returned, never raised.
//   - ActionError: validation failures, invariant violations and
//     infrastructure failures. Raised to the caller; the HTTP boundary masks
//     the internal text behind a generic message.
//
// ============================================================================

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sea_orm::DbErr;
use serde::Serialize;

use crate::services::mailer::MailError;
use crate::utils::password::HashError;

/// Uniform `{ success, message?, data?, unauthorized? }` result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse<T = ()> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unauthorized: Option<bool>,
}

impl<T> ActionResponse<T> {
    pub fn ok() -> Self {
        Self { success: true, message: None, data: None, unauthorized: None }
    }

    pub fn ok_with(data: T) -> Self {
        Self { success: true, message: None, data: Some(data), unauthorized: None }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), data: None, unauthorized: None }
    }

    pub fn unauthorized() -> Self {
        Self { success: false, message: None, data: None, unauthorized: Some(true) }
    }

    pub fn unauthorized_with(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), data: None, unauthorized: Some(true) }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.unauthorized.unwrap_or(false)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid data.")]
    InvalidData(#[from] validator::ValidationErrors),

    #[error("Invalid data.")]
    Malformed(#[from] serde_json::Error),

    /// A stored token without its expiry: data corruption, not a user error
    #[error("Token missing.")]
    TokenMissing,

    #[error("Something went wrong, Error: {0}")]
    Store(#[from] DbErr),

    #[error("Something went wrong, Error: {0}")]
    Hashing(#[from] HashError),

    #[error("Something went wrong, Error: {0}")]
    Mail(#[from] MailError),

    #[error("Something went wrong, Error: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),

    #[error("An error occurred: {0}")]
    SignIn(String),
}

impl ActionError {
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, ActionError::InvalidData(_) | ActionError::Malformed(_))
    }
}

impl ResponseError for ActionError {
    fn status_code(&self) -> StatusCode {
        if self.is_invalid_data() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_invalid_data() {
            tracing::info!(error = ?self, "rejected payload");
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid data."
            }));
        }

        tracing::error!(error = %self, "action failed");
        HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Something went wrong"
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_response_shape_omits_absent_fields() {
        let ok: ActionResponse = ActionResponse::ok();
        assert_eq!(serde_json::to_value(&ok).unwrap(), serde_json::json!({ "success": true }));

        let denied: ActionResponse = ActionResponse::unauthorized();
        assert_eq!(
            serde_json::to_value(&denied).unwrap(),
            serde_json::json!({ "success": false, "unauthorized": true })
        );

        let failed: ActionResponse = ActionResponse::fail("Token expired.");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "success": false, "message": "Token expired." })
        );
    }

    #[test]
    fn test_infrastructure_error_wraps_cause() {
        let err = ActionError::from(DbErr::Custom("connection refused".to_string()));
        assert!(err.to_string().starts_with("Something went wrong, Error: "));
        assert!(err.to_string().contains("connection refused"));
    }

    #[actix_web::test]
    async fn test_http_boundary_masks_internal_errors() {
        let err = ActionError::from(DbErr::Custom("password=hunter2".to_string()));
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
        assert!(text.contains("Something went wrong"));
    }

    #[test]
    fn test_invalid_data_is_bad_request() {
        let malformed = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ActionError::from(malformed);

        assert_eq!(err.to_string(), "Invalid data.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
