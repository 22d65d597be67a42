use std::collections::BTreeMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    auth::CryptError,
    error::log_error,
    model::{DatabaseError, ResourceType},
    storage::StorageError,
};

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("RegistrationUserConflict")]
    RegistrationUserConflict,

    #[error("RegistrationAdminForbidden")]
    RegistrationAdminForbidden,
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("AuthenticationTokenInvalid. Error: {error}")]
    AuthenticationTokenInvalid { error: jsonwebtoken::errors::Error },

    #[error("AuthenticationTokenRejected")]
    AuthenticationTokenRejected,

    #[error("AuthenticationWrongTokenKind")]
    AuthenticationWrongTokenKind,

    #[error("AuthenticationRequired")]
    AuthenticationRequired,

    #[error("AuthenticationInvalidCredentials")]
    AuthenticationInvalidCredentials,

    #[error("AuthenticationOAuthFailed: {0}")]
    AuthenticationOAuthFailed(String),
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("ResourceNotFound: {resource_type:?}")]
    ResourceNotFound { resource_type: ResourceType },

    #[error("ResourceForbidden: {resource_type:?}")]
    ResourceForbidden { resource_type: ResourceType },

    #[error("ResourceConflict: {resource_type:?}, {reason}")]
    ResourceConflict {
        resource_type: ResourceType,
        reason: &'static str,
    },

    #[error("ResourceFetchError: {resource_type:?}. Error: {error}")]
    ResourceFetchError {
        resource_type: ResourceType,
        error: DatabaseError,
    },

    #[error("ResourceBadRequest: {resource_type:?}, {reason}")]
    ResourceBadRequest {
        resource_type: ResourceType,
        reason: String,
    },
}

/// Field name to the messages of every failed rule on it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
#[error("ValidationError: {0:?}")]
pub struct ValidationError(pub FieldErrors);

impl ValidationError {
    pub fn field<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self(BTreeMap::from([(field.into(), vec![message.into()])]))
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid ({})", e.code),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        Self(fields)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("ServerCryptError: {0}")]
    ServerCryptError(#[from] CryptError),

    #[error("ServerStorageError: {0}")]
    ServerStorageError(#[from] StorageError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn client_display(&self) -> String {
        String::from("Internal server error.")
    }
}

impl RegistrationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RegistrationUserConflict => StatusCode::CONFLICT,
            Self::RegistrationAdminForbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::RegistrationUserConflict => String::from("User with this email already exists."),
            Self::RegistrationAdminForbidden => {
                String::from("Admin accounts cannot be created through registration.")
            }
        }
    }
}

impl AuthenticationError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::AuthenticationTokenInvalid { .. } => String::from("Invalid or expired token."),
            Self::AuthenticationTokenRejected => {
                String::from("Not authorized, token failed or user no longer exists.")
            }
            Self::AuthenticationWrongTokenKind => String::from("Invalid token type."),
            Self::AuthenticationRequired => String::from("Not authorized, no token provided."),
            Self::AuthenticationInvalidCredentials => String::from("Invalid credentials."),
            Self::AuthenticationOAuthFailed(_) => String::from("OAuth authentication failed."),
        }
    }
}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ResourceForbidden { .. } => StatusCode::FORBIDDEN,
            Self::ResourceConflict { .. } => StatusCode::CONFLICT,
            Self::ResourceFetchError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ResourceBadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceNotFound { resource_type } => {
                format!("{} not found.", resource_type.label())
            }
            Self::ResourceForbidden { .. } => {
                String::from("You do not have permission to perform this action.")
            }
            Self::ResourceConflict { reason, .. } => reason.to_string(),
            Self::ResourceFetchError { .. } => String::from("Internal server error."),
            Self::ResourceBadRequest { reason, .. } => reason.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("ResourceError - {0}")]
    ResourceError(#[from] ResourceError),
    #[error("AuthenticationError - {0}")]
    AuthenticationError(#[from] AuthenticationError),
    #[error("RegistrationError - {0}")]
    RegistrationError(#[from] RegistrationError),
    #[error("{0}")]
    ValidationError(#[from] ValidationError),
    #[error("ServerError - {0}")]
    ServerError(#[from] ServerError),
    #[error("Forbidden")]
    Forbidden,
    #[error("RateLimited")]
    RateLimited,
}

impl WebError {
    pub fn resource_not_found(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceNotFound {
            resource_type: r#type,
        })
    }

    pub fn resource_forbidden(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceForbidden {
            resource_type: r#type,
        })
    }

    pub fn resource_conflict(r#type: ResourceType, reason: &'static str) -> Self {
        Self::ResourceError(ResourceError::ResourceConflict {
            resource_type: r#type,
            reason,
        })
    }

    pub fn resource_bad_request<S: Into<String>>(r#type: ResourceType, reason: S) -> Self {
        Self::ResourceError(ResourceError::ResourceBadRequest {
            resource_type: r#type,
            reason: reason.into(),
        })
    }

    /// Maps a model error onto the matching client error for `r#type`.
    pub fn resource_fetch_error(r#type: ResourceType, error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound => Self::resource_not_found(r#type),
            DatabaseError::Forbidden => Self::resource_forbidden(r#type),
            DatabaseError::Conflict(reason) => Self::resource_conflict(r#type, reason),
            DatabaseError::Invalid(reason) => Self::resource_bad_request(r#type, reason),
            e if e.is_unique_violation() => {
                Self::resource_conflict(r#type, "Resource already exists.")
            }
            error => Self::ResourceError(ResourceError::ResourceFetchError {
                resource_type: r#type,
                error,
            }),
        }
    }

    pub fn auth_token_invalid(error: jsonwebtoken::errors::Error) -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationTokenInvalid { error })
    }

    pub fn auth_token_rejected() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationTokenRejected)
    }

    pub fn auth_wrong_token_kind() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationWrongTokenKind)
    }

    pub fn auth_required() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationRequired)
    }

    pub fn auth_invalid_credentials() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationInvalidCredentials)
    }

    pub fn auth_oauth_failed<S: Into<String>>(reason: S) -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationOAuthFailed(reason.into()))
    }

    pub fn registration_conflict() -> Self {
        Self::RegistrationError(RegistrationError::RegistrationUserConflict)
    }

    pub fn registration_admin_forbidden() -> Self {
        Self::RegistrationError(RegistrationError::RegistrationAdminForbidden)
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::ValidationError(ValidationError::field(field, message))
    }

    pub fn forbidden() -> Self {
        Self::Forbidden
    }

    pub fn server_crypt_error(e: CryptError) -> Self {
        Self::ServerError(ServerError::ServerCryptError(e))
    }

    /// Rejected uploads are the client's fault, backend failures are not.
    pub fn storage_error(e: StorageError) -> Self {
        if e.is_client_error() {
            Self::validation("file", e.to_string())
        } else {
            Self::ServerError(ServerError::ServerStorageError(e))
        }
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            Self::ResourceError(e) => e.status_code(),
            Self::RegistrationError(e) => e.status_code(),
            Self::AuthenticationError(e) => e.status_code(),
            Self::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ServerError(e) => e.status_code(),
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceError(e) => e.client_display(),
            Self::RegistrationError(e) => e.client_display(),
            Self::AuthenticationError(e) => e.client_display(),
            Self::ValidationError(_) => String::from("Validation failed."),
            Self::ServerError(e) => e.client_display(),
            Self::Forbidden => String::from("You do not have permission to perform this action."),
            Self::RateLimited => String::from("Too many requests, please try again later."),
        }
    }

    fn is_server_side(&self) -> bool {
        self.status_code().is_server_error()
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Body of every failed request.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Field level messages of a failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl From<&WebError> for ErrorResponse {
    fn from(e: &WebError) -> Self {
        match e {
            WebError::RateLimited => Self {
                success: false,
                message: None,
                errors: None,
                error: Some(ErrorDetail {
                    kind: String::from("RateLimitError"),
                    message: e.client_display(),
                }),
            },
            WebError::ValidationError(ValidationError(fields)) => Self {
                success: false,
                message: Some(e.client_display()),
                errors: Some(fields.clone()),
                error: None,
            },
            _ => Self {
                success: false,
                message: Some(e.client_display()),
                errors: None,
                error: None,
            },
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        if self.is_server_side() {
            log_error(&self);
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = ErrorResponse::from(&self);
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rate_limit_body_shape() {
        let body = serde_json::to_value(ErrorResponse::from(&WebError::RateLimited)).unwrap();
        assert_eq!(
            body,
            json!({
                "success": false,
                "error": {
                    "type": "RateLimitError",
                    "message": "Too many requests, please try again later."
                }
            })
        );
    }

    #[test]
    fn validation_body_lists_fields() {
        let e = WebError::validation("email", "Please provide a valid email");
        assert_eq!(e.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = serde_json::to_value(ErrorResponse::from(&e)).unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["errors"]["email"], json!(["Please provide a valid email"]));
    }

    #[test]
    fn database_errors_map_to_status() {
        let cases = [
            (DatabaseError::NotFound, StatusCode::NOT_FOUND),
            (DatabaseError::Forbidden, StatusCode::FORBIDDEN),
            (DatabaseError::Conflict("taken"), StatusCode::CONFLICT),
            (DatabaseError::invalid("bad"), StatusCode::BAD_REQUEST),
            (
                DatabaseError::SqlxError(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(
                WebError::resource_fetch_error(ResourceType::Course, error).status_code(),
                status
            );
        }
    }

    #[test]
    fn not_found_names_the_resource() {
        let e = WebError::resource_not_found(ResourceType::Quiz);
        assert_eq!(e.client_display(), "Quiz not found.");
    }
}
