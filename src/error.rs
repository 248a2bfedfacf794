use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Too many verification codes requested, retry in {wait_seconds}s")]
    RateLimitExceeded { wait_seconds: i64 },

    #[error("Resend requested too early, retry in {wait_seconds}s")]
    ResendCooldown { wait_seconds: i64 },

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Verification code expired")]
    CodeExpired,

    #[error("Signup session expired")]
    SessionExpired,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Email delivery error: {0}")]
    EmailDeliveryError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    /// The message shown to end users.
    pub fn user_message(&self) -> String {
        match self {
            AppError::RateLimitExceeded { wait_seconds } => {
                let minutes = wait_seconds / 60;
                let seconds = wait_seconds % 60;
                format!("Too many attempts. Please try again in {minutes}m {seconds}s.")
            }
            AppError::ResendCooldown { wait_seconds } => {
                format!("Please wait {wait_seconds} seconds before requesting a new code.")
            }
            AppError::InvalidCode => "Invalid verification code.".to_string(),
            AppError::CodeExpired => "This code has expired. Please request a new one.".to_string(),
            AppError::SessionExpired => "Session expired. Please start again.".to_string(),
            AppError::EmailNotVerified => "Please verify your email first.".to_string(),
            AppError::EmailDeliveryError(_) => {
                "Failed to send verification email. Please try again.".to_string()
            }
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::PermissionDenied => "Permission denied".to_string(),
            AppError::DatabaseError(_) => "Database error".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::AuthError(_) | AppError::JwtError(_) => {
                (StatusCode::UNAUTHORIZED, "AUTH_ERROR")
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::RateLimitExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            AppError::ResendCooldown { .. } => (StatusCode::TOO_MANY_REQUESTS, "RESEND_COOLDOWN"),
            AppError::InvalidCode => (StatusCode::BAD_REQUEST, "INVALID_CODE"),
            AppError::CodeExpired => (StatusCode::BAD_REQUEST, "CODE_EXPIRED"),
            AppError::SessionExpired => (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED"),
            AppError::EmailNotVerified => (StatusCode::FORBIDDEN, "EMAIL_NOT_VERIFIED"),
            AppError::EmailDeliveryError(_) => (StatusCode::BAD_GATEWAY, "EMAIL_DELIVERY_ERROR"),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status_and_code().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code) = self.status_and_code();

        match self {
            AppError::ValidationError(msg) => log::warn!("Validation error: {msg}"),
            AppError::AuthError(msg) => log::warn!("Authentication error: {msg}"),
            AppError::JwtError(err) => log::warn!("Token rejected: {err}"),
            AppError::PermissionDenied => log::warn!("{self}"),
            AppError::RateLimitExceeded { .. }
            | AppError::ResendCooldown { .. }
            | AppError::InvalidCode
            | AppError::CodeExpired
            | AppError::SessionExpired
            | AppError::EmailNotVerified
            | AppError::NotFound(_) => log::info!("{self}"),
            AppError::EmailDeliveryError(err) => log::error!("Email delivery error: {err}"),
            AppError::DatabaseError(err) => log::error!("Database error: {err}"),
            _ => log::error!("Internal error: {self}"),
        }

        let mut body = json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": self.user_message()
            }
        });
        if let AppError::RateLimitExceeded { wait_seconds }
        | AppError::ResendCooldown { wait_seconds } = self
        {
            body["error"]["wait_seconds"] = json!(wait_seconds);
        }

        HttpResponse::build(status_code).json(body)
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailDeliveryError(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::EmailDeliveryError(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::EmailDeliveryError(format!("invalid address: {err}"))
    }
}
