use crate::entities::VerificationRecord;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// State carried between the signup steps. The caller owns it; nothing is
/// kept server-side apart from the verification records themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupFlow {
    pub email: Option<String>,
}

impl SignupFlow {
    pub fn for_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
        }
    }

    pub fn require_email(&self) -> AppResult<&str> {
        self.email.as_deref().ok_or(AppError::SessionExpired)
    }
}

/// Outcome of the resend cooldown and hourly quota checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    Allowed,
    Denied { wait_seconds: i64 },
}

impl Throttle {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Throttle::Allowed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartSignupRequest {
    #[schema(example = "amina@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    pub signup_token: Option<String>,
    #[schema(example = "042137")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResendCodeRequest {
    pub signup_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteSignupRequest {
    pub signup_token: Option<String>,
    #[schema(example = "Amina Yusuf")]
    pub full_name: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupStepResponse {
    pub email: String,
    pub signup_token: String,
    /// Seconds the issued code stays valid.
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerificationRecordResponse {
    pub id: i32,
    pub email: String,
    pub code: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    /// "Valid" or "Expired"
    pub status: String,
}

impl VerificationRecordResponse {
    pub fn from_record(record: VerificationRecord, expired: bool) -> Self {
        Self {
            id: record.id,
            email: record.email,
            code: record.code,
            is_verified: record.is_verified,
            created_at: record.created_at,
            status: if expired { "Expired" } else { "Valid" }.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_without_email_is_session_expired() {
        let flow = SignupFlow::default();
        assert!(matches!(flow.require_email(), Err(AppError::SessionExpired)));
        assert_eq!(
            SignupFlow::for_email("a@x.com").require_email().unwrap(),
            "a@x.com"
        );
    }
}
