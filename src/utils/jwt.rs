use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";
pub const TOKEN_TYPE_SIGNUP: &str = "signup";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id, or the email being verified for signup tokens
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: i64,
    refresh_token_expires_in: i64,
    signup_token_expires_in: i64,
}

impl JwtService {
    pub fn new(
        secret: &str,
        access_expires_in: i64,
        refresh_expires_in: i64,
        signup_expires_in: i64,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_expires_in,
            refresh_token_expires_in: refresh_expires_in,
            signup_token_expires_in: signup_expires_in,
        }
    }

    fn issue(&self, sub: String, token_type: &str, expires_in: i64) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in);

        let claims = Claims {
            sub,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: token_type.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn generate_access_token(&self, user_id: i32) -> AppResult<String> {
        self.issue(
            user_id.to_string(),
            TOKEN_TYPE_ACCESS,
            self.access_token_expires_in,
        )
    }

    pub fn generate_refresh_token(&self, user_id: i32) -> AppResult<String> {
        self.issue(
            user_id.to_string(),
            TOKEN_TYPE_REFRESH,
            self.refresh_token_expires_in,
        )
    }

    /// Carries the email between the signup steps.
    pub fn generate_signup_token(&self, email: &str) -> AppResult<String> {
        self.issue(
            email.to_string(),
            TOKEN_TYPE_SIGNUP,
            self.signup_token_expires_in,
        )
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    fn verify_typed(&self, token: &str, token_type: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if claims.token_type != token_type {
            return Err(AppError::AuthError(format!(
                "Invalid {token_type} token type"
            )));
        }

        Ok(claims)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        self.verify_typed(token, TOKEN_TYPE_ACCESS)
    }

    pub fn verify_refresh_token(&self, token: &str) -> AppResult<Claims> {
        self.verify_typed(token, TOKEN_TYPE_REFRESH)
    }

    /// Returns the email the signup token was issued for.
    pub fn verify_signup_token(&self, token: &str) -> AppResult<String> {
        self.verify_typed(token, TOKEN_TYPE_SIGNUP)
            .map(|claims| claims.sub)
    }

    pub fn get_access_token_expires_in(&self) -> i64 {
        self.access_token_expires_in
    }

    pub fn get_signup_token_expires_in(&self) -> i64 {
        self.signup_token_expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", 60, 120, 300)
    }

    #[test]
    fn test_signup_token_carries_email() {
        let jwt = service();
        let token = jwt.generate_signup_token("a@x.com").unwrap();
        assert_eq!(jwt.verify_signup_token(&token).unwrap(), "a@x.com");
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let jwt = service();
        let access = jwt.generate_access_token(7).unwrap();
        let signup = jwt.generate_signup_token("a@x.com").unwrap();

        assert!(jwt.verify_signup_token(&access).is_err());
        assert!(jwt.verify_access_token(&signup).is_err());
        assert!(jwt.verify_refresh_token(&access).is_err());
        assert_eq!(jwt.verify_access_token(&access).unwrap().sub, "7");
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let token = JwtService::new("other", 60, 60, 60)
            .generate_signup_token("a@x.com")
            .unwrap();
        assert!(service().verify_signup_token(&token).is_err());
    }
}
