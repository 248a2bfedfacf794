use crate::entities::user_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignInRequest {
    #[schema(example = "amina@example.com")]
    pub email: String,
    #[schema(example = "Tilawah-2024")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub first_name_display: String,
    pub second_name_display: String,
    pub is_staff: bool,
    pub has_password: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Profile handed over by the OAuth integration once the provider has
/// authenticated the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SocialProfile {
    #[schema(example = "google")]
    pub provider: String,
    #[schema(example = "109876543210987654321")]
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SocialProfile {
    /// `name`, else `given_name family_name`, else `first_name last_name`.
    pub fn full_name(&self) -> Option<String> {
        let joined = |a: &Option<String>, b: &Option<String>| {
            format!(
                "{} {}",
                a.as_deref().unwrap_or_default(),
                b.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string()
        };

        let name = if let Some(name) = &self.name {
            name.trim().to_string()
        } else if self.given_name.is_some() {
            joined(&self.given_name, &self.family_name)
        } else if self.first_name.is_some() && self.last_name.is_some() {
            joined(&self.first_name, &self.last_name)
        } else {
            String::new()
        };

        (!name.is_empty()).then_some(name)
    }
}

impl From<user_entity::Model> for UserResponse {
    fn from(user: user_entity::Model) -> Self {
        Self {
            first_name_display: user.first_name_display(),
            second_name_display: user.second_name_display(),
            has_password: user.has_usable_password(),
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}
