use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(unique)]
    pub username: String,
    pub full_name: Option<String>,
    /// `None` for accounts created through social sign-in.
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::social_accounts::Entity")]
    SocialAccounts,
}

impl Related<super::social_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SocialAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    fn name_parts(&self) -> Vec<&str> {
        self.full_name
            .as_deref()
            .map(|n| n.split_whitespace().collect())
            .unwrap_or_default()
    }

    fn fallback_name(&self) -> String {
        if !self.username.is_empty() {
            return self.username.clone();
        }
        email_local_part(&self.email).to_string()
    }

    /// First word of the full name, else username, else the email local part.
    pub fn first_name_display(&self) -> String {
        match self.name_parts().first() {
            Some(first) => first.to_string(),
            None => self.fallback_name(),
        }
    }

    /// Second word of the full name (or the only word), with the same fallbacks.
    pub fn second_name_display(&self) -> String {
        let parts = self.name_parts();
        match parts.as_slice() {
            [_, second, ..] => second.to_string(),
            [only] => only.to_string(),
            [] => self.fallback_name(),
        }
    }

    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
