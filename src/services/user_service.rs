use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::models::UserResponse;
use crate::utils::{hash_password, username_base};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, Set,
};

/// Fields needed to create an account.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
}

impl UserService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabaseConnection {
        &self.pool
    }

    pub async fn get_user_by_id(&self, user_id: i32) -> AppResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_profile(&self, user_id: i32) -> AppResult<UserResponse> {
        let user = self.get_user_by_id(user_id).await?;
        Ok(user.into())
    }

    /// `email` must already be normalised.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.pool)
            .await?)
    }

    /// Active staff account or `PermissionDenied`.
    pub async fn require_staff(&self, user_id: i32) -> AppResult<users::Model> {
        let user = self.get_user_by_id(user_id).await?;
        if !user.is_active || !user.is_staff {
            return Err(AppError::PermissionDenied);
        }
        Ok(user)
    }

    pub async fn record_login(&self, user: users::Model, at: DateTime<Utc>) -> AppResult<users::Model> {
        let mut active = user.into_active_model();
        active.last_login = Set(Some(at));
        Ok(active.update(&self.pool).await?)
    }

    /// Create a superuser unless one already exists. Returns the new account.
    pub async fn ensure_superuser(
        &self,
        email: &str,
        password: &str,
    ) -> AppResult<Option<users::Model>> {
        let existing = users::Entity::find()
            .filter(users::Column::IsSuperuser.eq(true))
            .count(&self.pool)
            .await?;
        if existing > 0 {
            log::info!("Superuser already exists, skipping");
            return Ok(None);
        }

        let email = crate::utils::normalize_email(email)?;
        if let Some(user) = self.find_by_email(&email).await? {
            // promote the existing account rather than fail on the unique email
            let mut active = user.into_active_model();
            active.is_staff = Set(true);
            active.is_superuser = Set(true);
            let user = active.update(&self.pool).await?;
            log::info!("Promoted {} to superuser", user.email);
            return Ok(Some(user));
        }

        let user = create_user(
            &self.pool,
            NewUser {
                email,
                full_name: None,
                password_hash: Some(hash_password(password)?),
                is_staff: true,
                is_superuser: true,
            },
        )
        .await?;
        log::info!("Created superuser {}", user.email);
        Ok(Some(user))
    }
}

/// Username derived from the email local part, suffixed with the first free
/// number when taken: `amina`, `amina1`, `amina2`, ...
pub async fn unique_username<C: ConnectionTrait>(conn: &C, email: &str) -> AppResult<String> {
    let base = username_base(email);
    let mut candidate = base.clone();
    let mut suffix = 0u32;

    loop {
        let taken = users::Entity::find()
            .filter(users::Column::Username.eq(candidate.as_str()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        suffix += 1;
        candidate = format!("{base}{suffix}");
    }
}

pub async fn create_user<C: ConnectionTrait>(conn: &C, new_user: NewUser) -> AppResult<users::Model> {
    let username = unique_username(conn, &new_user.email).await?;
    let user = users::ActiveModel {
        email: Set(new_user.email),
        username: Set(username),
        full_name: Set(new_user.full_name),
        password_hash: Set(new_user.password_hash),
        is_active: Set(true),
        is_staff: Set(new_user.is_staff),
        is_superuser: Set(new_user.is_superuser),
        date_joined: Set(Utc::now()),
        last_login: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;

    fn plain(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_username_gets_numeric_suffix() {
        let pool = test_pool().await;
        let first = create_user(&pool, plain("amina@example.com")).await.unwrap();
        let second = create_user(&pool, plain("amina@example.org")).await.unwrap();
        let third = create_user(&pool, plain("amina@example.net")).await.unwrap();

        assert_eq!(first.username, "amina");
        assert_eq!(second.username, "amina1");
        assert_eq!(third.username, "amina2");
    }

    #[tokio::test]
    async fn test_ensure_superuser_is_idempotent() {
        let service = UserService::new(test_pool().await);

        let created = service
            .ensure_superuser("Admin@AlQuran.com", "admin123")
            .await
            .unwrap()
            .expect("superuser created");
        assert_eq!(created.email, "admin@alquran.com");
        assert!(created.is_staff && created.is_superuser);
        assert!(created.has_usable_password());

        assert!(service
            .ensure_superuser("other@alquran.com", "x")
            .await
            .unwrap()
            .is_none());
        assert!(service.require_staff(created.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_require_staff_rejects_regular_users() {
        let service = UserService::new(test_pool().await);
        let user = create_user(service.pool(), plain("bilal@example.com"))
            .await
            .unwrap();

        assert!(matches!(
            service.require_staff(user.id).await,
            Err(AppError::PermissionDenied)
        ));
        assert!(matches!(
            service.get_user_by_id(999).await,
            Err(AppError::NotFound(_))
        ));
    }
}
