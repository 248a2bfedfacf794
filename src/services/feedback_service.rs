use crate::entities::{contact_message_entity as contacts, feedback_entity as feedback, user_entity};
use crate::error::{AppError, AppResult};
use crate::models::{
    ContactMessageResponse, CreateContactRequest, CreateFeedbackRequest, FeedbackResponse,
    PaginatedResponse, PaginationParams,
};
use crate::utils::normalize_email;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

const MAX_NAME_LENGTH: usize = 150;
const MAX_SUBJECT_LENGTH: usize = 200;

/// Trimmed value, or `None` when blank.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_length(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::ValidationError(format!(
            "{field} must be at most {max} characters."
        )));
    }
    Ok(())
}

/// Name offered for a signed-in user: full name, else the first name display.
fn prefill_name(user: &user_entity::Model) -> String {
    user.full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| user.first_name_display())
}

#[derive(Clone)]
pub struct FeedbackService {
    pool: DatabaseConnection,
}

impl FeedbackService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn submit_feedback(
        &self,
        request: CreateFeedbackRequest,
        user: Option<&user_entity::Model>,
    ) -> AppResult<FeedbackResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::ValidationError("Message is required.".to_string()));
        }
        if let Some(rating) = request.rating
            && !(1..=5).contains(&rating)
        {
            return Err(AppError::ValidationError(
                "Rating must be between 1 and 5.".to_string(),
            ));
        }

        let name = non_blank(request.name).or_else(|| user.map(prefill_name));
        let email = match non_blank(request.email) {
            Some(email) => Some(normalize_email(&email)?),
            None => user.map(|u| u.email.clone()),
        };
        let name = name.unwrap_or_default();
        check_length("Name", &name, MAX_NAME_LENGTH)?;

        let model = feedback::ActiveModel {
            name: Set(name),
            email: Set(email.unwrap_or_default()),
            feedback_type: Set(request.feedback_type),
            rating: Set(request.rating),
            message: Set(message.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!(
            "Feedback {} received ({}, rating {:?})",
            model.id,
            model.feedback_type,
            model.rating
        );
        Ok(model.into())
    }

    pub async fn submit_contact(
        &self,
        request: CreateContactRequest,
        user: Option<&user_entity::Model>,
    ) -> AppResult<ContactMessageResponse> {
        let name = non_blank(request.name)
            .or_else(|| user.map(prefill_name))
            .ok_or_else(|| AppError::ValidationError("Name is required.".to_string()))?;
        check_length("Name", &name, MAX_NAME_LENGTH)?;

        let email = match non_blank(request.email) {
            Some(email) => normalize_email(&email)?,
            None => user
                .map(|u| u.email.clone())
                .ok_or_else(|| AppError::ValidationError("Email is required.".to_string()))?,
        };

        let subject = request.subject.trim();
        if subject.is_empty() {
            return Err(AppError::ValidationError("Subject is required.".to_string()));
        }
        check_length("Subject", subject, MAX_SUBJECT_LENGTH)?;

        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::ValidationError("Message is required.".to_string()));
        }

        let model = contacts::ActiveModel {
            name: Set(name),
            email: Set(email),
            subject: Set(subject.to_string()),
            message: Set(message.to_string()),
            created_at: Set(Utc::now()),
            is_read: Set(false),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Contact message {} received from {}", model.id, model.email);
        Ok(model.into())
    }

    pub async fn list_feedback(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<FeedbackResponse>> {
        let total = feedback::Entity::find().count(&self.pool).await?;
        let items = feedback::Entity::find()
            .order_by_desc(feedback::Column::CreatedAt)
            .order_by_desc(feedback::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            params,
            total,
        ))
    }

    pub async fn list_contact_messages(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<ContactMessageResponse>> {
        let total = contacts::Entity::find().count(&self.pool).await?;
        let items = contacts::Entity::find()
            .order_by_desc(contacts::Column::CreatedAt)
            .order_by_desc(contacts::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            params,
            total,
        ))
    }

    /// Bulk read/unread toggle. Returns the number of rows changed.
    pub async fn mark_contact_messages(&self, ids: &[i32], is_read: bool) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = contacts::Entity::update_many()
            .col_expr(contacts::Column::IsRead, Expr::value(is_read))
            .filter(contacts::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::entities::FeedbackType;
    use crate::services::{NewUser, create_user};

    fn feedback_request(message: &str) -> CreateFeedbackRequest {
        CreateFeedbackRequest {
            name: None,
            email: None,
            feedback_type: FeedbackType::default(),
            rating: None,
            message: message.to_string(),
        }
    }

    fn contact_request() -> CreateContactRequest {
        CreateContactRequest {
            name: None,
            email: None,
            subject: "Recitation audio".to_string(),
            message: "Surah 18 audio stops halfway.".to_string(),
        }
    }

    async fn signed_in_user(pool: &DatabaseConnection) -> user_entity::Model {
        create_user(
            pool,
            NewUser {
                email: "amina@example.com".to_string(),
                full_name: Some("Amina Yusuf".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_feedback() {
        let service = FeedbackService::new(test_pool().await);
        let saved = service
            .submit_feedback(feedback_request("Lovely site"), None)
            .await
            .unwrap();

        assert_eq!(saved.display_name, "Anonymous");
        assert_eq!(saved.feedback_type, FeedbackType::Other);
        assert_eq!(saved.rating, None);
    }

    #[tokio::test]
    async fn test_feedback_validation() {
        let service = FeedbackService::new(test_pool().await);

        let mut bad_rating = feedback_request("ok");
        bad_rating.rating = Some(6);
        assert!(service.submit_feedback(bad_rating, None).await.is_err());

        assert!(service
            .submit_feedback(feedback_request("   "), None)
            .await
            .is_err());

        let mut bad_email = feedback_request("ok");
        bad_email.email = Some("nope".to_string());
        assert!(service.submit_feedback(bad_email, None).await.is_err());
    }

    #[tokio::test]
    async fn test_signed_in_user_prefills_empty_fields() {
        let pool = test_pool().await;
        let user = signed_in_user(&pool).await;
        let service = FeedbackService::new(pool);

        let mut request = feedback_request("Please add tafsir");
        request.feedback_type = FeedbackType::Feature;
        request.rating = Some(5);
        let saved = service.submit_feedback(request, Some(&user)).await.unwrap();
        assert_eq!(saved.name, "Amina Yusuf");
        assert_eq!(saved.email, "amina@example.com");

        let mut contact = contact_request();
        contact.name = Some("Someone Else".to_string());
        let saved = service.submit_contact(contact, Some(&user)).await.unwrap();
        assert_eq!(saved.name, "Someone Else");
        assert_eq!(saved.email, "amina@example.com");
        assert!(!saved.is_read);
    }

    #[tokio::test]
    async fn test_anonymous_contact_needs_name_and_email() {
        let service = FeedbackService::new(test_pool().await);
        assert!(service.submit_contact(contact_request(), None).await.is_err());

        let mut long_subject = contact_request();
        long_subject.name = Some("Bilal".to_string());
        long_subject.email = Some("bilal@example.com".to_string());
        long_subject.subject = "x".repeat(201);
        assert!(service.submit_contact(long_subject, None).await.is_err());
    }

    #[tokio::test]
    async fn test_staff_listing_and_mark_read() {
        let pool = test_pool().await;
        let user = signed_in_user(&pool).await;
        let service = FeedbackService::new(pool);

        let mut ids = Vec::new();
        for _ in 0..3 {
            let saved = service
                .submit_contact(contact_request(), Some(&user))
                .await
                .unwrap();
            ids.push(saved.id);
        }

        assert_eq!(service.mark_contact_messages(&ids[..2], true).await.unwrap(), 2);
        assert_eq!(service.mark_contact_messages(&[], true).await.unwrap(), 0);

        let page = service
            .list_contact_messages(&PaginationParams::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].id, ids[2]);
        assert!(!page.data[0].is_read);
        assert!(page.data[1].is_read);
    }
}
