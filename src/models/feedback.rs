use crate::entities::{FeedbackType, contact_message_entity, feedback_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const FEEDBACK_PREVIEW_LEN: usize = 50;
const CONTACT_PREVIEW_LEN: usize = 75;

/// First `max` characters followed by "..." when the text is longer.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateFeedbackRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub feedback_type: FeedbackType,
    #[schema(minimum = 1, maximum = 5)]
    pub rating: Option<i16>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponse {
    pub id: i32,
    pub name: String,
    pub display_name: String,
    pub email: String,
    pub feedback_type: FeedbackType,
    pub feedback_type_label: String,
    pub rating: Option<i16>,
    pub message: String,
    pub message_preview: String,
    pub created_at: DateTime<Utc>,
}

impl From<feedback_entity::Model> for FeedbackResponse {
    fn from(m: feedback_entity::Model) -> Self {
        Self {
            display_name: m.display_name().to_string(),
            feedback_type_label: m.feedback_type.label().to_string(),
            message_preview: preview(&m.message, FEEDBACK_PREVIEW_LEN),
            id: m.id,
            name: m.name,
            email: m.email,
            feedback_type: m.feedback_type,
            rating: m.rating,
            message: m.message,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContactMessageResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub message_preview: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<contact_message_entity::Model> for ContactMessageResponse {
    fn from(m: contact_message_entity::Model) -> Self {
        Self {
            message_preview: preview(&m.message, CONTACT_PREVIEW_LEN),
            id: m.id,
            name: m.name,
            email: m.email,
            subject: m.subject,
            message: m.message,
            is_read: m.is_read,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    pub ids: Vec<i32>,
    pub is_read: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 50), "short");
        let long = "بسم ".repeat(30);
        let p = preview(&long, 75);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 78);
    }
}
