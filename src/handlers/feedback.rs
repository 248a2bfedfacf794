use crate::entities::user_entity;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{FeedbackService, UserService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

/// The signed-in user, if any, for prefilling name and email.
async fn optional_user(
    user_service: &UserService,
    req: &HttpRequest,
) -> Option<user_entity::Model> {
    let user_id = current_user_id(req)?;
    match user_service.get_user_by_id(user_id).await {
        Ok(user) => Some(user).filter(|u| u.is_active),
        Err(e) => {
            log::warn!("Ignoring signed-in user {user_id}: {e}");
            None
        }
    }
}

#[utoipa::path(
    post,
    path = "/feedback",
    tag = "feedback",
    request_body = CreateFeedbackRequest,
    responses(
        (status = 200, description = "Feedback recorded", body = FeedbackResponse),
        (status = 400, description = "Invalid feedback")
    )
)]
pub async fn submit_feedback(
    feedback_service: web::Data<FeedbackService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    request: web::Json<CreateFeedbackRequest>,
) -> Result<HttpResponse> {
    let user = optional_user(&user_service, &req).await;

    match feedback_service
        .submit_feedback(request.into_inner(), user.as_ref())
        .await
    {
        Ok(saved) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            saved,
            "Thank you! Your feedback has been recorded.",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/contact",
    tag = "feedback",
    request_body = CreateContactRequest,
    responses(
        (status = 200, description = "Message received", body = ContactMessageResponse),
        (status = 400, description = "Invalid message")
    )
)]
pub async fn submit_contact(
    feedback_service: web::Data<FeedbackService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    request: web::Json<CreateContactRequest>,
) -> Result<HttpResponse> {
    let user = optional_user(&user_service, &req).await;

    match feedback_service
        .submit_contact(request.into_inner(), user.as_ref())
        .await
    {
        Ok(saved) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            saved,
            "Thank you for contacting us! We'll get back to you soon.",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn feedback_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/feedback", web::post().to(submit_feedback))
        .route("/contact", web::post().to(submit_contact));
}
