use crate::error::{AppError, AppResult};
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{FeedbackService, UserService, VerificationCodeStore};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use chrono::Utc;
use serde_json::json;

async fn require_staff(user_service: &UserService, req: &HttpRequest) -> AppResult<()> {
    let user_id = current_user_id(req)
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))?;
    user_service.require_staff(user_id).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/admin/feedback",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Items per page")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Feedback, newest first", body = [FeedbackResponse]),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_feedback(
    user_service: web::Data<UserService>,
    feedback_service: web::Data<FeedbackService>,
    req: HttpRequest,
    query: web::Query<AdminListQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    let params = PaginationParams::new(query.page, query.per_page);
    match feedback_service.list_feedback(&params).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/contact-messages",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Items per page")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Contact messages, newest first", body = [ContactMessageResponse]),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_contact_messages(
    user_service: web::Data<UserService>,
    feedback_service: web::Data<FeedbackService>,
    req: HttpRequest,
    query: web::Query<AdminListQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    let params = PaginationParams::new(query.page, query.per_page);
    match feedback_service.list_contact_messages(&params).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/contact-messages/mark-read",
    tag = "admin",
    request_body = MarkReadRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Messages updated"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn mark_contact_messages(
    user_service: web::Data<UserService>,
    feedback_service: web::Data<FeedbackService>,
    req: HttpRequest,
    request: web::Json<MarkReadRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match feedback_service
        .mark_contact_messages(&request.ids, request.is_read)
        .await
    {
        Ok(count) => {
            let state = if request.is_read { "read" } else { "unread" };
            Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
                json!({ "updated_count": count }),
                format!("{count} message(s) marked as {state}."),
            )))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/verifications",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Items per page")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Verification records with Valid/Expired status", body = [VerificationRecordResponse]),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_verifications(
    user_service: web::Data<UserService>,
    verification_store: web::Data<VerificationCodeStore>,
    req: HttpRequest,
    query: web::Query<AdminListQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    let params = PaginationParams::new(query.page, query.per_page);
    match verification_store.list_recent(&params).await {
        Ok((records, total)) => {
            let now = Utc::now();
            let data = records
                .into_iter()
                .map(|record| {
                    let expired = verification_store.is_expired(&record, now);
                    VerificationRecordResponse::from_record(record, expired)
                })
                .collect();
            Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse::new(
                data, &params, total,
            ))))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/feedback", web::get().to(list_feedback))
            .route("/contact-messages", web::get().to(list_contact_messages))
            .route(
                "/contact-messages/mark-read",
                web::post().to(mark_contact_messages),
            )
            .route("/verifications", web::get().to(list_verifications)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::middlewares::CurrentUserId;
    use crate::services::{NewUser, VerificationPolicy, create_user};
    use actix_web::test::{TestRequest, call_service, init_service, read_body_json};
    use actix_web::{App, HttpMessage, http::StatusCode};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_verifications_listing_is_staff_only() {
        let pool = test_pool().await;
        let staff = create_user(
            &pool,
            NewUser {
                email: "staff@alquran.com".to_string(),
                is_staff: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let visitor = create_user(
            &pool,
            NewUser {
                email: "visitor@example.com".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let store = VerificationCodeStore::new(pool.clone(), VerificationPolicy::default());
        store.create_verification("visitor@example.com").await.unwrap();

        let app = init_service(
            App::new()
                .app_data(web::Data::new(UserService::new(pool.clone())))
                .app_data(web::Data::new(FeedbackService::new(pool)))
                .app_data(web::Data::new(store))
                .configure(admin_config),
        )
        .await;

        let req = TestRequest::get().uri("/admin/verifications").to_request();
        req.extensions_mut().insert(CurrentUserId(visitor.id));
        assert_eq!(call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::get().uri("/admin/verifications").to_request();
        req.extensions_mut().insert(CurrentUserId(staff.id));
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = read_body_json(resp).await;
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["data"][0]["status"], "Valid");
    }
}
