use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::FeedbackType;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup_email,
        handlers::auth::signup_verify,
        handlers::auth::signup_resend,
        handlers::auth::signup_complete,
        handlers::auth::signin,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::user::get_me,
        handlers::feedback::submit_feedback,
        handlers::feedback::submit_contact,
        handlers::surah::surah_audio,
        handlers::admin::list_feedback,
        handlers::admin::list_contact_messages,
        handlers::admin::mark_contact_messages,
        handlers::admin::list_verifications,
    ),
    components(
        schemas(
            StartSignupRequest,
            VerifyCodeRequest,
            ResendCodeRequest,
            CompleteSignupRequest,
            SignupStepResponse,
            SignInRequest,
            UserResponse,
            AuthResponse,
            FeedbackType,
            CreateFeedbackRequest,
            FeedbackResponse,
            CreateContactRequest,
            ContactMessageResponse,
            MarkReadRequest,
            VerificationRecordResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Email signup and sign-in"),
        (name = "user", description = "Signed-in user"),
        (name = "feedback", description = "Feedback and contact forms"),
        (name = "surah", description = "Surah pages"),
        (name = "admin", description = "Staff tools"),
    ),
    info(
        title = "MyQuran Backend API",
        version = "1.0.0",
        description = "Accounts, email verification and feedback for the Al-Qur'an site"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
