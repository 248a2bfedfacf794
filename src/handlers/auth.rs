use crate::models::*;
use crate::services::AuthService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/auth/signup/email",
    tag = "auth",
    request_body = StartSignupRequest,
    responses(
        (status = 200, description = "Verification code sent", body = SignupStepResponse),
        (status = 400, description = "Invalid or already registered email"),
        (status = 429, description = "Too many codes requested"),
        (status = 502, description = "Email could not be delivered")
    )
)]
pub async fn signup_email(
    auth_service: web::Data<AuthService>,
    request: web::Json<StartSignupRequest>,
) -> Result<HttpResponse> {
    match auth_service.start_signup(request.into_inner()).await {
        Ok(step) => {
            let message = format!("Verification code sent to {}", step.email);
            Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(step, message)))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/signup/verify",
    tag = "auth",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Invalid or expired code"),
        (status = 401, description = "Signup session expired")
    )
)]
pub async fn signup_verify(
    auth_service: web::Data<AuthService>,
    request: web::Json<VerifyCodeRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    let flow = auth_service.signup_flow(request.signup_token.as_deref());

    match auth_service.verify_signup(&flow, &request.code).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            json!({ "email": flow.email }),
            "Email verified. Complete your registration.",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/signup/resend",
    tag = "auth",
    request_body = ResendCodeRequest,
    responses(
        (status = 200, description = "New code sent", body = SignupStepResponse),
        (status = 401, description = "Signup session expired"),
        (status = 429, description = "Cooldown or hourly limit not yet elapsed")
    )
)]
pub async fn signup_resend(
    auth_service: web::Data<AuthService>,
    request: web::Json<ResendCodeRequest>,
) -> Result<HttpResponse> {
    let flow = auth_service.signup_flow(request.signup_token.as_deref());

    match auth_service.resend_code(&flow).await {
        Ok(step) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            step,
            "New verification code sent! Check your email.",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/signup/complete",
    tag = "auth",
    request_body = CompleteSignupRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid name or password"),
        (status = 401, description = "Signup session expired"),
        (status = 403, description = "Email not verified")
    )
)]
pub async fn signup_complete(
    auth_service: web::Data<AuthService>,
    request: web::Json<CompleteSignupRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    let flow = auth_service.signup_flow(request.signup_token.as_deref());

    match auth_service.complete_signup(&flow, request).await {
        Ok(auth) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            auth,
            "Account created successfully!",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/signin",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Wrong email or password")
    )
)]
pub async fn signin(
    auth_service: web::Data<AuthService>,
    request: web::Json<SignInRequest>,
) -> Result<HttpResponse> {
    match auth_service.signin(request.into_inner()).await {
        Ok(auth) => {
            let message = format!("Welcome back, {}!", auth.user.second_name_display);
            Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(auth, message)))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "New access token", body = AuthResponse),
        (status = 401, description = "Missing or invalid refresh token")
    )
)]
pub async fn refresh(
    auth_service: web::Data<AuthService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Ok(HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": {
                "code": "MISSING_TOKEN",
                "message": "Refresh token is required"
            }
        })));
    };

    match auth_service.refresh_token(token).await {
        Ok(auth) => Ok(HttpResponse::Ok().json(ApiResponse::success(auth))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Logged out")
    )
)]
pub async fn logout() -> Result<HttpResponse> {
    // Tokens are stateless; the client discards them.
    Ok(HttpResponse::Ok().json(ApiResponse::message("You have been logged out.")))
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/signup/email", web::post().to(signup_email))
            .route("/signup/verify", web::post().to(signup_verify))
            .route("/signup/resend", web::post().to(signup_resend))
            .route("/signup/complete", web::post().to(signup_complete))
            .route("/signin", web::post().to(signin))
            .route("/refresh", web::post().to(refresh))
            .route("/logout", web::post().to(logout)),
    );
}
