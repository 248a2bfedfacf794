use crate::error::AppError;
use crate::models::ApiResponse;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

pub const SURAH_COUNT: u32 = 114;

#[utoipa::path(
    get,
    path = "/surah/{surah_number}/audio",
    tag = "surah",
    params(
        ("surah_number" = u32, Path, description = "Surah number, 1 to 114")
    ),
    responses(
        (status = 200, description = "Surah accepted for playback"),
        (status = 400, description = "Invalid Surah number")
    )
)]
pub async fn surah_audio(path: web::Path<u32>) -> Result<HttpResponse> {
    let surah_number = path.into_inner();
    if !(1..=SURAH_COUNT).contains(&surah_number) {
        return Ok(AppError::ValidationError("Invalid Surah number.".to_string()).error_response());
    }

    Ok(HttpResponse::Ok().json(ApiResponse::success(json!({
        "surah_number": surah_number
    }))))
}

pub fn surah_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/surah").route("/{surah_number}/audio", web::get().to(surah_audio)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test::{TestRequest, call_service, init_service};
    use actix_web::App;

    #[actix_web::test]
    async fn test_surah_range() {
        let app = init_service(App::new().configure(surah_config)).await;

        for (uri, status) in [
            ("/surah/1/audio", StatusCode::OK),
            ("/surah/114/audio", StatusCode::OK),
            ("/surah/0/audio", StatusCode::BAD_REQUEST),
            ("/surah/115/audio", StatusCode::BAD_REQUEST),
        ] {
            let resp = call_service(&app, TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), status, "{uri}");
        }
    }
}
