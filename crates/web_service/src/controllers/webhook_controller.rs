use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use telegram_client::Update;

use crate::error::AppError;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    timestamp: String,
    uptime: f64,
    bot_ready: bool,
}

async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(Health {
        status: "Bot is running",
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        bot_ready: true,
    })
}

async fn webhook(state: web::Data<AppState>, update: web::Json<Update>) -> impl Responder {
    state.router.route(update.into_inner()).await;
    HttpResponse::Ok().json(json!({ "ok": true }))
}

pub(crate) async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::get().to(health))
            .route(web::post().to(webhook))
            .default_service(web::route().to(method_not_allowed)),
    );
}
