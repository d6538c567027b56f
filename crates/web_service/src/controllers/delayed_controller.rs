use actix_web::{web, HttpResponse};
use chrono::Utc;
use delayed_jobs::{DispatchRequest, JobDispatcher};
use serde_json::json;
use tracing::info;

use super::webhook_controller::method_not_allowed;
use crate::config::DISPATCH_PATH;
use crate::error::{AppError, Result};
use crate::server::AppState;

/// Callback of the push-schedule service: send the message now.
async fn dispatch_delayed(
    state: web::Data<AppState>,
    request: web::Json<DispatchRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    let (Some(user_id), Some(message)) = (request.user_id, request.message) else {
        return Err(AppError::BadRequest(
            "userId and message are required".to_string(),
        ));
    };

    state
        .dispatcher
        .dispatch(user_id, &message, request.options.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

/// Drain the fallback queue; called by an external scheduler.
async fn cron(state: web::Data<AppState>) -> Result<HttpResponse> {
    let poller = state.poller.as_ref().ok_or(AppError::QueueUnavailable)?;
    let processed = poller.drain(Utc::now().timestamp_millis()).await?;
    info!(processed, "Cron drain finished");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "processed": processed })))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(DISPATCH_PATH)
            .route(web::post().to(dispatch_delayed))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/cron")
            .route(web::get().to(cron))
            .route(web::post().to(cron))
            .default_service(web::route().to(method_not_allowed)),
    );
}
