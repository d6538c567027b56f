use std::sync::Arc;
use std::time::Instant;

use actix_web::{error::JsonPayloadError, web, App, HttpRequest, HttpResponse, HttpServer};
use delayed_jobs::{JobDispatcher, QueuePoller};
use serde_json::json;
use tracing::{info, warn};

use crate::controllers::{delayed_controller, webhook_controller};
use crate::middleware::TracingMiddleware;
use crate::services::UpdateRouter;

/// Largest accepted request body.
pub const JSON_LIMIT: usize = 256 * 1024;

pub struct AppState {
    pub router: UpdateRouter,
    pub dispatcher: Arc<dyn JobDispatcher>,
    /// `None` when no queue is configured.
    pub poller: Option<Arc<QueuePoller>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        router: UpdateRouter,
        dispatcher: Arc<dyn JobDispatcher>,
        poller: Option<Arc<QueuePoller>>,
    ) -> Self {
        Self {
            router,
            dispatcher,
            poller,
            started_at: Instant::now(),
        }
    }
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected request body: {}", err);
    let response = HttpResponse::InternalServerError().json(json!({ "ok": false }));
    actix_web::error::InternalError::from_response(err, response).into()
}

/// Malformed or oversized bodies answer 500 `{ok:false}`. The Bot API sends
/// no reliable content type, so none is required.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .content_type_required(false)
        .error_handler(json_error_handler)
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .configure(webhook_controller::config)
        .configure(delayed_controller::config);
}

pub async fn run(state: web::Data<AppState>, port: u16) -> std::io::Result<()> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingMiddleware)
            .configure(app_config)
    })
    .bind(("0.0.0.0", port))?
    .run();

    info!("Listening on http://0.0.0.0:{}", port);
    server.await
}
