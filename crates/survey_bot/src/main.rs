use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use clap::Parser;
use delayed_jobs::{
    FallbackScheduler, JobDispatcher, JobQueue, PollWorker, PushScheduler, QueuePoller,
    QueueScheduler, RedisRestQueue,
};
use dialogue_core::{DialogueEngine, InMemoryConversationStore};
use result_exporter::{Mailer, SpreadsheetMailExporter};
use telegram_client::{TelegramApi, TelegramClient};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use web_service::services::{TelegramDispatcher, UpdateRouter};
use web_service::{AppConfig, AppState};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_file(false),
        )
        .init();
}

fn build_state(config: &AppConfig) -> anyhow::Result<(web::Data<AppState>, Option<PollWorker>)> {
    let dialogue = Arc::new(config.load_dialogue()?);
    tracing::info!(branches = dialogue.branches.len(), "Dialogue loaded");

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let telegram: Arc<dyn TelegramApi> =
        Arc::new(TelegramClient::new(http.clone(), config.telegram_config()));
    let dispatcher: Arc<dyn JobDispatcher> = Arc::new(TelegramDispatcher::new(telegram.clone()));

    let queue: Option<Arc<dyn JobQueue>> = config
        .redis_config()
        .map(|redis| Arc::new(RedisRestQueue::new(http.clone(), redis)) as Arc<dyn JobQueue>);

    let mut scheduler = FallbackScheduler::new();
    if let Some(push) = config.push_config() {
        tracing::info!(destination = %push.destination, "Push scheduling enabled");
        scheduler = scheduler.with_strategy(Arc::new(PushScheduler::new(http.clone(), push)));
    }
    if let Some(queue) = &queue {
        tracing::info!("Queue fallback enabled");
        scheduler = scheduler.with_strategy(Arc::new(QueueScheduler::new(queue.clone())));
    }

    let engine_config = config.engine_config();
    let follow_up_enabled = engine_config.follow_up_delay.is_some();

    let exporter = Arc::new(SpreadsheetMailExporter::new(Mailer::smtp(config.mail_config())));
    let mut engine =
        DialogueEngine::new(dialogue, Arc::new(InMemoryConversationStore::new()), exporter)
            .with_config(engine_config);
    match scheduler.into_follow_up() {
        Some(scheduler) => engine = engine.with_scheduler(scheduler),
        None if follow_up_enabled => tracing::warn!(
            "FOLLOW_UP_DELAY_SECS is set but no scheduler is configured; post-final prompts stay inline"
        ),
        None => {}
    }
    let engine = Arc::new(engine);

    let poller = queue.map(|queue| Arc::new(QueuePoller::new(queue, dispatcher.clone())));
    let worker = match (&poller, config.poll_interval()) {
        (Some(poller), Some(interval)) => Some(PollWorker::new(poller.clone(), interval)),
        (None, Some(_)) => {
            tracing::warn!("POLL_INTERVAL_SECS is set but no queue is configured; poller disabled");
            None
        }
        _ => None,
    };

    let router = UpdateRouter::new(engine, telegram);
    let state = web::Data::new(AppState::new(router, dispatcher, poller));
    Ok((state, worker))
}

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::parse();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let (state, worker) = match build_state(&config) {
        Ok(built) => built,
        Err(e) => {
            tracing::error!("Failed to start: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Some(worker) = &worker {
        worker.spawn();
    }

    tracing::info!(port = config.port, "Starting survey bot");
    let result = web_service::run(state, config.port).await;

    if let Some(worker) = &worker {
        worker.stop();
    }

    if let Err(e) = result {
        tracing::error!("Web server error: {}", e);
        std::process::exit(1);
    }
}
