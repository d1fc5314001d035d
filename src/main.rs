use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use intervue::agent::RealtimeEngine;
use intervue::limiter::{MemoryAttemptStore, UsageLimiter};
use intervue::room::{RoomControlClient, SignalTransport};
use intervue::script::InterviewScript;
use intervue::session::{SessionController, SessionDeps, SessionPolicy};
use intervue::settings::Settings;
use intervue::table::TableClient;
use intervue::worker::Worker;

const AGENT_NAME: &str = "intervue";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env().context("failed to load settings")?;

    let script = match &settings.session.script_path {
        Some(path) => InterviewScript::from_file(path)
            .with_context(|| format!("failed to load interview script from {:?}", path))?,
        None => InterviewScript::default(),
    };
    info!(
        questions = script.questions.len(),
        voice = %script.voice,
        "interview script loaded"
    );

    let deps = SessionDeps {
        transport: Arc::new(SignalTransport::new(
            &settings.room_service.ws_url,
            &settings.room_service.api_key,
        )),
        control: Arc::new(RoomControlClient::new(
            &settings.room_service.http_url,
            &settings.room_service.api_key,
        )),
        engine: Arc::new(RealtimeEngine::new(
            &settings.engine.url,
            &settings.engine.api_key,
        )),
        tracking: Arc::new(TableClient::new(
            &settings.table.api_key,
            &settings.table.base_id,
            &settings.table.table_id,
        )),
        limiter: Arc::new(UsageLimiter::new(
            Arc::new(MemoryAttemptStore::default()),
            settings.session.usage_limit,
        )),
    };

    let policy = SessionPolicy {
        timeout: settings.session.timeout,
        join_timeout: settings.session.join_timeout,
        test_participant_name: settings.session.test_participant_name.clone(),
        script,
        storage: settings.storage.to_s3_upload(),
    };

    let controller = Arc::new(SessionController::new(deps, policy));
    let worker = Worker::new(
        controller,
        &settings.room_service.ws_url,
        &settings.room_service.api_key,
        AGENT_NAME,
    );

    worker.run().await
}
