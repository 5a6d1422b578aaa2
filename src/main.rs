mod api;
mod broadcast;
mod config;
mod debate;
mod error;
mod storage;

use config::Config;
use tracing_subscriber::EnvFilter;

use broadcast::Broadcaster;
use debate::engine::DebateEngine;
use debate::negotiation::EndNegotiationTracker;
use debate::presence::PresenceTracker;
use debate::summarizer;
use debate::sweeper;
use debate::timer::TurnTimerManager;
use storage::{MessageLog, RoomStore, UserDirectory};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let engine = DebateEngine::new(
        RoomStore::new(),
        UserDirectory::new(),
        MessageLog::new(),
        Broadcaster::new(),
        TurnTimerManager::new(config.debate.turn_timeout),
        EndNegotiationTracker::new(),
        PresenceTracker::new(),
        summarizer::from_config(&config.summarizer),
        config.debate.clone(),
    );

    let _sweeper = sweeper::start_deletion_sweep(engine.clone(), config.debate.sweep_interval);

    let routes = api::routes::debate_routes(engine);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Debate server listening"
    );
    warp::serve(routes).run(config.bind_address()).await;
}
