use std::sync::Arc;

use anyhow::Context;
use tokio::{
    net::TcpListener,
    signal::unix::{signal, SignalKind},
    sync::broadcast,
    task::JoinSet,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    room_manager::RoomManager,
    session::SessionContext,
    study::{ContentGenerator, GeminiGenerator, StudyService},
};

mod config;
mod error;
mod room_manager;
mod session;
mod study;
mod util;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let generator: Option<Arc<dyn ContentGenerator>> = match config.gemini.clone() {
        Some(gemini) => {
            info!(model = %gemini.model, "content generation enabled");
            Some(Arc::new(GeminiGenerator::new(gemini)?))
        }
        None => {
            warn!("GEMINI_API_KEY is not set, flashcard and quiz generation is disabled");
            None
        }
    };
    let context = SessionContext {
        rooms: Arc::new(RoomManager::new()),
        study: Arc::new(StudyService::new(generator)),
    };

    let mut join_set: JoinSet<anyhow::Result<()>> = JoinSet::new();
    let mut interrupt =
        signal(SignalKind::interrupt()).context("failed to create interrupt signal stream")?;
    let server = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("could not bind to {}:{}", config.host, config.port))?;
    let (quit_tx, quit_rx) = broadcast::channel::<()>(1);

    info!(host = %config.host, port = config.port, "listening");
    loop {
        tokio::select! {
            _ = interrupt.recv() => {
                info!("server interrupted, gracefully shutting down");
                // no receivers left means no session to stop
                let _ = quit_tx.send(());
                break;
            }
            Ok((socket, _)) = server.accept() => {
                join_set.spawn(session::handle_user_session(context.clone(), quit_rx.resubscribe(), socket));
            }
            Some(joined) = join_set.join_next() => match joined {
                Ok(Err(err)) => error!("session failed: {:#}", err),
                Err(err) => error!(%err, "session task panicked"),
                Ok(Ok(())) => {}
            },
        }
    }

    while join_set.join_next().await.is_some() {}
    info!("server shut down");

    Ok(())
}
