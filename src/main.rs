//! Turn-taking dialogue manager
//!
//! Listens to recognizer and synthesizer IUs on the bus, decides who holds
//! the floor, and publishes system utterances produced by an external
//! dialogue processor.

mod aggregator;
mod api;
mod bus;
mod config;
mod history;
mod iu;
mod listener;
mod processor;
mod runtime;
mod state_machine;

use aggregator::{run_aggregator, Aggregator};
use api::{create_router, AppState};
use bus::Bus;
use clap::Parser;
use config::AppConfig;
use processor::{HttpDialogueProcessor, LoggingProcessor};
use runtime::TurnRuntime;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the YAML configuration file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turntaking=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(&cli.config)?;
    tracing::info!(
        path = %cli.config.display(),
        processor = %config.processor.base_url,
        "Configuration loaded"
    );

    let bus = Bus::new(BUS_CAPACITY);
    let processor = LoggingProcessor::new(Arc::new(HttpDialogueProcessor::new(&config.processor)?));
    let runtime = TurnRuntime::new(config.dialogue.clone(), processor, bus.clone());
    let handle = runtime.handle();

    // Bus -> aggregator -> runtime
    let (iu_tx, iu_rx) = mpsc::unbounded_channel();
    let (end_tx, end_rx) = watch::channel(0.0);
    tokio::spawn(listener::listen_asr(bus.subscribe(iu::ASR), iu_tx));
    tokio::spawn(listener::listen_tts(
        bus.subscribe(iu::TTS),
        end_tx,
        handle.clone(),
    ));
    tokio::spawn(run_aggregator(
        Aggregator::new(config.dialogue.response_generation_interval),
        iu_rx,
        end_rx,
        handle.clone(),
    ));
    let mut runtime_task = tokio::spawn(runtime.run());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(AppState::new(bus, handle))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.server.bind).await?;
    tracing::info!("Turn-taking server listening on {}", config.server.bind);

    tokio::select! {
        result = axum::serve(listener, app) => result?,
        joined = &mut runtime_task => joined??,
    }

    Ok(())
}
