//! trackchat - terminal client for a tracker's live chatbox
//!
//! A browser session (driven over WebDriver) logs in and watches the chat;
//! captured messages are rendered in a Ratatui interface and typed messages
//! are sent back through the same session.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use trackchat_utils::{init_logging_with_config, LogConfig, Result};

mod cli;
mod config;
mod dispatcher;
mod pipeline;
mod session;
mod source;
mod supervisor;
mod ui;

use cli::Args;
use config::{AppConfig, ConfigLoader, DEFAULT_CONFIG_TOML};
use dispatcher::Dispatcher;
use pipeline::{message_channel, CapturePipeline, DedupSettings, Deduplicator, MessageExtractor};
use session::session_state;
use source::{EventSource, LoopbackSource, TrackerSource};
use supervisor::{SessionSupervisor, SupervisorSettings};
use ui::App;

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's env fallbacks can see it
    let dotenv = dotenvy::dotenv();
    let args = Args::parse_args();

    if args.print_default_config {
        print!("{}", DEFAULT_CONFIG_TOML.trim_start());
        return Ok(());
    }

    let log_config = if args.debug {
        LogConfig::client_debug()
    } else {
        LogConfig::client()
    };
    init_logging_with_config(log_config)?;
    tracing::info!("trackchat starting");
    tracing::debug!("CLI args: {:?}", args);
    match dotenv {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }

    match run_app(args).await {
        Ok(()) => {
            tracing::info!("trackchat exiting normally");
            Ok(())
        }
        Err(e) => {
            tracing::error!("trackchat error: {}", e);
            // Terminal is restored by now
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => ConfigLoader::load()?,
    };
    args.apply_to(&mut config);
    ConfigLoader::validate(&config)?;
    Ok(config)
}

fn build_source(args: &Args, config: &AppConfig) -> Result<Arc<dyn EventSource>> {
    if args.loopback {
        let name = config
            .tracker
            .username
            .clone()
            .unwrap_or_else(|| "you".to_string());
        tracing::info!("Using loopback source");
        return Ok(Arc::new(LoopbackSource::new(name)));
    }

    let url = ConfigLoader::validate_tracker(config)?;
    Ok(Arc::new(TrackerSource::new(url, config)?))
}

async fn run_app(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let source = build_source(&args, &config)?;

    let (state_writer, state_reader) = session_state();
    let (producer, consumer) = message_channel(
        config.pipeline.channel_capacity,
        config.pipeline.backpressure_wait(),
    );
    let pipeline = CapturePipeline::new(
        MessageExtractor::new(&config.selectors.staff_groups),
        Deduplicator::new(DedupSettings::from_config(&config.pipeline)),
        producer,
    );

    let shutdown = CancellationToken::new();
    let capture = SessionSupervisor::new(
        source.clone(),
        pipeline,
        state_writer,
        SupervisorSettings::from_config(&config.session),
        shutdown.clone(),
    )
    .spawn();

    let dispatcher = Dispatcher::new(
        source.clone(),
        state_reader.clone(),
        config.ui.max_message_length,
    );
    let app = App::new(
        consumer,
        state_reader,
        dispatcher,
        shutdown,
        capture,
        source.describe(),
        &config.ui,
    );

    let result = app.run().await;
    source.shutdown().await;
    result
}
