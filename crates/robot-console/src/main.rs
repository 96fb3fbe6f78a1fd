use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use robot_console::{
    config::Config,
    playback::{
        HeadlessMedia, HlsClientFactory, PlaybackController, player_event_channel, spawn_playback,
    },
    services::ConsoleStore,
    streaming::StreamUrlRewriter,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "robot-console")]
#[command(version)]
#[command(about = "Remote-control console for a mobile robot with a low-latency video proxy")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Robot stream server base URL (overrides config file)
    #[arg(short = 'u', long, value_name = "URL")]
    upstream: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the console web server (default)
    Serve,
    /// Follow a stream headlessly and log playback state changes
    Watch {
        /// Stream URL; defaults to the stored one
        url: Option<String>,
    },
}

fn init_tracing(cli: &Cli) {
    let log_filter = if cli.log_level == "trace" {
        format!("robot_console={},tower_http=trace", cli.log_level)
    } else {
        format!("robot_console={}", cli.log_level)
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());

    let fmt_layer = if cli.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Starting Robot Console v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host.clone() {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(upstream) = cli.upstream.clone() {
        config.upstream.base_url = upstream;
    }
    config.validate()?;
    info!("Using upstream stream server: {}", config.upstream.normalized_base_url());

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::Watch { url }) => watch(config, url).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let state = AppState::from_config(config.clone())?;
    let server = WebServer::new(&config, state)?;
    info!("Web server starting on {}:{}", server.host(), server.port());

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    let server_task = tokio::spawn(server.serve_with_cancellation(ready_tx, None));

    match ready_rx.await {
        Ok(Ok(())) => info!("Robot Console ready"),
        Ok(Err(e)) => warn!("Web server failed to start: {}", e),
        Err(_) => warn!("Web server exited before signalling readiness"),
    }

    server_task.await??;
    info!("Robot Console stopped");
    Ok(())
}

async fn watch(config: Config, url: Option<String>) -> Result<()> {
    let store = Arc::new(ConsoleStore::new(config.storage.state_file.clone()));
    let url = match url {
        Some(url) => url,
        None => store.load_stream_url(&config.storage.default_stream_url).await?,
    };

    let low_latency = &config.playback.low_latency;
    let media = HeadlessMedia::new(low_latency.max_buffer_hole, low_latency.back_buffer_length);
    let factory = Arc::new(HlsClientFactory::new(&config)?);
    let (events_tx, events_rx) = player_event_channel();

    let controller = PlaybackController::new(
        config.playback.clone(),
        StreamUrlRewriter::from_config(&config),
        Box::new(media),
        factory,
        events_tx,
    )
    .with_store(store);

    let cancellation_token = CancellationToken::new();
    let handle = spawn_playback(controller, events_rx, cancellation_token.clone());
    let mut snapshots = handle.snapshots();
    handle.connect(url);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                info!(
                    state = %snapshot.state,
                    latency = ?snapshot.latency.map(|l| l.to_string()),
                    error = ?snapshot.error_message,
                    url = %snapshot.stream_url,
                    "Playback state"
                );
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
        }
    }

    handle.shutdown().await;
    cancellation_token.cancel();
    Ok(())
}
