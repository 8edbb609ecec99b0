use anyhow::{Context, Result};
use clap::Parser;
use digiverifier::{
    create_router, AppState, Config, CpalBackendFactory, LiveSession, ToolDispatcher,
    VerificationFlow, WebSocketConnector,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "digiverifier", about = "Voice-driven identity verification bridge")]
struct Args {
    /// Config file path, extension optional
    #[arg(long, default_value = "config/digiverifier")]
    config: String,

    /// Connect the voice session at startup
    #[arg(long)]
    connect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("DigiVerifier v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Realtime endpoint: {}", cfg.live.endpoint);

    let connector = Arc::new(WebSocketConnector::from_env(
        cfg.live.endpoint.clone(),
        cfg.live.api_key_env.clone(),
        cfg.audio.channel_capacity,
    ));
    let flow = Arc::new(VerificationFlow::new(
        cfg.verification.build_matcher(),
        cfg.verification.delay(),
    ));
    let tools = Arc::new(ToolDispatcher::with_callbacks(flow.clone()));
    let session = Arc::new(LiveSession::new(
        cfg.session_config(),
        connector,
        Arc::new(CpalBackendFactory),
        tools,
    ));

    if args.connect {
        if let Err(e) = session.connect().await {
            error!("Initial connect failed: {}", e);
        }
    }

    let app = create_router(AppState::new(session.clone(), flow));
    let addr = cfg.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server error")?;

    let stats = session.disconnect().await;
    info!(
        "Session {} ended: {} blocks sent, {} chunks played, {} tool calls",
        stats.session_id, stats.blocks_sent, stats.chunks_played, stats.tool_calls_handled
    );

    Ok(())
}
