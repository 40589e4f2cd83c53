use anyhow::Context;
use botscope_engine::{
    trace_signals, AdvanceError, Debugger, DebuggerConfig, ErrorHandler, ReplayBackend,
    SimulationBackend,
};
use botscope_server::PlatformClient;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "botscope-server")]
#[command(about = "Step through a bot sandbox and watch what each entity sees")]
struct Args {
    /// Address of the local debugger service
    #[arg(long, default_value = "127.0.0.1:39444")]
    listen: SocketAddr,

    /// Base URL of the game platform, e.g. http://localhost:8080
    #[arg(long, requires = "user", conflicts_with = "replay")]
    platform: Option<String>,

    /// Platform user whose sandbox to debug
    #[arg(long)]
    user: Option<String>,

    /// JSON file with a recorded list of turns to replay instead of a live sandbox
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Debugger config (YAML); defaults to ~/.botscope/config.yaml when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).init();

    let config = load_config(args.config.as_deref())?;
    let backend: Arc<dyn SimulationBackend> = match (&args.platform, &args.user, &args.replay) {
        (Some(base), Some(user), None) => Arc::new(
            PlatformClient::login(base, user)
                .await
                .with_context(|| format!("log in to {base} as {user}"))?,
        ),
        (None, _, Some(path)) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read replay: {}", path.display()))?;
            let replay = ReplayBackend::from_json(&raw)
                .with_context(|| format!("parse replay: {}", path.display()))?;
            tracing::info!(turns = replay.len(), "replaying recorded sandbox");
            Arc::new(replay)
        }
        _ => anyhow::bail!("pass either --platform and --user, or --replay"),
    };

    let on_error: ErrorHandler =
        Arc::new(|err: &AdvanceError| tracing::error!(error = %err, "playback advance failed"));
    let debugger = Debugger::new(&config, backend, on_error);
    let _trace = trace_signals(debugger.bus());

    debugger.open().await.context("open sandbox")?;
    botscope_server::serve(args.listen, debugger.clone()).await?;

    if let Err(err) = debugger.close().await {
        tracing::warn!(error = %err, "cannot destroy sandbox on shutdown");
    }
    Ok(())
}

fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<DebuggerConfig> {
    if let Some(path) = explicit {
        return DebuggerConfig::load(path);
    }
    match botscope_server::default_config_path() {
        Some(path) if path.exists() => DebuggerConfig::load(&path),
        _ => Ok(DebuggerConfig::default()),
    }
}
