use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use botscope_engine::{AdvanceError, BackendError, Debugger, Frame, Inspection};
use botscope_protocol::{PlaybackStatus, SelectRequest, Snapshot, StepRequest};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod platform;

pub use platform::PlatformClient;

/// Upper bound for a single manual step request.
pub const MAX_STEPS: u32 = 1000;

#[derive(Clone)]
pub struct AppState {
    pub debugger: Debugger,
}

type ApiError = (StatusCode, String);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sandbox/state", get(api_sandbox_state))
        .route(
            "/api/sandbox/selection",
            get(api_selection).post(api_select),
        )
        .route("/api/sandbox/step", post(api_sandbox_step))
        .route("/api/sandbox/restart", post(api_sandbox_restart))
        .route("/api/playback", get(api_playback).post(api_playback_control))
        .route("/api/botview.png", get(api_botview_png))
        .with_state(Arc::new(state))
        // The debugger drives a live sandbox; keep it reachable from this machine only.
        .layer(middleware::from_fn(ip_allowlist))
        .layer(local_only_cors())
}

async fn health() -> &'static str {
    "ok"
}

async fn api_sandbox_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Snapshot>, ApiError> {
    let snapshot = state
        .debugger
        .sandbox()
        .state()
        .ok_or_else(|| (StatusCode::NOT_FOUND, "no sandbox state yet".to_string()))?;
    Ok(Json(snapshot.as_ref().clone()))
}

async fn api_selection(State(state): State<Arc<AppState>>) -> Result<Json<Inspection>, ApiError> {
    current_inspection(&state)
}

async fn api_select(
    State(state): State<Arc<AppState>>,
    Json(input): Json<SelectRequest>,
) -> Result<Json<Inspection>, ApiError> {
    if state.debugger.playback().is_running() {
        return Err((
            StatusCode::CONFLICT,
            "selection is locked while playback runs".to_string(),
        ));
    }
    if !state.debugger.select(&input.id) {
        return Err((
            StatusCode::NOT_FOUND,
            format!("entity {} is not in the current turn", input.id),
        ));
    }
    current_inspection(&state)
}

async fn api_sandbox_step(
    State(state): State<Arc<AppState>>,
    Json(input): Json<StepRequest>,
) -> Result<Json<Inspection>, ApiError> {
    if input.steps == 0 || input.steps > MAX_STEPS {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("steps must be between 1 and {MAX_STEPS}"),
        ));
    }
    state
        .debugger
        .step(input.steps)
        .await
        .map_err(advance_error)?;
    current_inspection(&state)
}

async fn api_sandbox_restart(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Inspection>, ApiError> {
    state.debugger.restart().await.map_err(advance_error)?;
    current_inspection(&state)
}

async fn api_playback(State(state): State<Arc<AppState>>) -> Json<PlaybackStatus> {
    Json(PlaybackStatus {
        running: state.debugger.playback().is_running(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Start,
    Stop,
    Toggle,
}

#[derive(Debug, Deserialize)]
struct PlaybackInput {
    action: PlaybackAction,
}

async fn api_playback_control(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PlaybackInput>,
) -> Json<PlaybackStatus> {
    let playback = state.debugger.playback();
    let running = match input.action {
        PlaybackAction::Start => {
            playback.start();
            true
        }
        PlaybackAction::Stop => {
            playback.stop();
            false
        }
        PlaybackAction::Toggle => playback.toggle(),
    };
    Json(PlaybackStatus { running })
}

async fn api_botview_png(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let png = encode_png(state.debugger.bot_view())
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    ))
}

fn current_inspection(state: &AppState) -> Result<Json<Inspection>, ApiError> {
    state
        .debugger
        .inspect()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "nothing selected".to_string()))
}

fn advance_error(err: AdvanceError) -> ApiError {
    tracing::warn!(error = %err, "advance failed");
    let status = match &err {
        AdvanceError::Backend(BackendError::NoSandbox) => StatusCode::CONFLICT,
        AdvanceError::Backend(_) | AdvanceError::Sandbox(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}

pub fn encode_png(frame: Frame) -> anyhow::Result<Vec<u8>> {
    let (width, height) = (frame.width(), frame.height());
    let img = image::RgbImage::from_raw(width, height, frame.into_bytes())
        .context("frame buffer does not match its dimensions")?;
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .context("encode png")?;
    Ok(out.into_inner())
}

/// `~/.botscope/config.yaml`, when a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".botscope").join("config.yaml"))
}

pub async fn serve(addr: SocketAddr, debugger: Debugger) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    serve_listener(listener, debugger, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    debugger: Debugger,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let addr = listener.local_addr()?;
    let app = build_router(AppState { debugger });
    tracing::info!(%addr, "debugger listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(addr)
}

async fn ip_allowlist(
    axum::extract::ConnectInfo(peer): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    if is_allowed_peer_ip(peer.ip()) {
        return next.run(req).await;
    }
    tracing::debug!(%peer, "rejected non-local peer");
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

fn is_allowed_peer_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
    }
}

fn local_only_cors() -> CorsLayer {
    use axum::http::{HeaderValue, Method};

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            origin.to_str().is_ok_and(is_local_origin)
        }))
}

const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

/// `scheme://host[:port]` for a loopback host.
fn is_local_origin(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };
    LOCAL_HOSTS.iter().any(|host| {
        rest.strip_prefix(host)
            .is_some_and(|after| after.is_empty() || after.starts_with(':'))
    })
}
