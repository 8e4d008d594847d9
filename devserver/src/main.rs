//! Local development server for the dashboard webapp
//!
//! Serves the webapp module, an internal remote API used by test tooling
//! for privileged operations, and an admin control server. On startup the
//! bound endpoints are announced on stderr and a warmup probe is issued
//! against the module; the logged probe line is what supervising tooling
//! watches for to decide the server is ready.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{mpsc, RwLock};

/// Development server for the dashboard webapp
#[derive(Parser)]
#[command(name = "devserver")]
#[command(about = "Runs the dashboard webapp locally with an admin and remote API server")]
struct Args {
    /// Port for the webapp module
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Port for the internal remote API server (0 picks a free port)
    #[arg(long, default_value_t = 0)]
    api_port: u16,

    /// Port for the admin control server (0 picks a free port)
    #[arg(long, default_value_t = 0)]
    admin_port: u16,

    /// Host to bind all listeners on
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Restart the module automatically when sources change
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    automatic_restart: bool,

    /// Skip the update check on startup
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    skip_update_check: bool,

    /// Start from a fresh datastore instead of reusing persisted state
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    clear_state: bool,

    /// Delay before the module starts serving (for exercising slow startups)
    #[arg(long, default_value_t = 0)]
    startup_delay_ms: u64,

    /// Acknowledge /quit without shutting down (for exercising forced kills)
    #[arg(long)]
    ignore_quit: bool,

    /// Exit unconditionally after this many seconds (0 disables the watchdog)
    #[arg(long, default_value_t = 0)]
    max_lifetime_secs: u64,
}

#[derive(Clone)]
struct AppState {
    datastore: Arc<RwLock<HashMap<String, String>>>,
}

#[derive(Clone)]
struct AdminState {
    quit: mpsc::Sender<()>,
    ignore_quit: bool,
}

#[derive(Serialize)]
struct ApiStatus {
    status: &'static str,
    entries: usize,
}

#[derive(Deserialize)]
struct SeedRequest {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct SeedResponse {
    success: bool,
    entries: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    tracing::info!("🖥️  Starting dashboard dev server");
    if args.automatic_restart {
        tracing::warn!("⚠️ automatic restart is not supported; running without it");
    }
    if !args.skip_update_check {
        tracing::debug!("update checks are not performed by this server");
    }
    if args.clear_state {
        tracing::info!("🧹 Starting with a fresh datastore");
    } else {
        tracing::warn!("⚠️ persisted state is not supported; the datastore is in-memory per run");
    }

    let state = AppState {
        datastore: Arc::new(RwLock::new(HashMap::new())),
    };
    let (quit_tx, mut quit_rx) = mpsc::channel::<()>(1);

    // Admin control server. Announced first so supervising tooling can
    // capture its address before the module comes up.
    let admin_listener = TcpListener::bind((args.host.as_str(), args.admin_port)).await?;
    let admin_port = admin_listener.local_addr()?.port();
    let admin_router = Router::new().route("/quit", get(quit)).with_state(AdminState {
        quit: quit_tx,
        ignore_quit: args.ignore_quit,
    });
    eprintln!("Starting admin server at: http://{}:{}", args.host, admin_port);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(admin_listener, admin_router).await {
            tracing::error!("❌ Admin server error: {e}");
        }
    });

    // Internal remote API server.
    let api_listener = TcpListener::bind((args.host.as_str(), args.api_port)).await?;
    let api_port = api_listener.local_addr()?.port();
    let api_router = Router::new()
        .route("/", get(api_status))
        .route("/_ah/remote_api", get(remote_api_probe).post(remote_api_seed))
        .with_state(state.clone());
    eprintln!("Starting API server at: http://{}:{}", args.host, api_port);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(api_listener, api_router).await {
            tracing::error!("❌ API server error: {e}");
        }
    });

    if args.startup_delay_ms > 0 {
        tracing::info!("⏳ Delaying module startup by {}ms", args.startup_delay_ms);
        tokio::time::sleep(Duration::from_millis(args.startup_delay_ms)).await;
    }

    // Webapp module.
    let app_listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    let app_port = app_listener.local_addr()?.port();
    let app_router = Router::new()
        .route("/", get(index))
        .route("/_ah/warmup", get(warmup))
        .with_state(state);
    eprintln!(
        "Starting module \"default\" running at: http://{}:{}",
        args.host, app_port
    );
    tokio::spawn(async move {
        if let Err(e) = axum::serve(app_listener, app_router).await {
            tracing::error!("❌ Module server error: {e}");
        }
    });

    issue_warmup_probe(&args.host, app_port).await?;
    tracing::info!(
        "✅ Dev server up: module :{app_port}, api :{api_port}, admin :{admin_port}"
    );

    tokio::select! {
        _ = quit_rx.recv() => {
            tracing::info!("🛑 Quit requested via admin server, shutting down");
        }
        _ = watchdog(args.max_lifetime_secs) => {
            tracing::warn!("⏰ Watchdog expired after {}s, shutting down", args.max_lifetime_secs);
        }
        _ = signal::ctrl_c() => {
            tracing::info!("🛑 Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Issues the warmup request against the module so the readiness line gets
/// logged by the handler.
async fn issue_warmup_probe(host: &str, port: u16) -> anyhow::Result<()> {
    let url = format!("http://{host}:{port}/_ah/warmup");
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    for attempt in 1..=5 {
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(response) => {
                tracing::warn!("⚠️ Warmup probe attempt {attempt} returned {}", response.status());
            }
            Err(e) => {
                tracing::debug!("warmup probe attempt {attempt} failed: {e}");
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("warmup probe against {url} never succeeded")
}

async fn watchdog(max_lifetime_secs: u64) {
    if max_lifetime_secs == 0 {
        std::future::pending::<()>().await
    } else {
        tokio::time::sleep(Duration::from_secs(max_lifetime_secs)).await
    }
}

async fn quit(State(admin): State<AdminState>) -> &'static str {
    if admin.ignore_quit {
        tracing::warn!("⚠️ Ignoring quit request (--ignore-quit)");
        return "quit ignored";
    }
    tracing::info!("🛑 Quit requested via admin server");
    let quit = admin.quit.clone();
    tokio::spawn(async move {
        // Let the response flush before the process winds down.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = quit.send(()).await;
    });
    "shutting down"
}

async fn index(State(state): State<AppState>) -> String {
    let entries = state.datastore.read().await.len();
    format!("dashboard dev server: {entries} seeded entries")
}

async fn warmup() -> &'static str {
    // Request log line; supervising tooling treats it as the ready signal.
    eprintln!("default: \"GET /_ah/warmup HTTP/1.1\" 200");
    "warmup complete"
}

async fn api_status(State(state): State<AppState>) -> Json<ApiStatus> {
    let entries = state.datastore.read().await.len();
    Json(ApiStatus {
        status: "ok",
        entries,
    })
}

async fn remote_api_probe() -> &'static str {
    "remote_api handler is running"
}

async fn remote_api_seed(
    State(state): State<AppState>,
    Json(request): Json<SeedRequest>,
) -> Json<SeedResponse> {
    let mut datastore = state.datastore.write().await;
    datastore.insert(request.key, request.value);
    Json(SeedResponse {
        success: true,
        entries: datastore.len(),
    })
}
