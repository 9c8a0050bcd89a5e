//! Entry point for the `tankage-metrics` dashboard service.
//!
//! Startup: load `.env` and the environment into [`Config`], initialise
//! tracing, build the shared cache and mutation client, start the background
//! revalidator, then serve the `routes` gateway.
//!
//! # Environment Variables
//! - `DASHBOARD_API_URL` (**required**) – base URL of the tankage backend
//! - `DASHBOARD_API_TOKEN` (optional) – bearer token for the backend
//! - `LISTEN_PORT` (optional) – HTTP port (default: 8080)
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the cache and retry knobs.
use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use tankage_metrics::routes::{self, AppState};
use tankage_metrics::{config, Config};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg: Config = config::load_from_env()?;
    cfg.log_config();

    let port = cfg.listen_port;
    let state = AppState::new(cfg)?;
    tracing::info!("Backend at {}", state.config.api_url);

    let revalidator = Arc::clone(&state.cache).spawn_revalidator();

    // Build app from routes gateway
    let app: Router = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;
    revalidator.abort();
    served?;

    Ok(())
}

// ---

/// Install the global tracing subscriber.
///
/// - Colors: `FORCE_COLOR=1|true|yes` forces them on, `0|false|no` off,
///   otherwise TTY detection decides.
/// - Span events: `AXUM_SPAN_EVENTS=full` emits ENTER, EXIT and CLOSE;
///   `enter_exit` emits ENTER and EXIT; anything else CLOSE only.
/// - Level: `RUST_LOG` wins when set, else `AXUM_LOG_LEVEL` (default `debug`).
///   The HTTP client stack is held at `warn`.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
