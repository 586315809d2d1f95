//! Single-choice voting service.
//!
//! Every identity gets one vote for one option of a fixed list, and anyone can read the totals.
//!
//!
//!
//! # Endpoints
//!
//! - `GET /resultados`: `{ total, resultados: [{ id, nombre, cantidad }] }`, ascending by id
//! - `POST /votar`: `{ optionId }`
//!   - 200 registered
//!   - 400 `optionId` missing, not an integer or not in `[1, N]`
//!   - 409 identity already voted
//!   - 500 the vote could not be committed, nothing was stored so retrying is safe
//!
//!
//!
//! # Identity
//!
//! First entry of `X-Forwarded-For` when present, otherwise the peer address. Meant to sit
//! behind a single reverse proxy that sets the header.
//!
//!
//!
//! # Storage
//!
//! SQLite, see [`database`]. The vote transaction in [`vote`] is the only writer after the
//! catalog is seeded at startup.
//!
//!
//!
//! # Setup
//!
//! Run with defaults (port 3000, `data.db` in the working directory).
//! ```sh
//! RUST_LOG=info cargo run -p voting
//! ```
//!
//! Hammer a running server.
//! ```sh
//! cargo run -p tester -- --voters 500
//! ```
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{
            CONTENT_SECURITY_POLICY, CONTENT_TYPE, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_DNS_PREFETCH_CONTROL, X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod registry;
pub mod results;
pub mod routes;
pub mod state;
pub mod tally;
pub mod utils;
pub mod vote;

use routes::{results_handler, vote_handler};
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await.inspect_err(|e| {
        error!("Startup failed: {e:#}");
    })?;

    info!("Starting server...");

    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutting down...");

    let database = state.database.clone();
    drop(state);
    database.close()?;

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let mut router = Router::new()
        .route("/resultados", get(results_handler))
        .route("/votar", post(vote_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    for (name, value) in security_headers() {
        router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
    }

    router.with_state(state)
}

const CONTENT_SECURITY: &str = "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
form-action 'self';frame-ancestors 'self';img-src 'self' data:;object-src 'none';\
script-src 'self';script-src-attr 'none';style-src 'self' https: 'unsafe-inline';\
upgrade-insecure-requests";

fn security_headers() -> [(HeaderName, HeaderValue); 12] {
    [
        (CONTENT_SECURITY_POLICY, HeaderValue::from_static(CONTENT_SECURITY)),
        (
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ),
        (
            HeaderName::from_static("origin-agent-cluster"),
            HeaderValue::from_static("?1"),
        ),
        (
            HeaderName::from_static("x-download-options"),
            HeaderValue::from_static("noopen"),
        ),
        (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
        (
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ),
        (X_XSS_PROTECTION, HeaderValue::from_static("0")),
    ]
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
