//! HTTP service.
//!
//! A single `POST /execute` route accepts `{"command": [..]}` bodies and
//! feeds them through the `cgql` grammar; everything except `register` and
//! `login` runs as the tenant identified by the `token` cookie. Store and
//! engine work is synchronous, so handlers push it onto the blocking pool.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::{
    extract::State,
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::{net::TcpListener, task};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth;
use crate::command::{self, NO_AUTH_COMMANDS};
use crate::config::ServerConfig;
use crate::error::GraphError;
use crate::store::SqliteStore;

const SESSION_COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

type AppState = Arc<ServerState>;

struct ServerState {
    store: Arc<SqliteStore>,
}

/// Errors that can occur while booting or serving.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Opening the store failed.
    #[error("failed to open store: {0}")]
    Store(#[from] GraphError),
    /// Binding the listener failed.
    #[error("failed to bind listener: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP server error bubbled up from Axum/Hyper.
    #[error("server error: {0}")]
    Http(#[from] hyper::Error),
}

/// Starts the service and runs until shutdown.
pub async fn serve(config: ServerConfig) -> Result<(), ServeError> {
    install_tracing_subscriber();

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let state = Arc::new(ServerState { store });
    let app = build_router(state);

    let addr = SocketAddr::from((config.host, config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, db_path = %config.db_path.display(), "cyclegraph listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/execute", post(execute_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn index_handler() -> Json<Value> {
    Json(json!({
        "name": "CycleGraph HTTP Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "execute": "POST /execute - Execute cgql commands",
            "health": "GET /health - Health check",
        },
    }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "success", "message": "server is running"}))
}

async fn execute_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Response, AppError> {
    let argv = parse_command(&payload)?;
    let name = argv[0].clone();
    let token = cookie_token(&headers);

    let store = state.store.clone();
    let run_token = token.clone();
    let run_name = name.clone();
    let outcome = task::spawn_blocking(move || {
        let actor = if NO_AUTH_COMMANDS.contains(&run_name.as_str()) {
            None
        } else {
            let actor = run_token
                .as_deref()
                .and_then(|t| auth::verify_token(&store, t).ok().flatten());
            match actor {
                Some(actor) => Some(actor),
                None => return ExecOutcome::Unauthorized,
            }
        };

        if run_name == "logout" {
            if let Some(token) = run_token.as_deref() {
                if let Err(err) = auth::logout(&store, token) {
                    tracing::warn!(?err, "failed to revoke token on logout");
                }
            }
        }

        ExecOutcome::Done(command::execute(&store, actor.as_deref(), &argv))
    })
    .await?;

    let result = match outcome {
        ExecOutcome::Unauthorized => return Err(AppError::Unauthorized),
        ExecOutcome::Done(result) => result,
    };

    let mut response = Json(&result).into_response();
    if name == "login" && result["status"] == "success" {
        if let Some(token) = result["token"].as_str() {
            let cookie = format!(
                "token={token}; HttpOnly; SameSite=Lax; Max-Age={SESSION_COOKIE_MAX_AGE_SECS}; Path=/"
            );
            if let Ok(value) = cookie.parse() {
                response.headers_mut().insert(SET_COOKIE, value);
            }
        }
    }
    if name == "logout" {
        if let Ok(value) = "token=; Max-Age=0; Path=/".parse() {
            response.headers_mut().insert(SET_COOKIE, value);
        }
    }
    Ok(response)
}

enum ExecOutcome {
    Unauthorized,
    Done(Value),
}

/// Extracts the command argv from a request body.
fn parse_command(payload: &Value) -> Result<Vec<String>, AppError> {
    let Some(command) = payload.get("command") else {
        return Err(AppError::BadRequest(
            "invalid request: missing 'command' field".to_string(),
        ));
    };
    let malformed = || {
        AppError::BadRequest("invalid command format: must be a non-empty list of strings".to_string())
    };
    let items = command.as_array().filter(|a| !a.is_empty()).ok_or_else(malformed)?;
    let mut argv = Vec::with_capacity(items.len());
    for item in items {
        argv.push(item.as_str().ok_or_else(malformed)?.to_string());
    }
    Ok(argv)
}

/// Pulls the session token out of the Cookie header.
fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "token").then(|| value.to_string())
    })
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid or expired token, please login again")]
    Unauthorized,
    #[error("internal task failure: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({"status": "error", "message": self.to_string()}));
        (status, body).into_response()
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => tracing::error!(?err, "failed to listen for shutdown signal"),
    }
}

/// Installs the global tracing subscriber once; respects `RUST_LOG`.
pub fn install_tracing_subscriber() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
