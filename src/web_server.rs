use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::constants;
use crate::gateway::{Gateway, GatewayError};
use crate::models::Quote;
use crate::scenarios;
use crate::search::{self, QuoteSearch, SearchStatus, SearchWidget};
use crate::session::{self, Session, SessionState};

/// One browser session: its conversation plus the two independent search widgets.
pub struct SessionHandle {
    session: Mutex<Session>,
    composer_search: Mutex<QuoteSearch>,
    panel_search: Mutex<QuoteSearch>,
    last_touched: Mutex<Instant>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self {
            session: Mutex::default(),
            composer_search: Mutex::default(),
            panel_search: Mutex::default(),
            last_touched: Mutex::new(Instant::now()),
        }
    }
}

impl SessionHandle {
    async fn clear_searches(&self) {
        for widget in [SearchWidget::Composer, SearchWidget::Panel] {
            self.search(widget).lock().await.clear();
        }
    }

    fn search(&self, widget: SearchWidget) -> &Mutex<QuoteSearch> {
        match widget {
            SearchWidget::Composer => &self.composer_search,
            SearchWidget::Panel => &self.panel_search,
        }
    }
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    gateway: Gateway,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<SessionHandle>>>>,
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(gateway: Gateway, templates_dir: impl Into<String>) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir.into())),
            gateway,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout: Duration::from_secs(constants::SESSION_IDLE_TIMEOUT_SECS),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    async fn session(&self, id: Uuid) -> Result<Arc<SessionHandle>, AppError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AppError::SessionNotFound(id))?;
        *handle.last_touched.lock().await = Instant::now();
        Ok(handle)
    }

    /// Drops sessions nobody has touched within the idle timeout. Returns how many were removed.
    pub async fn evict_idle_sessions(&self) -> usize {
        let mut expired = Vec::new();
        for (id, handle) in self.sessions.read().await.iter() {
            if handle.last_touched.lock().await.elapsed() >= self.idle_timeout {
                expired.push(*id);
            }
        }
        if expired.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().await;
        for id in &expired {
            sessions.remove(id);
            info!(%id, "Idle session evicted");
        }
        expired.len()
    }
}

fn spawn_session_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(constants::SESSION_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let evicted = state.evict_idle_sessions().await;
            if evicted > 0 {
                let remaining = state.sessions.read().await.len();
                debug!(evicted, remaining, "Session sweep");
            }
        }
    });
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            AppError::UnknownScenario(_) => (StatusCode::NOT_FOUND, "unknown_scenario"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Gateway(e) => {
                error!("AI gateway error: {}", e);
                (StatusCode::BAD_GATEWAY, "ai_unavailable")
            }
        };
        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectScenarioRequest {
    pub scenario_id: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Serialize)]
pub struct WidgetView {
    #[serde(flatten)]
    state: QuoteSearch,
    status: SearchStatus,
}

#[derive(Serialize)]
struct SearchesView {
    composer: WidgetView,
    panel: WidgetView,
}

#[derive(Serialize)]
struct SessionView {
    id: Uuid,
    #[serde(flatten)]
    state: SessionState,
    searches: SearchesView,
}

#[derive(Serialize)]
struct QuoteSearchResponse {
    quotes: Vec<Quote>,
    status: SearchStatus,
}

async fn widget_view(search: &Mutex<QuoteSearch>) -> WidgetView {
    let search = search.lock().await;
    WidgetView {
        state: search.clone(),
        status: search.status(),
    }
}

async fn session_view(id: Uuid, handle: &SessionHandle) -> SessionView {
    let state = handle.session.lock().await.snapshot();
    SessionView {
        id,
        state,
        searches: SearchesView {
            composer: widget_view(&handle.composer_search).await,
            panel: widget_view(&handle.panel_search).await,
        },
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: String) -> AutoReloader {
    // Use AutoReloader for development convenience
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

async fn index_handler(
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                let context = minijinja::context! {
                    title => "SDA Chaplaincy AI Assistant",
                    scenarios => scenarios::all(),
                };
                tmpl.render(context)
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
        })
}

async fn list_scenarios() -> impl IntoResponse {
    Json(scenarios::all())
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let id = Uuid::new_v4();
    let handle = Arc::new(SessionHandle::default());
    state.sessions.write().await.insert(id, handle.clone());
    info!(%id, "Session created");
    (StatusCode::CREATED, Json(session_view(id, &handle).await))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.session(id).await?;
    Ok(Json(session_view(id, &handle).await))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .write()
        .await
        .remove(&id)
        .map(|_| {
            info!(%id, "Session ended");
            StatusCode::NO_CONTENT
        })
        .ok_or(AppError::SessionNotFound(id))
}

async fn select_scenario(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectScenarioRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.session(id).await?;
    let scenario = scenarios::find(&req.scenario_id)
        .ok_or_else(|| AppError::UnknownScenario(req.scenario_id.clone()))?;
    handle.session.lock().await.select_scenario(scenario);
    handle.clear_searches().await;
    Ok(Json(session_view(id, &handle).await))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.session(id).await?;
    let outcome = session::send_message(&handle.session, &state.gateway, &req.text).await;
    info!(%id, ?outcome, "Chat turn finished");
    Ok(Json(session_view(id, &handle).await))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.session(id).await?;
    handle.session.lock().await.reset();
    handle.clear_searches().await;
    Ok(Json(session_view(id, &handle).await))
}

async fn widget_search(
    State(state): State<AppState>,
    Path((id, widget)): Path<(Uuid, String)>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let widget: SearchWidget = widget.parse().map_err(AppError::BadRequest)?;
    let handle = state.session(id).await?;
    let widget_state = handle.search(widget);
    search::run(widget_state, &state.gateway, &req.query).await;
    Ok(Json(widget_view(widget_state).await))
}

async fn quote_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("search query must not be empty".to_string()));
    }
    let quotes = state.gateway.search_quotes(&req.query).await?;
    let status = if quotes.is_empty() {
        SearchStatus::NoResults(constants::NO_QUOTES_FOUND)
    } else {
        SearchStatus::Results
    };
    Ok(Json(QuoteSearchResponse { quotes, status }))
}

pub fn router(state: AppState) -> Router {
    // Serve static files from the configured static directory
    let static_files_service = ServeDir::new(constants::STATIC_DIR.as_str()).not_found_service(
        tower::service_fn(|_req: axum::extract::Request| async {
            Ok::<_, Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
        }),
    );

    Router::new()
        .route("/", get(index_handler))
        .route("/api/scenarios", get(list_scenarios))
        .route("/api/search", post(quote_search))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/scenario", post(select_scenario))
        .route("/api/sessions/:id/messages", post(send_message))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/api/sessions/:id/search/:widget", post(widget_search))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(port: u16, gateway: Gateway) -> Result<()> {
    let state = AppState::new(gateway, constants::TEMPLATES_DIR.as_str());
    spawn_session_sweeper(state.clone());
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Ctrl-C received, shutting down web server...");
        })
        .await
        .context("Web server failed")?;

    Ok(())
}
