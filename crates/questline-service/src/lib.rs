#![deny(unsafe_code)]

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use questline_core::{
    Clock, DashboardResponse, EndpointRequest, EndpointResponse, EngineError, LedgerConfig,
    LedgerEngine, LedgerError, ObjectiveResponse, SpCollectResponse, SystemClock,
    TaskActionRequest, TaskActionResponse,
};
use questline_storage::{StorageConfig, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_HEADER: &str = "x-session-token";

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
}

/// One async mutex per username, so each account sees a single
/// load-mutate-persist sequence at a time.
#[derive(Default)]
pub struct AccountLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub async fn acquire(&self, username: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks
                .entry(username.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop the entry for an account that no longer exists, unless another
    /// request still holds or waits on its mutex.
    pub async fn forget(&self, username: &str) {
        let mut locks = self.inner.lock().await;
        if locks
            .get(username)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(username);
        }
    }
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<LedgerEngine>,
    pub locks: Arc<AccountLocks>,
    pub storage_backend: &'static str,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, ServiceError> {
        let ServiceConfig { storage, ledger } = config;
        let store = storage.connect().await?;
        let engine = LedgerEngine::new(store, Arc::new(SystemClock), ledger)?;
        Ok(Self::with_engine(engine, storage.label()))
    }

    pub fn with_engine(engine: LedgerEngine, storage_backend: &'static str) -> Self {
        Self {
            engine: Arc::new(engine),
            locks: Arc::new(AccountLocks::default()),
            storage_backend,
        }
    }

    /// Build a state around an explicit clock, for deterministic callers.
    pub async fn bootstrap_with_clock(
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        let ServiceConfig { storage, ledger } = config;
        let store = storage.connect().await?;
        let engine = LedgerEngine::new(store, clock, ledger)?;
        Ok(Self::with_engine(engine, storage.label()))
    }

    async fn require_user(&self, headers: &HeaderMap) -> Result<Caller, ApiError> {
        let token = session_token(headers).ok_or(ApiError::Unauthenticated)?;
        let username = self
            .engine
            .authenticate(&token)
            .await?
            .ok_or(ApiError::Unauthenticated)?;
        Ok(Caller { username, token })
    }

    /// Authenticate, take the account lock, then confirm the session again.
    ///
    /// A request queued behind an account deletion must not run against the
    /// deleted account, or the engine would seed a fresh row for it.
    async fn lock_user(
        &self,
        headers: &HeaderMap,
    ) -> Result<(Caller, OwnedMutexGuard<()>), ApiError> {
        let caller = self.require_user(headers).await?;
        let guard = self.locks.acquire(&caller.username).await;
        match self.engine.authenticate(&caller.token).await? {
            Some(username) if username == caller.username => Ok((caller, guard)),
            _ => Err(ApiError::Unauthenticated),
        }
    }
}

struct Caller {
    username: String,
    token: String,
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/dashboard", get(dashboard))
        .route("/v1/endpoint", post(endpoint))
        .route("/v1/tasks/action", post(task_action))
        .route("/v1/diamonds/collect", post(collect_diamonds))
        .route("/v1/objective", post(save_objective))
        .route("/v1/session/logout", post(logout))
        .route("/v1/account/delete", post(delete_account))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Session token from the `session` cookie, falling back to the
/// `x-session-token` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|token| !token.is_empty());

    from_cookie
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated.")]
    Unauthenticated,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let failure = |status: StatusCode, message: String| {
            (
                status,
                Json(serde_json::json!({ "success": false, "message": message })),
            )
                .into_response()
        };

        match self {
            ApiError::Unauthenticated => {
                failure(StatusCode::UNAUTHORIZED, "Not authenticated.".to_string())
            }
            ApiError::Engine(EngineError::UnknownOperation(message)) => {
                failure(StatusCode::BAD_REQUEST, message)
            }
            ApiError::Engine(err) => {
                error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": err.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    storage_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "questline-service",
        storage_backend: state.storage_backend,
    })
}

async fn dashboard(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, ApiError> {
    let (caller, _guard) = state.lock_user(&headers).await?;
    Ok(Json(state.engine.dashboard(&caller.username).await?))
}

async fn endpoint(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<EndpointRequest>,
) -> Result<Json<EndpointResponse>, ApiError> {
    let (caller, _guard) = state.lock_user(&headers).await?;
    Ok(Json(state.engine.dispatch(&caller.username, request).await?))
}

async fn task_action(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<TaskActionRequest>,
) -> Result<Json<TaskActionResponse>, ApiError> {
    let (caller, _guard) = state.lock_user(&headers).await?;
    Ok(Json(
        state.engine.task_action(&caller.username, request).await?,
    ))
}

async fn collect_diamonds(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<SpCollectResponse>, ApiError> {
    let (caller, _guard) = state.lock_user(&headers).await?;
    Ok(Json(state.engine.sp_collect(&caller.username).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct ObjectiveRequest {
    #[serde(default)]
    objective: String,
}

async fn save_objective(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<ObjectiveRequest>,
) -> Result<Json<ObjectiveResponse>, ApiError> {
    let (caller, _guard) = state.lock_user(&headers).await?;
    Ok(Json(
        state
            .engine
            .save_objective(&caller.username, &request.objective)
            .await?,
    ))
}

#[derive(Debug, Clone, Serialize)]
struct AckResponse {
    success: bool,
}

fn cleared_session_cookie() -> [(header::HeaderName, HeaderValue); 1] {
    [(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"),
    )]
}

async fn logout(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = state.require_user(&headers).await?;
    state.engine.logout(&caller.token).await?;
    Ok((cleared_session_cookie(), Json(AckResponse { success: true })).into_response())
}

async fn delete_account(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let username = {
        let (caller, _guard) = state.lock_user(&headers).await?;
        state.engine.delete_account(&caller.username).await?;
        if let Err(err) = state.engine.logout(&caller.token).await {
            warn!(username = %caller.username, error = %err, "session cleanup after delete failed");
        }
        caller.username
    };
    state.locks.forget(&username).await;
    Ok((cleared_session_cookie(), Json(AckResponse { success: true })).into_response())
}
