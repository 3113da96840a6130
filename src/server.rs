use crate::config::AppConfig;
use crate::data::{Day, DoctorId, TimeSlot};
use crate::error::SchedulerError;
use crate::service::{self, AvailableSlot, OptimizationOutcome};
use crate::solver::SolverSettings;
use crate::stats::{self, WorkloadSummary};
use crate::store::Store;
use crate::validator::Conflict;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<Store>>,
    pub solver: SolverSettings,
}

impl AppState {
    pub fn new(store: Store, solver: SolverSettings) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            solver,
        }
    }
}

/// Scope of a validate/optimize call. Omitted lists fall back to every day,
/// every room of the department and the three base slots.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub department: String,
    #[serde(default)]
    pub days: Option<Vec<Day>>,
    #[serde(default)]
    pub rooms: Option<Vec<String>>,
    #[serde(default)]
    pub time_slots: Option<Vec<TimeSlot>>,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_dry_run() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub optimized: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    #[serde(flatten)]
    pub outcome: OptimizationOutcome,
    pub summary: WorkloadSummary,
}

struct Scope {
    days: Vec<Day>,
    rooms: Vec<String>,
    slots: Vec<TimeSlot>,
}

fn resolve_scope(store: &Store, request: &ScheduleRequest) -> Result<Scope, SchedulerError> {
    let rooms = match &request.rooms {
        Some(rooms) => rooms.clone(),
        None => store
            .rooms_in_department(&request.department)?
            .into_iter()
            .map(|r| r.name)
            .collect(),
    };
    Ok(Scope {
        days: request.days.clone().unwrap_or_else(|| Day::ALL.to_vec()),
        rooms,
        slots: request
            .time_slots
            .clone()
            .unwrap_or_else(|| TimeSlot::BASE.to_vec()),
    })
}

fn error_response(err: SchedulerError) -> ApiError {
    let status = match &err {
        SchedulerError::Configuration(_) => StatusCode::BAD_REQUEST,
        SchedulerError::UnknownDoctor(_) => StatusCode::NOT_FOUND,
        SchedulerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {err}");
    }
    (status, err.to_string())
}

/// Runs `work` on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SchedulerError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work().map_err(error_response))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("worker failed: {e}")))?
}

/// Runs `work` against the locked store on the blocking pool. The lock is
/// released as soon as `work` returns.
async fn with_store<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Store) -> Result<T, SchedulerError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || {
        let mut guard = store.lock().map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("store lock poisoned: {e}"),
            )
        })?;
        work(&mut *guard).map_err(error_response)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("worker failed: {e}")))?
}

async fn validate_handler(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    with_store(&state, move |store| {
        let scope = resolve_scope(store, &request)?;
        let optimized = service::is_schedule_optimized(
            store,
            &request.department,
            &scope.days,
            &scope.rooms,
            &scope.slots,
        )?;
        Ok(ValidateResponse { optimized })
    })
    .await
    .map(Json)
}

async fn optimize_handler(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let dry_run = request.dry_run;
    let snapshot = with_store(&state, move |store| {
        let scope = resolve_scope(store, &request)?;
        service::snapshot(
            store,
            &request.department,
            &scope.days,
            &scope.rooms,
            &scope.slots,
        )
    })
    .await?;

    // the solve runs without holding the store
    let settings = state.solver;
    let (snapshot, mut outcome) = blocking(move || {
        let outcome = service::propose(&snapshot, &settings)?;
        Ok((snapshot, outcome))
    })
    .await?;

    if !dry_run {
        outcome = with_store(&state, move |store| service::commit(store, &snapshot, outcome)).await?;
    }
    let summary = stats::summarize_assignments(&outcome.assignments);
    Ok(Json(OptimizeResponse { outcome, summary }))
}

async fn recommendations_handler(
    State(state): State<AppState>,
    Path(doctor_id): Path<DoctorId>,
) -> Result<Json<Vec<AvailableSlot>>, ApiError> {
    with_store(&state, move |store| {
        service::recommend_available_slots(store, doctor_id)
    })
    .await
    .map(Json)
}

async fn conflicts_handler(
    State(state): State<AppState>,
    Path(department): Path<String>,
) -> Result<Json<Vec<Conflict>>, ApiError> {
    with_store(&state, move |store| service::schedule_conflicts(store, &department))
        .await
        .map(Json)
}

async fn workload_handler(
    State(state): State<AppState>,
    Path(department): Path<String>,
) -> Result<Json<WorkloadSummary>, ApiError> {
    with_store(&state, move |store| service::workload(store, &department))
        .await
        .map(Json)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/schedule/validate", post(validate_handler))
        .route("/v1/schedule/optimize", post(optimize_handler))
        .route("/v1/doctors/:id/recommendations", get(recommendations_handler))
        .route("/v1/departments/:name/conflicts", get(conflicts_handler))
        .route("/v1/departments/:name/workload", get(workload_handler))
        .with_state(state)
}

pub async fn run_server(config: &AppConfig, store: Store) -> std::io::Result<()> {
    let app = router(AppState::new(store, config.solver));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
