use axum::{
    Router,
    body::Bytes,
    extract::{Json, RawQuery, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::contact::{ContactError, ContactPayload, LogRelay, MailRelay, submit};
use crate::core::{
    Assumptions, CashflowPlan, CashflowSummary, Expenses, Members, OneOff, RetirementInputs,
    RetirementProjection, RetirementSummary, YearRow, summarize_cashflow, summarize_retirement,
};
use crate::error::{ExportError, StoreError};
use crate::export::{CsvExport, cashflow_csv, retirement_csv};
use crate::state::store::FileStore;
use crate::state::{CashflowPlanner, Planner, RetirementPlanner, Session};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STORE_PATH: &str = "lifeplan-store.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub port: u16,
    pub store_path: PathBuf,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

/// Shared by every handler. The store lock is only taken inside synchronous
/// helpers, never across an await.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<FileStore>>,
    relay: Arc<dyn MailRelay>,
    this_year: i32,
}

impl AppState {
    pub fn new(store: FileStore, relay: Arc<dyn MailRelay>, this_year: i32) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            relay,
            this_year,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanView<'a> {
    start_year: i32,
    horizon: u32,
    members: &'a Members,
    expenses: &'a Expenses,
    one_offs: &'a [OneOff],
    assumptions: Assumptions,
}

impl<'a> From<&'a CashflowPlan> for PlanView<'a> {
    fn from(plan: &'a CashflowPlan) -> Self {
        Self {
            start_year: plan.start_year,
            horizon: plan.horizon,
            members: &plan.members,
            expenses: &plan.expenses,
            one_offs: &plan.one_offs,
            assumptions: plan.assumptions,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CashflowResponse<'a> {
    plan: PlanView<'a>,
    rows: &'a [YearRow],
    summary: CashflowSummary,
    share_query: &'a str,
}

impl<'a> CashflowResponse<'a> {
    pub(crate) fn new(plan: &'a CashflowPlan, rows: &'a [YearRow], share_query: &'a str) -> Self {
        Self {
            plan: plan.into(),
            rows,
            summary: summarize_cashflow(plan, rows),
            share_query,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RetirementResponse<'a> {
    inputs: &'a RetirementInputs,
    projection: &'a RetirementProjection,
    summary: RetirementSummary,
    share_query: &'a str,
}

impl<'a> RetirementResponse<'a> {
    pub(crate) fn new(
        inputs: &'a RetirementInputs,
        projection: &'a RetirementProjection,
        share_query: &'a str,
    ) -> Self {
        Self {
            inputs,
            projection,
            summary: summarize_retirement(inputs, projection),
            share_query,
        }
    }
}

#[derive(Debug, Serialize)]
struct ContactResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/cashflow", get(cashflow_handler))
        .route("/api/cashflow.csv", get(cashflow_csv_handler))
        .route("/api/retirement", get(retirement_handler))
        .route("/api/retirement.csv", get(retirement_csv_handler))
        .route("/api/contact", post(contact_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_http_server(config: ServeConfig) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let store = FileStore::open(&config.store_path);
    let this_year = OffsetDateTime::now_utc().year();
    let app = router(AppState::new(store, Arc::new(LogRelay), this_year));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        store = %config.store_path.display(),
        "planner HTTP API listening on http://{addr}"
    );
    tracing::info!("local access: http://127.0.0.1:{}/api/cashflow", config.port);

    axum::serve(listener, app).await
}

/// Hydrates a fresh session for `P` against the shared store and hands it to `f`.
fn with_session<P: Planner, R>(
    state: &AppState,
    query: Option<&str>,
    f: impl FnOnce(&Session<P, &mut FileStore>) -> R,
) -> Result<R, StoreError> {
    let mut store = state.store.lock().map_err(|_| StoreError::Poisoned)?;
    let mut session = Session::<P, _>::new(&mut *store, state.this_year);
    session.hydrate(query.unwrap_or_default());
    Ok(f(&session))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn cashflow_handler(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let result = with_session::<CashflowPlanner, _>(&state, query.as_deref(), |session| {
        let body = CashflowResponse::new(session.model(), session.projection(), session.share_query());
        json_response(StatusCode::OK, body)
    });
    result.unwrap_or_else(|e| store_error_response(&e))
}

async fn cashflow_csv_handler(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let result = with_session::<CashflowPlanner, _>(&state, query.as_deref(), |session| {
        cashflow_csv(session.model(), session.projection())
    });
    export_response(result)
}

async fn retirement_handler(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let result = with_session::<RetirementPlanner, _>(&state, query.as_deref(), |session| {
        let body =
            RetirementResponse::new(session.model(), session.projection(), session.share_query());
        json_response(StatusCode::OK, body)
    });
    result.unwrap_or_else(|e| store_error_response(&e))
}

async fn retirement_csv_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    let result = with_session::<RetirementPlanner, _>(&state, query.as_deref(), |session| {
        retirement_csv(session.model(), session.projection())
    });
    export_response(result)
}

async fn contact_handler(State(state): State<AppState>, body: Bytes) -> Response {
    // An unreadable body is treated as an empty form.
    let payload = serde_json::from_slice::<ContactPayload>(&body).unwrap_or_default();
    match submit(state.relay.as_ref(), &payload, OffsetDateTime::now_utc()) {
        Ok(_) => json_response(StatusCode::OK, ContactResponse { ok: true, error: None }),
        Err(e) => {
            let status = match e {
                ContactError::MissingFields | ContactError::InvalidEmail => StatusCode::BAD_REQUEST,
                ContactError::Relay(_) => {
                    tracing::error!(error = %e, "contact relay failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            json_response(
                status,
                ContactResponse {
                    ok: false,
                    error: Some(e.to_string()),
                },
            )
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn store_error_response(e: &StoreError) -> Response {
    tracing::error!(error = %e, "local store unavailable");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

fn export_response(result: Result<Result<CsvExport, ExportError>, StoreError>) -> Response {
    let export = match result {
        Ok(Ok(export)) => export,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "CSV export failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
        Err(e) => return store_error_response(&e),
    };
    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    with_cache_control((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    ))
}
