use std::sync::Arc;

use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ReaderConfig;
use crate::export::topology_summary;
use crate::parse::{parse_case_str, parse_dyn_case_str};
use crate::reader::{FAULT_CLOSED_RESISTANCE, FAULT_OPEN_RESISTANCE, Reader};
use crate::topology::Domain;

type AppState = Arc<Mutex<Option<Reader>>>;

// Helper: respond with JSON
fn json_ok(val: serde_json::Value) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        val.to_string(),
    )
        .into_response()
}

fn json_err(status: StatusCode, msg: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        json!({"error": msg}).to_string(),
    )
        .into_response()
}

fn no_case() -> Response {
    json_err(StatusCode::NOT_FOUND, "No case loaded")
}

#[derive(Debug, Default, Deserialize)]
struct UploadParams {
    domain: Option<Domain>,
    frequency: Option<f64>,
}

// POST /api/upload?domain=&frequency=  multipart/form-data with fields "case" and "dyn"
async fn upload_case(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Response {
    let mut case_text = None;
    let mut dyn_text = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        let text = match field.text().await {
            Ok(t) => t,
            Err(_) => return json_err(StatusCode::BAD_REQUEST, "Failed to read form field"),
        };
        match name.as_deref() {
            Some("case") => case_text = Some(text),
            Some("dyn") => dyn_text = Some(text),
            other => warn!("Ignoring form field {:?}", other),
        }
    }

    let Some(case_text) = case_text else {
        return json_err(StatusCode::BAD_REQUEST, "No 'case' field in multipart form");
    };

    let defaults = ReaderConfig::default();
    let config = ReaderConfig {
        domain: params.domain.unwrap_or(defaults.domain),
        frequency: params.frequency.unwrap_or(defaults.frequency),
        ..defaults
    };

    let case = match parse_case_str(&case_text, &config.case_name) {
        Ok(case) => case,
        Err(e) => return json_err(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let dyn_case = match dyn_text
        .map(|text| parse_dyn_case_str(&text, &config.dyn_case_name))
        .transpose()
    {
        Ok(dyn_case) => dyn_case,
        Err(e) => return json_err(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let mut reader = Reader::from_cases(case, dyn_case);
    let topology_json = match reader.load_mpc(&config) {
        Ok(system) => serde_json::to_value(system).unwrap_or(json!(null)),
        Err(e) => return json_err(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    };

    info!("Uploaded case loaded for domain {}", config.domain);
    *state.lock().await = Some(reader);
    json_ok(topology_json)
}

// GET /api/topology
async fn get_topology(State(state): State<AppState>) -> Response {
    let guard = state.lock().await;
    match guard.as_ref().and_then(Reader::system) {
        Some(system) => json_ok(serde_json::to_value(system).unwrap_or(json!(null))),
        None => no_case(),
    }
}

// GET /api/results
async fn get_results(State(state): State<AppState>) -> Response {
    let guard = state.lock().await;
    match guard.as_ref() {
        Some(reader) => json_ok(serde_json::to_value(reader.pf_results()).unwrap_or(json!(null))),
        None => no_case(),
    }
}

// POST /api/init  initialize the topology from the stored power flow solution
async fn init_from_results(State(state): State<AppState>) -> Response {
    let mut guard = state.lock().await;
    let Some(reader) = guard.as_mut() else {
        return no_case();
    };

    if let Err(e) = reader.init_from_pf_results() {
        return json_err(StatusCode::CONFLICT, &e.to_string());
    }
    match reader.system() {
        Some(system) => json_ok(serde_json::to_value(system).unwrap_or(json!(null))),
        None => no_case(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct FaultParams {
    closed: Option<f64>,
    open: Option<f64>,
}

// POST /api/faults/{node}?closed=&open=
async fn add_fault(
    State(state): State<AppState>,
    Path(node): Path<String>,
    Query(params): Query<FaultParams>,
) -> Response {
    let mut guard = state.lock().await;
    let Some(reader) = guard.as_mut() else {
        return no_case();
    };

    match reader.add_three_phase_fault(
        &node,
        params.closed.unwrap_or(FAULT_CLOSED_RESISTANCE),
        params.open.unwrap_or(FAULT_OPEN_RESISTANCE),
    ) {
        Ok(name) => json_ok(json!({"added": name})),
        Err(e) => json_err(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

// GET /api/export
async fn export_topology(State(state): State<AppState>) -> Response {
    let guard = state.lock().await;
    let Some(system) = guard.as_ref().and_then(Reader::system) else {
        return no_case();
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"topology.txt\"",
            ),
        ],
        topology_summary(system),
    )
        .into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/upload", post(upload_case))
        .route("/api/topology", get(get_topology))
        .route("/api/results", get(get_results))
        .route("/api/init", post(init_from_results))
        .route("/api/faults/{node}", post(add_fault))
        .route("/api/export", get(export_topology))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(addr: &str) -> std::io::Result<()> {
    let state: AppState = Arc::new(Mutex::new(None));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("powertopo listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
