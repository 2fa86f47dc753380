use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use roll_planner::PlanError;
use roll_planner::config::PlannerConfig;
use roll_planner::error::WastageIssue;
use roll_planner::labels::{SequentialIdMapper, set_label};
use roll_planner::payload::{PlanRequest, build_payload};
use roll_planner::segment::{Segment, SegmentItem, SegmentationEngine};
use roll_planner::store::{HierarchyStore, SetSummary};
use roll_planner::types::{
    Client, ClientId, CutRollId, JumboId, PaperSpec, ProductionCutRoll, SetId, SpecId,
};
use roll_planner::wastage::{ReportableRange, WastageAllocation, WastageExtractor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

type Rejection = (StatusCode, String);

/// Most set labels one jumbo group may ask for.
const MAX_SETS_PER_GROUP: usize = 64;

struct AppState {
    config: PlannerConfig,
    mapper: SequentialIdMapper,
    session: Mutex<HierarchyStore>,
}

type Shared = Arc<AppState>;

fn reject(err: PlanError) -> Rejection {
    let status = match err {
        PlanError::NotFound { .. } => StatusCode::NOT_FOUND,
        PlanError::CapacityExceeded { .. }
        | PlanError::WidthExceedsPlanning { .. }
        | PlanError::CommitRejected { .. }
        | PlanError::DuplicatePaperSpec(_)
        | PlanError::AllowanceNotCommitted => StatusCode::CONFLICT,
        PlanError::Submission(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

fn with_session<T>(
    state: &AppState,
    f: impl FnOnce(&mut HierarchyStore) -> Result<T, PlanError>,
) -> Result<T, Rejection> {
    let mut session = state.session.lock().map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "session lock poisoned".to_string(),
        )
    })?;
    f(&mut *session).map_err(reject)
}

// Stateless endpoints

#[derive(Deserialize, Serialize)]
struct SegmentRequest {
    items: Vec<SegmentItem>,
    #[serde(default)]
    max_allowed_width: Option<f64>,
    #[serde(default)]
    sort: bool,
}

#[derive(Serialize)]
struct SegmentResponse {
    max_allowed_width: f64,
    segments: Vec<Segment>,
}

async fn segments(
    State(state): State<Shared>,
    Json(req): Json<SegmentRequest>,
) -> Result<Json<SegmentResponse>, Rejection> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /segments"
    );
    let engine = SegmentationEngine::new(
        req.max_allowed_width
            .unwrap_or(state.config.max_segment_width),
    )
    .map_err(reject)?;
    let segments = if req.sort {
        engine.layout(&req.items)
    } else {
        engine.segment(&req.items)
    };
    Ok(Json(SegmentResponse {
        max_allowed_width: engine.max_allowed_width(),
        segments,
    }))
}

#[derive(Deserialize)]
struct JumboGroup {
    raw_id: String,
    #[serde(default)]
    barcodes: Vec<String>,
    #[serde(default)]
    set_count: usize,
}

#[derive(Deserialize)]
struct LabelRequest {
    groups: Vec<JumboGroup>,
}

#[derive(Serialize)]
struct GroupLabel {
    raw_id: String,
    label: String,
    set_labels: Vec<String>,
}

fn group_labels(
    mapper: &SequentialIdMapper,
    groups: &[JumboGroup],
) -> Result<Vec<GroupLabel>, Rejection> {
    if let Some(g) = groups.iter().find(|g| g.set_count > MAX_SETS_PER_GROUP) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "jumbo {} asks for {} sets, at most {MAX_SETS_PER_GROUP} allowed",
                g.raw_id, g.set_count
            ),
        ));
    }
    let labels = mapper.jumbo_labels(groups.iter().map(|g| g.raw_id.as_str()));
    Ok(groups
        .iter()
        .map(|g| GroupLabel {
            raw_id: g.raw_id.clone(),
            label: mapper.group_label(&labels, &g.raw_id, &g.barcodes).to_string(),
            set_labels: (1..=g.set_count).map(set_label).collect(),
        })
        .collect())
}

async fn labels(
    State(state): State<Shared>,
    Json(req): Json<LabelRequest>,
) -> Result<Json<Vec<GroupLabel>>, Rejection> {
    group_labels(&state.mapper, &req.groups).map(Json)
}

#[derive(Deserialize)]
struct WastageRequest {
    source_plan_id: String,
    cut_rolls: Vec<ProductionCutRoll>,
}

#[derive(Serialize)]
struct WastageResponse {
    allocations: Vec<WastageAllocation>,
    issues: Vec<WastageIssue>,
}

async fn wastage(
    State(state): State<Shared>,
    Json(req): Json<WastageRequest>,
) -> Json<WastageResponse> {
    let extractor = WastageExtractor::new(ReportableRange::from_config(&state.config));
    let allocations = extractor.extract(&req.cut_rolls, &req.source_plan_id);
    let issues = extractor.validate(&allocations);
    Json(WastageResponse {
        allocations,
        issues,
    })
}

// Planning session

async fn add_clients(
    State(state): State<Shared>,
    Json(clients): Json<Vec<Client>>,
) -> Result<StatusCode, Rejection> {
    with_session(&state, |s| {
        for client in clients {
            s.register_client(client);
        }
        Ok(StatusCode::NO_CONTENT)
    })
}

async fn add_paper(
    State(state): State<Shared>,
    Json(spec): Json<PaperSpec>,
) -> Result<Json<SpecId>, Rejection> {
    with_session(&state, |s| s.add_paper_spec(spec)).map(Json)
}

async fn add_jumbo(
    State(state): State<Shared>,
    Path(spec_id): Path<u64>,
) -> Result<Json<JumboId>, Rejection> {
    with_session(&state, |s| s.add_jumbo_roll(SpecId(spec_id))).map(Json)
}

async fn add_set(
    State(state): State<Shared>,
    Path(jumbo_id): Path<u64>,
) -> Result<Json<SetId>, Rejection> {
    with_session(&state, |s| s.add_set(JumboId(jumbo_id))).map(Json)
}

#[derive(Deserialize)]
struct CutRollRequest {
    set_id: SetId,
    width_inches: f64,
    quantity: u32,
    client_id: ClientId,
    #[serde(default)]
    editing: Option<CutRollId>,
}

async fn save_cut_roll(
    State(state): State<Shared>,
    Json(req): Json<CutRollRequest>,
) -> Result<Json<CutRollId>, Rejection> {
    with_session(&state, |s| {
        s.add_or_edit_cut_roll(
            req.set_id,
            req.width_inches,
            req.quantity,
            req.client_id,
            req.editing,
        )
    })
    .map(Json)
}

async fn delete_node(
    State(state): State<Shared>,
    Path((kind, id)): Path<(String, u64)>,
) -> Result<StatusCode, Rejection> {
    with_session(&state, |s| match kind.as_str() {
        "papers" => s.delete_paper_spec(SpecId(id)),
        "jumbos" => s.delete_jumbo_roll(JumboId(id)),
        "sets" => s.delete_set(SetId(id)),
        "cut-rolls" => s.delete_cut_roll(CutRollId(id)),
        other => Err(PlanError::NotFound {
            entity: "node kind",
            id: other.to_string(),
        }),
    })?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct AllowanceRequest {
    allowance: f64,
}

#[derive(Serialize)]
struct CapacityResponse {
    allowance: f64,
    planning_width: f64,
    committed: bool,
}

fn capacity_of(s: &HierarchyStore) -> CapacityResponse {
    CapacityResponse {
        allowance: s.capacity().allowance(),
        planning_width: s.planning_width(),
        committed: s.capacity().is_committed(),
    }
}

async fn propose_allowance(
    State(state): State<Shared>,
    Json(req): Json<AllowanceRequest>,
) -> Result<Json<CapacityResponse>, Rejection> {
    with_session(&state, |s| {
        s.propose_allowance(req.allowance)?;
        Ok(capacity_of(s))
    })
    .map(Json)
}

async fn commit_allowance(State(state): State<Shared>) -> Result<Json<CapacityResponse>, Rejection> {
    with_session(&state, |s| {
        s.commit_allowance()?;
        Ok(capacity_of(s))
    })
    .map(Json)
}

async fn reopen_allowance(State(state): State<Shared>) -> Result<Json<CapacityResponse>, Rejection> {
    with_session(&state, |s| {
        s.reopen_allowance();
        Ok(capacity_of(s))
    })
    .map(Json)
}

async fn summary(State(state): State<Shared>) -> Result<Json<BTreeMap<SetId, SetSummary>>, Rejection> {
    with_session(&state, |s| {
        s.set_usage()
            .into_iter()
            .map(|u| Ok((u.set_id, s.set_summary(u.set_id)?)))
            .collect()
    })
    .map(Json)
}

#[derive(Deserialize)]
struct PayloadQuery {
    created_by: String,
}

async fn payload(
    State(state): State<Shared>,
    axum::extract::Query(q): axum::extract::Query<PayloadQuery>,
) -> Result<Json<PlanRequest>, Rejection> {
    with_session(&state, |s| build_payload(s, &q.created_by)).map(Json)
}

async fn reset(State(state): State<Shared>) -> Result<StatusCode, Rejection> {
    with_session(&state, |s| {
        s.reset();
        Ok(StatusCode::NO_CONTENT)
    })
}

#[tokio::main]
async fn main() {
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("failed to open development.log: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let config = PlannerConfig::load(None).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let mapper = SequentialIdMapper::from_config(&config).unwrap_or_else(|e| {
        eprintln!("Error: invalid legacy jumbo pattern: {e}");
        std::process::exit(1);
    });
    let session = HierarchyStore::from_config(&config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let state = Arc::new(AppState {
        session: Mutex::new(session),
        mapper,
        config,
    });

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/segments", post(segments))
        .route("/labels", post(labels))
        .route("/wastage", post(wastage))
        .route("/session/clients", post(add_clients))
        .route("/session/papers", post(add_paper))
        .route("/session/papers/{id}/jumbos", post(add_jumbo))
        .route("/session/jumbos/{id}/sets", post(add_set))
        .route("/session/cut-rolls", post(save_cut_roll))
        .route("/session/{kind}/{id}", delete(delete_node))
        .route("/session/allowance", post(propose_allowance))
        .route("/session/allowance/commit", post(commit_allowance))
        .route("/session/allowance/reopen", post(reopen_allowance))
        .route("/session/summary", get(summary))
        .route("/session/payload", get(payload))
        .route("/session/reset", post(reset))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("cannot bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    eprintln!("Listening on {addr}");
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}
