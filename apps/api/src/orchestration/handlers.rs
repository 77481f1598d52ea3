//! Axum route handlers for the Run Control API.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::header,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    Json,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tracing::info;

use crate::agents::catalog::{self, AgentProfile};
use crate::agents::hosted::conversation_roster;
use crate::agents::prompts::KICKOFF_MESSAGE;
use crate::config::Config;
use crate::errors::AppError;
use crate::orchestration::feed::{FeedCursor, HEARTBEAT_INTERVAL};
use crate::orchestration::run::RunSnapshot;
use crate::orchestration::stats::{AgentStatistics, InvocationRecord};
use crate::state::AppState;

/// Invocation records returned by the agent detail endpoint.
const RECENT_RECORDS: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: &'static str,
    pub run_id: uuid::Uuid,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AgentSummary {
    #[serde(flatten)]
    pub profile: &'static AgentProfile,
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub run: RunSnapshot,
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsView {
    pub invocations: u32,
    pub avg_response_time: f64,
    pub total_response_time: f64,
    pub first_invocation: Option<DateTime<Utc>>,
    pub last_invocation: Option<DateTime<Utc>>,
    pub total_workflow_time: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AgentDetailResponse {
    #[serde(flatten)]
    pub agent: AgentSummary,
    pub playground_url: Option<String>,
    pub statistics: StatisticsView,
    pub messages: Vec<InvocationRecord>,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub playground_url_prefix: String,
    pub agent_endpoint: String,
    pub model_deployment: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/start
///
/// Starts the screening conversation. Refused while a run is in progress
/// and when the agent service is not configured.
pub async fn handle_start(State(state): State<AppState>) -> Result<Json<StartResponse>, AppError> {
    let client = state.agent_client.as_ref().ok_or_else(|| {
        AppError::Configuration(
            "Agent service is not configured: set AGENT_ENDPOINT and AGENT_MODEL_DEPLOYMENT_NAME"
                .to_string(),
        )
    })?;

    let run_id = state.runs.start(
        conversation_roster(client),
        state.config.max_rounds,
        KICKOFF_MESSAGE.to_string(),
    )?;

    Ok(Json(StartResponse {
        status: "started",
        run_id,
    }))
}

/// POST /api/stop
///
/// Cancels the running conversation before its next turn.
pub async fn handle_stop(State(state): State<AppState>) -> Result<Json<StopResponse>, AppError> {
    if !state.runs.stop() {
        return Err(AppError::Conflict("No workflow is running".to_string()));
    }
    info!("Stop requested for the running workflow");
    Ok(Json(StopResponse { status: "stopping" }))
}

/// GET /api/status
pub async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        run: state.runs.snapshot(),
        agents: catalog::all()
            .iter()
            .map(|profile| summarize(&state.config, profile))
            .collect(),
    })
}

/// GET /api/events
///
/// Server-sent events: one `data:` frame per transcript message, heartbeats in between.
pub async fn handle_events(State(state): State<AppState>) -> impl IntoResponse {
    let events = FeedCursor::new(state.runs.clone(), HEARTBEAT_INTERVAL)
        .into_stream()
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    )
}

/// GET /api/agent/:name
///
/// Catalog entry, playground link and invocation statistics for one agent.
pub async fn handle_agent_detail(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AgentDetailResponse>, AppError> {
    let profile = catalog::find(&name)
        .ok_or_else(|| AppError::NotFound(format!("Agent {name} not found")))?;

    let agent = summarize(&state.config, profile);
    let playground_url = state.config.playground_url(agent.id.as_deref());
    let stats = state.runs.statistics(profile.name).unwrap_or_default();
    let run_start = state.runs.snapshot().start_time;

    Ok(Json(AgentDetailResponse {
        agent,
        playground_url,
        statistics: statistics_view(&stats, run_start),
        messages: stats.latest(RECENT_RECORDS),
    }))
}

/// GET /api/config
pub async fn handle_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.config;
    Json(ConfigResponse {
        playground_url_prefix: config.playground_url_prefix.clone().unwrap_or_default(),
        agent_endpoint: config.agent_endpoint.clone().unwrap_or_default(),
        model_deployment: config.model_deployment.clone().unwrap_or_default(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn summarize(config: &Config, profile: &'static AgentProfile) -> AgentSummary {
    AgentSummary {
        profile,
        id: config.agent_ids.get(profile.name).cloned(),
    }
}

fn statistics_view(stats: &AgentStatistics, run_start: Option<DateTime<Utc>>) -> StatisticsView {
    let total_workflow_time = match (run_start, stats.last_invocation_time) {
        (Some(start), Some(last)) => {
            Some(round2((last - start).num_milliseconds() as f64 / 1000.0))
        }
        _ => None,
    };

    StatisticsView {
        invocations: stats.invocation_count,
        avg_response_time: round2(stats.average_response_time),
        total_response_time: round2(stats.cumulative_response_time),
        first_invocation: stats.first_invocation_time,
        last_invocation: stats.last_invocation_time,
        total_workflow_time,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
