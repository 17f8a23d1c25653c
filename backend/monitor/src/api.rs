//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use cron_protocol::economics::{format_ton, FundingMode, JobEconomics};
use cron_protocol::Address;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db;
use crate::errors::MonitorError;
use crate::snapshot::{DomainSnapshot, JobSnapshot};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct JobsResponse {
    pub count: usize,
    pub jobs: Vec<JobSnapshot>,
}

#[derive(Serialize)]
pub struct DomainsResponse {
    pub count: usize,
    /// Domains no live job renews
    pub uncovered: usize,
    pub domains: Vec<DomainSnapshot>,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub economics: JobEconomics,
    pub cost_per_cycle_ton: String,
    pub initial_funding_ton: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub domains: u32,
    pub mode: Option<String>,
    pub cycles: Option<u32>,
}

fn error_response(status: StatusCode, error: impl ToString) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn internal_error(e: MonitorError) -> axum::response::Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /jobs`
pub async fn get_all_jobs(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match db::get_all_jobs(&state.pool).await {
        Ok(jobs) => Json(JobsResponse {
            count: jobs.len(),
            jobs,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /jobs/:address`
///
/// Accepts raw or user-friendly addresses.
pub async fn get_job(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let address: Address = match address.parse() {
        Ok(a) => a,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    match db::get_job(&state.pool, &address.to_string()).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("job {address} not found")),
        Err(e) => internal_error(e),
    }
}

/// `GET /domains`
pub async fn get_all_domains(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match db::get_all_domains(&state.pool).await {
        Ok(domains) => Json(DomainsResponse {
            count: domains.len(),
            uncovered: domains.iter().filter(|d| d.covered_by.is_none()).count(),
            domains,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /quote?domains=3&mode=classic&cycles=1`
pub async fn get_quote(Query(params): Query<QuoteParams>) -> impl IntoResponse {
    match quote(&params) {
        Ok(q) => Json(q).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

fn quote(params: &QuoteParams) -> Result<QuoteResponse, String> {
    let mode: FundingMode = params.mode.as_deref().unwrap_or("classic").parse()?;
    let cycles = params.cycles.unwrap_or(1);
    if params.domains == 0 {
        return Err("domains must be at least 1".to_string());
    }
    if mode == FundingMode::Classic && cycles == 0 {
        return Err("cycles must be at least 1".to_string());
    }
    let economics = JobEconomics::new(mode, params.domains, cycles);
    Ok(QuoteResponse {
        cost_per_cycle_ton: format_ton(economics.cost_per_cycle),
        initial_funding_ton: format_ton(economics.initial_funding),
        economics,
    })
}
