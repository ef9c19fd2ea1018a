//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::errors::ControlError;
use crate::lifecycle::fsm::DeploymentStatus;
use crate::lifecycle::transitions;
use crate::models::ids::{DeploymentId, EnvironmentId};
use crate::server::state::ServerState;
use crate::utils::version_info;

fn status_for(err: &ControlError) -> StatusCode {
    match err {
        ControlError::NotFound(_) => StatusCode::NOT_FOUND,
        ControlError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ControlError::InvalidTransition { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ControlError) -> StatusCode {
    warn!("Request failed: {}", err);
    status_for(&err)
}

fn parse_deployment_id(raw: &str) -> Result<DeploymentId, StatusCode> {
    raw.parse().map_err(|_| StatusCode::BAD_REQUEST)
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: i64,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "rollgate".to_string(),
        version: version.version,
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Environment summary
#[derive(Debug, Serialize)]
pub struct EnvironmentInfo {
    pub id: EnvironmentId,
    pub name: String,
    pub concurrency_limit: i64,
    pub started: usize,
    pub pending: usize,
}

/// Environments response
#[derive(Debug, Serialize)]
pub struct EnvironmentsResponse {
    pub environments: Vec<EnvironmentInfo>,
    pub total: usize,
}

/// Environments handler
pub async fn environments_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, StatusCode> {
    let environments = state.store.list_environments().await.map_err(reject)?;

    let mut infos = Vec::with_capacity(environments.len());
    for environment in environments {
        let started = state
            .store
            .find_deployments_by_environment_and_status(environment.id, DeploymentStatus::Started)
            .await
            .map_err(reject)?;
        let pending = state
            .store
            .find_deployments_by_environment_and_status(environment.id, DeploymentStatus::Pending)
            .await
            .map_err(reject)?;

        infos.push(EnvironmentInfo {
            id: environment.id,
            name: environment.name,
            concurrency_limit: environment.concurrency_limit,
            started: started.len(),
            pending: pending.len(),
        });
    }

    let total = infos.len();
    Ok(Json(EnvironmentsResponse {
        environments: infos,
        total,
    }))
}

/// Dry-run admission response
#[derive(Debug, Serialize)]
pub struct AdmissionResponse {
    pub deployment_id: DeploymentId,
    pub status: DeploymentStatus,
    pub emergency_rollback: bool,
    pub allowed: bool,
    pub reason: String,
}

/// Evaluate the admission verdict for a deployment without acting on it
pub async fn admission_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = parse_deployment_id(&id)?;
    let deployment = state.store.find_deployment_by_id(id).await.map_err(reject)?;
    let verdict = state
        .gate
        .controller()
        .decide(&deployment)
        .await
        .map_err(reject)?;

    Ok(Json(AdmissionResponse {
        deployment_id: deployment.id,
        status: deployment.status,
        emergency_rollback: deployment.is_emergency_rollback(),
        allowed: verdict.is_allowed(),
        reason: verdict.to_string(),
    }))
}

/// Cancel response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub deployment_id: DeploymentId,
    pub status: DeploymentStatus,
}

/// Cancel a PENDING or STARTED deployment
pub async fn cancel_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = parse_deployment_id(&id)?;
    let status = transitions::cancel(state.store.as_ref(), id)
        .await
        .map_err(reject)?;

    Ok(Json(CancelResponse {
        deployment_id: id,
        status,
    }))
}
