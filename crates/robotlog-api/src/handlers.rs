//! REST endpoint handlers for the registry API.
//!
//! Handlers only translate between HTTP and [`Registry`] calls.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/robots` | List robots with their last update time |
//! | `GET` | `/robots/{name}` | Current attributes of one robot |
//! | `PUT` | `/robots/{name}` | Create or update a robot's attributes |
//! | `GET` | `/robots/{name}/history` | Change history of one robot |
//!
//! [`Registry`]: robotlog_store::Registry

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use indexmap::IndexMap;
use robotlog_types::{History, RobotSummary, Snapshot};

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `PUT /robots/{name}`.
#[derive(Debug, serde::Deserialize)]
pub struct UpsertRequest {
    /// Attribute values to write, in the order given.
    pub robot: IndexMap<String, String>,
}

/// List every robot with the time of its latest change.
pub async fn list_robots(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RobotSummary>>, ApiError> {
    Ok(Json(state.registry.list().await?))
}

/// Current attributes of one robot.
pub async fn get_robot(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    Ok(Json(state.registry.snapshot(&name).await?))
}

/// Create or update a robot's attributes and return all of them.
pub async fn put_robot(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<Snapshot>, ApiError> {
    tracing::debug!(robot = name, attributes = request.robot.len(), "PUT robot");
    Ok(Json(state.registry.upsert(&name, &request.robot).await?))
}

/// Change history of one robot, keyed by second.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<History>, ApiError> {
    Ok(Json(state.registry.history(&name).await?))
}
