use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo_types::Project;
use crate::{error::parse_body, error::ApiError, state::AppState, store::StoreError};

const EMPTY_REQUEST: &str = "Empty project request";
const NOT_FOUND: &str = "Project doesn't exist";
const DUPLICATE_NAME: &str = "Project with that name already exists";

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}

fn decode_project(body: &[u8]) -> Result<Project, ApiError> {
    let project: Project = parse_body(body, EMPTY_REQUEST)?;
    if project.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Project name is required".into()));
    }
    Ok(project)
}

fn map_not_found(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound { .. } => ApiError::NotFound(NOT_FOUND.into()),
        other => other.into(),
    }
}

fn map_conflict(err: StoreError, project: &Project) -> ApiError {
    match err {
        StoreError::Conflict { .. } => {
            warn!(name = %project.name, "project name already taken");
            ApiError::Conflict(DUPLICATE_NAME.into())
        }
        other => other.into(),
    }
}

/// The id is always generated here; any id in the body is ignored.
#[instrument(skip(state, body))]
pub async fn create_project(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Project>, ApiError> {
    let mut project = decode_project(&body)?;
    project.id = Uuid::new_v4().to_string();

    state
        .projects
        .insert_unique(&project)
        .await
        .map_err(|e| map_conflict(e, &project))?;

    info!(id = %project.id, name = %project.name, "project created");
    Ok(Json(project))
}

/// Full replacement. When no project has this id the response is an empty
/// 200, not a 404.
#[instrument(skip(state, body))]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut project = decode_project(&body)?;
    project.id = id.clone();

    let matched = state
        .projects
        .update_by_key(&id, &project)
        .await
        .map_err(|e| map_conflict(e, &project))?;

    if matched == 0 {
        info!(%id, "update matched no project");
        return Ok(StatusCode::OK.into_response());
    }
    info!(%id, "project updated");
    Ok(Json(Message {
        message: format!("project {id} updated"),
    })
    .into_response())
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    let project = state.projects.find_by_key(&id).await.map_err(map_not_found)?;
    Ok(Json(project))
}

#[instrument(skip(state))]
pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    let projects: Vec<Project> = state.projects.list_all().try_collect().await?;
    Ok(Json(projects))
}

#[instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    state.projects.delete_by_key(&id).await.map_err(map_not_found)?;
    info!(%id, "project deleted");
    Ok(Json(Message {
        message: format!("project {id} deleted"),
    }))
}
