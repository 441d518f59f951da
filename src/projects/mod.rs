use axum::Router;

use crate::state::AppState;

pub mod handlers;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    handlers::project_routes()
}
