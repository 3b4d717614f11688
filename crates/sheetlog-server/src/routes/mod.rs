//! Route definitions for the REST API.

mod health;
mod imports;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
///
/// Upload size is enforced by the engine while it reads the body stream.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Imports
        .route("/api/excel/import", post(imports::import_file))
        .route("/api/excel/history", get(imports::get_history))
        .route("/api/excel/changes", get(imports::get_changes))
        .route("/api/excel/summary", get(imports::get_summary))
        .route("/api/excel/snapshot", get(imports::get_snapshot))
        .route("/api/excel/datasets", get(imports::list_datasets))
        // Attach state
        .with_state(state)
}

pub use health::*;
pub use imports::*;
