use std::sync::Arc;

use autobids_core::process::SystemRunner;
use autobids_pipeline::Pipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: autobids_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Tool configuration, DICOM queries, and email delivery.
    pub pipeline: Arc<Pipeline<SystemRunner>>,
}
