//! services/api/src/web/state.rs
//!
//! Defines the shared application state handed to every Axum handler.

use crate::config::Config;
use course_workflow_core::WorkflowOrchestrator;
use std::sync::Arc;

/// The shared state of the web application.
///
/// The orchestrator already owns every adapter behind its ports, so handlers
/// never reach the database or the generation services directly.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: WorkflowOrchestrator,
    pub config: Arc<Config>,
}
