//! Shared application state handed to every handler.

use std::sync::Arc;

use taskrelay_core::{Config, Tracer};
use taskrelay_worker::{QueueTransport, TaskPublisher};

pub struct AppState {
    pub config: Config,
    pub tracer: Tracer,
    pub publisher: TaskPublisher,
    /// Used by the readiness probe.
    pub transport: Arc<dyn QueueTransport>,
}
