use std::sync::Arc;

use prometheus::Registry;

use crate::notify::NotificationGuard;
use crate::persistence::{DocumentStore, PersistencePipeline, ResumeRepository};
use crate::relay::StreamRelay;
use crate::scoring::ScoringEngine;
use crate::tasks::service::TaskService;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every component is built once in `main`; background work is owned by the
/// supervisor inside `tasks` and `pipeline`, not by this struct.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskService,
    pub pipeline: PersistencePipeline,
    pub scoring: Arc<ScoringEngine>,
    pub relay: StreamRelay,
    pub notify: Arc<NotificationGuard>,
    pub repo: Arc<dyn ResumeRepository>,
    pub documents: Arc<dyn DocumentStore>,
    /// Scraped by `/metrics`.
    pub metrics: Registry,
}
