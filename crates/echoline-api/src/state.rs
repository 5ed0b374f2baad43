//! Application state shared by the handlers.

use std::sync::Arc;

use echoline_core::Config;
use echoline_db::MediaRecordStore;
use echoline_storage::StorageGateway;
use echoline_worker::{PipelineOrchestrator, RetryService, StatusService};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Used directly by download and readiness; everything else goes through the services.
    pub media: Arc<dyn MediaRecordStore>,
    pub storage: Arc<StorageGateway>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub retry: RetryService,
    pub status: StatusService,
}
