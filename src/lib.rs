pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::repository::ResultRepository;
use crate::services::analysis_service::AnalysisAdapter;
use crate::services::session_service::SessionService;
use crate::services::test_provider::TestDefinitionProvider;
use crate::utils::clock::Clock;

#[derive(Clone)]
pub struct AppState {
    pub session_service: SessionService,
    pub repository: Arc<dyn ResultRepository>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn ResultRepository>,
        tests: Arc<dyn TestDefinitionProvider>,
        analysis: Option<Arc<dyn AnalysisAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session_service =
            SessionService::new(Arc::clone(&repository), tests, analysis, clock);
        Self {
            session_service,
            repository,
        }
    }
}
