pub mod analysis_service;
pub mod attempt_policy;
pub mod scoring_service;
pub mod session_service;
pub mod test_provider;
