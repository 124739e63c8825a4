use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};

use crate::error::{Error, Result};
use crate::models::answer::AnswerSheet;

/// External analysis collaborator. Invoked asynchronously after a completed
/// finalization; its output is merged back onto the record and its failures
/// never touch score or status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisAdapter: Send + Sync {
    async fn analyze(&self, answers: &AnswerSheet) -> Result<JsonValue>;
}

/// Posts the raw answer sheet to the analysis service and returns its
/// free-form payload verbatim. The payload's shape is owned by that service.
#[derive(Clone)]
pub struct HttpAnalysisAdapter {
    client: Client,
    endpoint: String,
}

impl HttpAnalysisAdapter {
    pub fn new(endpoint: String, client: Client) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl AnalysisAdapter for HttpAnalysisAdapter {
    async fn analyze(&self, answers: &AnswerSheet) -> Result<JsonValue> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "answers": answers }))
            .send()
            .await
            .map_err(|e| Error::AnalysisUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::AnalysisUnavailable(format!(
                "analysis service returned {}",
                response.status()
            )));
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|e| Error::AnalysisUnavailable(e.to_string()))
    }
}
