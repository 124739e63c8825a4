use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::test_definition::TestDefinition;

/// External collaborator supplying per-test configuration: max score, time
/// limit, answer key, passing threshold, and max attempts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TestDefinitionProvider: Send + Sync {
    async fn fetch(&self, test_id: Uuid) -> Result<TestDefinition>;
}

/// Production provider: fetches definitions from the test-authoring service.
#[derive(Clone)]
pub struct HttpTestDefinitionProvider {
    client: Client,
    base_url: String,
}

impl HttpTestDefinitionProvider {
    pub fn new(base_url: String, client: Client) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl TestDefinitionProvider for HttpTestDefinitionProvider {
    async fn fetch(&self, test_id: Uuid) -> Result<TestDefinition> {
        let url = format!("{}/tests/{}", self.base_url.trim_end_matches('/'), test_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!(
                "test definition {} not found",
                test_id
            )));
        }
        let response = response.error_for_status()?;
        let definition: TestDefinition = response.json().await?;
        Ok(definition)
    }
}

/// In-memory provider for tests and local harnesses.
#[derive(Clone, Default)]
pub struct StaticTestDefinitionProvider {
    tests: HashMap<Uuid, TestDefinition>,
}

impl StaticTestDefinitionProvider {
    pub fn new(definitions: impl IntoIterator<Item = TestDefinition>) -> Self {
        Self {
            tests: definitions
                .into_iter()
                .map(|definition| (definition.test_id, definition))
                .collect(),
        }
    }
}

#[async_trait]
impl TestDefinitionProvider for StaticTestDefinitionProvider {
    async fn fetch(&self, test_id: Uuid) -> Result<TestDefinition> {
        self.tests
            .get(&test_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("test definition {} not found", test_id)))
    }
}
