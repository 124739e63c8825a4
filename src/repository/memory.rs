use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::result_record::{Finalization, ResultRecord, ResultStatus};
use crate::repository::ResultRepository;

/// In-memory backend. One mutex over the whole map makes `create` atomic
/// with both uniqueness checks, mirroring what the Postgres backend gets
/// from its unique indexes. Used by tests and database-less runs.
#[derive(Default)]
pub struct MemoryResultRepository {
    records: Mutex<HashMap<Uuid, ResultRecord>>,
}

impl MemoryResultRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultRepository for MemoryResultRepository {
    async fn create(&self, record: ResultRecord) -> Result<ResultRecord> {
        let mut records = self.records.lock().await;

        let same_pair = |existing: &&ResultRecord| {
            existing.candidate_id == record.candidate_id && existing.test_id == record.test_id
        };
        if records
            .values()
            .filter(same_pair)
            .any(|existing| existing.status == ResultStatus::InProgress)
        {
            return Err(Error::AttemptInProgress);
        }
        if records
            .values()
            .filter(same_pair)
            .any(|existing| existing.attempt_number == record.attempt_number)
        {
            return Err(Error::AttemptNumberTaken);
        }

        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<ResultRecord>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn list_by_candidate_and_test(
        &self,
        candidate_id: Uuid,
        test_id: Uuid,
    ) -> Result<Vec<ResultRecord>> {
        let records = self.records.lock().await;
        let mut matching: Vec<ResultRecord> = records
            .values()
            .filter(|r| r.candidate_id == candidate_id && r.test_id == test_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.attempt_number);
        Ok(matching)
    }

    async fn list_by_application(&self, application_id: Uuid) -> Result<Vec<ResultRecord>> {
        let records = self.records.lock().await;
        let mut matching: Vec<ResultRecord> = records
            .values()
            .filter(|r| r.application_id == Some(application_id))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.started_at);
        Ok(matching)
    }

    async fn list_by_test_ranked(&self, test_id: Uuid, limit: i64) -> Result<Vec<ResultRecord>> {
        let records = self.records.lock().await;
        let mut matching: Vec<ResultRecord> = records
            .values()
            .filter(|r| r.test_id == test_id && r.status == ResultStatus::Completed)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ended_at.cmp(&b.ended_at))
        });
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn update_status_and_score(
        &self,
        id: Uuid,
        finalization: &Finalization,
    ) -> Result<ResultRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("result {} not found", id)))?;
        if record.status.is_terminal() {
            return Err(Error::ConflictAlreadyFinalized);
        }
        record.apply_finalization(finalization);
        Ok(record.clone())
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        analysis: Option<JsonValue>,
        feedback: Option<String>,
    ) -> Result<ResultRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("result {} not found", id)))?;
        if record.status == ResultStatus::InProgress {
            return Err(Error::InvalidState(record.status));
        }
        if let Some(analysis) = analysis {
            record.analysis = Some(analysis);
        }
        if let Some(feedback) = feedback {
            record.feedback = Some(feedback);
        }
        Ok(record.clone())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut records = self.records.lock().await;
        let mut expired = 0u64;
        for record in records.values_mut() {
            if record.status == ResultStatus::InProgress && record.deadline < now {
                let finalization =
                    Finalization::expired_at_deadline(record.started_at, record.deadline);
                record.apply_finalization(&finalization);
                expired += 1;
            }
        }
        Ok(expired)
    }
}
