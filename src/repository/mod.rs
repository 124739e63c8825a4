use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::result_record::{Finalization, ResultRecord};

pub mod memory;
pub mod postgres;

pub use memory::MemoryResultRepository;
pub use postgres::PgResultRepository;

/// Persistence boundary for attempt records.
///
/// Post-creation, the only permitted mutations are `update_status_and_score`
/// (conditional on the record still being in progress) and `update_analysis`
/// (analysis/feedback only, terminal records only). Backends enforce this,
/// not callers.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Inserts a new in-progress record atomically with the pair's
    /// uniqueness invariants: fails with `AttemptInProgress` when the pair
    /// already has a live record, and with `AttemptNumberTaken` when a
    /// concurrent start claimed the same attempt number first.
    async fn create(&self, record: ResultRecord) -> Result<ResultRecord>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<ResultRecord>>;

    /// Attempt history for one pair, ordered by attempt number.
    async fn list_by_candidate_and_test(
        &self,
        candidate_id: Uuid,
        test_id: Uuid,
    ) -> Result<Vec<ResultRecord>>;

    async fn list_by_application(&self, application_id: Uuid) -> Result<Vec<ResultRecord>>;

    /// Completed records for one test, best score first.
    async fn list_by_test_ranked(&self, test_id: Uuid, limit: i64) -> Result<Vec<ResultRecord>>;

    /// Conditional terminal transition: succeeds only while the stored
    /// status is still in progress, otherwise `ConflictAlreadyFinalized`.
    /// This is what makes double-submit and submit-vs-expiry races safe.
    async fn update_status_and_score(
        &self,
        id: Uuid,
        finalization: &Finalization,
    ) -> Result<ResultRecord>;

    /// Merges analysis output and/or recruiter feedback onto a terminal
    /// record. Passing `None` leaves the corresponding field untouched.
    async fn update_analysis(
        &self,
        id: Uuid,
        analysis: Option<JsonValue>,
        feedback: Option<String>,
    ) -> Result<ResultRecord>;

    /// Expires every in-progress record whose deadline lies strictly before
    /// `now`, with `ended_at` pinned to the deadline. Idempotent; safe to
    /// run from multiple workers. Returns the number of records expired.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64>;
}
