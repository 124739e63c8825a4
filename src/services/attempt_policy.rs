use crate::error::{Error, Result};
use crate::models::result_record::{ResultRecord, ResultStatus};

/// Pure admission decision for a new attempt on one (candidate, test) pair.
///
/// The decision is only meaningful when acted on atomically with record
/// creation; the repository's uniqueness guarantees close the race between
/// two sessions that both saw the same history.
pub struct AttemptPolicy;

impl AttemptPolicy {
    /// Returns the next dense attempt number, or rejects the start.
    pub fn decide(history: &[ResultRecord], max_attempts: Option<u32>) -> Result<i32> {
        if history
            .iter()
            .any(|record| record.status == ResultStatus::InProgress)
        {
            return Err(Error::AttemptInProgress);
        }

        if let Some(limit) = max_attempts {
            let terminal = history
                .iter()
                .filter(|record| record.status.is_terminal())
                .count() as u32;
            if terminal >= limit {
                return Err(Error::AttemptLimitExceeded(limit));
            }
        }

        let next = history
            .iter()
            .map(|record| record.attempt_number)
            .max()
            .unwrap_or(0)
            + 1;
        Ok(next)
    }
}
