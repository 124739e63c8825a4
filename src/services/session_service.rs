use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::AnswerSheet;
use crate::models::result_record::{Finalization, ResultRecord, ResultStatus};
use crate::repository::ResultRepository;
use crate::services::analysis_service::AnalysisAdapter;
use crate::services::attempt_policy::AttemptPolicy;
use crate::services::scoring_service::ScoringService;
use crate::services::test_provider::TestDefinitionProvider;
use crate::utils::clock::Clock;

/// Bounded retries for the start race: an attempt-number collision means a
/// concurrent start claimed the slot first, so the policy is re-evaluated
/// against fresh history.
const MAX_START_RETRIES: usize = 3;

/// Live handle for one in-progress attempt.
#[derive(Debug, Clone, Copy)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub record: ResultRecord,
    pub remaining_seconds: i64,
}

/// Orchestrates the attempt lifecycle: start, submit, abandon, expiry.
/// The only stateful component; all races resolve through the repository's
/// atomic create and conditional finalization.
#[derive(Clone)]
pub struct SessionService {
    repository: Arc<dyn ResultRepository>,
    tests: Arc<dyn TestDefinitionProvider>,
    analysis: Option<Arc<dyn AnalysisAdapter>>,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(
        repository: Arc<dyn ResultRepository>,
        tests: Arc<dyn TestDefinitionProvider>,
        analysis: Option<Arc<dyn AnalysisAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            tests,
            analysis,
            clock,
        }
    }

    /// Starts a new attempt for a candidate/test pair.
    ///
    /// Policy evaluation and record creation act as one atomic unit: the
    /// repository's uniqueness guarantees reject stale decisions, and the
    /// bounded retry re-evaluates the policy on attempt-number collisions.
    pub async fn start(
        &self,
        candidate_id: Uuid,
        test_id: Uuid,
        application_id: Option<Uuid>,
    ) -> Result<SessionHandle> {
        let test = self.tests.fetch(test_id).await?;

        for _ in 0..MAX_START_RETRIES {
            let history = self
                .repository
                .list_by_candidate_and_test(candidate_id, test_id)
                .await?;
            let attempt_number = AttemptPolicy::decide(&history, test.max_attempts)?;

            let started_at = self.clock.now();
            let record = ResultRecord::new_in_progress(
                candidate_id,
                test_id,
                application_id,
                attempt_number,
                &test,
                started_at,
            );

            match self.repository.create(record).await {
                Ok(created) => {
                    tracing::info!(
                        session_id = %created.id,
                        %candidate_id,
                        %test_id,
                        attempt_number,
                        deadline = %created.deadline,
                        "session started"
                    );
                    return Ok(SessionHandle {
                        session_id: created.id,
                        attempt_number: created.attempt_number,
                        started_at: created.started_at,
                        deadline: created.deadline,
                    });
                }
                Err(Error::AttemptNumberTaken) => {
                    tracing::debug!(%candidate_id, %test_id, "attempt number raced, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        // Retries exhausted: a concurrent start holds the live slot.
        Err(Error::AttemptInProgress)
    }

    /// Submits answers for a live session.
    ///
    /// One clock read decides the boundary: at or before the deadline the
    /// sheet is scored and the attempt completes; strictly after, the
    /// attempt expires with the answers kept for audit but unscored.
    pub async fn submit(&self, session_id: Uuid, answers: AnswerSheet) -> Result<ResultRecord> {
        let record = self.fetch_live(session_id).await?;
        let test = self.tests.fetch(record.test_id).await?;
        let now = self.clock.now();

        let finalization = if now > record.deadline {
            Finalization::expired_on_submit(answers.clone(), record.started_at, now)
        } else {
            let outcome = ScoringService::score(
                &answers,
                &test.answer_key,
                test.max_score,
                test.passing_threshold,
            );
            Finalization::completed(
                outcome.score,
                outcome.percentage,
                outcome.passed,
                answers.clone(),
                record.started_at,
                now,
            )
        };

        let updated = self
            .repository
            .update_status_and_score(session_id, &finalization)
            .await?;

        tracing::info!(
            %session_id,
            status = %updated.status,
            score = updated.score,
            percentage = updated.percentage,
            passed = updated.passed,
            "session finalized"
        );

        if updated.status == ResultStatus::Completed {
            self.dispatch_analysis(updated.id, answers);
        }
        Ok(updated)
    }

    /// Candidate-initiated exit. The attempt ends unscored; no analysis.
    pub async fn abandon(&self, session_id: Uuid) -> Result<ResultRecord> {
        let record = self.fetch_live(session_id).await?;
        let now = self.clock.now();
        let updated = self
            .repository
            .update_status_and_score(session_id, &Finalization::abandoned(record.started_at, now))
            .await?;
        tracing::info!(%session_id, "session abandoned");
        Ok(updated)
    }

    /// Expires one session if its deadline has passed, otherwise returns it
    /// unchanged. Losing the finalization race to a concurrent submit or
    /// sweep is benign: the current record is fetched and returned.
    pub async fn check_expiry(&self, session_id: Uuid) -> Result<ResultRecord> {
        let record = self
            .repository
            .get_by_id(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;

        if record.status.is_terminal() || self.clock.now() <= record.deadline {
            return Ok(record);
        }

        let finalization = Finalization::expired_at_deadline(record.started_at, record.deadline);
        match self
            .repository
            .update_status_and_score(session_id, &finalization)
            .await
        {
            Ok(updated) => Ok(updated),
            Err(Error::ConflictAlreadyFinalized) => self
                .repository
                .get_by_id(session_id)
                .await?
                .ok_or(Error::SessionNotFound(session_id)),
            Err(e) => Err(e),
        }
    }

    /// Current view of a session plus seconds left on the clock.
    pub async fn session_status(&self, session_id: Uuid) -> Result<SessionStatus> {
        let record = self.check_expiry(session_id).await?;
        let remaining_seconds = if record.status == ResultStatus::InProgress {
            (record.deadline - self.clock.now()).num_seconds().max(0)
        } else {
            0
        };
        Ok(SessionStatus {
            record,
            remaining_seconds,
        })
    }

    /// Expires every overdue live session. Idempotent; safe from multiple
    /// workers because each record transitions through the conditional
    /// update exactly once.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let expired = self.repository.expire_overdue(self.clock.now()).await?;
        if expired > 0 {
            tracing::info!(expired, "expired overdue sessions");
        }
        Ok(expired)
    }

    /// Attaches recruiter feedback to a finalized attempt.
    pub async fn record_feedback(&self, result_id: Uuid, feedback: String) -> Result<ResultRecord> {
        self.repository
            .update_analysis(result_id, None, Some(feedback))
            .await
    }

    async fn fetch_live(&self, session_id: Uuid) -> Result<ResultRecord> {
        let record = self
            .repository
            .get_by_id(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;
        if record.status.is_terminal() {
            return Err(Error::InvalidState(record.status));
        }
        Ok(record)
    }

    /// Fire-and-forget analysis dispatch. Runs on its own task so the
    /// submit response never waits on the analysis service; failures are
    /// logged and leave the finalized record untouched.
    fn dispatch_analysis(&self, result_id: Uuid, answers: AnswerSheet) {
        let Some(analysis) = self.analysis.clone() else {
            return;
        };
        let repository = Arc::clone(&self.repository);
        tokio::spawn(async move {
            match analysis.analyze(&answers).await {
                Ok(payload) => {
                    if let Err(e) = repository
                        .update_analysis(result_id, Some(payload), None)
                        .await
                    {
                        tracing::warn!(%result_id, error = %e, "failed to merge analysis payload");
                    }
                }
                Err(e) => {
                    tracing::warn!(%result_id, error = %e, "analysis unavailable");
                }
            }
        });
    }
}
