use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::answer::AnswerSheet;
use super::test_definition::TestDefinition;

/// Lifecycle status of one attempt. The only legal transitions go from
/// `InProgress` to one of the three terminal states; the repository's
/// conditional update enforces this at the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    InProgress,
    Completed,
    Abandoned,
    Expired,
}

impl ResultStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ResultStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::InProgress => "in_progress",
            ResultStatus::Completed => "completed",
            ResultStatus::Abandoned => "abandoned",
            ResultStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ResultStatus::InProgress),
            "completed" => Ok(ResultStatus::Completed),
            "abandoned" => Ok(ResultStatus::Abandoned),
            "expired" => Ok(ResultStatus::Expired),
            other => Err(format!("unknown result status '{}'", other)),
        }
    }
}

/// Durable record of one test attempt by one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Uuid,
    pub test_id: Uuid,
    pub candidate_id: Uuid,
    pub application_id: Option<Uuid>,
    /// 1-based, dense per (candidate, test) pair, assigned at creation.
    pub attempt_number: i32,
    pub score: f64,
    pub max_score: f64,
    pub percentage: i32,
    pub passed: bool,
    pub answers: Option<AnswerSheet>,
    pub started_at: DateTime<Utc>,
    /// Absolute cutoff, fixed at creation: started_at + time limit.
    pub deadline: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Wall-clock seconds between start and end, stored unclamped.
    pub duration_seconds: Option<i64>,
    pub status: ResultStatus,
    /// Opaque payload owned by the external analysis service.
    pub analysis: Option<JsonValue>,
    pub feedback: Option<String>,
}

impl ResultRecord {
    pub fn new_in_progress(
        candidate_id: Uuid,
        test_id: Uuid,
        application_id: Option<Uuid>,
        attempt_number: i32,
        test: &TestDefinition,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_id,
            candidate_id,
            application_id,
            attempt_number,
            score: 0.0,
            max_score: test.max_score,
            percentage: 0,
            passed: false,
            answers: None,
            started_at,
            deadline: test.deadline_for(started_at),
            ended_at: None,
            duration_seconds: None,
            status: ResultStatus::InProgress,
            analysis: None,
            feedback: None,
        }
    }

    /// Applies a finalization in place. Callers must hold whatever lock
    /// guards the record and must have verified the record is in progress.
    pub fn apply_finalization(&mut self, finalization: &Finalization) {
        self.status = finalization.status;
        self.score = finalization.score;
        self.percentage = finalization.percentage;
        self.passed = finalization.passed;
        self.ended_at = Some(finalization.ended_at);
        self.duration_seconds = Some(finalization.duration_seconds);
        if let Some(answers) = &finalization.answers {
            self.answers = Some(answers.clone());
        }
    }
}

/// The full set of fields fixed by one terminal transition. Constructors
/// only produce terminal statuses, so an in-progress "finalization" cannot
/// be expressed.
#[derive(Debug, Clone)]
pub struct Finalization {
    pub status: ResultStatus,
    pub score: f64,
    pub percentage: i32,
    pub passed: bool,
    pub answers: Option<AnswerSheet>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl Finalization {
    pub fn completed(
        score: f64,
        percentage: i32,
        passed: bool,
        answers: AnswerSheet,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: ResultStatus::Completed,
            score,
            percentage,
            passed,
            answers: Some(answers),
            ended_at,
            duration_seconds: (ended_at - started_at).num_seconds(),
        }
    }

    /// Late submit: answers are kept for audit but never scored.
    pub fn expired_on_submit(
        answers: AnswerSheet,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: ResultStatus::Expired,
            score: 0.0,
            percentage: 0,
            passed: false,
            answers: Some(answers),
            ended_at,
            duration_seconds: (ended_at - started_at).num_seconds(),
        }
    }

    /// Sweep expiry: the record ends at its deadline, not at the sweep's
    /// wall clock, so the stored duration stays bounded by the time limit.
    pub fn expired_at_deadline(started_at: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        Self {
            status: ResultStatus::Expired,
            score: 0.0,
            percentage: 0,
            passed: false,
            answers: None,
            ended_at: deadline,
            duration_seconds: (deadline - started_at).num_seconds(),
        }
    }

    pub fn abandoned(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        Self {
            status: ResultStatus::Abandoned,
            score: 0.0,
            percentage: 0,
            passed: false,
            answers: None,
            ended_at,
            duration_seconds: (ended_at - started_at).num_seconds(),
        }
    }
}
