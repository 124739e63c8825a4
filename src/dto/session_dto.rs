use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::answer::AnswerSheet;
use crate::models::result_record::ResultStatus;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub candidate_id: Uuid,
    pub test_id: Uuid,
    pub application_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitSessionRequest {
    pub answers: AnswerSheet,
}

#[derive(Debug, Serialize)]
pub struct SubmitSessionResponse {
    pub session_id: Uuid,
    pub status: ResultStatus,
    pub score: f64,
    pub max_score: f64,
    pub percentage: i32,
    pub passed: bool,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl From<crate::models::result_record::ResultRecord> for SubmitSessionResponse {
    fn from(record: crate::models::result_record::ResultRecord) -> Self {
        Self {
            session_id: record.id,
            status: record.status,
            score: record.score,
            max_score: record.max_score,
            percentage: record.percentage,
            passed: record.passed,
            ended_at: record.ended_at,
            duration_seconds: record.duration_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub status: ResultStatus,
    pub attempt_number: i32,
    pub deadline: DateTime<Utc>,
    pub remaining_seconds: i64,
}
