use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::result_record::{Finalization, ResultRecord, ResultStatus};
use crate::repository::ResultRepository;

const COLUMNS: &str = "id, test_id, candidate_id, application_id, attempt_number, score, \
                       max_score, percentage, passed, answers, started_at, deadline, ended_at, \
                       duration_seconds, status, analysis, feedback";

/// Postgres backend. The pair invariants live in the schema: a partial
/// unique index on (candidate_id, test_id) where status = 'in_progress' and
/// a unique (candidate_id, test_id, attempt_number) index.
#[derive(Clone)]
pub struct PgResultRepository {
    pool: PgPool,
}

impl PgResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ResultRow {
    id: Uuid,
    test_id: Uuid,
    candidate_id: Uuid,
    application_id: Option<Uuid>,
    attempt_number: i32,
    score: f64,
    max_score: f64,
    percentage: i32,
    passed: bool,
    answers: Option<JsonValue>,
    started_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    duration_seconds: Option<i64>,
    status: String,
    analysis: Option<JsonValue>,
    feedback: Option<String>,
}

impl TryFrom<ResultRow> for ResultRecord {
    type Error = Error;

    fn try_from(row: ResultRow) -> Result<Self> {
        let status: ResultStatus = row.status.parse().map_err(Error::Internal)?;
        let answers = match row.answers {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        Ok(ResultRecord {
            id: row.id,
            test_id: row.test_id,
            candidate_id: row.candidate_id,
            application_id: row.application_id,
            attempt_number: row.attempt_number,
            score: row.score,
            max_score: row.max_score,
            percentage: row.percentage,
            passed: row.passed,
            answers,
            started_at: row.started_at,
            deadline: row.deadline,
            ended_at: row.ended_at,
            duration_seconds: row.duration_seconds,
            status,
            analysis: row.analysis,
            feedback: row.feedback,
        })
    }
}

fn rows_to_records(rows: Vec<ResultRow>) -> Result<Vec<ResultRecord>> {
    rows.into_iter().map(ResultRecord::try_from).collect()
}

fn answers_json(answers: &Option<crate::models::answer::AnswerSheet>) -> Result<Option<JsonValue>> {
    answers
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(Error::from)
}

#[async_trait]
impl ResultRepository for PgResultRepository {
    async fn create(&self, record: ResultRecord) -> Result<ResultRecord> {
        let query = format!(
            "INSERT INTO assessment_results ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ResultRow>(&query)
            .bind(record.id)
            .bind(record.test_id)
            .bind(record.candidate_id)
            .bind(record.application_id)
            .bind(record.attempt_number)
            .bind(record.score)
            .bind(record.max_score)
            .bind(record.percentage)
            .bind(record.passed)
            .bind(answers_json(&record.answers)?)
            .bind(record.started_at)
            .bind(record.deadline)
            .bind(record.ended_at)
            .bind(record.duration_seconds)
            .bind(record.status.as_str())
            .bind(record.analysis.clone())
            .bind(record.feedback.clone())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) => match db.constraint() {
                    Some("uniq_assessment_results_in_progress") => Error::AttemptInProgress,
                    Some("uniq_assessment_results_attempt") => Error::AttemptNumberTaken,
                    _ => Error::Database(e),
                },
                _ => Error::Database(e),
            })?;
        row.try_into()
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<ResultRecord>> {
        let query = format!("SELECT {COLUMNS} FROM assessment_results WHERE id = $1");
        let row = sqlx::query_as::<_, ResultRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ResultRecord::try_from).transpose()
    }

    async fn list_by_candidate_and_test(
        &self,
        candidate_id: Uuid,
        test_id: Uuid,
    ) -> Result<Vec<ResultRecord>> {
        let query = format!(
            "SELECT {COLUMNS} FROM assessment_results \
             WHERE candidate_id = $1 AND test_id = $2 \
             ORDER BY attempt_number"
        );
        let rows = sqlx::query_as::<_, ResultRow>(&query)
            .bind(candidate_id)
            .bind(test_id)
            .fetch_all(&self.pool)
            .await?;
        rows_to_records(rows)
    }

    async fn list_by_application(&self, application_id: Uuid) -> Result<Vec<ResultRecord>> {
        let query = format!(
            "SELECT {COLUMNS} FROM assessment_results \
             WHERE application_id = $1 \
             ORDER BY started_at"
        );
        let rows = sqlx::query_as::<_, ResultRow>(&query)
            .bind(application_id)
            .fetch_all(&self.pool)
            .await?;
        rows_to_records(rows)
    }

    async fn list_by_test_ranked(&self, test_id: Uuid, limit: i64) -> Result<Vec<ResultRecord>> {
        let query = format!(
            "SELECT {COLUMNS} FROM assessment_results \
             WHERE test_id = $1 AND status = 'completed' \
             ORDER BY score DESC, ended_at \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, ResultRow>(&query)
            .bind(test_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows_to_records(rows)
    }

    async fn update_status_and_score(
        &self,
        id: Uuid,
        finalization: &Finalization,
    ) -> Result<ResultRecord> {
        let query = format!(
            "UPDATE assessment_results \
             SET status = $2, score = $3, percentage = $4, passed = $5, \
                 answers = COALESCE($6, answers), ended_at = $7, duration_seconds = $8 \
             WHERE id = $1 AND status = 'in_progress' \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ResultRow>(&query)
            .bind(id)
            .bind(finalization.status.as_str())
            .bind(finalization.score)
            .bind(finalization.percentage)
            .bind(finalization.passed)
            .bind(answers_json(&finalization.answers)?)
            .bind(finalization.ended_at)
            .bind(finalization.duration_seconds)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            // Either the record never existed or someone finalized it first.
            None => match self.get_by_id(id).await? {
                Some(_) => Err(Error::ConflictAlreadyFinalized),
                None => Err(Error::NotFound(format!("result {} not found", id))),
            },
        }
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        analysis: Option<JsonValue>,
        feedback: Option<String>,
    ) -> Result<ResultRecord> {
        let query = format!(
            "UPDATE assessment_results \
             SET analysis = COALESCE($2, analysis), feedback = COALESCE($3, feedback) \
             WHERE id = $1 AND status <> 'in_progress' \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ResultRow>(&query)
            .bind(id)
            .bind(analysis)
            .bind(feedback)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get_by_id(id).await? {
                Some(record) => Err(Error::InvalidState(record.status)),
                None => Err(Error::NotFound(format!("result {} not found", id))),
            },
        }
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE assessment_results \
             SET status = 'expired', ended_at = deadline, \
                 duration_seconds = EXTRACT(EPOCH FROM (deadline - started_at))::bigint \
             WHERE status = 'in_progress' AND deadline < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
