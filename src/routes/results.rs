use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::result_dto::{FeedbackRequest, ListResultsQuery, RankingQuery};
use crate::error::Error;
use crate::models::result_record::ResultRecord;
use crate::AppState;

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Path(result_id): Path<Uuid>,
) -> crate::error::Result<Json<ResultRecord>> {
    let record = state
        .repository
        .get_by_id(result_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("result {} not found", result_id)))?;
    Ok(Json(record))
}

#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Query(query): Query<ListResultsQuery>,
) -> crate::error::Result<Json<Vec<ResultRecord>>> {
    let records = state
        .repository
        .list_by_candidate_and_test(query.candidate_id, query.test_id)
        .await?;
    Ok(Json(records))
}

#[axum::debug_handler]
pub async fn list_results_for_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
) -> crate::error::Result<Json<Vec<ResultRecord>>> {
    let records = state.repository.list_by_application(application_id).await?;
    Ok(Json(records))
}

#[axum::debug_handler]
pub async fn list_test_ranking(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Query(query): Query<RankingQuery>,
) -> crate::error::Result<Json<Vec<ResultRecord>>> {
    let records = state
        .repository
        .list_by_test_ranked(test_id, query.limit.clamp(1, 100))
        .await?;
    Ok(Json(records))
}

#[axum::debug_handler]
pub async fn post_feedback(
    State(state): State<AppState>,
    Path(result_id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> crate::error::Result<Json<ResultRecord>> {
    req.validate()?;
    let record = state
        .session_service
        .record_feedback(result_id, req.feedback)
        .await?;
    Ok(Json(record))
}
