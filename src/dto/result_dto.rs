use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

fn default_ranking_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct ListResultsQuery {
    pub candidate_id: Uuid,
    pub test_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    #[serde(default = "default_ranking_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(length(min = 1, max = 4000))]
    pub feedback: String,
}
