use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::answer::QuestionId;

/// Expected answer and weight for one question. Weights across the key sum
/// to the test's max score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    pub expected: JsonValue,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(pub BTreeMap<QuestionId, KeyEntry>);

impl AnswerKey {
    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &KeyEntry)> {
        self.0.iter()
    }

    pub fn weight_sum(&self) -> f64 {
        self.0.values().map(|e| e.weight).sum()
    }
}

/// Per-test configuration supplied by the external test-definition provider.
/// `max_attempts` unset means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    pub test_id: Uuid,
    pub max_score: f64,
    pub time_limit_seconds: i64,
    pub passing_threshold: f64,
    pub max_attempts: Option<u32>,
    pub answer_key: AnswerKey,
}

impl TestDefinition {
    pub fn deadline_for(&self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        started_at + Duration::seconds(self.time_limit_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn weight_sum_totals_every_entry() {
        let key = AnswerKey(BTreeMap::from([
            (
                QuestionId::from("q1"),
                KeyEntry {
                    expected: json!(1),
                    weight: 4.0,
                },
            ),
            (
                QuestionId::from("q2"),
                KeyEntry {
                    expected: json!(2),
                    weight: 6.0,
                },
            ),
        ]));
        assert_eq!(key.weight_sum(), 10.0);
        assert_eq!(AnswerKey::default().weight_sum(), 0.0);
    }

    #[test]
    fn deadline_is_start_plus_time_limit() {
        let test = TestDefinition {
            test_id: Uuid::new_v4(),
            max_score: 10.0,
            time_limit_seconds: 90,
            passing_threshold: 60.0,
            max_attempts: None,
            answer_key: AnswerKey::default(),
        };
        let started = Utc::now();
        assert_eq!(test.deadline_for(started), started + Duration::seconds(90));
    }
}
