use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::error::Error;

const WINDOW: Duration = Duration::from_secs(1);
// Stale windows are pruned once the map grows past this.
const PRUNE_THRESHOLD: usize = 1024;

/// Bucket for one window: either the shared start bucket or one session.
/// Submit storms against one session cannot starve starts, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RateKey {
    Start,
    Session(Uuid),
}

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

/// Fixed-window limiter over the session endpoints, one window per bucket.
#[derive(Clone)]
pub struct SessionRateLimiter {
    rps: u32,
    windows: Arc<Mutex<HashMap<RateKey, WindowState>>>,
}

impl SessionRateLimiter {
    pub fn new(rps: u32) -> Self {
        Self {
            rps: rps.max(1),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn allow(&self, key: RateKey) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.start) < WINDOW);
        }

        let window = windows.entry(key).or_insert(WindowState {
            start: now,
            count: 0,
        });
        if now.duration_since(window.start) >= WINDOW {
            window.start = now;
            window.count = 0;
        }
        if window.count < self.rps {
            window.count += 1;
            true
        } else {
            false
        }
    }
}

/// Session paths carry the session id as a path segment; start requests
/// name no session and share one bucket.
fn key_for(path: &str) -> RateKey {
    path.split('/')
        .find_map(|segment| segment.parse::<Uuid>().ok())
        .map_or(RateKey::Start, RateKey::Session)
}

pub async fn session_rate_limit(
    State(limiter): State<SessionRateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.allow(key_for(req.uri().path())) {
        return Error::RateLimited.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rejects_once_the_budget_is_spent() {
        let limiter = SessionRateLimiter::new(3);
        let key = RateKey::Session(Uuid::new_v4());
        for _ in 0..3 {
            assert!(limiter.allow(key));
        }
        assert!(!limiter.allow(key));
    }

    #[test]
    fn buckets_are_independent() {
        let limiter = SessionRateLimiter::new(1);
        let first = RateKey::Session(Uuid::new_v4());
        assert!(limiter.allow(first));
        assert!(!limiter.allow(first));

        // Exhausting one session leaves other sessions and starts alone.
        assert!(limiter.allow(RateKey::Session(Uuid::new_v4())));
        assert!(limiter.allow(RateKey::Start));
    }

    #[test]
    fn session_paths_key_on_the_session_id() {
        let session_id = Uuid::new_v4();
        assert_eq!(
            key_for(&format!("/api/sessions/{session_id}/submit")),
            RateKey::Session(session_id)
        );
        assert_eq!(
            key_for(&format!("/api/sessions/{session_id}")),
            RateKey::Session(session_id)
        );
        assert_eq!(key_for("/api/sessions"), RateKey::Start);
    }

    #[test]
    fn zero_rps_is_clamped_to_one() {
        let limiter = SessionRateLimiter::new(0);
        assert!(limiter.allow(RateKey::Start));
        assert!(!limiter.allow(RateKey::Start));
    }
}
