use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Time source injected into the session engine so deadline and expiry
/// logic is testable without real delays.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and local harnesses.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().expect("manual clock mutex poisoned");
        *guard += delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.lock().expect("manual clock mutex poisoned");
        *guard = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("manual clock mutex poisoned")
    }
}
