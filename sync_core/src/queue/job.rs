//! A job is just `entities::sync_queue::Model` plus the pure backoff/dedup
//! math (see DESIGN.md for the rationale behind the formula below).

use chrono::{DateTime, Utc};
use entities::sea_orm_active_enums::{JobAction, JobDirection};
use entities::sync_queue::Model;
use serde_json::Value;

pub const MAX_BACKOFF_SECONDS: i64 = 3600;

/// `min(attempts² · 60, 3600)` seconds. Engine-only, capped backoff — never
/// implemented inside the transport.
pub fn backoff_seconds(attempts: i32) -> i64 {
    let attempts = attempts.max(1) as i64;
    (attempts * attempts * 60).min(MAX_BACKOFF_SECONDS)
}

pub fn next_attempt_at(attempts: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    now + chrono::Duration::seconds(backoff_seconds(attempts))
}

#[derive(Clone, Debug)]
pub struct NewJob {
    pub tenant: String,
    pub module: String,
    pub entity_type: String,
    pub direction: JobDirection,
    pub action: JobAction,
    pub local_id: Option<i64>,
    pub remote_id: Option<i64>,
    pub payload: Value,
    pub priority: i16,
    pub max_attempts: i32,
}

pub struct Job(pub Model);

impl Job {
    pub fn payload(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.0.payload)
    }

    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn attempts(&self) -> i32 {
        self.0.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.0.attempts >= self.0.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_quadratically_then_caps() {
        assert_eq!(backoff_seconds(1), 60);
        assert_eq!(backoff_seconds(2), 240);
        assert_eq!(backoff_seconds(5), 1500);
        assert_eq!(backoff_seconds(8), 3600); // 8*8*60 = 3840, capped
        assert_eq!(backoff_seconds(100), 3600);
    }

    #[test]
    fn backoff_floors_non_positive_attempts_to_one() {
        assert_eq!(backoff_seconds(0), 60);
        assert_eq!(backoff_seconds(-3), 60);
    }
}
