use std::time::{SystemTime, UNIX_EPOCH};

use crate::time::domain::Timestamp;

/// Clock abstraction so processing-time timer targets can be pinned in
/// tests instead of sampling the wall clock.
pub trait ProcessingClock: Send {
    fn now(&mut self) -> Timestamp;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        SystemClock
    }
}

impl ProcessingClock for SystemClock {
    fn now(&mut self) -> Timestamp {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp::from_millis(elapsed.as_millis().min(i64::MAX as u128) as i64)
    }
}
