//! Clock abstraction.
//!
//! Expiry of authorization requests is measured against a [`Clock`] so that
//! tests can move time forward without sleeping.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;

pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> OffsetDateTime;
}

/// Shareable clock handle.
pub type DynClock = Arc<dyn Clock>;

/// Wall clock in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut now = self.now.write();
        *now += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        *self.now.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.read()
    }
}

pub fn system_clock() -> DynClock {
    Arc::new(SystemClock)
}
