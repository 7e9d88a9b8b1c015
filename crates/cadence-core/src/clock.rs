//! Reference clock injected into the engine.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};

/// Source of "now" for every time-relative rule.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    #[must_use]
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(instant)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut guard = self.lock();
        *guard += by;
    }

    /// Locks the instant and recovers from poisoning.
    fn lock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.instant.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                self.instant.clear_poison();
                poisoned.into_inner()
            }
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
