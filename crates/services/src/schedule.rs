//! Quarter-hour scheduling guard.
//!
//! Driven by event arrival, not by a timer: a boundary minute (0/15/30/45)
//! fires on the first check that lands in it. Any check outside a boundary
//! re-arms the guard. A race between two checks costs at most a duplicate
//! or missed firing.

use std::sync::atomic::{AtomicI32, Ordering};

use chrono::{Timelike, Utc};

const UNARMED: i32 = -1;

#[derive(Debug)]
pub struct QuarterHourGuard {
    last_fired_minute: AtomicI32,
}

impl Default for QuarterHourGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl QuarterHourGuard {
    pub fn new() -> Self {
        Self {
            last_fired_minute: AtomicI32::new(UNARMED),
        }
    }

    /// Checks against the current wall-clock minute.
    pub fn check_and_fire(&self) -> bool {
        self.check_and_fire_at(Utc::now().minute())
    }

    pub fn check_and_fire_at(&self, minute: u32) -> bool {
        let minute = (minute % 60) as i32;
        if minute % 15 != 0 {
            self.last_fired_minute.store(UNARMED, Ordering::SeqCst);
            return false;
        }
        self.last_fired_minute.swap(minute, Ordering::SeqCst) != minute
    }
}
