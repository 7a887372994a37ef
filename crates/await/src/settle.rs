//! Settle window scheduling.
//!
//! The control plane never says "endpoints finished populating", so the
//! awaiter waits for a quiet period after the last Endpoints change.

use std::{future, pin::Pin, time::Duration};

use tokio::time::{Instant, Sleep};

/// Something the Endpoints classifier can (re)arm after each change.
pub trait SettleSchedule {
    fn schedule(&mut self);
}

/// Single reschedulable timer owned by one awaiter. Each `schedule` pushes the
/// deadline out to `now + delay`; an unarmed timer never fires.
pub struct SettleTimer {
    delay: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl SettleTimer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, sleep: Box::pin(tokio::time::sleep(delay)), armed: false }
    }

    pub fn is_armed(&self) -> bool { self.armed }

    /// Resolves once the armed deadline passes. Cancel-safe: dropping the
    /// future leaves the timer armed.
    pub async fn fired(&mut self) {
        if !self.armed {
            return future::pending().await;
        }
        self.sleep.as_mut().await;
        self.armed = false;
    }
}

impl SettleSchedule for SettleTimer {
    fn schedule(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.delay);
        self.armed = true;
    }
}

/// Snapshot reads treat the window as already elapsed.
pub struct Immediate;

impl SettleSchedule for Immediate {
    fn schedule(&mut self) {}
}
