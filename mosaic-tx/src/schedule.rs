//! Repeat sending on a timer, optionally in active/sleep cycles.

use std::time::Duration;

/// Where a [`DutyCycle`] is at some moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Send now; the active window ends in `remaining`.
    Active { remaining: Option<Duration> },
    /// Nothing to send until `remaining` has passed.
    Sleeping { remaining: Duration },
}

/// Send every `interval`; with `active` set, alternate `active` of sending
/// with `sleep` of silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    pub interval: Duration,
    pub active: Option<Duration>,
    pub sleep: Duration,
}

impl DutyCycle {
    pub fn phase_at(&self, elapsed: Duration) -> Phase {
        let Some(active) = self.active.filter(|a| !a.is_zero()) else {
            return Phase::Active { remaining: None };
        };
        let period = active + self.sleep;
        let offset = Duration::from_nanos((elapsed.as_nanos() % period.as_nanos()) as u64);
        if offset < active {
            Phase::Active {
                remaining: Some(active - offset),
            }
        } else {
            Phase::Sleeping {
                remaining: period - offset,
            }
        }
    }

    /// How long to wait after handling `phase`.
    pub fn pause_after(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Active { remaining: None } => self.interval,
            Phase::Active {
                remaining: Some(left),
            } => self.interval.min(left),
            Phase::Sleeping { remaining } => remaining,
        }
    }
}
