use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::Effect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPurpose {
    /// Force-complete the running prompt/drawing/describing round.
    Round,
    /// Advance the reveal to its next step.
    Reveal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed {
    generation: u64,
    purpose: TimerPurpose,
    deadline_ms: u64,
}

/// Bookkeeping for a session's single countdown.
///
/// The actual sleeping happens in the session runtime. Each arm bumps the
/// generation, and a firing is honoured only if it carries the generation
/// that is still armed, so a firing that was already queued when its timer
/// got replaced or cancelled is a no-op.
#[derive(Debug, Default)]
pub struct RoundScheduler {
    generation: u64,
    armed: Option<Armed>,
}

impl RoundScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fresh countdown, superseding any pending one.
    pub fn arm(&mut self, purpose: TimerPurpose, after: Duration) -> Effect {
        self.generation += 1;
        self.armed = Some(Armed {
            generation: self.generation,
            purpose,
            deadline_ms: epoch_millis().saturating_add(after.as_millis() as u64),
        });
        Effect::ArmTimer {
            generation: self.generation,
            after,
        }
    }

    /// Cancel the pending countdown. Cancelling twice is harmless.
    pub fn cancel(&mut self) -> Option<Effect> {
        self.armed.take().map(|_| Effect::CancelTimer)
    }

    /// Consume a firing. Returns what the timer was armed for, or `None`
    /// for a stale or repeated firing.
    pub fn fire(&mut self, generation: u64) -> Option<TimerPurpose> {
        match self.armed {
            Some(armed) if armed.generation == generation => {
                self.armed = None;
                Some(armed.purpose)
            }
            _ => None,
        }
    }

    /// Deadline of the armed countdown in Unix epoch milliseconds.
    pub fn deadline(&self) -> Option<u64> {
        self.armed.map(|a| a.deadline_ms)
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
