use crate::protocol::{PlayerId, RosterEntry, StepContent};

/// Gameplay-side view of a connected player. The connection handle lives
/// in the session runtime, keyed by the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Whether the current round's task has been handed in.
    pub done: bool,
    /// Content handed in this round, committed to an album when the round ends.
    pub staged: Option<Staged>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Staged {
    pub content: StepContent,
    pub timed_out: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            done: false,
            staged: None,
        }
    }

    /// Stage this round's submission. Returns false, leaving the earlier
    /// submission in place, if the player already finished the round.
    pub fn stage(&mut self, content: StepContent, timed_out: bool) -> bool {
        if self.done {
            return false;
        }
        self.staged = Some(Staged { content, timed_out });
        self.done = true;
        true
    }

    pub fn reset_round(&mut self) {
        self.done = false;
        self.staged = None;
    }

    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            id: self.id,
            username: self.name.clone(),
        }
    }
}
