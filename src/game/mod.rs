pub mod album;
pub mod assigner;
pub mod lobby;
pub mod player;
pub mod reveal;
pub mod scheduler;

use std::time::Duration;

use crate::protocol::{PlayerId, ServerMessage};

pub use lobby::{Lobby, SessionSummary};

/// Side effect requested by the state machine, applied in order by the
/// session runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver to a single player.
    Send { to: PlayerId, message: ServerMessage },
    /// Deliver to every player, optionally skipping one (usually the sender).
    Broadcast {
        message: ServerMessage,
        except: Option<PlayerId>,
    },
    /// Replace the session's countdown; it reports back with `generation`.
    ArmTimer { generation: u64, after: Duration },
    CancelTimer,
}
