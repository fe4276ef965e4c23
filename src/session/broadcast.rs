use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::protocol::{PlayerId, ServerMessage, SessionCode};

/// Outbound queue depth per connection. A client that falls this far
/// behind starts losing messages rather than stalling the session.
pub const CONNECTION_BUFFER: usize = 256;

/// Sender half feeding a connection's write task.
pub type ConnectionTx = mpsc::Sender<Arc<ServerMessage>>;

/// Connection handles of one session, keyed by player id.
pub struct Broadcaster {
    code: SessionCode,
    connections: HashMap<PlayerId, ConnectionTx>,
}

impl Broadcaster {
    pub fn new(code: SessionCode) -> Self {
        Self {
            code,
            connections: HashMap::new(),
        }
    }

    pub fn attach(&mut self, player: PlayerId, tx: ConnectionTx) {
        self.connections.insert(player, tx);
        debug!("Player {} attached to {} ({} connections)", player, self.code, self.len());
    }

    /// Drop a connection handle. Once the last sender is gone the write
    /// task closes the socket.
    pub fn detach(&mut self, player: PlayerId) -> Option<ConnectionTx> {
        self.connections.remove(&player)
    }

    pub fn send_to(&self, player: PlayerId, message: ServerMessage) {
        match self.connections.get(&player) {
            Some(tx) => self.deliver(player, tx, Arc::new(message)),
            None => debug!("No connection for player {} in {}", player, self.code),
        }
    }

    /// Fan out to every open connection, optionally skipping one.
    pub fn broadcast(&self, message: ServerMessage, except: Option<PlayerId>) {
        let message = Arc::new(message);
        for (&player, tx) in &self.connections {
            if Some(player) != except {
                self.deliver(player, tx, Arc::clone(&message));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    fn deliver(&self, player: PlayerId, tx: &ConnectionTx, message: Arc<ServerMessage>) {
        match tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Dropping message for slow player {} in {}", player, self.code);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection of player {} in {} already closed", player, self.code);
            }
        }
    }
}
