pub mod broadcast;
pub mod registry;
pub mod timer;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::config::SessionRules;
use crate::error::JoinError;
use crate::game::{Effect, Lobby, SessionSummary};
use crate::protocol::{ClientMessage, PlayerId, SessionCode, Visibility};

use broadcast::{Broadcaster, ConnectionTx};
use registry::SessionRegistry;
use timer::TimerSlot;

/// Everything that can happen to a session, in the order it is applied.
#[derive(Debug)]
pub enum SessionEvent {
    Join {
        player: PlayerId,
        username: String,
        connection: ConnectionTx,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    Leave {
        player: PlayerId,
    },
    Client {
        player: PlayerId,
        message: ClientMessage,
    },
    TimerFired {
        generation: u64,
    },
}

/// Cloneable address of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    code: SessionCode,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Ask the session to admit a new player whose outbound messages go to
    /// `connection`.
    pub async fn join(
        &self,
        player: PlayerId,
        username: String,
        connection: ConnectionTx,
    ) -> Result<(), JoinError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(SessionEvent::Join {
                player,
                username,
                connection,
                reply,
            })
            .map_err(|_| JoinError::SessionClosed)?;
        response.await.map_err(|_| JoinError::SessionClosed)?
    }

    pub fn leave(&self, player: PlayerId) {
        self.post(SessionEvent::Leave { player });
    }

    pub fn client(&self, player: PlayerId, message: ClientMessage) {
        self.post(SessionEvent::Client { player, message });
    }

    pub fn is_same(&self, other: &SessionHandle) -> bool {
        self.events.same_channel(&other.events)
    }

    fn post(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Session {} is gone, dropping event", self.code);
        }
    }
}

/// Start the task that owns a new, empty session.
///
/// The returned watch channel always holds the session's latest summary.
pub fn spawn(
    code: SessionCode,
    visibility: Visibility,
    rules: SessionRules,
    registry: Arc<SessionRegistry>,
) -> (SessionHandle, watch::Receiver<SessionSummary>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        code: code.clone(),
        events: events_tx,
    };
    let lobby = Lobby::new(code, visibility, rules.clone());
    let (summary_tx, summary_rx) = watch::channel(lobby.summary());

    let runtime = SessionRuntime {
        lobby,
        broadcaster: Broadcaster::new(handle.code.clone()),
        timer: TimerSlot::default(),
        handle: handle.clone(),
        summary: summary_tx,
    };
    tokio::spawn(runtime.run(events_rx, rules, registry));

    (handle, summary_rx)
}

struct SessionRuntime {
    lobby: Lobby,
    broadcaster: Broadcaster,
    timer: TimerSlot,
    handle: SessionHandle,
    summary: watch::Sender<SessionSummary>,
}

impl SessionRuntime {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        rules: SessionRules,
        registry: Arc<SessionRegistry>,
    ) {
        let code = self.handle.code.clone();
        loop {
            // A session nobody has joined yet is reaped after a while.
            let next = if self.lobby.is_empty() {
                match tokio::time::timeout(rules.idle_timeout, events.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        info!("Session {} was never joined, closing", code);
                        break;
                    }
                }
            } else {
                events.recv().await
            };
            let Some(event) = next else { break };

            let emptied = matches!(event, SessionEvent::Leave { .. });
            self.handle_event(event);
            self.apply_effects();
            self.summary.send_replace(self.lobby.summary());

            if emptied && self.lobby.is_empty() {
                info!("Session {} is empty, closing", code);
                break;
            }
        }

        self.timer.cancel();
        registry.destroy(&self.handle);
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Join {
                player,
                username,
                connection,
                reply,
            } => {
                self.broadcaster.attach(player, connection);
                let result = self.lobby.join(player, &username);
                if result.is_err() {
                    self.broadcaster.detach(player);
                }
                let _ = reply.send(result);
            }
            SessionEvent::Leave { player } => {
                self.broadcaster.detach(player);
                self.lobby.leave(player);
            }
            SessionEvent::Client { player, message } => {
                self.lobby.handle_client(player, message);
            }
            SessionEvent::TimerFired { generation } => {
                self.lobby.timer_fired(generation);
            }
        }
    }

    fn apply_effects(&mut self) {
        for effect in self.lobby.drain_effects() {
            match effect {
                Effect::Send { to, message } => self.broadcaster.send_to(to, message),
                Effect::Broadcast { message, except } => {
                    self.broadcaster.broadcast(message, except)
                }
                Effect::ArmTimer { generation, after } => {
                    self.timer
                        .arm(generation, after, self.handle.events.clone())
                }
                Effect::CancelTimer => self.timer.cancel(),
            }
        }
    }
}
