use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::config::SessionRules;
use crate::game::SessionSummary;
use crate::protocol::{Phase, PlayerId, SessionCode, Visibility};

use super::SessionHandle;

/// Unambiguous uppercase letters (no I or O).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const CODE_LEN: usize = 5;

/// One row of the public lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSession {
    pub code: SessionCode,
    pub player_count: usize,
}

struct SessionEntry {
    handle: SessionHandle,
    summary: watch::Receiver<SessionSummary>,
}

/// All live sessions, keyed by code.
///
/// Each entry is written only by `create` and by its own session task on
/// shutdown; everything else reads.
pub struct SessionRegistry {
    sessions: DashMap<SessionCode, SessionEntry>,
    next_player_id: AtomicU64,
    rules: SessionRules,
}

impl SessionRegistry {
    pub fn new(rules: SessionRules) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            next_player_id: AtomicU64::new(1),
            rules,
        })
    }

    /// Create and start an empty session, returning its fresh code.
    pub fn create(self: &Arc<Self>, visibility: Visibility) -> SessionCode {
        loop {
            let code = generate_code();
            if let Entry::Vacant(slot) = self.sessions.entry(code.clone()) {
                let (handle, summary) = super::spawn(
                    code.clone(),
                    visibility,
                    self.rules.clone(),
                    Arc::clone(self),
                );
                slot.insert(SessionEntry { handle, summary });
                info!("Session {} created ({:?})", code, visibility);
                return code;
            }
        }
    }

    pub fn lookup(&self, code: &str) -> Option<SessionHandle> {
        self.sessions
            .get(&normalize(code))
            .map(|entry| entry.handle.clone())
    }

    pub fn exists(&self, code: &str) -> bool {
        self.summary(code).is_some()
    }

    pub fn summary(&self, code: &str) -> Option<SessionSummary> {
        self.sessions
            .get(&normalize(code))
            .map(|entry| *entry.summary.borrow())
    }

    /// Public sessions still waiting in their lobby, sorted by code.
    pub fn list_open(&self) -> Vec<OpenSession> {
        let mut open: Vec<OpenSession> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                let summary = *entry.summary.borrow();
                (summary.visibility == Visibility::Public && summary.phase == Phase::Lobby).then(
                    || OpenSession {
                        code: entry.key().clone(),
                        player_count: summary.player_count,
                    },
                )
            })
            .collect();
        open.sort_by(|a, b| a.code.cmp(&b.code));
        open
    }

    /// Remove a session. Only the instance behind `handle` is removed, so a
    /// late call can never evict a newer session that reused the code.
    pub fn destroy(&self, handle: &SessionHandle) {
        let removed = self
            .sessions
            .remove_if(handle.code(), |_, entry| entry.handle.is_same(handle));
        if removed.is_some() {
            info!("Session {} destroyed", handle.code());
        }
    }

    /// Ids are handed out per connection and never reused.
    pub fn next_player_id(&self) -> PlayerId {
        self.next_player_id.fetch_add(1, Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

fn generate_code() -> SessionCode {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn normalize(code: &str) -> SessionCode {
    code.trim().to_ascii_uppercase()
}
