use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::protocol::{Phase, StepKind};

/// How long each phase of a game may run before the server steps in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub prompt: Duration,
    pub drawing: Duration,
    pub describing: Duration,
    pub reveal_prompt: Duration,
    pub reveal_drawing: Duration,
}

impl Timings {
    /// Round length for a task phase. `None` for phases without a round timer.
    pub fn round(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Prompting => Some(self.prompt),
            Phase::Drawing => Some(self.drawing),
            Phase::Describing => Some(self.describing),
            Phase::Lobby | Phase::Reveal => None,
        }
    }

    /// How long a reveal step stays on screen before auto-advancing.
    pub fn reveal(&self, kind: StepKind) -> Duration {
        match kind {
            StepKind::Prompt => self.reveal_prompt,
            StepKind::Drawing => self.reveal_drawing,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            prompt: Duration::from_secs(60),
            drawing: Duration::from_secs(90),
            describing: Duration::from_secs(45),
            reveal_prompt: Duration::from_secs(4),
            reveal_drawing: Duration::from_secs(8),
        }
    }
}

/// Rules applied to every session the registry creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRules {
    pub timings: Timings,
    pub min_players: usize,
    pub max_username_len: usize,
    /// A session nobody joins is torn down after this long.
    pub idle_timeout: Duration,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            timings: Timings::default(),
            min_players: 2,
            max_username_len: 24,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub ws_addr: String,
    pub http_addr: String,
    pub rules: SessionRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_addr: "127.0.0.1:9001".to_string(),
            http_addr: "127.0.0.1:9002".to_string(),
            rules: SessionRules::default(),
        }
    }
}

impl ServerConfig {
    /// Build the configuration from `RELAY_*` environment variables,
    /// falling back to defaults for anything missing or malformed.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ServerConfig::default();
        let t = defaults.rules.timings;

        let secs = |key: &str, fallback: Duration| {
            parsed::<u64>(&lookup, key)
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let timings = Timings {
            prompt: secs("RELAY_PROMPT_SECS", t.prompt),
            drawing: secs("RELAY_DRAWING_SECS", t.drawing),
            describing: secs("RELAY_DESCRIBE_SECS", t.describing),
            reveal_prompt: secs("RELAY_REVEAL_PROMPT_SECS", t.reveal_prompt),
            reveal_drawing: secs("RELAY_REVEAL_DRAWING_SECS", t.reveal_drawing),
        };

        let min_players = parsed::<usize>(&lookup, "RELAY_MIN_PLAYERS")
            .unwrap_or(defaults.rules.min_players)
            .max(2);

        Self {
            ws_addr: lookup("RELAY_WS_ADDR")
                .filter(|a| !a.is_empty())
                .unwrap_or(defaults.ws_addr),
            http_addr: lookup("RELAY_HTTP_ADDR")
                .filter(|a| !a.is_empty())
                .unwrap_or(defaults.http_addr),
            rules: SessionRules {
                timings,
                min_players,
                max_username_len: parsed::<usize>(&lookup, "RELAY_MAX_USERNAME_LEN")
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.rules.max_username_len),
                idle_timeout: secs("RELAY_IDLE_SESSION_SECS", defaults.rules.idle_timeout),
            },
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring malformed {}={:?}, using default", key, raw);
            None
        }
    }
}
