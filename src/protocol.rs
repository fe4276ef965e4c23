use serde::{Deserialize, Serialize};

// ── Core type aliases ──────────────────────────────────────────────

pub type PlayerId = u64;
pub type SessionCode = String;

// ── Session-level enums ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// Parses the `visibility` query value used by the discovery API.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Game phase. Moves forward only, except the reset back to `Lobby`
/// once the reveal has been played out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Prompting,
    Drawing,
    Describing,
    Reveal,
}

impl Phase {
    /// Phases during which every player holds exactly one outstanding task.
    pub fn is_round(self) -> bool {
        matches!(self, Phase::Prompting | Phase::Drawing | Phase::Describing)
    }
}

// ── Drawing data ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StrokeCommand {
    Begin {
        x: f32,
        y: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f32>,
    },
    LineTo {
        x: f32,
        y: f32,
    },
}

// ── Albums ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Prompt,
    Drawing,
}

/// Content of one album step: text for prompts and descriptions,
/// stroke commands for drawings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepContent {
    Text(String),
    Drawing(Vec<StrokeCommand>),
}

impl StepContent {
    pub fn kind(&self) -> StepKind {
        match self {
            StepContent::Text(_) => StepKind::Prompt,
            StepContent::Drawing(_) => StepKind::Drawing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub kind: StepKind,
    pub author_id: PlayerId,
    pub author: String,
    pub content: StepContent,
    /// Set when the content is a placeholder produced by the round timer
    /// (or by the author having left) rather than a real submission.
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub author_id: PlayerId,
    pub author_name: String,
    pub steps: Vec<Step>,
}

// ── Roster ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Prompt,
    Draw,
    Describe,
}

/// Fields of a live stroke preview message other than its `type`.
pub type StrokePreview = serde_json::Map<String, serde_json::Value>;

// ── Client → Server messages ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        username: String,
    },
    StartGame {},
    SubmitPrompt {
        text: String,
    },
    SubmitDrawing {
        stroke_commands: Vec<StrokeCommand>,
    },
    SubmitDescription {
        text: String,
    },
    NextRevealStep {},

    // Live stroke preview, relayed to the other players while drawing.
    // The payload is freeform and passed through untouched.
    BeginStroke {
        #[serde(flatten)]
        stroke: StrokePreview,
    },
    StrokeSegment {
        #[serde(flatten)]
        stroke: StrokePreview,
    },
}

// ── Server → Client messages ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    InitialState {
        self_id: PlayerId,
        host_id: PlayerId,
        roster: Vec<RosterEntry>,
    },
    PlayerJoined {
        id: PlayerId,
        username: String,
    },
    PlayerLeft {
        id: PlayerId,
        new_host_id: Option<PlayerId>,
    },
    GameStarted {},
    PromptAccepted {},
    PlayerSubmitted {
        id: PlayerId,
    },
    NewTask {
        task_kind: TaskKind,
        content: Option<StepContent>,
        /// Unix epoch milliseconds at which the round is force-completed.
        round_deadline: u64,
    },
    RevealAll {
        albums: Vec<Album>,
    },
    UpdateRevealStep {
        album_index: usize,
        step_index: usize,
    },
    GameOver {},
    BeginStroke {
        player_id: PlayerId,
        #[serde(flatten)]
        stroke: StrokePreview,
    },
    StrokeSegment {
        player_id: PlayerId,
        #[serde(flatten)]
        stroke: StrokePreview,
    },
    Error {
        reason: String,
    },
}
