use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::config::SessionRules;
use crate::error::JoinError;
use crate::protocol::{
    Album, ClientMessage, Phase, PlayerId, ServerMessage, SessionCode, Step, StepContent,
    StepKind, TaskKind, Visibility,
};

use super::album::placeholder_content;
use super::assigner;
use super::player::Player;
use super::reveal::RevealCursor;
use super::scheduler::{RoundScheduler, TimerPurpose};
use super::Effect;

/// A place in the turn order. Seats outlive their players: when someone
/// leaves mid-game their seat stays, and the rest of their tasks are
/// filled with placeholders so every album still completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub player: PlayerId,
    pub name: String,
    pub present: bool,
}

/// What the registry needs to list a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub visibility: Visibility,
    pub phase: Phase,
    pub player_count: usize,
}

/// Per-session game state machine.
///
/// Transport-free and synchronous: every operation records [`Effect`]s,
/// which the owning runtime drains and applies in order.
pub struct Lobby {
    code: SessionCode,
    visibility: Visibility,
    rules: SessionRules,
    phase: Phase,
    /// Join order.
    roster: Vec<Player>,
    host: Option<PlayerId>,
    /// Turn order, fixed when the game starts. Album `i` belongs to seat `i`.
    seats: Vec<Seat>,
    albums: Vec<Album>,
    /// Drawing/describing round, 1-indexed. Zero while prompting.
    round: usize,
    scheduler: RoundScheduler,
    reveal: RevealCursor,
    effects: Vec<Effect>,
}

impl Lobby {
    pub fn new(code: SessionCode, visibility: Visibility, rules: SessionRules) -> Self {
        Self {
            code,
            visibility,
            rules,
            phase: Phase::Lobby,
            roster: Vec::new(),
            host: None,
            seats: Vec::new(),
            albums: Vec::new(),
            round: 0,
            scheduler: RoundScheduler::new(),
            reveal: RevealCursor::new(),
            effects: Vec::new(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            visibility: self.visibility,
            phase: self.phase,
            player_count: self.roster.len(),
        }
    }

    /// Take the effects recorded since the last call.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // ── Membership ───────────────────────────────────────────────────

    pub fn join(&mut self, id: PlayerId, username: &str) -> Result<(), JoinError> {
        if self.phase != Phase::Lobby {
            return Err(JoinError::GameInProgress);
        }
        let name = username.trim();
        let max = self.rules.max_username_len;
        if name.is_empty() || name.chars().count() > max {
            return Err(JoinError::InvalidUsername { max });
        }

        self.roster.push(Player::new(id, name.to_string()));
        let host_id = *self.host.get_or_insert(id);

        self.send(
            id,
            ServerMessage::InitialState {
                self_id: id,
                host_id,
                roster: self.roster.iter().map(Player::roster_entry).collect(),
            },
        );
        self.broadcast(
            ServerMessage::PlayerJoined {
                id,
                username: name.to_string(),
            },
            Some(id),
        );
        info!(
            "Player {} ({}) joined session {} ({} players)",
            id,
            name,
            self.code,
            self.roster.len()
        );
        Ok(())
    }

    pub fn leave(&mut self, id: PlayerId) {
        let Some(idx) = self.roster.iter().position(|p| p.id == id) else {
            return;
        };
        self.roster.remove(idx);
        if let Some(seat) = self.seats.iter_mut().find(|s| s.player == id) {
            seat.present = false;
        }
        if self.host == Some(id) {
            self.host = self.roster.first().map(|p| p.id);
        }
        info!(
            "Player {} left session {} ({} remaining, host {:?})",
            id,
            self.code,
            self.roster.len(),
            self.host
        );

        if self.roster.is_empty() {
            self.cancel_timer();
            return;
        }

        self.broadcast(
            ServerMessage::PlayerLeft {
                id,
                new_host_id: self.host,
            },
            None,
        );
        self.check_round_complete();
    }

    // ── Inbound messages ─────────────────────────────────────────────

    /// Apply a message from a member. Messages that don't fit the current
    /// phase, or that come from someone without the right to send them,
    /// are ignored.
    pub fn handle_client(&mut self, from: PlayerId, message: ClientMessage) {
        if !self.roster.iter().any(|p| p.id == from) {
            return;
        }
        match (self.phase, message) {
            (Phase::Lobby, ClientMessage::StartGame {}) => {
                if self.host != Some(from) {
                    debug!("Ignoring start_game from non-host {} in {}", from, self.code);
                } else if self.roster.len() < self.rules.min_players {
                    debug!(
                        "Ignoring start_game in {}: {} of {} players",
                        self.code,
                        self.roster.len(),
                        self.rules.min_players
                    );
                } else {
                    self.start_game();
                }
            }
            (Phase::Prompting, ClientMessage::SubmitPrompt { text }) => {
                self.submit(from, StepContent::Text(text), Some(ServerMessage::PromptAccepted {}));
            }
            (Phase::Drawing, ClientMessage::SubmitDrawing { stroke_commands }) => {
                self.submit(from, StepContent::Drawing(stroke_commands), None);
            }
            (Phase::Describing, ClientMessage::SubmitDescription { text }) => {
                self.submit(from, StepContent::Text(text), None);
            }
            (Phase::Reveal, ClientMessage::NextRevealStep {}) => {
                if self.host == Some(from) {
                    self.advance_reveal();
                } else {
                    debug!("Ignoring next_reveal_step from non-host {} in {}", from, self.code);
                }
            }
            (Phase::Drawing, ClientMessage::BeginStroke { mut stroke }) => {
                stroke.remove("playerId");
                self.broadcast(
                    ServerMessage::BeginStroke {
                        player_id: from,
                        stroke,
                    },
                    Some(from),
                );
            }
            (Phase::Drawing, ClientMessage::StrokeSegment { mut stroke }) => {
                stroke.remove("playerId");
                self.broadcast(
                    ServerMessage::StrokeSegment {
                        player_id: from,
                        stroke,
                    },
                    Some(from),
                );
            }
            (phase, message) => {
                debug!("Ignoring {:?} from {} during {:?}", message, from, phase);
            }
        }
    }

    /// A countdown armed by this lobby elapsed.
    pub fn timer_fired(&mut self, generation: u64) {
        match self.scheduler.fire(generation) {
            Some(TimerPurpose::Round) if self.phase.is_round() => self.force_complete_round(),
            Some(TimerPurpose::Reveal) if self.phase == Phase::Reveal => self.advance_reveal(),
            Some(purpose) => {
                debug!("Timer {:?} fired outside its phase in {}", purpose, self.code);
            }
            None => debug!("Stale timer {} in {}", generation, self.code),
        }
    }

    // ── Rounds ───────────────────────────────────────────────────────

    fn start_game(&mut self) {
        let mut seats: Vec<Seat> = self
            .roster
            .iter()
            .map(|p| Seat {
                player: p.id,
                name: p.name.clone(),
                present: true,
            })
            .collect();
        seats.shuffle(&mut rand::thread_rng());
        self.seats = seats;
        self.albums.clear();
        self.round = 0;

        info!("Session {} started with {} players", self.code, self.seats.len());
        self.broadcast(ServerMessage::GameStarted {}, None);
        self.begin_round(Phase::Prompting);
    }

    fn begin_round(&mut self, phase: Phase) {
        self.phase = phase;
        for player in &mut self.roster {
            player.reset_round();
        }
        if let Some(after) = self.rules.timings.round(phase) {
            let effect = self.scheduler.arm(TimerPurpose::Round, after);
            self.effects.push(effect);
        }
        let deadline = self.scheduler.deadline().unwrap_or_default();
        debug!("Session {} entered {:?} (round {})", self.code, phase, self.round);

        let n = self.seats.len();
        let tasks: Vec<(PlayerId, ServerMessage)> = self
            .seats
            .iter()
            .enumerate()
            .filter(|(_, seat)| seat.present)
            .map(|(idx, seat)| {
                let (task_kind, content) = match phase {
                    Phase::Prompting => (TaskKind::Prompt, None),
                    _ => {
                        let album = &self.albums[assigner::assignment(idx, self.round, n)];
                        let kind = if phase == Phase::Drawing {
                            TaskKind::Draw
                        } else {
                            TaskKind::Describe
                        };
                        (kind, album.last().map(|s| s.content.clone()))
                    }
                };
                (
                    seat.player,
                    ServerMessage::NewTask {
                        task_kind,
                        content,
                        round_deadline: deadline,
                    },
                )
            })
            .collect();
        for (to, message) in tasks {
            self.send(to, message);
        }
    }

    fn submit(&mut self, from: PlayerId, content: StepContent, ack: Option<ServerMessage>) {
        let Some(player) = self.roster.iter_mut().find(|p| p.id == from) else {
            return;
        };
        if !player.stage(content, false) {
            debug!("Duplicate submission from {} in {}", from, self.code);
            return;
        }
        if let Some(ack) = ack {
            self.send(from, ack);
        }
        self.broadcast(ServerMessage::PlayerSubmitted { id: from }, Some(from));
        self.check_round_complete();
    }

    fn check_round_complete(&mut self) {
        if self.phase.is_round()
            && !self.roster.is_empty()
            && self.roster.iter().all(|p| p.done)
        {
            self.complete_round();
        }
    }

    fn force_complete_round(&mut self) {
        let kind = round_step_kind(self.phase);
        let mut forced = 0;
        for player in self.roster.iter_mut().filter(|p| !p.done) {
            player.stage(placeholder_content(kind), true);
            forced += 1;
        }
        info!(
            "Round timer expired in {} during {:?}; {} placeholder submissions",
            self.code, self.phase, forced
        );
        self.complete_round();
    }

    fn complete_round(&mut self) {
        self.cancel_timer();
        let kind = round_step_kind(self.phase);
        let steps: Vec<Step> = self.seats.iter().map(|seat| self.step_for(seat, kind)).collect();

        match self.phase {
            Phase::Prompting => {
                self.albums = steps.into_iter().map(Album::seeded).collect();
                self.round = 1;
                self.begin_round(Phase::Drawing);
            }
            Phase::Drawing | Phase::Describing => {
                let n = self.seats.len();
                let targets = assigner::assignments(n, self.round);
                for (step, album) in steps.into_iter().zip(targets) {
                    self.albums[album].push(step);
                }
                if self.round >= assigner::total_rounds(n) {
                    self.enter_reveal();
                } else {
                    let next = if self.phase == Phase::Drawing {
                        Phase::Describing
                    } else {
                        Phase::Drawing
                    };
                    self.round += 1;
                    self.begin_round(next);
                }
            }
            Phase::Lobby | Phase::Reveal => {}
        }
    }

    /// The step a seat contributes this round: its staged submission, or a
    /// placeholder for a seat whose player has left.
    fn step_for(&self, seat: &Seat, kind: StepKind) -> Step {
        let staged = self
            .roster
            .iter()
            .find(|p| p.id == seat.player)
            .and_then(|p| p.staged.as_ref());
        match staged {
            Some(staged) => Step::new(seat.player, &seat.name, staged.content.clone(), staged.timed_out),
            None => Step::placeholder(seat.player, &seat.name, kind),
        }
    }

    // ── Reveal ───────────────────────────────────────────────────────

    fn enter_reveal(&mut self) {
        self.phase = Phase::Reveal;
        for player in &mut self.roster {
            player.reset_round();
        }
        self.reveal = RevealCursor::new();
        info!("Session {} revealing {} albums", self.code, self.albums.len());

        self.broadcast(
            ServerMessage::RevealAll {
                albums: self.albums.clone(),
            },
            None,
        );
        self.show_reveal_step();
    }

    fn advance_reveal(&mut self) {
        if self.reveal.advance(&self.albums) {
            self.show_reveal_step();
        } else {
            self.finish_game();
        }
    }

    fn show_reveal_step(&mut self) {
        let (album_index, step_index) = self.reveal.position();
        self.broadcast(
            ServerMessage::UpdateRevealStep {
                album_index,
                step_index,
            },
            None,
        );
        let kind = self
            .reveal
            .current_kind(&self.albums)
            .unwrap_or(StepKind::Prompt);
        let effect = self
            .scheduler
            .arm(TimerPurpose::Reveal, self.rules.timings.reveal(kind));
        self.effects.push(effect);
    }

    fn finish_game(&mut self) {
        self.cancel_timer();
        self.broadcast(ServerMessage::GameOver {}, None);
        self.phase = Phase::Lobby;
        self.seats.clear();
        self.albums.clear();
        self.round = 0;
        self.reveal = RevealCursor::new();
        info!("Session {} finished its game, back in lobby", self.code);
    }

    // ── Effects ──────────────────────────────────────────────────────

    fn send(&mut self, to: PlayerId, message: ServerMessage) {
        self.effects.push(Effect::Send { to, message });
    }

    fn broadcast(&mut self, message: ServerMessage, except: Option<PlayerId>) {
        self.effects.push(Effect::Broadcast { message, except });
    }

    fn cancel_timer(&mut self) {
        if let Some(effect) = self.scheduler.cancel() {
            self.effects.push(effect);
        }
    }
}

#[cfg(test)]
impl Lobby {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host(&self) -> Option<PlayerId> {
        self.host
    }

    pub fn roster(&self) -> &[Player] {
        &self.roster
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn reveal_position(&self) -> (usize, usize) {
        self.reveal.position()
    }
}

/// Kind of step a task phase produces.
fn round_step_kind(phase: Phase) -> StepKind {
    match phase {
        Phase::Drawing => StepKind::Drawing,
        _ => StepKind::Prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{StrokeCommand, StrokePreview, TaskKind};
    use serde_json::json;
    use std::collections::HashSet;

    fn lobby() -> Lobby {
        Lobby::new("ABCD".into(), Visibility::Public, SessionRules::default())
    }

    fn lobby_with(n: u64) -> Lobby {
        let mut l = lobby();
        for id in 1..=n {
            l.join(id, &format!("p{}", id)).unwrap();
        }
        l.drain_effects();
        l
    }

    /// Messages `to` would receive from `effects`.
    fn inbox(effects: &[Effect], to: PlayerId) -> Vec<ServerMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send { to: t, message } if *t == to => Some(message.clone()),
                Effect::Broadcast { message, except } if *except != Some(to) => {
                    Some(message.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn last_generation(effects: &[Effect]) -> u64 {
        effects
            .iter()
            .rev()
            .find_map(|e| match e {
                Effect::ArmTimer { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("a timer should have been armed")
    }

    fn task_for(effects: &[Effect], to: PlayerId) -> (TaskKind, Option<StepContent>) {
        inbox(effects, to)
            .into_iter()
            .find_map(|m| match m {
                ServerMessage::NewTask {
                    task_kind, content, ..
                } => Some((task_kind, content)),
                _ => None,
            })
            .expect("player should have been given a task")
    }

    fn drawing(tag: f32) -> Vec<StrokeCommand> {
        vec![
            StrokeCommand::Begin {
                x: tag,
                y: tag,
                color: None,
                width: None,
            },
            StrokeCommand::LineTo { x: tag + 1.0, y: tag },
        ]
    }

    /// Everyone still in the roster hands in their current task.
    fn submit_all(l: &mut Lobby) {
        let phase = l.phase();
        let ids: Vec<PlayerId> = l.roster().iter().map(|p| p.id).collect();
        for id in ids {
            let msg = match phase {
                Phase::Prompting => ClientMessage::SubmitPrompt {
                    text: format!("prompt by {}", id),
                },
                Phase::Drawing => ClientMessage::SubmitDrawing {
                    stroke_commands: drawing(id as f32),
                },
                Phase::Describing => ClientMessage::SubmitDescription {
                    text: format!("description by {}", id),
                },
                other => panic!("no task during {:?}", other),
            };
            l.handle_client(id, msg);
        }
    }

    #[test]
    fn first_joiner_becomes_host_and_gets_initial_state() {
        let mut l = lobby();
        l.join(10, "ana").unwrap();
        l.join(11, "ben").unwrap();
        let effects = l.drain_effects();

        assert_eq!(l.host(), Some(10));
        let initial = inbox(&effects, 11)
            .into_iter()
            .find(|m| matches!(m, ServerMessage::InitialState { .. }))
            .unwrap();
        match initial {
            ServerMessage::InitialState {
                self_id,
                host_id,
                roster,
            } => {
                assert_eq!(self_id, 11);
                assert_eq!(host_id, 10);
                assert_eq!(roster.len(), 2);
            }
            _ => unreachable!(),
        }
        // The joiner doesn't get its own player_joined echo.
        assert!(!inbox(&effects, 11)
            .iter()
            .any(|m| matches!(m, ServerMessage::PlayerJoined { id: 11, .. })));
        assert!(inbox(&effects, 10)
            .iter()
            .any(|m| matches!(m, ServerMessage::PlayerJoined { id: 11, .. })));
    }

    #[test]
    fn join_rejects_bad_usernames() {
        let mut l = lobby();
        assert_eq!(
            l.join(1, "   "),
            Err(JoinError::InvalidUsername { max: 24 })
        );
        assert!(l.join(2, &"x".repeat(25)).is_err());
        assert!(l.is_empty());
    }

    #[test]
    fn join_is_refused_once_the_game_started() {
        let mut l = lobby_with(2);
        l.handle_client(1, ClientMessage::StartGame {});
        assert_eq!(l.join(3, "late"), Err(JoinError::GameInProgress));
    }

    #[test]
    fn only_host_with_enough_players_can_start() {
        let mut l = lobby_with(1);
        l.handle_client(1, ClientMessage::StartGame {});
        assert_eq!(l.phase(), Phase::Lobby);

        l.join(2, "p2").unwrap();
        l.handle_client(2, ClientMessage::StartGame {});
        assert_eq!(l.phase(), Phase::Lobby);

        l.handle_client(1, ClientMessage::StartGame {});
        assert_eq!(l.phase(), Phase::Prompting);
        let ids: HashSet<PlayerId> = l.seats().iter().map(|s| s.player).collect();
        assert_eq!(ids, HashSet::from([1, 2]));
    }

    #[test]
    fn two_player_game_end_to_end() {
        let mut l = lobby();
        l.join(1, "A").unwrap();
        l.join(2, "B").unwrap();
        l.handle_client(1, ClientMessage::StartGame {});
        let effects = l.drain_effects();
        assert!(inbox(&effects, 2).contains(&ServerMessage::GameStarted {}));
        assert_eq!(task_for(&effects, 1).0, TaskKind::Prompt);

        l.handle_client(
            1,
            ClientMessage::SubmitPrompt {
                text: "a sleepy cat".into(),
            },
        );
        let effects = l.drain_effects();
        assert_eq!(
            effects[0],
            Effect::Send {
                to: 1,
                message: ServerMessage::PromptAccepted {}
            }
        );
        assert_eq!(l.phase(), Phase::Prompting);

        l.handle_client(
            2,
            ClientMessage::SubmitPrompt {
                text: "a robot chef".into(),
            },
        );
        assert_eq!(l.phase(), Phase::Drawing);
        let effects = l.drain_effects();
        assert_eq!(
            task_for(&effects, 2),
            (TaskKind::Draw, Some(StepContent::Text("a sleepy cat".into())))
        );
        assert_eq!(
            task_for(&effects, 1),
            (TaskKind::Draw, Some(StepContent::Text("a robot chef".into())))
        );

        submit_all(&mut l);
        assert_eq!(l.phase(), Phase::Reveal);
        assert_eq!(l.albums().len(), 2);
        assert!(l.albums().iter().all(|a| a.len() == 2));
        let effects = l.drain_effects();
        assert!(inbox(&effects, 1)
            .iter()
            .any(|m| matches!(m, ServerMessage::RevealAll { albums } if albums.len() == 2)));
        assert!(inbox(&effects, 2).contains(&ServerMessage::UpdateRevealStep {
            album_index: 0,
            step_index: 0
        }));

        for _ in 0..3 {
            l.handle_client(1, ClientMessage::NextRevealStep {});
            assert_eq!(l.phase(), Phase::Reveal);
        }
        assert_eq!(l.reveal_position(), (1, 1));
        l.drain_effects();

        l.handle_client(1, ClientMessage::NextRevealStep {});
        let effects = l.drain_effects();
        assert!(inbox(&effects, 1).contains(&ServerMessage::GameOver {}));
        assert!(inbox(&effects, 2).contains(&ServerMessage::GameOver {}));
        assert_eq!(l.phase(), Phase::Lobby);
        assert!(l.albums().is_empty());
        assert_eq!(l.roster().len(), 2);
    }

    #[test]
    fn every_album_collects_one_step_from_every_player() {
        for n in 2..=7u64 {
            let mut l = lobby_with(n);
            l.handle_client(1, ClientMessage::StartGame {});
            let mut rounds = 0;
            while l.phase() != Phase::Reveal {
                submit_all(&mut l);
                rounds += 1;
                assert!(rounds <= n as usize, "game did not terminate for n={}", n);
            }
            // One prompting round plus n-1 drawing/describing rounds.
            assert_eq!(rounds, n as usize);
            assert_eq!(l.albums().len(), n as usize);
            for album in l.albums() {
                assert_eq!(album.len(), n as usize);
                let authors: HashSet<PlayerId> = album.contributors().collect();
                assert_eq!(authors.len(), n as usize);
                assert_eq!(album.steps[0].author_id, album.author_id);
                // Steps alternate text and drawings.
                for (i, step) in album.steps.iter().enumerate() {
                    let expected = if i % 2 == 0 {
                        StepKind::Prompt
                    } else {
                        StepKind::Drawing
                    };
                    assert_eq!(step.kind, expected);
                }
            }
        }
    }

    #[test]
    fn tasks_never_hand_a_player_their_own_album() {
        let mut l = lobby_with(4);
        l.handle_client(1, ClientMessage::StartGame {});
        submit_all(&mut l);
        while l.phase() != Phase::Reveal {
            let n = l.seats().len();
            for (seat, s) in l.seats().iter().enumerate() {
                let album = &l.albums()[assigner::assignment(seat, l.round(), n)];
                assert!(!album.contributors().any(|a| a == s.player));
            }
            submit_all(&mut l);
        }
    }

    #[test]
    fn duplicate_submission_is_a_no_op() {
        let mut l = lobby_with(3);
        l.handle_client(1, ClientMessage::StartGame {});
        l.drain_effects();

        l.handle_client(2, ClientMessage::SubmitPrompt { text: "first".into() });
        let once = l.drain_effects();
        l.handle_client(2, ClientMessage::SubmitPrompt { text: "second".into() });
        assert!(l.drain_effects().is_empty());
        assert_eq!(once.len(), 2);

        l.handle_client(1, ClientMessage::SubmitPrompt { text: "x".into() });
        l.handle_client(3, ClientMessage::SubmitPrompt { text: "y".into() });
        let seat = l.seats().iter().position(|s| s.player == 2).unwrap();
        assert_eq!(
            l.albums()[seat].steps[0].content,
            StepContent::Text("first".into())
        );
    }

    #[test]
    fn submissions_for_the_wrong_phase_are_ignored() {
        let mut l = lobby_with(2);
        l.handle_client(1, ClientMessage::StartGame {});
        l.drain_effects();
        l.handle_client(
            1,
            ClientMessage::SubmitDrawing {
                stroke_commands: drawing(1.0),
            },
        );
        l.handle_client(2, ClientMessage::NextRevealStep {});
        assert!(l.drain_effects().is_empty());
        assert!(l.roster().iter().all(|p| !p.done));
    }

    #[test]
    fn timeout_fills_in_for_missing_players_only() {
        let mut l = lobby_with(4);
        l.handle_client(1, ClientMessage::StartGame {});
        submit_all(&mut l);
        assert_eq!(l.phase(), Phase::Drawing);
        let effects = l.drain_effects();
        let generation = last_generation(&effects);

        l.handle_client(
            1,
            ClientMessage::SubmitDrawing {
                stroke_commands: drawing(1.0),
            },
        );
        l.handle_client(
            3,
            ClientMessage::SubmitDrawing {
                stroke_commands: drawing(3.0),
            },
        );
        l.drain_effects();

        l.timer_fired(generation);
        assert_eq!(l.phase(), Phase::Describing);
        assert_eq!(l.round(), 2);

        let drawings: Vec<&Step> = l.albums().iter().map(|a| &a.steps[1]).collect();
        let timed_out: HashSet<PlayerId> = drawings
            .iter()
            .filter(|s| s.timed_out)
            .map(|s| s.author_id)
            .collect();
        assert_eq!(timed_out, HashSet::from([2, 4]));
        for step in drawings.iter().filter(|s| s.timed_out) {
            assert_eq!(step.content, StepContent::Drawing(Vec::new()));
        }

        // The same firing again, or a late drawing, changes nothing.
        l.drain_effects();
        l.timer_fired(generation);
        l.handle_client(
            2,
            ClientMessage::SubmitDrawing {
                stroke_commands: drawing(2.0),
            },
        );
        assert!(l.drain_effects().is_empty());
        assert_eq!(l.round(), 2);
        assert!(l.albums().iter().all(|a| a.len() == 2));
    }

    #[test]
    fn prompt_timeout_seeds_empty_placeholder() {
        let mut l = lobby_with(2);
        l.handle_client(1, ClientMessage::StartGame {});
        let generation = last_generation(&l.drain_effects());
        l.handle_client(1, ClientMessage::SubmitPrompt { text: "kite".into() });
        l.timer_fired(generation);

        assert_eq!(l.phase(), Phase::Drawing);
        let seat = l.seats().iter().position(|s| s.player == 2).unwrap();
        let seed = &l.albums()[seat].steps[0];
        assert!(seed.timed_out);
        assert_eq!(seed.content, StepContent::Text(String::new()));
    }

    #[test]
    fn natural_completion_cancels_round_timer() {
        let mut l = lobby_with(2);
        l.handle_client(1, ClientMessage::StartGame {});
        let prompt_generation = last_generation(&l.drain_effects());
        submit_all(&mut l);
        let effects = l.drain_effects();
        assert!(effects.contains(&Effect::CancelTimer));

        // The prompting timer firing late must not touch the drawing round.
        l.timer_fired(prompt_generation);
        assert_eq!(l.phase(), Phase::Drawing);
        assert!(l.roster().iter().all(|p| !p.done));
    }

    #[test]
    fn host_leaving_promotes_next_joiner() {
        let mut l = lobby_with(3);
        l.leave(1);
        let effects = l.drain_effects();
        assert_eq!(l.host(), Some(2));
        assert!(inbox(&effects, 3).contains(&ServerMessage::PlayerLeft {
            id: 1,
            new_host_id: Some(2)
        }));

        l.handle_client(3, ClientMessage::StartGame {});
        assert_eq!(l.phase(), Phase::Lobby);
        l.handle_client(2, ClientMessage::StartGame {});
        assert_eq!(l.phase(), Phase::Prompting);
    }

    #[test]
    fn only_new_host_can_advance_reveal() {
        let mut l = lobby_with(3);
        l.handle_client(1, ClientMessage::StartGame {});
        while l.phase() != Phase::Reveal {
            submit_all(&mut l);
        }
        l.leave(1);
        assert_eq!(l.host(), Some(2));
        l.drain_effects();

        l.handle_client(3, ClientMessage::NextRevealStep {});
        assert_eq!(l.reveal_position(), (0, 0));
        l.handle_client(2, ClientMessage::NextRevealStep {});
        assert_eq!(l.reveal_position(), (0, 1));
    }

    #[test]
    fn leaving_mid_round_can_complete_it() {
        let mut l = lobby_with(3);
        l.handle_client(1, ClientMessage::StartGame {});
        l.handle_client(1, ClientMessage::SubmitPrompt { text: "a".into() });
        l.handle_client(2, ClientMessage::SubmitPrompt { text: "b".into() });
        assert_eq!(l.phase(), Phase::Prompting);

        l.leave(3);
        assert_eq!(l.phase(), Phase::Drawing);
        assert_eq!(l.albums().len(), 3);

        // The absent seat keeps getting placeholders until the game ends.
        while l.phase() != Phase::Reveal {
            submit_all(&mut l);
        }
        for album in l.albums() {
            assert_eq!(album.len(), 3);
            let from_absent = album.steps.iter().find(|s| s.author_id == 3).unwrap();
            assert!(from_absent.timed_out);
        }
    }

    #[test]
    fn last_player_leaving_cancels_timer() {
        let mut l = lobby_with(2);
        l.handle_client(1, ClientMessage::StartGame {});
        submit_all(&mut l);
        l.drain_effects();
        l.leave(1);
        l.drain_effects();
        l.leave(2);
        assert!(l.is_empty());
        assert_eq!(l.drain_effects(), vec![Effect::CancelTimer]);
    }

    fn preview(value: serde_json::Value) -> StrokePreview {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn stroke_preview_is_relayed_only_while_drawing() {
        let mut l = lobby_with(2);
        let segment = preview(json!({ "x": 1, "y": 2 }));
        l.handle_client(
            1,
            ClientMessage::StrokeSegment {
                stroke: segment.clone(),
            },
        );
        assert!(l.drain_effects().is_empty());

        l.handle_client(1, ClientMessage::StartGame {});
        submit_all(&mut l);
        l.drain_effects();
        l.handle_client(1, ClientMessage::StrokeSegment { stroke: segment });
        let effects = l.drain_effects();
        assert!(inbox(&effects, 1).is_empty());
        assert_eq!(inbox(&effects, 2).len(), 1);
    }

    #[test]
    fn stroke_preview_fields_pass_through_with_sender_id() {
        let mut l = lobby_with(2);
        l.handle_client(1, ClientMessage::StartGame {});
        submit_all(&mut l);
        l.drain_effects();

        l.handle_client(
            2,
            ClientMessage::StrokeSegment {
                stroke: preview(json!({
                    "x": 1, "y": 2, "pressure": 0.5, "tool": "eraser", "playerId": 99
                })),
            },
        );
        l.handle_client(
            2,
            ClientMessage::BeginStroke {
                stroke: preview(json!({ "points": [[1, 2]], "color": "#f00" })),
            },
        );
        let effects = l.drain_effects();
        assert_eq!(
            effects,
            vec![
                Effect::Broadcast {
                    message: ServerMessage::StrokeSegment {
                        player_id: 2,
                        stroke: preview(json!({ "x": 1, "y": 2, "pressure": 0.5, "tool": "eraser" })),
                    },
                    except: Some(2),
                },
                Effect::Broadcast {
                    message: ServerMessage::BeginStroke {
                        player_id: 2,
                        stroke: preview(json!({ "points": [[1, 2]], "color": "#f00" })),
                    },
                    except: Some(2),
                },
            ]
        );
        let wire = serde_json::to_value(inbox(&effects, 1)[0].clone()).unwrap();
        assert_eq!(wire["playerId"], 2);
        assert_eq!(wire["tool"], "eraser");
    }

    #[test]
    fn reveal_timer_advances_and_finishes_game() {
        let mut l = lobby_with(2);
        l.handle_client(1, ClientMessage::StartGame {});
        while l.phase() != Phase::Reveal {
            submit_all(&mut l);
        }
        let mut steps = 0;
        while l.phase() == Phase::Reveal {
            let generation = last_generation(&l.drain_effects());
            l.timer_fired(generation);
            steps += 1;
        }
        assert_eq!(steps, 4);
        assert!(inbox(&l.drain_effects(), 1).contains(&ServerMessage::GameOver {}));
    }

    #[test]
    fn game_can_be_replayed_after_game_over() {
        let mut l = lobby_with(2);
        l.handle_client(1, ClientMessage::StartGame {});
        while l.phase() != Phase::Reveal {
            submit_all(&mut l);
        }
        while l.phase() == Phase::Reveal {
            l.handle_client(1, ClientMessage::NextRevealStep {});
        }
        l.join(3, "p3").unwrap();
        l.handle_client(1, ClientMessage::StartGame {});
        assert_eq!(l.phase(), Phase::Prompting);
        assert_eq!(l.seats().len(), 3);
    }
}
