//! Session orchestration: registration, rounds, tie-breakers and results.
//!
//! The state machine never touches physics. Its caller plays each turn on the
//! simulation and reports the outcome through [`GameStateMachine::complete_turn`].

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::api::types::PlayerId;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::game::turns::TurnManager;
use crate::systems::scoring;

/// Longest allowed player name, in characters after trimming.
pub const MAX_NAME_CHARS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Registration,
    Playing,
    /// Leaders are tied after the last round. `start_tie_breaker` returns
    /// the session to `Playing` for one more round among them.
    TieBreaker,
    Results,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylePattern {
    #[default]
    Solid,
    Striped,
    Ringed,
}

/// How a player's pucks are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuckStyle {
    /// 0xRRGGBB.
    pub color: u32,
    #[serde(default)]
    pub pattern: StylePattern,
}

impl Default for PuckStyle {
    fn default() -> Self {
        Self {
            color: 0xE7_4C_3C,
            pattern: StylePattern::Solid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRegistration {
    pub name: String,
    #[serde(default)]
    pub style: PuckStyle,
}

impl PlayerRegistration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            style: PuckStyle::default(),
        }
    }

    pub fn with_style(mut self, style: PuckStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub style: PuckStyle,
    pub score: u32,
    /// 1-based registration order.
    pub turn_order: u32,
    /// False while sitting out a tie-breaker.
    pub is_active: bool,
}

/// Handed to the caller when a turn begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnContext {
    pub player_id: PlayerId,
    pub round: u32,
    pub turn_number: u32,
    /// 0 for regular play, otherwise which tie-breaker this turn belongs to.
    pub tie_breaker: u32,
}

/// What happened during a turn, as measured by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub drop_x: f32,
    pub shoves: Vec<Vec2>,
    pub bucket: Option<usize>,
    pub score_earned: u32,
    pub bounce_count: u32,
    /// The puck was force-settled by the stall timeout.
    pub timed_out: bool,
}

/// Immutable log entry for one completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub context: TurnContext,
    pub result: TurnResult,
}

/// Verdict of [`GameStateMachine::evaluate_round_end`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundOutcome {
    NextRound { round: u32 },
    Winner { player: PlayerId },
    /// Leaders in registration order.
    TieBreaker { tied: Vec<PlayerId> },
    /// Still tied after every allowed tie-breaker.
    CoWinners { players: Vec<PlayerId> },
}

pub struct GameStateMachine {
    config: SessionConfig,
    phase: GamePhase,
    /// Registration order.
    players: Vec<Player>,
    /// Players taking turns, in registration order.
    active_players: Vec<PlayerId>,
    turns: Option<TurnManager>,
    records: Vec<TurnRecord>,
    tie_breakers_played: u32,
    winners: Vec<PlayerId>,
}

impl GameStateMachine {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            phase: GamePhase::Registration,
            players: Vec::new(),
            active_players: Vec::new(),
            turns: None,
            records: Vec::new(),
            tie_breakers_played: 0,
            winners: Vec::new(),
        }
    }

    /// Validate the roster, assign ids and turn order, and begin round 1.
    pub fn start_session(
        &mut self,
        registrations: Vec<PlayerRegistration>,
    ) -> Result<(), SessionError> {
        if self.phase != GamePhase::Registration {
            return Err(SessionError::WrongPhase { actual: self.phase });
        }
        if registrations.is_empty() {
            return Err(SessionError::NoPlayers);
        }
        if registrations.len() > self.config.max_players {
            return Err(SessionError::TooManyPlayers {
                count: registrations.len(),
                max: self.config.max_players,
            });
        }

        let mut players = Vec::with_capacity(registrations.len());
        for (i, registration) in registrations.into_iter().enumerate() {
            let name = validate_name(&registration.name)?;
            players.push(Player {
                id: PlayerId(i as u32 + 1),
                name,
                style: registration.style,
                score: 0,
                turn_order: i as u32 + 1,
                is_active: true,
            });
        }

        self.active_players = players.iter().map(|p| p.id).collect();
        self.turns = Some(TurnManager::new(players.len(), self.config.total_rounds));
        self.players = players;
        self.records.clear();
        self.tie_breakers_played = 0;
        self.winners.clear();
        self.phase = GamePhase::Playing;
        log::info!(
            "session started: {} players, {} rounds",
            self.players.len(),
            self.config.total_rounds
        );
        Ok(())
    }

    /// Context for the turn about to be played.
    pub fn start_turn(&self) -> Result<TurnContext, SessionError> {
        let turns = self.live_turn_manager()?;
        if turns.is_all_rounds_complete() {
            return Err(SessionError::RoundsComplete);
        }
        let player_id = self
            .active_players
            .get(turns.current_player_index())
            .copied()
            .ok_or(SessionError::NoTurnManager)?;
        Ok(TurnContext {
            player_id,
            round: turns.current_round(),
            turn_number: turns.turn_number(),
            tie_breaker: self.tie_breakers_played,
        })
    }

    /// Credit the current player, log the turn and advance.
    pub fn complete_turn(&mut self, result: TurnResult) -> Result<TurnRecord, SessionError> {
        let context = self.start_turn()?;
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == context.player_id)
            .ok_or(SessionError::UnknownPlayer(context.player_id))?;
        player.score = player.score.saturating_add(result.score_earned);

        let record = TurnRecord { context, result };
        self.records.push(record.clone());
        if let Some(turns) = self.turns.as_mut() {
            turns.advance_turn();
        }
        Ok(record)
    }

    /// Decide what follows the current round. A tie moves the session to
    /// `TieBreaker`; winner and co-winner outcomes move it to results.
    pub fn evaluate_round_end(&mut self) -> Result<RoundOutcome, SessionError> {
        let turns = self.live_turn_manager()?;
        if !turns.is_all_rounds_complete() {
            return Ok(RoundOutcome::NextRound {
                round: turns.current_round(),
            });
        }

        let active = || self.players.iter().filter(|p| p.is_active);
        let best = active().map(|p| p.score).max().unwrap_or(0);
        let leaders: Vec<PlayerId> = active().filter(|p| p.score == best).map(|p| p.id).collect();

        let outcome = match leaders.len() {
            0 => return Err(SessionError::NoPlayers),
            1 => RoundOutcome::Winner { player: leaders[0] },
            _ if self.tie_breakers_played < self.config.max_tie_breakers => {
                RoundOutcome::TieBreaker { tied: leaders }
            }
            _ => RoundOutcome::CoWinners { players: leaders },
        };

        match &outcome {
            RoundOutcome::Winner { player } => {
                self.winners = vec![*player];
                self.finish();
            }
            RoundOutcome::CoWinners { players } => {
                self.winners = players.clone();
                self.finish();
            }
            RoundOutcome::TieBreaker { .. } => self.phase = GamePhase::TieBreaker,
            RoundOutcome::NextRound { .. } => {}
        }
        Ok(outcome)
    }

    /// Play one extra round among `tied` only. Only valid right after
    /// `evaluate_round_end` reported a tie.
    pub fn start_tie_breaker(&mut self, tied: &[PlayerId]) -> Result<(), SessionError> {
        if self.phase != GamePhase::TieBreaker {
            return Err(SessionError::WrongPhase { actual: self.phase });
        }
        if tied.len() < 2 {
            return Err(SessionError::NotEnoughTiedPlayers(tied.len()));
        }
        if let Some(unknown) = tied.iter().find(|id| !self.players.iter().any(|p| p.id == **id)) {
            return Err(SessionError::UnknownPlayer(*unknown));
        }

        self.tie_breakers_played += 1;
        for player in &mut self.players {
            player.is_active = tied.contains(&player.id);
        }
        self.active_players = self
            .players
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.id)
            .collect();
        self.turns = Some(TurnManager::new(self.active_players.len(), 1));
        self.phase = GamePhase::Playing;
        log::info!(
            "tie-breaker {} started between {:?}",
            self.tie_breakers_played,
            self.active_players
        );
        Ok(())
    }

    /// Same roster, scores zeroed, back to round 1.
    pub fn reset_for_replay(&mut self) -> Result<(), SessionError> {
        if self.players.is_empty() {
            return Err(SessionError::NotStarted);
        }
        for player in &mut self.players {
            player.score = 0;
            player.is_active = true;
        }
        self.active_players = self.players.iter().map(|p| p.id).collect();
        self.turns = Some(TurnManager::new(self.players.len(), self.config.total_rounds));
        self.records.clear();
        self.tie_breakers_played = 0;
        self.winners.clear();
        self.phase = GamePhase::Playing;
        log::info!("replay with {} players", self.players.len());
        Ok(())
    }

    /// Forget everything and return to registration.
    pub fn reset_full(&mut self) {
        self.players.clear();
        self.active_players.clear();
        self.turns = None;
        self.records.clear();
        self.tie_breakers_played = 0;
        self.winners.clear();
        self.phase = GamePhase::Registration;
    }

    /// Claw back a displaced puck's score. Returns the amount actually removed.
    pub fn revoke_score(&mut self, player_id: PlayerId, amount: u32) -> Result<u32, SessionError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        let revoked = scoring::revoke_score(player.score, amount);
        player.score -= revoked;
        if revoked > 0 {
            log::debug!("{} lost {} points, now {}", player_id, revoked, player.score);
        }
        Ok(revoked)
    }

    /// Add points outside a turn, e.g. when a displaced puck settles again.
    pub fn credit_score(&mut self, player_id: PlayerId, amount: u32) -> Result<u32, SessionError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        player.score = player.score.saturating_add(amount);
        Ok(player.score)
    }

    /// Overwrite every total with an authoritative recomputation. Players
    /// missing from `totals` score zero.
    pub fn reconcile_scores(&mut self, totals: &BTreeMap<PlayerId, u32>) {
        for player in &mut self.players {
            player.score = totals.get(&player.id).copied().unwrap_or(0);
        }
    }

    // -- Accessors --

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn active_players(&self) -> &[PlayerId] {
        &self.active_players
    }

    pub fn current_round(&self) -> Option<u32> {
        self.turns.as_ref().map(TurnManager::current_round)
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    pub fn tie_breakers_played(&self) -> u32 {
        self.tie_breakers_played
    }

    pub fn winners(&self) -> &[PlayerId] {
        &self.winners
    }

    /// Players by score, highest first; ties keep registration order.
    pub fn standings(&self) -> Vec<&Player> {
        let mut ranked: Vec<&Player> = self.players.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.turn_order.cmp(&b.turn_order)));
        ranked
    }

    // -- private helpers --

    fn live_turn_manager(&self) -> Result<&TurnManager, SessionError> {
        match self.phase {
            GamePhase::Registration => Err(SessionError::NotStarted),
            GamePhase::Results => Err(SessionError::WrongPhase { actual: self.phase }),
            GamePhase::Playing | GamePhase::TieBreaker => {
                self.turns.as_ref().ok_or(SessionError::NoTurnManager)
            }
        }
    }

    fn finish(&mut self) {
        self.phase = GamePhase::Results;
        self.turns = None;
        log::info!("results: winners {:?}", self.winners);
    }
}

fn validate_name(raw: &str) -> Result<String, SessionError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(SessionError::InvalidPlayerName {
            name: raw.to_string(),
            max: MAX_NAME_CHARS,
        });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rounds: u32, tie_breakers: u32) -> SessionConfig {
        SessionConfig {
            total_rounds: rounds,
            max_tie_breakers: tie_breakers,
            ..SessionConfig::default()
        }
    }

    fn started(names: &[&str], rounds: u32) -> GameStateMachine {
        let mut gsm = GameStateMachine::new(config(rounds, 3));
        gsm.start_session(names.iter().map(|n| PlayerRegistration::new(*n)).collect())
            .unwrap();
        gsm
    }

    fn scored(score: u32) -> TurnResult {
        TurnResult {
            score_earned: score,
            ..TurnResult::default()
        }
    }

    #[test]
    fn operations_before_start_fail() {
        let mut gsm = GameStateMachine::new(SessionConfig::default());
        assert_eq!(gsm.start_turn(), Err(SessionError::NotStarted));
        assert_eq!(gsm.complete_turn(scored(1)), Err(SessionError::NotStarted));
        assert_eq!(gsm.evaluate_round_end(), Err(SessionError::NotStarted));
        assert_eq!(gsm.reset_for_replay(), Err(SessionError::NotStarted));
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        let mut gsm = GameStateMachine::new(SessionConfig::default());
        assert!(matches!(
            gsm.start_session(vec![PlayerRegistration::new("   ")]),
            Err(SessionError::InvalidPlayerName { .. })
        ));
        assert!(matches!(
            gsm.start_session(vec![PlayerRegistration::new("a".repeat(17))]),
            Err(SessionError::InvalidPlayerName { .. })
        ));
        assert_eq!(gsm.phase(), GamePhase::Registration);

        gsm.start_session(vec![
            PlayerRegistration::new("  Ada  "),
            PlayerRegistration::new("é".repeat(16)),
        ])
        .unwrap();
        assert_eq!(gsm.players()[0].name, "Ada");
        assert_eq!(gsm.players()[1].turn_order, 2);
        assert_eq!(gsm.phase(), GamePhase::Playing);
    }

    #[test]
    fn roster_size_limits() {
        let mut gsm = GameStateMachine::new(SessionConfig::default());
        assert_eq!(gsm.start_session(Vec::new()), Err(SessionError::NoPlayers));
        let too_many = (0..9).map(|i| PlayerRegistration::new(format!("p{}", i))).collect();
        assert_eq!(
            gsm.start_session(too_many),
            Err(SessionError::TooManyPlayers { count: 9, max: 8 })
        );
    }

    #[test]
    fn turns_rotate_and_accumulate() {
        let mut gsm = started(&["A", "B"], 2);
        let ctx = gsm.start_turn().unwrap();
        assert_eq!(ctx.player_id, PlayerId(1));
        assert_eq!(ctx.round, 1);
        assert_eq!(ctx.tie_breaker, 0);

        gsm.complete_turn(scored(250)).unwrap();
        assert_eq!(gsm.start_turn().unwrap().player_id, PlayerId(2));
        assert_eq!(
            gsm.evaluate_round_end(),
            Ok(RoundOutcome::NextRound { round: 1 })
        );
        gsm.complete_turn(scored(100)).unwrap();
        assert_eq!(
            gsm.evaluate_round_end(),
            Ok(RoundOutcome::NextRound { round: 2 })
        );
        assert_eq!(gsm.player(PlayerId(1)).unwrap().score, 250);
        assert_eq!(gsm.records().len(), 2);
        assert_eq!(gsm.records()[1].context.player_id, PlayerId(2));
    }

    #[test]
    fn single_leader_wins() {
        let mut gsm = started(&["A", "B"], 1);
        gsm.complete_turn(scored(100)).unwrap();
        gsm.complete_turn(scored(300)).unwrap();
        assert_eq!(gsm.start_turn(), Err(SessionError::RoundsComplete));

        assert_eq!(
            gsm.evaluate_round_end(),
            Ok(RoundOutcome::Winner { player: PlayerId(2) })
        );
        assert_eq!(gsm.phase(), GamePhase::Results);
        assert_eq!(gsm.winners(), &[PlayerId(2)]);
        assert_eq!(gsm.standings()[0].id, PlayerId(2));
    }

    #[test]
    fn tied_leaders_go_to_tie_breaker_in_registration_order() {
        let mut gsm = started(&["A", "B", "C"], 1);
        for score in [500, 100, 500] {
            gsm.complete_turn(scored(score)).unwrap();
        }

        let outcome = gsm.evaluate_round_end().unwrap();
        assert_eq!(
            outcome,
            RoundOutcome::TieBreaker { tied: vec![PlayerId(1), PlayerId(3)] }
        );

        assert_eq!(gsm.phase(), GamePhase::TieBreaker);
        assert_eq!(gsm.start_turn(), Err(SessionError::RoundsComplete));

        let RoundOutcome::TieBreaker { tied } = outcome else { unreachable!() };
        gsm.start_tie_breaker(&tied).unwrap();
        assert_eq!(gsm.phase(), GamePhase::Playing);
        assert_eq!(gsm.tie_breakers_played(), 1);
        assert!(!gsm.player(PlayerId(2)).unwrap().is_active);

        let ctx = gsm.start_turn().unwrap();
        assert_eq!(ctx.player_id, PlayerId(1));
        assert_eq!(ctx.tie_breaker, 1);
        gsm.complete_turn(scored(100)).unwrap();
        assert_eq!(gsm.start_turn().unwrap().player_id, PlayerId(3));
        gsm.complete_turn(scored(250)).unwrap();

        assert_eq!(
            gsm.evaluate_round_end(),
            Ok(RoundOutcome::Winner { player: PlayerId(3) })
        );
    }

    #[test]
    fn exhausted_tie_breakers_yield_co_winners() {
        let mut gsm = GameStateMachine::new(config(1, 1));
        gsm.start_session(vec![PlayerRegistration::new("A"), PlayerRegistration::new("B")])
            .unwrap();
        gsm.complete_turn(scored(100)).unwrap();
        gsm.complete_turn(scored(100)).unwrap();

        let tied = vec![PlayerId(1), PlayerId(2)];
        assert_eq!(
            gsm.evaluate_round_end(),
            Ok(RoundOutcome::TieBreaker { tied: tied.clone() })
        );
        gsm.start_tie_breaker(&tied).unwrap();
        gsm.complete_turn(scored(0)).unwrap();
        gsm.complete_turn(scored(0)).unwrap();

        assert_eq!(
            gsm.evaluate_round_end(),
            Ok(RoundOutcome::CoWinners { players: tied.clone() })
        );
        assert_eq!(gsm.phase(), GamePhase::Results);
        assert_eq!(gsm.winners(), tied.as_slice());
        assert!(matches!(gsm.start_turn(), Err(SessionError::WrongPhase { .. })));
    }

    #[test]
    fn tie_breaker_needs_a_reported_tie() {
        let mut gsm = started(&["A", "B"], 1);
        assert_eq!(
            gsm.start_tie_breaker(&[PlayerId(1), PlayerId(2)]),
            Err(SessionError::WrongPhase { actual: GamePhase::Playing })
        );
    }

    #[test]
    fn second_tie_returns_to_tie_breaker_phase() {
        let mut gsm = started(&["A", "B"], 1);
        let tied = vec![PlayerId(1), PlayerId(2)];
        for _ in 0..2 {
            gsm.complete_turn(scored(50)).unwrap();
            gsm.complete_turn(scored(50)).unwrap();
            assert_eq!(
                gsm.evaluate_round_end(),
                Ok(RoundOutcome::TieBreaker { tied: tied.clone() })
            );
            assert_eq!(gsm.phase(), GamePhase::TieBreaker);
            gsm.start_tie_breaker(&tied).unwrap();
            assert_eq!(gsm.phase(), GamePhase::Playing);
        }
        assert_eq!(gsm.tie_breakers_played(), 2);
        assert_eq!(gsm.start_turn().unwrap().tie_breaker, 2);
    }

    #[test]
    fn tie_breaker_needs_known_players() {
        let mut gsm = started(&["A", "B"], 1);
        gsm.complete_turn(scored(10)).unwrap();
        gsm.complete_turn(scored(10)).unwrap();
        assert!(matches!(
            gsm.evaluate_round_end(),
            Ok(RoundOutcome::TieBreaker { .. })
        ));
        assert_eq!(
            gsm.start_tie_breaker(&[PlayerId(1)]),
            Err(SessionError::NotEnoughTiedPlayers(1))
        );
        assert_eq!(
            gsm.start_tie_breaker(&[PlayerId(1), PlayerId(9)]),
            Err(SessionError::UnknownPlayer(PlayerId(9)))
        );
    }

    #[test]
    fn revocation_and_reconciliation() {
        let mut gsm = started(&["A", "B"], 3);
        gsm.complete_turn(scored(200)).unwrap();

        assert_eq!(gsm.revoke_score(PlayerId(1), 500), Ok(200));
        assert_eq!(gsm.player(PlayerId(1)).unwrap().score, 0);
        assert_eq!(gsm.revoke_score(PlayerId(7), 1), Err(SessionError::UnknownPlayer(PlayerId(7))));
        assert_eq!(gsm.credit_score(PlayerId(1), 75), Ok(75));

        let totals = BTreeMap::from([(PlayerId(2), 330)]);
        gsm.reconcile_scores(&totals);
        assert_eq!(gsm.player(PlayerId(1)).unwrap().score, 0);
        assert_eq!(gsm.player(PlayerId(2)).unwrap().score, 330);
    }

    #[test]
    fn replay_keeps_roster_and_full_reset_clears_it() {
        let mut gsm = started(&["A", "B"], 1);
        gsm.complete_turn(scored(100)).unwrap();
        gsm.complete_turn(scored(300)).unwrap();
        gsm.evaluate_round_end().unwrap();
        assert_eq!(gsm.phase(), GamePhase::Results);

        gsm.reset_for_replay().unwrap();
        assert_eq!(gsm.phase(), GamePhase::Playing);
        assert_eq!(gsm.players().len(), 2);
        assert!(gsm.players().iter().all(|p| p.score == 0 && p.is_active));
        assert!(gsm.records().is_empty());
        assert_eq!(gsm.current_round(), Some(1));

        gsm.reset_full();
        assert_eq!(gsm.phase(), GamePhase::Registration);
        assert!(gsm.players().is_empty());
        assert_eq!(gsm.start_turn(), Err(SessionError::NotStarted));
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_string(&RoundOutcome::Winner { player: PlayerId(2) }).unwrap();
        assert_eq!(json, r#"{"kind":"winner","player":2}"#);
    }
}
