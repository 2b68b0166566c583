use std::collections::BTreeMap;

use glam::Vec2;
use serde::Serialize;

use plinko_engine::systems::scoring;
use plinko_engine::{
    AutoShoveEvent, BoardGeometry, BoardSnapshot, ConfigError, ContactEvent, FixedTimestep,
    GameConfig, GamePhase, GameStateMachine, GrowthOutcome, OutOfBoundsEvent, PhysicsSimulation,
    Player, PlayerId, PlayerRegistration, PuckId, RoundOutcome, ScoreRevocationEvent,
    SessionError, SettleReason, SettledPuck, StepResult, TurnContext, TurnRecord, TurnResult,
};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("a puck is already in play")]
    TurnInProgress,

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything the front end needs to react to, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerEvent {
    SessionStarted { players: Vec<Player> },
    RoundStarted { round: u32 },
    TurnStarted { context: TurnContext },
    PuckDropped { puck_id: PuckId, player_id: PlayerId, x: f32 },
    Contact(ContactEvent),
    AutoShove(AutoShoveEvent),
    OutOfBounds(OutOfBoundsEvent),
    Growth(GrowthOutcome),
    Settled(SettledPuck),
    /// `applied` is what actually came off the owner's total.
    ScoreRevoked { revocation: ScoreRevocationEvent, applied: u32 },
    TurnCompleted { record: TurnRecord },
    TieBreakerStarted { tied: Vec<PlayerId> },
    GameOver { winners: Vec<PlayerId> },
}

/// Session state for the overlay UI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView<'a> {
    pub phase: GamePhase,
    pub players: &'a [Player],
    /// Highest score first.
    pub standings: Vec<&'a Player>,
    pub current_round: Option<u32>,
    pub current_player: Option<PlayerId>,
    pub active_puck: Option<PuckId>,
    pub tie_breakers_played: u32,
    pub winners: &'a [PlayerId],
}

struct ActiveTurn {
    context: TurnContext,
    puck: PuckId,
    drop_x: f32,
    shoves: Vec<Vec2>,
}

/// Drives one board and one session from frame callbacks.
///
/// Turns end when the dropped puck settles. Round boundaries swap in the
/// round's layout without touching pucks; tie-breakers and replays clear the
/// board first.
pub struct SessionRunner {
    config: GameConfig,
    sim: PhysicsSimulation,
    session: GameStateMachine,
    timestep: FixedTimestep,
    active: Option<ActiveTurn>,
    round: u32,
    pending: Vec<RunnerEvent>,
}

impl SessionRunner {
    pub fn new(config: GameConfig) -> Result<Self, RunnerError> {
        let sim = PhysicsSimulation::create_world(config.clone())?;
        Ok(Self {
            session: GameStateMachine::new(config.session.clone()),
            timestep: FixedTimestep::from_millis(config.physics.fixed_timestep_ms),
            sim,
            config,
            active: None,
            round: 0,
            pending: Vec::new(),
        })
    }

    /// Register players and begin round 1.
    pub fn start(&mut self, registrations: Vec<PlayerRegistration>) -> Result<Vec<RunnerEvent>, RunnerError> {
        self.session.start_session(registrations)?;
        self.pending.push(RunnerEvent::SessionStarted {
            players: self.session.players().to_vec(),
        });
        self.enter_round(1)?;
        Ok(self.drain())
    }

    /// Drop the current player's puck. Only one puck may be in play.
    pub fn drop_puck(&mut self, x: f32) -> Result<PuckId, RunnerError> {
        if self.active.is_some() {
            return Err(RunnerError::TurnInProgress);
        }
        let context = self.session.start_turn()?;
        let puck = self.sim.drop_puck(x, context.player_id, context.turn_number);
        let position = self
            .sim
            .puck_state(puck)
            .map(|s| s.position.x)
            .unwrap_or(x);
        self.pending.push(RunnerEvent::TurnStarted { context });
        self.pending.push(RunnerEvent::PuckDropped {
            puck_id: puck,
            player_id: context.player_id,
            x: position,
        });
        self.active = Some(ActiveTurn {
            context,
            puck,
            drop_x: position,
            shoves: Vec::new(),
        });
        Ok(puck)
    }

    /// Shove the puck in play. Rejected shoves are not recorded.
    pub fn shove(&mut self, vector: Vec2) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let accepted = self.sim.apply_shove(active.puck, vector);
        if accepted {
            active.shoves.push(vector);
        }
        accepted
    }

    /// Feed frame time in seconds; runs however many fixed ticks are owed.
    pub fn tick(&mut self, frame_dt: f32) -> Result<Vec<RunnerEvent>, RunnerError> {
        let steps = self.timestep.accumulate(frame_dt);
        self.advance(steps)
    }

    /// Run exactly `ticks` fixed steps.
    pub fn advance(&mut self, ticks: u32) -> Result<Vec<RunnerEvent>, RunnerError> {
        for _ in 0..ticks {
            let result = self.sim.step();
            self.absorb(result)?;
        }
        Ok(self.drain())
    }

    /// Same players, fresh board, scores zeroed.
    pub fn replay(&mut self) -> Result<Vec<RunnerEvent>, RunnerError> {
        self.session.reset_for_replay()?;
        self.sim.clear_pucks();
        self.active = None;
        self.timestep.reset();
        self.pending.push(RunnerEvent::SessionStarted {
            players: self.session.players().to_vec(),
        });
        self.enter_round(1)?;
        Ok(self.drain())
    }

    /// Back to registration with an empty board.
    pub fn reset(&mut self) {
        self.session.reset_full();
        self.sim.clear_pucks();
        self.active = None;
        self.round = 0;
        self.pending.clear();
        self.timestep.reset();
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.sim.snapshot()
    }

    pub fn board(&self) -> BoardGeometry {
        self.sim.board_geometry()
    }

    pub fn session_view(&self) -> SessionView<'_> {
        SessionView {
            phase: self.session.phase(),
            players: self.session.players(),
            standings: self.session.standings(),
            current_round: self.session.current_round(),
            current_player: self.session.start_turn().ok().map(|c| c.player_id),
            active_puck: self.active.as_ref().map(|a| a.puck),
            tie_breakers_played: self.session.tie_breakers_played(),
            winners: self.session.winners(),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.timestep.alpha()
    }

    pub fn simulation(&self) -> &PhysicsSimulation {
        &self.sim
    }

    pub fn session(&self) -> &GameStateMachine {
        &self.session
    }

    /// Authoritative totals recomputed from the pucks on the board.
    pub fn recomputed_scores(&self) -> BTreeMap<PlayerId, u32> {
        scoring::recalculate_all_scores(self.sim.pucks(), &self.sim.layout().bucket_scores)
    }

    // -- private helpers --

    fn drain(&mut self) -> Vec<RunnerEvent> {
        std::mem::take(&mut self.pending)
    }

    fn absorb(&mut self, result: StepResult) -> Result<(), RunnerError> {
        let active_puck = self.active.as_ref().map(|a| a.puck);
        let finished = active_puck.and_then(|id| result.settlement_of(id).copied());
        let StepResult {
            contacts,
            settled,
            auto_shoves,
            out_of_bounds,
            revocations,
            growths,
            ..
        } = result;

        self.pending.extend(contacts.into_iter().map(RunnerEvent::Contact));
        self.pending.extend(auto_shoves.into_iter().map(RunnerEvent::AutoShove));
        self.pending.extend(out_of_bounds.into_iter().map(RunnerEvent::OutOfBounds));
        self.pending.extend(growths.into_iter().map(RunnerEvent::Growth));

        for revocation in revocations {
            let applied = self
                .session
                .revoke_score(revocation.player_id, revocation.revoked_score)
                .unwrap_or_else(|e| {
                    log::warn!("revocation for {} not applied: {}", revocation.puck_id, e);
                    0
                });
            self.pending.push(RunnerEvent::ScoreRevoked { revocation, applied });
        }

        for settlement in settled {
            self.pending.push(RunnerEvent::Settled(settlement));
            if Some(settlement.puck_id) == active_puck {
                continue;
            }
            // A displaced puck came to rest again
            if let Err(e) = self.session.credit_score(settlement.player_id, settlement.score) {
                log::warn!("re-settle credit for {} not applied: {}", settlement.puck_id, e);
            }
        }

        if let Some(settlement) = finished {
            if let Some(active) = self.active.take() {
                self.finish_turn(active, &settlement)?;
            }
        }
        Ok(())
    }

    fn finish_turn(&mut self, active: ActiveTurn, settlement: &SettledPuck) -> Result<(), RunnerError> {
        if settlement.reason.is_forced() {
            log::info!(
                "{}'s turn ended by a forced settle ({:?})",
                active.context.player_id,
                settlement.reason
            );
        }
        let result = TurnResult {
            drop_x: active.drop_x,
            shoves: active.shoves,
            bucket: Some(settlement.bucket),
            score_earned: settlement.score,
            bounce_count: settlement.bounce_count,
            timed_out: settlement.reason == SettleReason::Timeout,
        };
        let record = self.session.complete_turn(result)?;
        debug_assert_eq!(record.context, active.context);
        self.pending.push(RunnerEvent::TurnCompleted { record });

        match self.session.evaluate_round_end()? {
            RoundOutcome::NextRound { round } => {
                if round != self.round {
                    self.enter_round(round)?;
                }
            }
            RoundOutcome::TieBreaker { tied } => {
                self.session.start_tie_breaker(&tied)?;
                self.sim.clear_pucks();
                self.pending.push(RunnerEvent::TieBreakerStarted { tied });
                self.enter_round(1)?;
            }
            RoundOutcome::Winner { player } => {
                self.pending.push(RunnerEvent::GameOver { winners: vec![player] });
            }
            RoundOutcome::CoWinners { players } => {
                self.pending.push(RunnerEvent::GameOver { winners: players });
            }
        }
        Ok(())
    }

    fn enter_round(&mut self, round: u32) -> Result<(), RunnerError> {
        let layout = self.config.layout_for_round(round);
        if layout != self.sim.layout() {
            self.sim.rebuild_board(layout.clone())?;
        }
        self.round = round;
        self.pending.push(RunnerEvent::RoundStarted { round });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinko_engine::BoardLayout;

    const MAX_TICKS: u32 = 3000;

    fn runner(rounds: u32) -> SessionRunner {
        let mut config = GameConfig::default();
        config.session.total_rounds = rounds;
        SessionRunner::new(config).unwrap()
    }

    fn players(names: &[&str]) -> Vec<PlayerRegistration> {
        names.iter().map(|n| PlayerRegistration::new(*n)).collect()
    }

    /// Tick until the active turn completes, returning every event seen.
    fn play_turn(runner: &mut SessionRunner, x: f32) -> Vec<RunnerEvent> {
        runner.drop_puck(x).unwrap();
        let mut seen = Vec::new();
        for _ in 0..MAX_TICKS {
            let events = runner.advance(1).unwrap();
            let done = events
                .iter()
                .any(|e| matches!(e, RunnerEvent::TurnCompleted { .. }));
            seen.extend(events);
            if done {
                return seen;
            }
        }
        panic!("turn never completed");
    }

    #[test]
    fn drop_requires_started_session() {
        let mut r = runner(1);
        assert!(matches!(
            r.drop_puck(300.0),
            Err(RunnerError::Session(SessionError::NotStarted))
        ));
        assert!(!r.shove(Vec2::X));
    }

    #[test]
    fn one_puck_in_play_at_a_time() {
        let mut r = runner(1);
        r.start(players(&["A", "B"])).unwrap();
        r.drop_puck(300.0).unwrap();
        assert!(matches!(r.drop_puck(200.0), Err(RunnerError::TurnInProgress)));
        assert!(r.shove(Vec2::new(50.0, 0.0)));
    }

    #[test]
    fn settled_puck_completes_the_turn() {
        let mut r = runner(2);
        let started = r.start(players(&["A", "B"])).unwrap();
        assert!(matches!(started[0], RunnerEvent::SessionStarted { .. }));
        assert_eq!(started[1], RunnerEvent::RoundStarted { round: 1 });

        let events = play_turn(&mut r, 150.0);
        let settled = events
            .iter()
            .find_map(|e| match e {
                RunnerEvent::Settled(s) => Some(*s),
                _ => None,
            })
            .unwrap();
        let Some(RunnerEvent::TurnCompleted { record }) = events
            .iter()
            .find(|e| matches!(e, RunnerEvent::TurnCompleted { .. }))
        else {
            unreachable!()
        };
        assert_eq!(record.context.player_id, PlayerId(1));
        assert_eq!(record.result.score_earned, settled.score);
        assert_eq!(record.result.bucket, Some(settled.bucket));
        assert_eq!(r.session().player(PlayerId(1)).unwrap().score, settled.score);
        assert_eq!(r.session_view().current_player, Some(PlayerId(2)));
        assert_eq!(r.session_view().active_puck, None);
    }

    #[test]
    fn turn_stays_active_until_its_puck_settles() {
        let mut r = runner(2);
        r.start(players(&["A", "B"])).unwrap();
        let id = r.drop_puck(150.0).unwrap();

        r.advance(5).unwrap();
        assert_eq!(r.session_view().active_puck, Some(id));
        assert!(matches!(r.drop_puck(300.0), Err(RunnerError::TurnInProgress)));

        let mut completed = 0;
        for _ in 0..MAX_TICKS {
            let events = r.advance(1).unwrap();
            completed += events
                .iter()
                .filter(|e| matches!(e, RunnerEvent::TurnCompleted { .. }))
                .count();
            if completed > 0 {
                break;
            }
        }
        assert_eq!(completed, 1);
        assert_eq!(r.session().records().len(), 1);
        assert_eq!(r.session_view().current_player, Some(PlayerId(2)));
        let earned = r.session().records()[0].result.score_earned;
        assert_eq!(r.session().player(PlayerId(1)).unwrap().score, earned);
    }

    #[test]
    fn full_game_reaches_an_ending() {
        let mut r = runner(1);
        r.start(players(&["A", "B"])).unwrap();
        play_turn(&mut r, 100.0);
        let events = play_turn(&mut r, 500.0);

        let ended = events.iter().any(|e| {
            matches!(e, RunnerEvent::GameOver { .. } | RunnerEvent::TieBreakerStarted { .. })
        });
        assert!(ended);
        if r.session().tie_breakers_played() > 0 {
            assert_eq!(r.session().phase(), GamePhase::Playing);
            assert!(r.simulation().pucks().is_empty(), "tie-breaker starts on a clear board");
        } else {
            assert_eq!(r.session().phase(), GamePhase::Results);
            assert_eq!(r.simulation().pucks().len(), 2);
        }
    }

    #[test]
    fn round_layouts_are_applied_at_round_boundaries() {
        let mut config = GameConfig::default();
        config.session.total_rounds = 2;
        let second = BoardLayout {
            bucket_count: 5,
            bucket_scores: vec![50, 200, 800, 200, 50],
            ..BoardLayout::default()
        };
        config.session.round_layouts = vec![BoardLayout::default(), second.clone()];
        let mut r = SessionRunner::new(config).unwrap();
        r.start(players(&["Solo"])).unwrap();

        let events = play_turn(&mut r, 300.0);

        assert!(events.contains(&RunnerEvent::RoundStarted { round: 2 }));
        assert_eq!(r.simulation().layout(), &second);
        assert_eq!(r.simulation().pucks().len(), 1, "pucks survive round changes");
    }

    #[test]
    fn tie_breaker_plays_on_the_first_round_layout() {
        let mut config = GameConfig::default();
        config.session.total_rounds = 2;
        let first = BoardLayout {
            bucket_scores: vec![0; 7],
            ..BoardLayout::default()
        };
        let second = BoardLayout {
            bucket_count: 5,
            bucket_scores: vec![0; 5],
            ..BoardLayout::default()
        };
        config.session.round_layouts = vec![first.clone(), second.clone()];
        let mut r = SessionRunner::new(config).unwrap();
        r.start(players(&["A", "B"])).unwrap();

        play_turn(&mut r, 150.0);
        play_turn(&mut r, 450.0);
        assert_eq!(r.simulation().layout(), &second);
        play_turn(&mut r, 150.0);
        let events = play_turn(&mut r, 450.0);

        let started = events
            .iter()
            .position(|e| matches!(e, RunnerEvent::TieBreakerStarted { .. }))
            .expect("every score is zero, so the leaders tie");
        assert_eq!(events[started + 1], RunnerEvent::RoundStarted { round: 1 });
        assert_eq!(r.simulation().layout(), &first);
        assert!(r.simulation().pucks().is_empty());
        assert_eq!(r.session_view().current_round, Some(1));
    }

    #[test]
    fn replay_clears_board_and_scores() {
        let mut r = runner(3);
        r.start(players(&["A"])).unwrap();
        play_turn(&mut r, 300.0);

        let events = r.replay().unwrap();

        assert!(events.contains(&RunnerEvent::RoundStarted { round: 1 }));
        assert!(r.simulation().pucks().is_empty());
        assert_eq!(r.session().player(PlayerId(1)).unwrap().score, 0);
        assert_eq!(r.session_view().current_round, Some(1));
    }

    #[test]
    fn reset_returns_to_registration() {
        let mut r = runner(1);
        r.start(players(&["A"])).unwrap();
        r.drop_puck(300.0).unwrap();
        r.reset();
        assert_eq!(r.session().phase(), GamePhase::Registration);
        assert!(r.simulation().pucks().is_empty());
        assert!(r.start(players(&["B"])).is_ok());
    }

    #[test]
    fn recomputed_scores_match_session_totals() {
        let mut r = runner(2);
        r.start(players(&["A", "B"])).unwrap();
        play_turn(&mut r, 120.0);
        play_turn(&mut r, 480.0);

        let totals = r.recomputed_scores();
        for player in r.session().players() {
            assert_eq!(totals.get(&player.id).copied().unwrap_or(0), player.score);
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&RunnerEvent::RoundStarted { round: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"round_started","round":2}"#);
    }
}
