//! Per-puck settlement classification.
//!
//! Each tick the simulation hands the detector one [`PuckObservation`] per
//! puck and acts on the returned [`Verdict`]. All timers are tick counts in
//! maps keyed by puck id, so they survive shape swaps and never live on the
//! puck itself. Thresholds are fixed at construction; `rebuild_board`
//! replaces the whole detector.

use std::collections::HashMap;

use glam::Vec2;

use crate::api::events::{AutoShoveEvent, SettleReason};
use crate::api::types::PuckId;
use crate::board::geometry::{self, Bucket};
use crate::config::{BoardLayout, PhysicsConfig};

/// Time a puck must rest inside the bucket margin before it settles.
pub const SETTLE_HOLD_MS: f32 = 500.0;

/// A settled puck moving faster than this multiple of the stall threshold may be displaced.
pub const DISPLACEMENT_SPEED_FACTOR: f32 = 5.0;

/// Post-step state of one puck, as read from the physics world.
#[derive(Debug, Clone, Copy)]
pub struct PuckObservation {
    pub id: PuckId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub sleeping: bool,
    pub settled: bool,
    pub settled_bucket: Option<usize>,
    /// Settled with a score on record.
    pub scored: bool,
}

/// What the simulation should do with a puck this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Unchanged,
    Settle { bucket: usize, reason: SettleReason },
    AutoShove(AutoShoveEvent),
    Displaced { from_bucket: usize },
}

/// Thresholds derived from the layout and physics config.
#[derive(Debug, Clone)]
struct Thresholds {
    buckets: Vec<Bucket>,
    /// Pucks at or below this Y (Y-down) are inside the bucket-floor margin.
    settle_zone_top: f32,
    stall_velocity: f32,
    stuck_velocity: f32,
    settle_ticks: u32,
    stuck_ticks: u32,
    max_auto_shoves: u32,
    stall_timeout_ms: f32,
    dt_ms: f32,
    out_of_bounds_ticks: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct OutOfBounds {
    ticks: u32,
    reported: bool,
}

pub struct BucketDetector {
    thresholds: Thresholds,
    settle_timers: HashMap<PuckId, u32>,
    stuck_timers: HashMap<PuckId, u32>,
    auto_shove_attempts: HashMap<PuckId, u32>,
    /// Ticks since the puck last became active, for the fallback timeout.
    active_ticks: HashMap<PuckId, u32>,
    out_of_bounds: HashMap<PuckId, OutOfBounds>,
}

impl BucketDetector {
    pub fn new(layout: &BoardLayout, physics: &PhysicsConfig) -> Self {
        let dt_ms = physics.fixed_timestep_ms;
        Self {
            thresholds: Thresholds {
                buckets: geometry::bucket_boundaries(layout),
                settle_zone_top: geometry::bucket_top_y(layout) - physics.settle_margin,
                stall_velocity: physics.stall_velocity_threshold,
                stuck_velocity: physics.auto_shove_velocity_threshold,
                settle_ticks: ((SETTLE_HOLD_MS / dt_ms).round() as u32).max(1),
                stuck_ticks: physics.stuck_ticks,
                max_auto_shoves: physics.max_auto_shoves,
                stall_timeout_ms: physics.stall_timeout_ms,
                dt_ms,
                out_of_bounds_ticks: physics.out_of_bounds_ticks.max(1),
            },
            settle_timers: HashMap::new(),
            stuck_timers: HashMap::new(),
            auto_shove_attempts: HashMap::new(),
            active_ticks: HashMap::new(),
            out_of_bounds: HashMap::new(),
        }
    }

    /// Ticks a puck must rest in the margin before settling.
    pub fn settle_ticks(&self) -> u32 {
        self.thresholds.settle_ticks
    }

    /// Bucket for an X position, clamped to the valid range.
    pub fn bucket_at(&self, x: f32) -> usize {
        geometry::index_in(&self.thresholds.buckets, x)
    }

    /// Classify one puck. Settled pucks are checked for displacement, active
    /// pucks for settlement, stalls and the fallback timeout.
    pub fn classify(&mut self, obs: &PuckObservation) -> Verdict {
        if obs.settled {
            return self.check_displacement(obs);
        }

        let active = self.active_ticks.entry(obs.id).or_insert(0);
        *active += 1;
        let elapsed_ms = *active as f32 * self.thresholds.dt_ms;

        if obs.sleeping {
            return self.settle(obs, SettleReason::Sleep);
        }

        let t = &self.thresholds;
        let speed = obs.velocity.length();
        if speed >= t.stuck_velocity {
            self.stuck_timers.remove(&obs.id);
        }

        if obs.position.y >= t.settle_zone_top {
            self.stuck_timers.remove(&obs.id);
            if speed < t.stall_velocity {
                let held = self.settle_timers.entry(obs.id).or_insert(0);
                *held += 1;
                if *held >= t.settle_ticks {
                    return self.settle(obs, SettleReason::Rest);
                }
            } else {
                self.settle_timers.remove(&obs.id);
            }
        } else {
            self.settle_timers.remove(&obs.id);
            if speed < t.stuck_velocity {
                let stalled = self.stuck_timers.entry(obs.id).or_insert(0);
                *stalled += 1;
                if *stalled > t.stuck_ticks {
                    self.stuck_timers.remove(&obs.id);
                    let attempts = self.auto_shove_attempts.entry(obs.id).or_insert(0);
                    if *attempts >= self.thresholds.max_auto_shoves {
                        log::warn!("{} still stuck after {} auto-shoves", obs.id, attempts);
                        return self.settle(obs, SettleReason::AutoShoveExhausted);
                    }
                    let attempt_index = *attempts;
                    *attempts += 1;
                    return Verdict::AutoShove(AutoShoveEvent {
                        puck_id: obs.id,
                        attempt_index,
                        direction: auto_shove_direction(attempt_index),
                    });
                }
            }
        }

        if elapsed_ms >= self.thresholds.stall_timeout_ms {
            log::warn!("{} hit the stall timeout after {} ms", obs.id, elapsed_ms);
            return self.settle(obs, SettleReason::Timeout);
        }
        Verdict::Unchanged
    }

    /// Count ticks spent above the top edge. Returns `true` exactly once per
    /// continuous excursion, when the count reaches the limit.
    pub fn track_out_of_bounds(&mut self, id: PuckId, y: f32) -> bool {
        if y >= 0.0 {
            self.out_of_bounds.remove(&id);
            return false;
        }
        let limit = self.thresholds.out_of_bounds_ticks;
        let state = self.out_of_bounds.entry(id).or_default();
        state.ticks += 1;
        if state.ticks >= limit && !state.reported {
            state.reported = true;
            return true;
        }
        false
    }

    /// Drop every timer held for `id`.
    pub fn forget(&mut self, id: PuckId) {
        self.settle_timers.remove(&id);
        self.stuck_timers.remove(&id);
        self.auto_shove_attempts.remove(&id);
        self.active_ticks.remove(&id);
        self.out_of_bounds.remove(&id);
    }

    /// Drop all bookkeeping.
    pub fn reset(&mut self) {
        self.settle_timers.clear();
        self.stuck_timers.clear();
        self.auto_shove_attempts.clear();
        self.active_ticks.clear();
        self.out_of_bounds.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_tracking(&self, id: PuckId) -> bool {
        self.settle_timers.contains_key(&id)
            || self.stuck_timers.contains_key(&id)
            || self.auto_shove_attempts.contains_key(&id)
            || self.active_ticks.contains_key(&id)
            || self.out_of_bounds.contains_key(&id)
    }

    fn settle(&mut self, obs: &PuckObservation, reason: SettleReason) -> Verdict {
        self.forget(obs.id);
        Verdict::Settle {
            bucket: self.bucket_at(obs.position.x),
            reason,
        }
    }

    fn check_displacement(&mut self, obs: &PuckObservation) -> Verdict {
        let Some(from_bucket) = obs.settled_bucket else {
            return Verdict::Unchanged;
        };
        if !obs.scored || obs.sleeping {
            return Verdict::Unchanged;
        }
        let t = &self.thresholds;
        if obs.velocity.length() <= t.stall_velocity * DISPLACEMENT_SPEED_FACTOR {
            return Verdict::Unchanged;
        }
        let above_margin = obs.position.y < t.settle_zone_top;
        let moved_bucket = from_bucket != self.bucket_at(obs.position.x);
        if above_margin || moved_bucket {
            self.forget(obs.id);
            return Verdict::Displaced { from_bucket };
        }
        Verdict::Unchanged
    }
}

/// Left, right, straight down, repeating.
pub fn auto_shove_direction(attempt_index: u32) -> Vec2 {
    match attempt_index % 3 {
        0 => Vec2::NEG_X,
        1 => Vec2::X,
        _ => Vec2::Y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> BucketDetector {
        BucketDetector::new(&BoardLayout::default(), &PhysicsConfig::default())
    }

    fn obs(position: Vec2, velocity: Vec2) -> PuckObservation {
        PuckObservation {
            id: PuckId(1),
            position,
            velocity,
            sleeping: false,
            settled: false,
            settled_bucket: None,
            scored: false,
        }
    }

    /// Well above the bucket margin, in the pin field.
    fn pin_field() -> Vec2 {
        Vec2::new(300.0, 300.0)
    }

    /// Resting on the floor of bucket 3.
    fn bucket_floor() -> Vec2 {
        Vec2::new(300.0, 785.0)
    }

    #[test]
    fn settle_hold_is_half_a_second() {
        assert_eq!(detector().settle_ticks(), 30);
    }

    #[test]
    fn sleeping_puck_settles_immediately() {
        let mut d = detector();
        let mut o = obs(pin_field(), Vec2::ZERO);
        o.sleeping = true;
        assert_eq!(
            d.classify(&o),
            Verdict::Settle { bucket: 3, reason: SettleReason::Sleep }
        );
    }

    #[test]
    fn resting_in_bucket_settles_after_hold() {
        let mut d = detector();
        let o = obs(bucket_floor(), Vec2::new(1.0, 0.0));
        for _ in 0..29 {
            assert_eq!(d.classify(&o), Verdict::Unchanged);
        }
        assert_eq!(
            d.classify(&o),
            Verdict::Settle { bucket: 3, reason: SettleReason::Rest }
        );
    }

    #[test]
    fn movement_in_bucket_restarts_hold() {
        let mut d = detector();
        let slow = obs(bucket_floor(), Vec2::ZERO);
        let fast = obs(bucket_floor(), Vec2::new(0.0, 50.0));
        for _ in 0..20 {
            d.classify(&slow);
        }
        d.classify(&fast);
        for _ in 0..29 {
            assert_eq!(d.classify(&slow), Verdict::Unchanged);
        }
        assert!(matches!(d.classify(&slow), Verdict::Settle { .. }));
    }

    #[test]
    fn stuck_puck_gets_cycling_auto_shoves_then_forced_settle() {
        let mut d = detector();
        let stuck = obs(pin_field(), Vec2::new(2.0, 0.0));
        let stuck_ticks = PhysicsConfig::default().stuck_ticks;

        let mut shoves = Vec::new();
        let mut verdict = Verdict::Unchanged;
        for _ in 0..(stuck_ticks + 1) * 4 {
            verdict = d.classify(&stuck);
            match verdict {
                Verdict::AutoShove(e) => shoves.push(e),
                Verdict::Settle { .. } => break,
                _ => {}
            }
        }

        assert_eq!(shoves.len(), 3);
        assert_eq!(
            shoves.iter().map(|s| s.attempt_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(shoves[0].direction, Vec2::NEG_X);
        assert_eq!(shoves[1].direction, Vec2::X);
        assert_eq!(shoves[2].direction, Vec2::Y);
        assert_eq!(
            verdict,
            Verdict::Settle { bucket: 3, reason: SettleReason::AutoShoveExhausted }
        );
    }

    #[test]
    fn fast_tick_clears_stuck_timer() {
        let mut d = detector();
        let stuck_ticks = PhysicsConfig::default().stuck_ticks;
        let slow = obs(pin_field(), Vec2::ZERO);
        let fast = obs(pin_field(), Vec2::new(0.0, 100.0));
        for _ in 0..stuck_ticks {
            assert_eq!(d.classify(&slow), Verdict::Unchanged);
        }
        d.classify(&fast);
        for _ in 0..stuck_ticks {
            assert_eq!(d.classify(&slow), Verdict::Unchanged);
        }
        assert!(matches!(d.classify(&slow), Verdict::AutoShove(_)));
    }

    #[test]
    fn stall_timeout_forces_settlement() {
        let physics = PhysicsConfig { stall_timeout_ms: 1000.0, ..PhysicsConfig::default() };
        let mut d = BucketDetector::new(&BoardLayout::default(), &physics);
        // Bouncing around fast enough never to stall
        let busy = obs(pin_field(), Vec2::new(0.0, 100.0));
        let ticks = (1000.0 / physics.fixed_timestep_ms).ceil() as u32;
        for _ in 0..ticks - 1 {
            assert_eq!(d.classify(&busy), Verdict::Unchanged);
        }
        assert_eq!(
            d.classify(&busy),
            Verdict::Settle { bucket: 3, reason: SettleReason::Timeout }
        );
    }

    #[test]
    fn displaced_when_knocked_into_other_bucket() {
        let mut d = detector();
        let mut o = obs(Vec2::new(30.0, 785.0), Vec2::new(80.0, 0.0));
        o.settled = true;
        o.scored = true;
        o.settled_bucket = Some(3);
        assert_eq!(d.classify(&o), Verdict::Displaced { from_bucket: 3 });
    }

    #[test]
    fn displaced_when_knocked_above_margin() {
        let mut d = detector();
        let mut o = obs(Vec2::new(300.0, 500.0), Vec2::new(0.0, -80.0));
        o.settled = true;
        o.scored = true;
        o.settled_bucket = Some(3);
        assert_eq!(d.classify(&o), Verdict::Displaced { from_bucket: 3 });
    }

    #[test]
    fn slow_or_sleeping_settled_puck_stays() {
        let mut d = detector();
        let mut o = obs(Vec2::new(30.0, 785.0), Vec2::new(30.0, 0.0));
        o.settled = true;
        o.scored = true;
        o.settled_bucket = Some(3);
        // 30 < 5 × 8
        assert_eq!(d.classify(&o), Verdict::Unchanged);

        o.velocity = Vec2::new(100.0, 0.0);
        o.sleeping = true;
        assert_eq!(d.classify(&o), Verdict::Unchanged);
    }

    #[test]
    fn jostled_within_own_bucket_stays() {
        let mut d = detector();
        let mut o = obs(bucket_floor(), Vec2::new(100.0, 0.0));
        o.settled = true;
        o.scored = true;
        o.settled_bucket = Some(3);
        assert_eq!(d.classify(&o), Verdict::Unchanged);
    }

    #[test]
    fn out_of_bounds_reported_once_per_excursion() {
        let mut d = detector();
        let id = PuckId(1);
        for _ in 0..29 {
            assert!(!d.track_out_of_bounds(id, -5.0));
        }
        assert!(d.track_out_of_bounds(id, -5.0));
        for _ in 0..100 {
            assert!(!d.track_out_of_bounds(id, -5.0));
        }
        // Back in bounds re-arms
        assert!(!d.track_out_of_bounds(id, 10.0));
        for _ in 0..29 {
            assert!(!d.track_out_of_bounds(id, -5.0));
        }
        assert!(d.track_out_of_bounds(id, -5.0));
    }

    #[test]
    fn brief_bounce_above_top_is_debounced() {
        let mut d = detector();
        let id = PuckId(1);
        for _ in 0..20 {
            assert!(!d.track_out_of_bounds(id, -5.0));
        }
        assert!(!d.track_out_of_bounds(id, 5.0));
        for _ in 0..20 {
            assert!(!d.track_out_of_bounds(id, -5.0));
        }
    }
}
