//! The board simulation: the only place physics state is mutated.
//!
//! One call to [`PhysicsSimulation::step`] runs the fixed pipeline
//! integration → contact classification → bucket detection → growth and
//! returns everything that happened as a [`StepResult`]. Pucks are visited in
//! drop order at every stage so identical call sequences replay identically.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::api::events::{
    ContactEvent, ContactTarget, GrowthEvent, OutOfBoundsEvent, ScoreRevocationEvent,
    SettledPuck, StepResult,
};
use crate::api::types::{PlayerId, PuckId};
use crate::board::geometry::{self, Bucket};
use crate::components::puck::PuckBody;
use crate::config::{BoardLayout, GameConfig, SurfaceMaterial};
use crate::core::physics::{
    BodyDesc, BodyTag, ColliderDesc, ColliderMaterial, CollisionPair, PhysicsBody, PhysicsWorld,
};
use crate::core::scene::PuckArena;
use crate::error::ConfigError;
use crate::systems::bucket::{BucketDetector, PuckObservation, Verdict};
use crate::systems::{growth, scoring};

/// Read-only view of one puck for renderers and the session driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuckState {
    pub id: PuckId,
    pub player_id: PlayerId,
    pub turn_index: u32,
    pub position: Vec2,
    pub angle: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub radius: f32,
    pub growth_count: u32,
    pub bounce_count: u32,
    pub is_settled: bool,
    pub settled_in_bucket: Option<usize>,
    pub score_awarded: u32,
    pub bounce_multiplier: f64,
    pub sleeping: bool,
    /// At or above the shove line, so a shove would be accepted if unsettled.
    pub in_shove_zone: bool,
}

/// Every puck on the board at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub tick: u64,
    pub shove_zone_y: f32,
    pub pucks: Vec<PuckState>,
}

/// Static geometry for drawing the board. Changes only on rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardGeometry {
    pub width: f32,
    pub height: f32,
    pub pin_radius: f32,
    pub pins: Vec<Vec2>,
    pub buckets: Vec<Bucket>,
    pub bucket_top_y: f32,
    pub shove_zone_y: f32,
}

pub struct PhysicsSimulation {
    config: GameConfig,
    layout: BoardLayout,
    world: PhysicsWorld,
    pucks: PuckArena,
    /// Pins, walls and dividers. Replaced wholesale on rebuild.
    statics: Vec<PhysicsBody>,
    detector: BucketDetector,
    shove_zone_y: f32,
    tick: u64,
    /// Chain depth and tick of each puck's most recent growth.
    recent_growth: HashMap<PuckId, (u32, u64)>,
    collisions: Vec<CollisionPair>,
}

fn material(surface: &SurfaceMaterial, density: f32) -> ColliderMaterial {
    ColliderMaterial {
        restitution: surface.restitution,
        friction: surface.friction,
        density,
    }
}

impl PhysicsSimulation {
    /// Validate `config` and build the world for its base layout.
    pub fn create_world(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let physics = &config.physics;
        let mut world = PhysicsWorld::new(physics.gravity);
        world.set_dt(physics.fixed_timestep_secs());
        world.set_solver_iterations(physics.solver_iterations, physics.friction_iterations);
        world.set_length_unit(physics.length_unit);

        let layout = config.layout.clone();
        let detector = BucketDetector::new(&layout, physics);
        let mut sim = Self {
            shove_zone_y: geometry::shove_zone_y(&layout, layout.shove_row_limit),
            layout,
            world,
            pucks: PuckArena::new(),
            statics: Vec::new(),
            detector,
            tick: 0,
            recent_growth: HashMap::new(),
            collisions: Vec::with_capacity(32),
            config,
        };
        sim.build_statics();
        log::info!(
            "board created: {}x{}, {} buckets, {} static bodies",
            sim.layout.width,
            sim.layout.height,
            sim.layout.bucket_count,
            sim.statics.len()
        );
        Ok(sim)
    }

    /// Spawn a puck above the first pin row. Out-of-range X is clamped inside
    /// the walls; this never fails.
    pub fn drop_puck(&mut self, x: f32, player_id: PlayerId, turn_index: u32) -> PuckId {
        let x = geometry::clamp_drop_x(&self.layout, x);
        let y = geometry::drop_y(&self.layout);
        let radius = self.layout.puck_radius;
        let physics = &self.config.physics;

        let id = self.pucks.next_id();
        let body = self.world.create_body(
            BodyTag::Puck(id),
            &BodyDesc::dynamic(ColliderDesc::Ball { radius })
                .with_position(Vec2::new(x, y))
                .with_ccd(true)
                .with_angular_damping(physics.angular_damping),
            material(&physics.puck_material, physics.puck_density),
        );
        self.pucks
            .spawn(PuckBody::new(id, player_id, body, radius).with_turn_index(turn_index));
        log::debug!("{} dropped by {} at x={:.1}", id, player_id, x);
        id
    }

    /// Nudge a puck in flight. Accepted only for an existing, unsettled puck
    /// at or above the shove line. The vector is a velocity change, clamped to
    /// `max_shove_speed`, applied off-centre to add spin.
    pub fn apply_shove(&mut self, id: PuckId, vector: Vec2) -> bool {
        let Some(puck) = self.pucks.get(id) else {
            log::warn!("shove for unknown {}", id);
            return false;
        };
        if puck.is_settled || !vector.is_finite() {
            return false;
        }
        let (position, _) = self.world.body_position(&puck.body);
        if position.y > self.shove_zone_y {
            return false;
        }

        let physics = &self.config.physics;
        let delta_v = vector.clamp_length_max(physics.max_shove_speed);
        let impulse = delta_v * self.world.mass(&puck.body);
        let spin = physics.shove_spin_fraction;
        if spin != 0.0 && delta_v != Vec2::ZERO {
            let offset = delta_v.normalize().perp() * puck.current_radius * spin;
            self.world
                .apply_impulse_at_point(&puck.body, impulse, position + offset);
        } else {
            self.world.apply_impulse(&puck.body, impulse);
        }
        true
    }

    /// Advance one fixed timestep.
    pub fn step(&mut self) -> StepResult {
        self.tick += 1;
        let mut result = StepResult {
            tick: self.tick,
            ..StepResult::default()
        };

        let mut collisions = std::mem::take(&mut self.collisions);
        collisions.clear();
        self.world.step_into(&mut collisions);

        let max_spin = self.config.physics.max_angular_velocity;
        for puck in self.pucks.iter() {
            self.world.clamp_angular_velocity(&puck.body, max_spin);
        }

        let growth_events = self.classify_contacts(&collisions, &mut result);
        self.collisions = collisions;

        self.run_detector(&mut result);

        result.growths = growth::process_growth_events(
            &growth_events,
            &mut self.pucks,
            &mut self.world,
            &self.config.growth,
        );
        for outcome in &result.growths {
            for (id, _) in &outcome.grown {
                self.recent_growth
                    .insert(*id, (outcome.event.chain_depth, self.tick));
            }
        }
        let window = u64::from(self.config.growth.chain_window_ticks);
        let now = self.tick;
        self.recent_growth
            .retain(|_, (_, grown_at)| now - *grown_at <= window);

        result
    }

    /// Replace every static body with the geometry of `layout`. Pucks stay
    /// where they are and are woken; detector timers start over.
    pub fn rebuild_board(&mut self, layout: BoardLayout) -> Result<(), ConfigError> {
        layout.validate()?;
        for body in self.statics.drain(..) {
            self.world.remove_body(&body);
        }
        self.layout = layout;
        self.shove_zone_y = geometry::shove_zone_y(&self.layout, self.layout.shove_row_limit);
        self.detector = BucketDetector::new(&self.layout, &self.config.physics);
        self.build_statics();
        for puck in self.pucks.iter() {
            self.world.wake(&puck.body);
        }
        log::info!(
            "board rebuilt: {} buckets, shove line y={:.1}, {} pucks kept",
            self.layout.bucket_count,
            self.shove_zone_y,
            self.pucks.len()
        );
        Ok(())
    }

    /// Remove every puck. Ids keep counting.
    pub fn clear_pucks(&mut self) {
        for puck in self.pucks.drain() {
            self.world.remove_body(&puck.body);
        }
        self.detector.reset();
        self.recent_growth.clear();
        log::debug!("pucks cleared");
    }

    /// Move a puck and set its velocity directly, waking it. Gameplay never
    /// does this; tests and tooling use it to stage positions.
    pub fn teleport_puck(&mut self, id: PuckId, position: Vec2, velocity: Vec2) -> bool {
        let Some(puck) = self.pucks.get(id) else {
            return false;
        };
        self.world.set_position(&puck.body, position);
        self.world.set_velocity(&puck.body, velocity);
        true
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            tick: self.tick,
            shove_zone_y: self.shove_zone_y,
            pucks: self.pucks.iter().map(|p| self.state_of(p)).collect(),
        }
    }

    pub fn puck_state(&self, id: PuckId) -> Option<PuckState> {
        self.pucks.get(id).map(|p| self.state_of(p))
    }

    pub fn board_geometry(&self) -> BoardGeometry {
        BoardGeometry {
            width: self.layout.width,
            height: self.layout.height,
            pin_radius: self.layout.pin_radius,
            pins: geometry::pin_positions(&self.layout),
            buckets: geometry::bucket_boundaries(&self.layout),
            bucket_top_y: geometry::bucket_top_y(&self.layout),
            shove_zone_y: self.shove_zone_y,
        }
    }

    // -- Accessors --

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn shove_zone_y(&self) -> f32 {
        self.shove_zone_y
    }

    pub fn pucks(&self) -> &[PuckBody] {
        self.pucks.as_slice()
    }

    pub fn puck(&self, id: PuckId) -> Option<&PuckBody> {
        self.pucks.get(id)
    }

    /// True when every puck on the board is settled (vacuously true when empty).
    pub fn all_settled(&self) -> bool {
        self.pucks.iter().all(|p| p.is_settled)
    }

    /// Rigid bodies in the world, static geometry included.
    pub fn body_count(&self) -> usize {
        self.world.body_count()
    }

    // -- private helpers --

    fn build_statics(&mut self) {
        let physics = &self.config.physics;
        let layout = &self.layout;

        let pin_material = material(&physics.pin_material, 1.0);
        for (i, pin) in geometry::pin_positions(layout).into_iter().enumerate() {
            self.statics.push(self.world.create_body(
                BodyTag::Pin(i as u32),
                &BodyDesc::fixed(ColliderDesc::Ball { radius: layout.pin_radius })
                    .with_position(pin),
                pin_material,
            ));
        }

        let wall_material = material(&physics.wall_material, 1.0);
        for (i, wall) in geometry::wall_segments(layout).iter().enumerate() {
            self.statics.push(self.world.create_body(
                BodyTag::Wall(i as u32),
                &BodyDesc::fixed(ColliderDesc::Cuboid {
                    half_width: wall.half_extents.x,
                    half_height: wall.half_extents.y,
                })
                .with_position(wall.center),
                wall_material,
            ));
        }

        let divider_material = material(&physics.divider_material, 1.0);
        for (i, divider) in geometry::divider_segments(layout).iter().enumerate() {
            self.statics.push(self.world.create_body(
                BodyTag::Divider(i as u32),
                &BodyDesc::fixed(ColliderDesc::Cuboid {
                    half_width: divider.half_extents.x,
                    half_height: divider.half_extents.y,
                })
                .with_position(divider.center),
                divider_material,
            ));
        }
    }

    /// Depth a new contact between `a` and `b` inherits from recent growth.
    fn chain_depth_for(&self, a: PuckId, b: PuckId) -> u32 {
        let window = u64::from(self.config.growth.chain_window_ticks);
        [a, b]
            .iter()
            .filter_map(|id| self.recent_growth.get(id))
            .filter(|(_, grown_at)| self.tick - grown_at <= window)
            .map(|(depth, _)| depth + 1)
            .max()
            .unwrap_or(0)
    }

    /// Turn started contacts into contact events, bounce counts and pending
    /// same-owner growth.
    fn classify_contacts(
        &mut self,
        collisions: &[CollisionPair],
        result: &mut StepResult,
    ) -> Vec<GrowthEvent> {
        let mut growth_events = Vec::new();
        for pair in collisions.iter().filter(|c| c.started) {
            match (pair.tag_a, pair.tag_b) {
                (BodyTag::Puck(a), BodyTag::Puck(b)) => {
                    let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
                    let (Some(pa), Some(pb)) = (self.pucks.get(lo), self.pucks.get(hi)) else {
                        continue;
                    };
                    result.contacts.push(ContactEvent {
                        puck: lo,
                        target: ContactTarget::Puck(hi),
                    });
                    if pa.player_id == pb.player_id {
                        growth_events.push(GrowthEvent {
                            puck_a: lo,
                            puck_b: hi,
                            player_id: pa.player_id,
                            chain_depth: self.chain_depth_for(lo, hi),
                        });
                    }
                }
                (BodyTag::Puck(id), other) | (other, BodyTag::Puck(id)) => {
                    let target = match other {
                        BodyTag::Pin(i) => ContactTarget::Pin(i),
                        BodyTag::Wall(i) => ContactTarget::Wall(i),
                        BodyTag::Divider(i) => ContactTarget::Divider(i),
                        BodyTag::Puck(_) => continue,
                    };
                    let Some(puck) = self.pucks.get_mut(id) else {
                        continue;
                    };
                    if matches!(target, ContactTarget::Pin(_)) && !puck.is_settled {
                        puck.bounce_count += 1;
                    }
                    result.contacts.push(ContactEvent { puck: id, target });
                }
                _ => {}
            }
        }
        growth_events
    }

    fn run_detector(&mut self, result: &mut StepResult) {
        let physics = &self.config.physics;
        for puck in self.pucks.iter_mut() {
            let (position, _) = self.world.body_position(&puck.body);

            if self.detector.track_out_of_bounds(puck.id, position.y) {
                log::debug!("{} out of bounds at {:?}", puck.id, position);
                result.out_of_bounds.push(OutOfBoundsEvent {
                    puck_id: puck.id,
                    player_id: puck.player_id,
                    position,
                });
            }

            let observation = PuckObservation {
                id: puck.id,
                position,
                velocity: self.world.velocity(&puck.body),
                sleeping: self.world.is_sleeping(&puck.body),
                settled: puck.is_settled,
                settled_bucket: puck.settled_in_bucket,
                scored: puck.is_scored(),
            };

            match self.detector.classify(&observation) {
                Verdict::Unchanged => {}
                Verdict::Settle { bucket, reason } => {
                    let multiplier = scoring::bounce_multiplier(puck.bounce_count, &self.config.scoring);
                    let score = match scoring::score_for_bucket(&self.layout.bucket_scores, bucket) {
                        Ok(base) => scoring::apply_multiplier(base, multiplier),
                        Err(e) => {
                            log::warn!("{} settled without a score: {}", puck.id, e);
                            0
                        }
                    };
                    puck.settle(bucket, multiplier, score);
                    log::debug!(
                        "{} settled in bucket {} ({:?}): {} bounces, x{:.3}, {} points",
                        puck.id,
                        bucket,
                        reason,
                        puck.bounce_count,
                        multiplier,
                        score
                    );
                    result.settled.push(SettledPuck {
                        puck_id: puck.id,
                        player_id: puck.player_id,
                        bucket,
                        bounce_count: puck.bounce_count,
                        bounce_multiplier: multiplier,
                        score,
                        reason,
                    });
                }
                Verdict::AutoShove(event) => {
                    let impulse =
                        event.direction * physics.auto_shove_speed * self.world.mass(&puck.body);
                    self.world.apply_impulse(&puck.body, impulse);
                    log::debug!(
                        "{} auto-shoved (attempt {}) toward {:?}",
                        puck.id,
                        event.attempt_index,
                        event.direction
                    );
                    result.auto_shoves.push(event);
                }
                Verdict::Displaced { from_bucket } => {
                    let revoked_score = puck.unsettle();
                    log::debug!(
                        "{} displaced from bucket {}, revoking {}",
                        puck.id,
                        from_bucket,
                        revoked_score
                    );
                    result.revocations.push(ScoreRevocationEvent {
                        puck_id: puck.id,
                        player_id: puck.player_id,
                        revoked_score,
                        from_bucket,
                        position,
                    });
                }
            }
        }
    }

    fn state_of(&self, puck: &PuckBody) -> PuckState {
        let (position, angle) = self.world.body_position(&puck.body);
        PuckState {
            id: puck.id,
            player_id: puck.player_id,
            turn_index: puck.turn_index,
            position,
            angle,
            velocity: self.world.velocity(&puck.body),
            angular_velocity: self.world.angular_velocity(&puck.body),
            radius: puck.current_radius,
            growth_count: puck.growth_count,
            bounce_count: puck.bounce_count,
            is_settled: puck.is_settled,
            settled_in_bucket: puck.settled_in_bucket,
            score_awarded: puck.score_awarded,
            bounce_multiplier: puck.bounce_multiplier,
            sleeping: self.world.is_sleeping(&puck.body),
            in_shove_zone: position.y <= self.shove_zone_y,
        }
    }
}
