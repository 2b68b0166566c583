//! Same-owner growth.
//!
//! Area grows by `surface_area_growth_factor`, so radius grows by its square
//! root, up to a hard cap. Shapes are swapped in place on the existing
//! collider; the new size takes effect on the next integration step.

use crate::api::events::{GrowthEvent, GrowthOutcome};
use crate::api::types::PuckId;
use crate::config::GrowthConfig;
use crate::core::physics::PhysicsWorld;
use crate::core::scene::PuckArena;

/// `min(r × √factor, max_puck_radius)`.
pub fn grown_radius(radius: f32, config: &GrowthConfig) -> f32 {
    (radius * config.surface_area_growth_factor.sqrt()).min(config.max_puck_radius)
}

/// Grow one puck if it is below the cap. Returns the new radius when it grew.
pub fn grow_puck(
    id: PuckId,
    pucks: &mut PuckArena,
    world: &mut PhysicsWorld,
    config: &GrowthConfig,
) -> Option<f32> {
    let puck = pucks.get_mut(id)?;
    if puck.current_radius >= config.max_puck_radius {
        return None;
    }
    let radius = grown_radius(puck.current_radius, config);
    if radius <= puck.current_radius {
        return None;
    }
    world.set_ball_radius(&puck.body, radius);
    puck.current_radius = radius;
    puck.growth_count += 1;
    Some(radius)
}

/// Process a batch of growth events in order.
///
/// Events at or past the chain-depth cap, events naming a puck that no longer
/// exists, and contacts between different owners are dropped. An event is
/// reported only if at least one of its pucks actually grew.
pub fn process_growth_events(
    events: &[GrowthEvent],
    pucks: &mut PuckArena,
    world: &mut PhysicsWorld,
    config: &GrowthConfig,
) -> Vec<GrowthOutcome> {
    let mut processed = Vec::new();
    for event in events {
        if event.chain_depth >= config.max_chain_depth {
            log::debug!(
                "growth {}+{} dropped at chain depth {}",
                event.puck_a,
                event.puck_b,
                event.chain_depth
            );
            continue;
        }
        let owners = pucks
            .get(event.puck_a)
            .map(|p| p.player_id)
            .zip(pucks.get(event.puck_b).map(|p| p.player_id));
        match owners {
            Some((a, b)) if a == b => {}
            _ => continue,
        }

        let mut grown = Vec::with_capacity(2);
        if let Some(r) = grow_puck(event.puck_a, pucks, world, config) {
            grown.push((event.puck_a, r));
        }
        if event.puck_b != event.puck_a {
            if let Some(r) = grow_puck(event.puck_b, pucks, world, config) {
                grown.push((event.puck_b, r));
            }
        }

        if !grown.is_empty() {
            log::debug!(
                "growth {}+{} (depth {}): {:?}",
                event.puck_a,
                event.puck_b,
                event.chain_depth,
                grown
            );
            processed.push(GrowthOutcome { event: *event, grown });
        }
    }
    processed
}
