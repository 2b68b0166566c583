//! Game configuration, passed in-process or parsed from JSON.
//!
//! Every section has a `Default` carrying the reference tuning, and every
//! field is `#[serde(default)]` so a JSON document only needs the overrides.
//! Coordinates are Y-down: the board's top edge is `y = 0` and the bucket
//! floor is `y = height`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pin grid, bucket table and board dimensions. Immutable per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardLayout {
    pub width: f32,
    pub height: f32,
    pub pin_rows: u32,
    /// Pins on even rows; odd rows carry one fewer.
    pub pins_per_row: u32,
    /// Horizontal distance between neighbouring pins in a row.
    pub pin_spacing: f32,
    /// Distance from the top edge to the first pin row (the drop zone).
    pub top_margin: f32,
    /// Distance from the last pin row to the bucket floor.
    pub bottom_margin: f32,
    /// Height of the bucket divider posts above the floor.
    pub divider_height: f32,
    pub pin_radius: f32,
    pub puck_radius: f32,
    pub wall_thickness: f32,
    pub bucket_count: usize,
    /// Score per bucket, left to right. Length must equal `bucket_count`.
    pub bucket_scores: Vec<u32>,
    /// Optional relative bucket widths. Equal spans when absent.
    pub bucket_fractions: Option<Vec<f32>>,
    /// Shoves are legal only above pin row `shove_row_limit - 1`.
    pub shove_row_limit: u32,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 800.0,
            pin_rows: 12,
            pins_per_row: 9,
            pin_spacing: 60.0,
            top_margin: 120.0,
            bottom_margin: 130.0,
            divider_height: 80.0,
            pin_radius: 5.0,
            puck_radius: 14.0,
            wall_thickness: 20.0,
            bucket_count: 7,
            bucket_scores: vec![1000, 250, 100, 500, 100, 250, 1000],
            bucket_fractions: None,
            shove_row_limit: 6,
        }
    }
}

impl BoardLayout {
    /// Check structural invariants. Called once at setup, never per tick.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("width", self.width),
            ("height", self.height),
            ("pin_spacing", self.pin_spacing),
            ("pin_radius", self.pin_radius),
            ("puck_radius", self.puck_radius),
            ("wall_thickness", self.wall_thickness),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidDimension { field, value });
            }
        }
        for (field, value) in [
            ("top_margin", self.top_margin),
            ("bottom_margin", self.bottom_margin),
            ("divider_height", self.divider_height),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidDimension { field, value });
            }
        }
        if self.top_margin + self.bottom_margin >= self.height {
            return Err(ConfigError::MarginsExceedHeight {
                top: self.top_margin,
                bottom: self.bottom_margin,
                height: self.height,
            });
        }
        if self.pin_rows == 0 || self.pins_per_row == 0 {
            return Err(ConfigError::EmptyPinGrid);
        }
        if self.bucket_count < 2 {
            return Err(ConfigError::TooFewBuckets(self.bucket_count));
        }
        if self.bucket_scores.len() != self.bucket_count {
            return Err(ConfigError::BucketScoreMismatch {
                expected: self.bucket_count,
                actual: self.bucket_scores.len(),
            });
        }
        if let Some(fractions) = &self.bucket_fractions {
            if fractions.len() != self.bucket_count {
                return Err(ConfigError::BucketFractionMismatch {
                    expected: self.bucket_count,
                    actual: fractions.len(),
                });
            }
            if fractions.iter().any(|f| !(f.is_finite() && *f > 0.0)) {
                return Err(ConfigError::InvalidBucketFraction);
            }
        }
        Ok(())
    }
}

/// Restitution and friction for one class of collider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMaterial {
    pub restitution: f32,
    pub friction: f32,
}

/// Rigid-body tuning and the settlement/stall thresholds the detector uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Y-down: positive Y pulls pucks toward the buckets.
    pub gravity: Vec2,
    pub fixed_timestep_ms: f32,
    pub solver_iterations: usize,
    pub friction_iterations: usize,
    /// World units per meter, so sleep and contact tolerances scale with pixel boards.
    pub length_unit: f32,
    pub pin_material: SurfaceMaterial,
    pub wall_material: SurfaceMaterial,
    pub divider_material: SurfaceMaterial,
    pub puck_material: SurfaceMaterial,
    pub puck_density: f32,
    pub angular_damping: f32,
    /// Angular speed cap in rad/s, enforced after every integration step.
    pub max_angular_velocity: f32,
    /// Below this speed a puck in the bucket-floor margin counts as resting.
    pub stall_velocity_threshold: f32,
    /// Looser threshold: below this speed outside the margin a puck is a stuck candidate.
    pub auto_shove_velocity_threshold: f32,
    /// Ticks a stuck candidate waits before being auto-shoved.
    pub stuck_ticks: u32,
    pub max_auto_shoves: u32,
    /// Velocity change applied by one auto-shove.
    pub auto_shove_speed: f32,
    /// Fallback: any puck unsettled this long (simulated ms) is force-settled.
    pub stall_timeout_ms: f32,
    /// How far above the divider tops still counts as "in the buckets".
    pub settle_margin: f32,
    /// Consecutive ticks above the top edge before an out-of-bounds event.
    pub out_of_bounds_ticks: u32,
    /// Maximum velocity change a player shove can apply.
    pub max_shove_speed: f32,
    /// Off-centre application point as a fraction of puck radius. 0 disables spin.
    pub shove_spin_fraction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 981.0),
            fixed_timestep_ms: 1000.0 / 60.0,
            solver_iterations: 4,
            friction_iterations: 4,
            length_unit: 100.0,
            pin_material: SurfaceMaterial { restitution: 0.5, friction: 0.1 },
            wall_material: SurfaceMaterial { restitution: 0.4, friction: 0.2 },
            divider_material: SurfaceMaterial { restitution: 0.3, friction: 0.3 },
            puck_material: SurfaceMaterial { restitution: 0.35, friction: 0.3 },
            puck_density: 1.0,
            angular_damping: 0.5,
            max_angular_velocity: 25.0,
            stall_velocity_threshold: 8.0,
            auto_shove_velocity_threshold: 20.0,
            stuck_ticks: 90,
            max_auto_shoves: 3,
            auto_shove_speed: 220.0,
            stall_timeout_ms: 15_000.0,
            settle_margin: 40.0,
            out_of_bounds_ticks: 30,
            max_shove_speed: 600.0,
            shove_spin_fraction: 0.3,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep_ms.is_finite() && self.fixed_timestep_ms > 0.0) {
            return Err(ConfigError::InvalidTimestep(self.fixed_timestep_ms));
        }
        Ok(())
    }

    pub fn fixed_timestep_secs(&self) -> f32 {
        self.fixed_timestep_ms / 1000.0
    }
}

/// Same-owner growth tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    /// Area multiplier per growth. Radius scales by its square root.
    pub surface_area_growth_factor: f32,
    pub max_puck_radius: f32,
    /// Events at this depth or deeper are never processed.
    pub max_chain_depth: u32,
    /// A contact started within this many ticks of a growth continues that growth's chain.
    pub chain_window_ticks: u32,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            surface_area_growth_factor: 1.2,
            max_puck_radius: 28.0,
            max_chain_depth: 3,
            chain_window_ticks: 30,
        }
    }
}

/// Bounce multiplier: `min(rate^bounces, cap)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub bounce_multiplier_rate: f64,
    pub bounce_multiplier_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            bounce_multiplier_rate: 1.15,
            bounce_multiplier_cap: 10.0,
        }
    }
}

/// Round and roster limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub total_rounds: u32,
    pub max_tie_breakers: u32,
    pub max_players: usize,
    /// Layout for round N at index N-1. Rounds past the end reuse the base layout.
    pub round_layouts: Vec<BoardLayout>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            max_tie_breakers: 3,
            max_players: 8,
            round_layouts: Vec::new(),
        }
    }
}

/// Top-level configuration bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub layout: BoardLayout,
    pub physics: PhysicsConfig,
    pub growth: GrowthConfig,
    pub scoring: ScoringConfig,
    pub session: SessionConfig,
}

impl GameConfig {
    /// Parse a configuration from a JSON string. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        for layout in &self.session.round_layouts {
            layout.validate()?;
        }
        self.physics.validate()?;
        if !(self.growth.surface_area_growth_factor >= 1.0) {
            return Err(ConfigError::InvalidGrowthFactor(self.growth.surface_area_growth_factor));
        }
        if !(self.scoring.bounce_multiplier_rate >= 1.0 && self.scoring.bounce_multiplier_cap >= 1.0) {
            return Err(ConfigError::InvalidBounceMultiplier);
        }
        Ok(())
    }

    /// Layout for a 1-based round number.
    pub fn layout_for_round(&self, round: u32) -> &BoardLayout {
        round
            .checked_sub(1)
            .and_then(|i| self.session.round_layouts.get(i as usize))
            .unwrap_or(&self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(GameConfig::default().validate(), Ok(()));
    }

    #[test]
    fn score_count_must_match_bucket_count() {
        let mut layout = BoardLayout::default();
        layout.bucket_scores.pop();
        assert_eq!(
            layout.validate(),
            Err(ConfigError::BucketScoreMismatch { expected: 7, actual: 6 })
        );
    }

    #[test]
    fn needs_two_buckets() {
        let layout = BoardLayout {
            bucket_count: 1,
            bucket_scores: vec![100],
            ..BoardLayout::default()
        };
        assert_eq!(layout.validate(), Err(ConfigError::TooFewBuckets(1)));
    }

    #[test]
    fn fractions_are_checked() {
        let mut layout = BoardLayout::default();
        layout.bucket_fractions = Some(vec![1.0; 3]);
        assert!(matches!(
            layout.validate(),
            Err(ConfigError::BucketFractionMismatch { expected: 7, actual: 3 })
        ));
        layout.bucket_fractions = Some(vec![1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(layout.validate(), Err(ConfigError::InvalidBucketFraction));
    }

    #[test]
    fn zero_timestep_rejected() {
        let mut config = GameConfig::default();
        config.physics.fixed_timestep_ms = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimestep(0.0)));
    }

    #[test]
    fn parse_partial_json() {
        let json = r#"{
            "layout": { "bucket_count": 3, "bucket_scores": [10, 20, 10] },
            "session": { "total_rounds": 2 }
        }"#;
        let config = GameConfig::from_json(json).unwrap();
        assert_eq!(config.layout.bucket_scores, vec![10, 20, 10]);
        assert_eq!(config.layout.pin_rows, BoardLayout::default().pin_rows);
        assert_eq!(config.session.total_rounds, 2);
        assert_eq!(config.session.max_tie_breakers, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn round_layout_lookup() {
        let mut config = GameConfig::default();
        let narrow = BoardLayout { pins_per_row: 7, ..BoardLayout::default() };
        config.session.round_layouts = vec![BoardLayout::default(), narrow.clone()];
        assert_eq!(config.layout_for_round(2), &narrow);
        assert_eq!(config.layout_for_round(3), &config.layout);
        assert_eq!(config.layout_for_round(0), &config.layout);
    }
}
