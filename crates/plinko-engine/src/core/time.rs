/// Default cap on ticks owed per frame.
pub const DEFAULT_MAX_STEPS_PER_FRAME: u32 = 10;

/// Converts variable frame time into a whole number of fixed simulation ticks.
///
/// Frame time that would owe more than `max_steps` ticks is dropped, so a
/// stalled tab cannot queue a burst of catch-up steps.
pub struct FixedTimestep {
    /// Seconds per tick.
    dt: f32,
    accumulator: f32,
    max_steps: u32,
}

impl FixedTimestep {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            accumulator: 0.0,
            max_steps: DEFAULT_MAX_STEPS_PER_FRAME,
        }
    }

    /// Build from a tick length in milliseconds, as stored in `PhysicsConfig`.
    pub fn from_millis(dt_ms: f32) -> Self {
        Self::new(dt_ms / 1000.0)
    }

    /// Add frame time in seconds. Returns the number of fixed ticks to run.
    /// Negative or non-finite frame times count as zero.
    pub fn accumulate(&mut self, frame_dt: f32) -> u32 {
        if frame_dt.is_finite() && frame_dt > 0.0 {
            self.accumulator += frame_dt;
        }
        self.accumulator = self.accumulator.min(self.dt * self.max_steps as f32);
        let steps = (self.accumulator / self.dt) as u32;
        self.accumulator -= steps as f32 * self.dt;
        steps
    }

    /// Fraction of the next tick already elapsed, for render interpolation.
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }

    /// Drop any partial tick, e.g. after a pause.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
