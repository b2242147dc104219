use serde::{Deserialize, Serialize};

/// Engine tuning knobs with conservative defaults.
///
/// The inter-tick delay and press duration are ranges; the actual value is
/// drawn uniformly per tick / per press so the output cadence never looks
/// machine-regular.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Randomized sleep between shared ticks (also used by independent
    /// loops), in milliseconds.
    pub tick_delay_ms_min: u64,
    pub tick_delay_ms_max: u64,

    /// Default key hold range for bindings that don't declare their own.
    pub press_ms_min: u64,
    pub press_ms_max: u64,

    /// Neighborhood distance for capture-region clustering: sample points
    /// within this Euclidean distance share a capture rectangle.
    pub cluster_epsilon: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_delay_ms_min: 100,
            tick_delay_ms_max: 150,
            press_ms_min: 95,
            press_ms_max: 135,
            cluster_epsilon: 20,
        }
    }
}

impl EngineSettings {
    /// Ranges are tolerated in either order; draw helpers sort the bounds.
    pub fn tick_delay_bounds(&self) -> (u64, u64) {
        sorted(self.tick_delay_ms_min, self.tick_delay_ms_max)
    }

    pub fn press_bounds(&self) -> (u64, u64) {
        sorted(self.press_ms_min, self.press_ms_max)
    }
}

fn sorted(a: u64, b: u64) -> (u64, u64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
