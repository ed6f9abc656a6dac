//! Translation of legacy `delay_factor`/`max_loops` timing.

use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

/// Poll interval the legacy loop counts were expressed in.
const LEGACY_LOOP_DELAY: f64 = 0.2;

const DEFAULT_MAX_LOOPS: u32 = 500;

/// Old-style timing knobs, converted once into a plain timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyTiming {
    pub delay_factor: Option<f64>,
    pub max_loops: Option<u32>,
}

impl LegacyTiming {
    pub fn new(delay_factor: Option<f64>, max_loops: Option<u32>) -> Self {
        Self {
            delay_factor,
            max_loops,
        }
    }

    /// Convert to a read timeout.
    ///
    /// With both knobs at their defaults the loop count is derived from
    /// `base_timeout`, so the result equals it.
    pub fn to_timeout(&self, base_timeout: Duration) -> Duration {
        warn!(
            "delay_factor/max_loops are deprecated, use read_timeout instead \
             (delay_factor={:?}, max_loops={:?})",
            self.delay_factor, self.max_loops
        );
        let delay_factor = self.delay_factor.unwrap_or(1.0);
        let mut max_loops = self.max_loops.unwrap_or(DEFAULT_MAX_LOOPS);
        if delay_factor == 1.0 && max_loops == DEFAULT_MAX_LOOPS {
            max_loops = (base_timeout.as_secs_f64() / LEGACY_LOOP_DELAY) as u32;
        }
        let secs = f64::from(max_loops) * LEGACY_LOOP_DELAY * delay_factor;
        Duration::from_secs(secs.max(0.0).round() as u64)
    }
}
