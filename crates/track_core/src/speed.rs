//! Travel-speed assumptions and the seeded randomness behind them.
//!
//! Vehicles move at a constant assumed speed. Route durations are stretched
//! by a traffic multiplier sampled once per route fetch; the same RNG feeds the
//! lateral jitter of synthetic fallback paths, so a fixed seed reproduces both.

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Assumed average city speed for laundry pickup/delivery vehicles.
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Inclusive multiplier range, serializable for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierRange {
    pub min: f64,
    pub max: f64,
}

impl MultiplierRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn as_range(&self) -> RangeInclusive<f64> {
        let lo = self.min.min(self.max);
        let hi = self.min.max(self.max);
        lo..=hi
    }
}

/// Traffic multipliers applied per endpoint variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficRanges {
    pub primary: MultiplierRange,
    pub alternate: MultiplierRange,
}

impl Default for TrafficRanges {
    fn default() -> Self {
        Self {
            primary: MultiplierRange::new(0.9, 1.3),
            alternate: MultiplierRange::new(0.9, 1.2),
        }
    }
}

pub struct TrafficModel {
    rng: StdRng,
}

impl TrafficModel {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn sample_multiplier(&mut self, range: MultiplierRange) -> f64 {
        self.rng.gen_range(range.as_range())
    }

    /// Uniform sample in `[-1, 1]`.
    pub fn sample_signed_unit(&mut self) -> f64 {
        self.rng.gen_range(-1.0..=1.0)
    }
}

/// Minutes needed to cover `distance_km` at `speed_kmh`, scaled by `multiplier`.
pub fn travel_minutes(distance_km: f64, speed_kmh: f64, multiplier: f64) -> f64 {
    if distance_km <= 0.0 {
        return 0.0;
    }
    distance_km / speed_kmh.max(1.0) * 60.0 * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipliers_stay_in_range() {
        let mut model = TrafficModel::new(Some(7));
        let ranges = TrafficRanges::default();
        for _ in 0..1_000 {
            let p = model.sample_multiplier(ranges.primary);
            assert!((0.9..=1.3).contains(&p));
            let a = model.sample_multiplier(ranges.alternate);
            assert!((0.9..=1.2).contains(&a));
        }
    }

    #[test]
    fn same_seed_same_samples() {
        let mut a = TrafficModel::new(Some(42));
        let mut b = TrafficModel::new(Some(42));
        for _ in 0..10 {
            assert_eq!(a.sample_signed_unit(), b.sample_signed_unit());
        }
    }

    #[test]
    fn travel_minutes_at_forty_kmh() {
        assert_eq!(travel_minutes(0.0, 40.0, 1.2), 0.0);
        assert!((travel_minutes(1.5, 40.0, 1.0) - 2.25).abs() < 1e-12);
        assert!((travel_minutes(2.0, 40.0, 1.25) - 3.75).abs() < 1e-12);
    }

    #[test]
    fn degenerate_range_returns_the_bound() {
        let mut model = TrafficModel::new(Some(1));
        assert_eq!(model.sample_multiplier(MultiplierRange::new(1.0, 1.0)), 1.0);
    }
}
