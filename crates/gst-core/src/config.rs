//! Run configuration and the quantities derived from it.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{GstError, Result};
use crate::models::Resolution;
use crate::spatial::{half_circumference_m, METRES_PER_DEGREE, METRES_PER_NAUTICAL_MILE};

/// Named waterways cut through the land mask unless configured otherwise.
pub const DEFAULT_CANALS: [&str; 2] = ["Panama Canal", "Suez Canal"];

/// Immutable description of one sailing run.
///
/// Every field that changes the geometry is encoded into the cache and
/// checkpoint paths by [`crate::naming::StoreLayout`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SailConfig {
    /// Start longitude in degrees.
    pub lon: f64,
    /// Start latitude in degrees.
    pub lat: f64,
    /// Vessel speed in knots.
    pub speed_kn: f64,
    /// Sailing time in days.
    pub duration_days: f64,
    /// Scales down fill density and simplification tolerance.
    pub conservatism: f64,
    /// Directions sampled around each vertex when buffering.
    pub angular_resolution: usize,
    /// Distance sailed per step, in meters.
    pub precision_m: f64,
    /// Steps between re-evaluations of the relevant obstacles.
    pub land_frequency: usize,
    /// Steps between simplifications of the region.
    pub simplify_frequency: usize,
    /// Coincidence tolerance in degrees.
    pub tolerance_deg: f64,
    pub resolution: Resolution,
    /// Also read the minor-islands dataset.
    pub detailed: bool,
    /// Restrict the land mask to what the start point can reach.
    pub local: bool,
    /// Validate every intermediate geometry.
    pub debug: bool,
    pub canals: Vec<String>,
}

impl Default for SailConfig {
    fn default() -> Self {
        Self {
            lon: 0.0,
            lat: 0.0,
            speed_kn: 20.0,
            duration_days: 1.0,
            conservatism: 2.0,
            angular_resolution: 9,
            precision_m: 10_000.0,
            land_frequency: 100,
            simplify_frequency: 25,
            tolerance_deg: 1.0e-10,
            resolution: Resolution::Crude,
            detailed: false,
            local: false,
            debug: false,
            canals: DEFAULT_CANALS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SailConfig {
    pub fn new(lon: f64, lat: f64, speed_kn: f64) -> Self {
        Self {
            lon,
            lat,
            speed_kn,
            ..Self::default()
        }
    }

    /// Check ranges of every field.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("lon", self.lon),
            ("lat", self.lat),
            ("speed", self.speed_kn),
            ("duration", self.duration_days),
            ("conservatism", self.conservatism),
            ("precision", self.precision_m),
            ("tolerance", self.tolerance_deg),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(GstError::InvalidConfig(format!("{name} must be finite")));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(GstError::InvalidConfig(format!(
                "longitude {} is outside [-180, 180]",
                self.lon
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(GstError::InvalidConfig(format!(
                "latitude {} is outside [-90, 90]",
                self.lat
            )));
        }
        for (name, value) in [
            ("speed", self.speed_kn),
            ("duration", self.duration_days),
            ("conservatism", self.conservatism),
            ("precision", self.precision_m),
        ] {
            if value <= 0.0 {
                return Err(GstError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.tolerance_deg < 0.0 {
            return Err(GstError::InvalidConfig(
                "tolerance must not be negative".to_string(),
            ));
        }
        if self.angular_resolution < 3 {
            return Err(GstError::InvalidConfig(
                "angular resolution must be at least 3".to_string(),
            ));
        }
        if self.land_frequency == 0 || self.simplify_frequency == 0 {
            return Err(GstError::InvalidConfig(
                "land and simplify frequencies must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject runs whose step is longer than the whole voyage.
    pub fn check_precision(&self) -> Result<()> {
        let max_distance_m = self.max_distance_m();
        if self.precision_m > max_distance_m {
            return Err(GstError::PrecisionTooCoarse {
                max_distance_m,
                precision_m: self.precision_m,
            });
        }
        Ok(())
    }

    /// Furthest distance sailable in the configured time, in meters.
    pub fn max_distance_m(&self) -> f64 {
        METRES_PER_NAUTICAL_MILE * self.speed_kn * 24.0 * self.duration_days
    }

    /// Whether the furthest reachable distance covers the whole globe.
    pub fn covers_globe(&self) -> bool {
        self.max_distance_m() > half_circumference_m()
    }

    pub fn nstep(&self) -> usize {
        (self.max_distance_m() / self.precision_m).round() as usize
    }

    /// Maximum spacing between vertices before buffering, in degrees.
    pub fn fill_deg(&self) -> f64 {
        self.precision_m / METRES_PER_DEGREE / self.conservatism
    }

    /// Simplification tolerance, in degrees.
    pub fn simplify_deg(&self) -> f64 {
        self.fill_deg() / self.conservatism
    }

    /// How close a region hole must be to an obstacle to be kept, in meters.
    pub fn hole_match_distance_m(&self) -> f64 {
        self.precision_m / self.conservatism
    }

    /// Distance an epoch of steps could possibly cover, padded by conservatism.
    pub fn reach_distance_m(&self) -> f64 {
        self.conservatism * self.land_frequency as f64 * self.precision_m
    }

    pub fn step_duration(&self) -> Duration {
        let hours = self.precision_m / (METRES_PER_NAUTICAL_MILE * self.speed_kn);
        Duration::seconds((hours * 3600.0).round() as i64)
    }

    pub fn is_simplify_step(&self, step: usize) -> bool {
        (step + 1) % self.simplify_frequency == 0
    }

    pub fn is_land_step(&self, step: usize) -> bool {
        step % self.land_frequency == 0
    }

    /// Canal names to open, trimmed, sorted and without duplicates.
    pub fn canal_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .canals
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// First step of the obstacle epoch containing `step`.
    pub fn epoch_start(&self, step: usize) -> usize {
        step - step % self.land_frequency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solent() -> SailConfig {
        SailConfig {
            duration_days: 0.5,
            ..SailConfig::new(-1.0, 50.7, 20.0)
        }
    }

    #[test]
    fn canal_names_are_normalised() {
        let config = SailConfig {
            canals: vec![
                " Suez Canal".to_string(),
                "Panama Canal".to_string(),
                "Suez Canal".to_string(),
                String::new(),
            ],
            ..solent()
        };
        assert_eq!(config.canal_names(), vec!["Panama Canal", "Suez Canal"]);
    }

    #[test]
    fn derives_distance_and_step_count() {
        let config = solent();
        assert!((config.max_distance_m() - 444_480.0).abs() < 1e-6);
        assert_eq!(config.nstep(), 44);
        assert!(config.validate().is_ok());
        assert!(config.check_precision().is_ok());
    }

    #[test]
    fn derives_fill_and_simplification() {
        let config = solent();
        let fill = 10_000.0 / METRES_PER_DEGREE / 2.0;
        assert!((config.fill_deg() - fill).abs() < 1e-15);
        assert!((config.simplify_deg() - fill / 2.0).abs() < 1e-15);
        assert!((config.hole_match_distance_m() - 5_000.0).abs() < 1e-9);
        assert!((config.reach_distance_m() - 2_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn step_duration_matches_speed() {
        let config = solent();
        // 10 km at 20 kn is 0.27 h.
        assert_eq!(config.step_duration().num_seconds(), 972);
    }

    #[test]
    fn rejects_precision_longer_than_voyage() {
        let config = SailConfig {
            duration_days: 0.01,
            precision_m: 50_000.0,
            ..SailConfig::new(0.0, 0.0, 1.0)
        };
        let err = config.check_precision().unwrap_err();
        assert!(matches!(err, GstError::PrecisionTooCoarse { .. }));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut config = solent();
        config.lat = 91.0;
        assert!(matches!(config.validate(), Err(GstError::InvalidConfig(_))));

        let mut config = solent();
        config.angular_resolution = 2;
        assert!(config.validate().is_err());

        let mut config = solent();
        config.land_frequency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn schedules_land_and_simplify_steps() {
        let config = SailConfig {
            land_frequency: 10,
            simplify_frequency: 5,
            ..solent()
        };
        assert!(config.is_land_step(0));
        assert!(config.is_land_step(20));
        assert!(!config.is_land_step(21));
        assert_eq!(config.epoch_start(27), 20);
        assert!(config.is_simplify_step(4));
        assert!(!config.is_simplify_step(5));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SailConfig =
            serde_json::from_str(r#"{"lon": 1.5, "lat": 2.5, "resolution": "i"}"#).unwrap();
        assert_eq!(config.resolution, Resolution::Intermediate);
        assert_eq!(config.angular_resolution, 9);
        assert_eq!(config.canals.len(), 2);
    }
}
