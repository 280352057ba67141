//! Calibration constants
//!
//! Geometric heuristics used by identification and the built-in checks.
//! Defaults are the values the rule catalogue was tuned against; a drawing
//! pipeline with different rendering DPI can override them from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::PidGuardError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// OCR hits within this radius of a detected symbol are the same unit
    #[serde(default = "default_dedup_radius")]
    pub dedup_radius_px: f64,
    /// Max horizontal offset for "directly above/below"
    #[serde(default = "default_alignment_tolerance")]
    pub alignment_tolerance_px: f64,
    /// Vertical window for "on the same process line"
    #[serde(default = "default_y_band")]
    pub y_band_px: f64,
    /// Drawing scale assumed when the caller supplies none
    #[serde(default = "default_px_per_m")]
    pub default_px_per_m: f64,
    /// Margin added around an equipment cluster for containment checks
    #[serde(default = "default_cluster_margin")]
    pub cluster_margin_px: f64,
    /// Relative tolerance for capacity ratios (0.10 = ±10%)
    #[serde(default = "default_capacity_tolerance")]
    pub capacity_tolerance: f64,
}

fn default_dedup_radius() -> f64 {
    100.0
}

fn default_alignment_tolerance() -> f64 {
    200.0
}

fn default_y_band() -> f64 {
    150.0
}

fn default_px_per_m() -> f64 {
    100.0
}

fn default_cluster_margin() -> f64 {
    200.0
}

fn default_capacity_tolerance() -> f64 {
    0.10
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            dedup_radius_px: default_dedup_radius(),
            alignment_tolerance_px: default_alignment_tolerance(),
            y_band_px: default_y_band(),
            default_px_per_m: default_px_per_m(),
            cluster_margin_px: default_cluster_margin(),
            capacity_tolerance: default_capacity_tolerance(),
        }
    }
}

impl Calibration {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load and validate an override file.
    pub fn from_json_file(path: &Path) -> Result<Self, PidGuardError> {
        let content = std::fs::read_to_string(path)?;
        let calibration = Self::from_json_str(&content)?;
        calibration.validate()?;
        Ok(calibration)
    }

    /// Distances and scales must be positive; the capacity tolerance may be zero.
    pub fn validate(&self) -> Result<(), PidGuardError> {
        let positive = [
            ("dedup_radius_px", self.dedup_radius_px),
            ("alignment_tolerance_px", self.alignment_tolerance_px),
            ("y_band_px", self.y_band_px),
            ("default_px_per_m", self.default_px_per_m),
            ("cluster_margin_px", self.cluster_margin_px),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(PidGuardError::Config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if !self.capacity_tolerance.is_finite() || self.capacity_tolerance < 0.0 {
            return Err(PidGuardError::Config(format!(
                "capacity_tolerance must not be negative, got {}",
                self.capacity_tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let cal = Calibration::from_json_str(r#"{"y_band_px": 80}"#).unwrap();
        assert_eq!(cal.y_band_px, 80.0);
        assert_eq!(cal.dedup_radius_px, 100.0);
        assert_eq!(cal.default_px_per_m, 100.0);
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Calibration::default().validate().is_ok());
    }

    #[test]
    fn test_non_positive_scale_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"default_px_per_m": 0}"#).unwrap();

        let err = Calibration::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, PidGuardError::Config(ref msg) if msg.contains("default_px_per_m")));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let cal = Calibration::from_json_str(r#"{"capacity_tolerance": -0.1}"#).unwrap();
        assert!(matches!(cal.validate(), Err(PidGuardError::Config(_))));

        let zero = Calibration::from_json_str(r#"{"capacity_tolerance": 0}"#).unwrap();
        assert!(zero.validate().is_ok());
    }
}
