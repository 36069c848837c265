//! Engine tunables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapError};

/// Tunable constants of the snap engine.
///
/// Loaded from TOML; every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapSettings {
    /// Aperture in pixels used when a request gives none.
    pub aperture: f64,
    /// Keypoint divisor used when a request gives none.
    pub divisor: u32,
    /// A wire center snap beats a farther edge snap only when its
    /// edge distance exceeds its cursor distance by this many apertures.
    pub preferred_center_margin: f64,
    /// View distances closer than this are ties; the earlier candidate wins.
    pub tie_tolerance: f64,
    /// Stop walking a stream once the pick is this close to a feature.
    pub local_stop_distance: f64,
    /// Mesh index reads between cancellation checks.
    pub cancel_interval: usize,
    /// Offset along the line of sight when probing for the visible face.
    pub probe_offset: f64,
    /// Distance beyond which a snap point is considered off a face.
    pub on_surface_tolerance: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            aperture: 12.0,
            divisor: 2,
            preferred_center_margin: 0.4,
            tie_tolerance: 0.01,
            local_stop_distance: 1.0e-3,
            cancel_interval: 100,
            probe_offset: 1.0e-3,
            on_surface_tolerance: 1.0e-5,
        }
    }
}

impl SnapSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.aperture > 0.0) {
            return Err(SnapError::InvalidSettings(format!(
                "aperture must be positive, got {}",
                self.aperture
            )));
        }
        if self.divisor == 0 {
            return Err(SnapError::InvalidSettings(
                "divisor must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.preferred_center_margin) {
            return Err(SnapError::InvalidSettings(format!(
                "preferred_center_margin must be in [0, 1], got {}",
                self.preferred_center_margin
            )));
        }
        if self.tie_tolerance < 0.0 || self.local_stop_distance < 0.0 {
            return Err(SnapError::InvalidSettings(
                "tolerances must not be negative".into(),
            ));
        }
        if self.cancel_interval == 0 {
            return Err(SnapError::InvalidSettings(
                "cancel_interval must be at least 1".into(),
            ));
        }
        if !(self.probe_offset > 0.0) || !(self.on_surface_tolerance > 0.0) {
            return Err(SnapError::InvalidSettings(
                "probe_offset and on_surface_tolerance must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        let settings = SnapSettings::default();
        assert!(settings.validate().is_ok());
        assert!((settings.preferred_center_margin - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_partial_toml() {
        let settings = SnapSettings::from_toml_str("aperture = 20.0\ndivisor = 4\n").unwrap();
        assert!((settings.aperture - 20.0).abs() < 1e-12);
        assert_eq!(settings.divisor, 4);
        assert_eq!(settings.cancel_interval, 100);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            SnapSettings::from_toml_str("divisor = 0"),
            Err(SnapError::InvalidSettings(_))
        ));
        assert!(matches!(
            SnapSettings::from_toml_str("aperture = -1.0"),
            Err(SnapError::InvalidSettings(_))
        ));
        assert!(matches!(
            SnapSettings::from_toml_str("aperture = \"wide\""),
            Err(SnapError::Settings(_))
        ));
    }
}
