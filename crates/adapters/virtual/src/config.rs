//! Virtual source configuration.

use serde::Deserialize;

/// Configuration for the simulated devices.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// Register the simulated devices.
    pub enabled: bool,
    /// Active power above which the meter raises `overload`, in watts.
    pub overload_threshold_w: f64,
    /// Seed for the noise generator; random when unset.
    pub seed: Option<u64>,
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overload_threshold_w: 3_680.0,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = VirtualConfig::default();
        assert!(config.enabled);
        assert!((config.overload_threshold_w - 3_680.0).abs() < f64::EPSILON);
        assert!(config.seed.is_none());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r"
            enabled = false
            overload_threshold_w = 2000.0
            seed = 42
        ";
        let config: VirtualConfig = toml::from_str(toml).unwrap();
        assert!(!config.enabled);
        assert!((config.overload_threshold_w - 2_000.0).abs() < f64::EPSILON);
        assert_eq!(config.seed, Some(42));
    }
}
