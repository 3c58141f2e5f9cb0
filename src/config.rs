//! Optional TOML configuration for the checker: thresholds and the polarity
//! of each unit class.
//!
//! ```toml
//! regression_threshold = 0.1
//! improvement_threshold = 0.1
//!
//! [units]
//! "ns/iter" = "lower"
//! "MB/s" = "higher"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_derive::Deserialize;

use crate::errors::{Error, Result};

/// Whether smaller or larger values of a unit are better. Time-based units
/// (the default) are lower-is-better; throughput units invert the sign of the
/// comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Lower,
    Higher,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Relative worsening above which a result is a regression
    /// (0.1 = +10%).
    #[serde(default = "default_threshold")]
    pub regression_threshold: f64,
    /// Relative improvement above which a result is reported as such.
    #[serde(default = "default_threshold")]
    pub improvement_threshold: f64,
    /// Unit string to polarity; unlisted units default to lower-is-better.
    #[serde(default)]
    pub units: HashMap<String, Polarity>,
}

fn default_threshold() -> f64 {
    0.1
}

impl Default for Config {
    fn default() -> Self {
        Config {
            regression_threshold: default_threshold(),
            improvement_threshold: default_threshold(),
            units: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let cfg: Config = toml::from_str(&raw).map_err(|e| Error::BadConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !(self.regression_threshold >= 0.0) || !(self.improvement_threshold >= 0.0) {
            return Err(Error::BadConfig(
                "thresholds must be non-negative".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn polarity_for(&self, unit: &str) -> Polarity {
        self.units.get(unit).copied().unwrap_or(Polarity::Lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let cfg: Config = toml::from_str(
            r#"
regression_threshold = 0.05
improvement_threshold = 0.2

[units]
"ns/iter" = "lower"
"MB/s" = "higher"
"#,
        )
        .unwrap();
        assert_eq!(cfg.regression_threshold, 0.05);
        assert_eq!(cfg.polarity_for("MB/s"), Polarity::Higher);
        assert_eq!(cfg.polarity_for("ns/iter"), Polarity::Lower);
    }

    #[test]
    fn unlisted_units_default_to_lower_is_better() {
        let cfg = Config::default();
        assert_eq!(cfg.polarity_for("ns/iter"), Polarity::Lower);
        assert_eq!(cfg.regression_threshold, 0.1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("regression_treshold = 0.1").is_err());
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cellar.toml");
        std::fs::write(&path, "regression_threshold = -0.1").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(Error::BadConfig(_))
        ));
    }
}
