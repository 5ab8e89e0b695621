use std::path::Path;

use common::SerdeFormat;
use serde::{Deserialize, Serialize};

use crate::codec::Compression;

/// Settings of a [`LinkManager`](crate::LinkManager).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Links needed before a transformation may be computed.
    pub min_links_for_computation: usize,
    /// Per-axis distance below which two link points count as the same coordinate.
    pub coordinate_tolerance: f64,
    pub report_separator: String,
    pub compression: Compression,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            min_links_for_computation: 5,
            coordinate_tolerance: common::EPSILON,
            report_separator: ",\t".to_string(),
            compression: Compression::Gzip,
        }
    }
}

impl LinkConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let format = SerdeFormat::from_path(path)?;
        let serialized = std::fs::read(path)?;
        let config: LinkConfig = common::deserialize(&serialized, format)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Self {
        match LinkConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::info!(
                    "Using default link settings, {} not loaded: {err:#}",
                    path.display()
                );
                LinkConfig::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let format = SerdeFormat::from_path(path)?;
        let serialized = common::serialize(self, format)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.coordinate_tolerance > 0.0 && self.coordinate_tolerance.is_finite()) {
            anyhow::bail!(
                "coordinate tolerance must be finite and positive, got {}",
                self.coordinate_tolerance
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::test_utils::test_output_path;

    use super::*;

    #[test]
    fn defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.min_links_for_computation, 5);
        assert_eq!(config.coordinate_tolerance, 1e-6);
        assert_eq!(config.report_separator, ",\t");
        assert_eq!(config.compression, Compression::Gzip);
    }

    #[test]
    fn save_and_load_every_format() -> anyhow::Result<()> {
        let config = LinkConfig {
            min_links_for_computation: 7,
            report_separator: ";".to_string(),
            compression: Compression::None,
            ..LinkConfig::default()
        };

        for ext in ["toml", "json", "yaml"] {
            let path = test_output_path(&format!("link_config.{ext}"));
            config.save(&path)?;
            assert_eq!(LinkConfig::load(&path)?, config);
        }

        Ok(())
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() -> anyhow::Result<()> {
        let config: LinkConfig =
            common::deserialize(b"min_links_for_computation = 3\n", SerdeFormat::Toml)?;
        assert_eq!(config.min_links_for_computation, 3);
        assert_eq!(config.compression, Compression::Gzip);
        Ok(())
    }

    #[test]
    fn invalid_or_missing_files_use_defaults() {
        let path = test_output_path("link_config_missing.toml");
        let _ = std::fs::remove_file(&path);
        assert_eq!(LinkConfig::load_or_default(&path), LinkConfig::default());

        let bad = LinkConfig {
            coordinate_tolerance: -1.0,
            ..LinkConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn tolerance_must_be_positive() {
        for tolerance in [0.0, -0.0, f64::NAN, f64::INFINITY] {
            let config = LinkConfig {
                coordinate_tolerance: tolerance,
                ..LinkConfig::default()
            };
            assert!(config.validate().is_err(), "{tolerance} accepted");
        }
        assert!(LinkConfig::default().validate().is_ok());
    }
}
