//! Pipeline configuration: tolerances, physical constants, the sensor-fault fence and the
//! site catalog. Loaded from TOML; every field has a default so a partial file is valid.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const CONFIG_ENV_VAR: &str = "TIRETOX_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub master_dir: PathBuf,
    pub barometric_tolerance_minutes: i64,
    pub destack_interval_seconds: i64,
    pub gravity: f64,
    pub fence: FenceConfig,
    pub sites: Vec<SiteConfig>,
}

/// Physical range for water level (m). Rows outside it are sensor fill values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FenceConfig {
    pub min: f64,
    pub max: f64,
}

impl FenceConfig {
    pub fn contains(&self, water_level: f64) -> bool {
        water_level >= self.min && water_level <= self.max
    }
}

impl Default for FenceConfig {
    fn default() -> Self {
        Self {
            min: -200.0,
            max: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// File-name substrings (logger serials, site tokens) identifying this site.
    pub patterns: Vec<String>,
    /// Site records barometric pressure itself and needs no correction.
    #[serde(default)]
    pub barometric: bool,
    /// Barometric-source site whose master supplies pressure for correction.
    #[serde(default)]
    pub companion: Option<String>,
}

impl SiteConfig {
    fn barometric(name: &str, patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            barometric: true,
            companion: None,
        }
    }

    fn corrected(name: &str, patterns: &[&str], companion: &str) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            barometric: false,
            companion: Some(companion.to_string()),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            master_dir: PathBuf::from("masters"),
            barometric_tolerance_minutes: 10,
            destack_interval_seconds: 5,
            gravity: 9.81,
            fence: FenceConfig::default(),
            sites: default_sites(),
        }
    }
}

fn default_sites() -> Vec<SiteConfig> {
    vec![
        SiteConfig::barometric("cat_beaconsBT", &["22084122", "cat_beaconsBT"]),
        SiteConfig::barometric("northfield_poolBT", &["22084123", "northfield_poolBT"]),
        SiteConfig::barometric("chase_usBT", &["22084124", "chase_usBT"]),
        SiteConfig::barometric("northfield_bridgeBT", &["northfield_bridgeBT"]),
        SiteConfig::corrected("cat_beacons", &["cat_beacons_"], "cat_beaconsBT"),
        SiteConfig::corrected("northfield_bridge", &["northfield_bridge"], "northfield_poolBT"),
        SiteConfig::corrected("chase_us", &["chase_us", "chase_upstream"], "chase_usBT"),
        SiteConfig::corrected("chase_ds", &["chase_ds", "chase_downstream"], "chase_usBT"),
    ]
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)
            .map_err(|err| PipelineError::Config(format!("failed to parse TOML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| PipelineError::io(path, source))?;
        Self::from_toml_str(&content)
    }

    /// `path` if given, else the file named by `TIRETOX_CONFIG`, else the built-in catalog.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(value) if !value.is_empty() => Self::load(Path::new(&value)),
            _ => Ok(Self::default()),
        }
    }

    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| site.name == name)
    }

    pub fn barometric_tolerance_micros(&self) -> i64 {
        self.barometric_tolerance_minutes * 60 * 1_000_000
    }

    pub fn destack_interval_micros(&self) -> i64 {
        self.destack_interval_seconds * 1_000_000
    }

    pub fn validate(&self) -> Result<()> {
        if self.barometric_tolerance_minutes < 0 {
            return Err(PipelineError::Config(
                "barometric_tolerance_minutes must not be negative".to_string(),
            ));
        }
        if self.destack_interval_seconds <= 0 {
            return Err(PipelineError::Config(
                "destack_interval_seconds must be positive".to_string(),
            ));
        }
        if !(self.gravity > 0.0) {
            return Err(PipelineError::Config("gravity must be positive".to_string()));
        }
        if self.fence.min > self.fence.max {
            return Err(PipelineError::Config(format!(
                "fence min {} exceeds max {}",
                self.fence.min, self.fence.max
            )));
        }

        let mut names = HashSet::new();
        for site in &self.sites {
            if !names.insert(site.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "site '{}' is defined twice",
                    site.name
                )));
            }
            if site.patterns.iter().any(|p| p.is_empty()) || site.patterns.is_empty() {
                return Err(PipelineError::Config(format!(
                    "site '{}' needs at least one non-empty pattern",
                    site.name
                )));
            }
        }

        for site in &self.sites {
            let Some(companion) = &site.companion else {
                continue;
            };
            match self.site(companion) {
                Some(target) if target.barometric => {}
                Some(_) => {
                    return Err(PipelineError::Config(format!(
                        "companion '{companion}' of site '{}' is not a barometric site",
                        site.name
                    )))
                }
                None => {
                    return Err(PipelineError::Config(format!(
                        "companion '{companion}' of site '{}' is not defined",
                        site.name
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_valid() {
        let config = PipelineConfig::default();
        config.validate().expect("default config");
        assert_eq!(
            config.site("chase_ds").and_then(|s| s.companion.as_deref()),
            Some("chase_usBT")
        );
        assert_eq!(config.barometric_tolerance_micros(), 600_000_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
master_dir = "/data/masters"
barometric_tolerance_minutes = 15

[fence]
min = -5.0
max = 5.0
"#,
        )
        .expect("config");
        assert_eq!(config.master_dir, PathBuf::from("/data/masters"));
        assert_eq!(config.barometric_tolerance_minutes, 15);
        assert_eq!(config.destack_interval_seconds, 5);
        assert!(!config.fence.contains(6.0));
        assert_eq!(config.sites.len(), 8);
    }

    #[test]
    fn companion_must_be_barometric() {
        let err = PipelineConfig::from_toml_str(
            r#"
[[sites]]
name = "creek"
patterns = ["creek"]
companion = "bridge"

[[sites]]
name = "bridge"
patterns = ["bridge"]
"#,
        )
        .expect_err("non-barometric companion");
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
