//! Configuration file schema and loader
//!
//! `letstry.toml`, every field optional:
//!
//! ```toml
//! data_dir = "/var/lib/letstry"
//!
//! [ballot]
//! default_duration_hours = 72
//!
//! [metadata]
//! freshness_hours = 24
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metadata::DEFAULT_FRESHNESS_HOURS;
use crate::models::DEFAULT_BALLOT_HOURS;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "letstry.toml";

/// Upper bound for every hour count in the file: a century
pub const MAX_HOURS: i64 = 24 * 366 * 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root of per-guild storage; platform data directory when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub ballot: BallotConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BallotConfig {
    #[serde(default = "default_ballot_hours")]
    pub default_duration_hours: i64,
}

impl Default for BallotConfig {
    fn default() -> Self {
        Self {
            default_duration_hours: DEFAULT_BALLOT_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataConfig {
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: i64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            freshness_hours: DEFAULT_FRESHNESS_HOURS,
        }
    }
}

fn default_ballot_hours() -> i64 {
    DEFAULT_BALLOT_HOURS
}

fn default_freshness_hours() -> i64 {
    DEFAULT_FRESHNESS_HOURS
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.ballot_duration()?;
        self.metadata_freshness()?;
        Ok(())
    }

    /// Platform directories for this application
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "letstry", "letstry").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })
    }

    /// Default location of the configuration file
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join(CONFIG_FILE))
    }

    /// Configured data directory, or the platform default
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    pub fn ballot_duration(&self) -> Result<Duration> {
        hours("ballot.default_duration_hours", self.ballot.default_duration_hours)
    }

    pub fn metadata_freshness(&self) -> Result<Duration> {
        hours("metadata.freshness_hours", self.metadata.freshness_hours)
    }
}

/// `value` hours, for a field that must lie within `0..=MAX_HOURS`
fn hours(field: &str, value: i64) -> Result<Duration> {
    if !(0..=MAX_HOURS).contains(&value) {
        return Err(Error::Config(format!(
            "{field} must be between 0 and {MAX_HOURS}, got {value}"
        )));
    }
    Duration::try_hours(value)
        .ok_or_else(|| Error::Config(format!("{field} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ballot_duration().unwrap(), Duration::days(3));
        assert_eq!(config.metadata_freshness().unwrap(), Duration::hours(24));
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
            data_dir = "/srv/letstry"

            [ballot]
            default_duration_hours = 168

            [metadata]
            freshness_hours = 6
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/srv/letstry"));
        assert_eq!(config.ballot_duration().unwrap(), Duration::weeks(1));
        assert_eq!(config.metadata_freshness().unwrap(), Duration::hours(6));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml("[metadata]\nfreshness_hours = 1\n").unwrap();
        assert_eq!(config.ballot.default_duration_hours, DEFAULT_BALLOT_HOURS);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        assert!(matches!(
            Config::from_toml("[ballot]\ndefault_duration_hours = \"soon\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_toml("[ballot]\ndefault_duration_hours = -1"),
            Err(Error::Config(_))
        ));
        assert!(matches!(Config::from_toml("colour = 1"), Err(Error::Config(_))));
    }

    #[test]
    fn test_out_of_range_hours_are_config_errors() {
        for content in [
            "[metadata]\nfreshness_hours = 9223372036854775807",
            "[ballot]\ndefault_duration_hours = 9223372036854775807",
            "[ballot]\ndefault_duration_hours = 900000",
        ] {
            assert!(
                matches!(Config::from_toml(content), Err(Error::Config(_))),
                "{content}"
            );
        }
        let at_bound = format!("[ballot]\ndefault_duration_hours = {MAX_HOURS}");
        assert!(Config::from_toml(&at_bound).is_ok());

        let config = Config {
            metadata: MetadataConfig {
                freshness_hours: i64::MAX,
            },
            ..Config::default()
        };
        assert!(matches!(config.metadata_freshness(), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[ballot]\ndefault_duration_hours = 24\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.ballot_duration().unwrap(), Duration::days(1));
    }
}
