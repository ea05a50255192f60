use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::assessment::AssessmentConfig;
use crate::capture::CaptureConfig;
use crate::filtering::FilteringConfig;
use crate::logging::LoggingConfig;
use crate::storage::StorageConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TwcloudConfigRaw {
    capture: CaptureConfig,
    storage: StorageConfig,
    #[serde(default)]
    filtering: FilteringConfig,
    #[serde(default)]
    assessment: AssessmentConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// TwcloudConfig (resolved, validated)
// ---------------------------------------------------------------------------

/// The whole run configuration. Read once at startup and immutable for the
/// duration of the run.
#[derive(Debug)]
pub struct TwcloudConfig {
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub filtering: FilteringConfig,
    pub assessment: AssessmentConfig,
    pub logging: LoggingConfig,
}

impl TwcloudConfig {
    /// Read and parse a config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for TwcloudConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a validated [`TwcloudConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: TwcloudConfigRaw = toml::from_str(toml_str)?;

        let mut capture = raw.capture;
        capture.keywords.retain(|k| !k.trim().is_empty());

        let config = TwcloudConfig {
            capture,
            storage: raw.storage,
            filtering: raw.filtering,
            assessment: raw.assessment,
            logging: raw.logging,
        };

        validate::validate(&config)?;

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
