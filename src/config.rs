//! Configuration management for the THR30II pedal gateway.
//!
//! Handles loading, parsing, and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Application name used for the data directory in installed mode
const APP_NAME: &str = "thr30ii-pedal";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub patches: PatchConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

/// MIDI port configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Substring matched against port names when picking the amplifier
    #[serde(default = "default_port_match")]
    pub port_match: String,
}

/// Patch library configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatchConfig {
    /// Directory scanned for `.json` patch documents
    #[serde(default = "default_patch_dir")]
    pub dir: PathBuf,
}

/// Runtime behavior flags
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BehaviorConfig {
    /// Send single-parameter messages as soon as a setter changes state
    #[serde(default = "default_true")]
    pub immediate_send: bool,
    /// Outbound queue tick interval in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    ///
    /// A present-but-broken file is still an error; only a missing file is
    /// silently replaced by the built-in defaults.
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if !std::path::Path::new(path).exists() {
            info!("No config at {}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.port_match.is_empty() {
            anyhow::bail!("MIDI port_match cannot be empty");
        }

        if self.behavior.tick_ms == 0 {
            anyhow::bail!("behavior.tick_ms must be at least 1");
        }

        if self.patches.dir.as_os_str().is_empty() {
            anyhow::bail!("patches.dir cannot be empty");
        }

        Ok(())
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            port_match: default_port_match(),
        }
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            dir: default_patch_dir(),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            immediate_send: default_true(),
            tick_ms: default_tick_ms(),
        }
    }
}

/// Resolve the configuration file location.
///
/// `config.yaml` in the current working directory wins (typical when running
/// with `cargo run`); otherwise the per-user data directory is used.
pub fn default_location() -> PathBuf {
    let cwd_config = PathBuf::from("config.yaml");
    if cwd_config.exists() {
        return cwd_config;
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.yaml")
}

// Default value functions
fn default_port_match() -> String {
    "THR30II".to_string()
}
fn default_patch_dir() -> PathBuf {
    PathBuf::from("patches")
}
fn default_true() -> bool {
    true
}
fn default_tick_ms() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_document_fills_every_default() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.midi.port_match, "THR30II");
        assert_eq!(config.patches.dir, PathBuf::from("patches"));
        assert!(config.behavior.immediate_send);
        assert_eq!(config.behavior.tick_ms, 10);
    }

    #[test]
    fn partial_sections_keep_their_defaults() {
        let yaml = r#"
midi:
  port_match: "THR10II"
behavior:
  tick_ms: 25
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.midi.port_match, "THR10II");
        assert_eq!(config.behavior.tick_ms, 25);
        assert!(config.behavior.immediate_send);
        assert_eq!(config.patches.dir, PathBuf::from("patches"));
    }

    #[test]
    fn validation_rejects_empty_port_match() {
        let mut config = AppConfig::default();
        config.midi.port_match.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_tick() {
        let mut config = AppConfig::default();
        config.behavior.tick_ms = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn load_reads_and_validates_a_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "midi:\n  port_match: \"THR30II Wireless\"").unwrap();

        let config = AppConfig::load(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.midi.port_match, "THR30II Wireless");
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_or_default("definitely/not/here.yaml")
            .await
            .unwrap();
        assert_eq!(config.midi.port_match, "THR30II");
    }
}
