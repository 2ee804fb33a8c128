//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use can_live_decoder::{SessionConfig, SignalConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub signals: Vec<SignalEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// candump log to replay
    pub file: Option<PathBuf>,
    /// Register the preset decoders before the `[[signals]]` entries
    #[serde(default)]
    pub use_default_signals: bool,
}

/// One `[[signals]]` table: the identifier plus the signal definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalEntry {
    pub can_id: u32,
    #[serde(flatten)]
    pub signal: SignalConfig,
}

impl AppConfig {
    /// `(can_id, signal)` pairs in file order
    pub fn signal_pairs(&self) -> impl Iterator<Item = (u32, &SignalConfig)> {
        self.signals.iter().map(|entry| (entry.can_id, &entry.signal))
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate(&config).with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    config.session.validate()?;

    let mut seen = HashSet::new();
    for entry in &config.signals {
        entry
            .signal
            .to_spec()
            .with_context(|| format!("signal '{}' (0x{:X})", entry.signal.name, entry.can_id))?;
        if !seen.insert((entry.can_id, entry.signal.name.as_str())) {
            bail!(
                "signal '{}' defined twice for CAN ID 0x{:X}",
                entry.signal.name,
                entry.can_id
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_live_decoder::{DataType, OverflowPolicy};
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [session]
            history_capacity = 250
            overflow_policy = "block"

            [input]
            file = "trace.log"
            use_default_signals = true

            [[signals]]
            can_id = 0x259
            name = "voltage"
            byte_index = 0
            data_type = "uint16_le"
            scale = 0.001
            unit = "V"

            [[signals]]
            can_id = 0x25E
            name = "flags"
            start_bit = 60
            length = 4
            byte_order = "big_endian"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.session.history_capacity, 250);
        assert_eq!(config.session.queue_capacity, 4096);
        assert_eq!(config.session.overflow_policy, OverflowPolicy::Block);
        assert_eq!(config.input.file, Some(PathBuf::from("trace.log")));
        assert!(config.input.use_default_signals);

        assert_eq!(config.signals.len(), 2);
        assert_eq!(config.signals[0].can_id, 0x259);
        assert_eq!(config.signals[0].signal.data_type, Some(DataType::Uint16Le));
        assert_eq!(config.signals[1].signal.length, Some(4));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.session, SessionConfig::default());
        assert!(config.input.file.is_none());
        assert!(config.signals.is_empty());
    }

    #[test]
    fn test_load_config_rejects_invalid_signal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[signals]]\ncan_id = 1\nname = \"wide\"\nstart_bit = 60\nlength = 8"
        )
        .unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("wide"));
    }

    #[test]
    fn test_load_config_rejects_duplicate_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[signals]]
            can_id = 1
            name = "a"
            start_bit = 0
            length = 8

            [[signals]]
            can_id = 1
            name = "a"
            start_bit = 8
            length = 8
            "#
        )
        .unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config(Path::new("does-not-exist.toml")).is_err());
    }
}
