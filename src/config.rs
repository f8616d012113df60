use crate::constants;
use crate::error::{Result, ScraperError};
use crate::types::BankTarget;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub google_play: GooglePlayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GooglePlayConfig {
    /// Delay between targets, to stay polite to the marketplace
    pub delay_ms: u64,
    pub timeout_seconds: u64,
    /// Bounded retries per request before a target is skipped
    pub max_retries: u32,
}

impl Default for GooglePlayConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            timeout_seconds: 30,
            max_retries: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_play: GooglePlayConfig::default(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory; a missing file means defaults.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        if !Path::new(config_path).exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{config_path}': {e}"))
        })?;
        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

/// The three banks the dataset was built around, used when no mapping file is given
pub fn default_bank_targets() -> Vec<BankTarget> {
    vec![
        BankTarget::new(constants::CBE_BANK, constants::CBE_APP_ID),
        BankTarget::new(constants::BOA_BANK, constants::BOA_APP_ID),
        BankTarget::new(constants::DASHEN_BANK, constants::DASHEN_APP_ID),
    ]
}

/// Load bank targets from a JSON file mapping display name to Play Store app id,
/// e.g. `{"CBE": "com.combanketh.mobilebanking"}`. BTreeMap keeps target order stable.
pub fn load_bank_targets(path: &Path) -> Result<Vec<BankTarget>> {
    let content = fs::read_to_string(path).map_err(|e| {
        ScraperError::Config(format!("Failed to read banks file '{}': {e}", path.display()))
    })?;
    let mapping: BTreeMap<String, String> = serde_json::from_str(&content)?;
    if mapping.is_empty() {
        return Err(ScraperError::Config(format!(
            "Banks file '{}' contains no targets",
            path.display()
        )));
    }
    Ok(mapping
        .into_iter()
        .map(|(name, app_id)| BankTarget::new(name, app_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn google_play_defaults() {
        let config = Config::default();
        assert_eq!(config.google_play.delay_ms, 2000);
        assert_eq!(config.google_play.max_retries, 3);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str("[google_play]\ndelay_ms = 500\n").unwrap();
        assert_eq!(config.google_play.delay_ms, 500);
        assert_eq!(config.google_play.timeout_seconds, 30);
    }

    #[test]
    fn bank_targets_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"Awash": "com.awash.bank", "CBE": "com.combanketh.mobilebanking"}}"#
        )
        .unwrap();
        let targets = load_bank_targets(file.path()).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "Awash");
        assert_eq!(targets[0].app_id, "com.awash.bank");
    }

    #[test]
    fn empty_banks_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        assert!(load_bank_targets(file.path()).is_err());
    }
}
