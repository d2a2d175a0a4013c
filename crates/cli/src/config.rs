//! Bot configuration file: global settings plus the plugin set.

use std::{path::Path, time::Duration};

use {
    anyhow::Context,
    serde::Deserialize,
};

use clatter_plugins::PluginConfig;

fn default_name() -> String {
    "clatter".to_string()
}

fn default_listen_window() -> u64 {
    77
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    /// Name the bot answers to in channels.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub admins: Vec<String>,
    /// How long an unmatched message stays eligible for empty-message
    /// replay, in seconds.
    #[serde(default = "default_listen_window")]
    pub listen_window_secs: u64,
    #[serde(default)]
    pub elevator: Option<ElevatorConfig>,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ElevatorConfig {
    #[serde(default = "ElevatorConfig::default_timeout")]
    pub timeout_secs: u64,
    /// "idle" or "absolute".
    #[serde(default)]
    pub timeout_type: String,
    #[serde(default = "ElevatorConfig::default_reply_timeout")]
    pub reply_timeout_secs: u64,
}

impl ElevatorConfig {
    fn default_timeout() -> u64 {
        600
    }

    fn default_reply_timeout() -> u64 {
        30
    }
}

impl BotConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn listen_window(&self) -> Duration {
        Duration::from_secs(self.listen_window_secs)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
            name = "robbie"
            admins = ["root"]
            listen-window-secs = 30

            [elevator]
            timeout-secs = 120
            timeout-type = "absolute"

            [[plugins]]
            name = "ping"
            all-channels = true

            [[plugins.commands]]
            command = "ping"
            pattern = "^ping$"
        "#;
        let config: BotConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.name, "robbie");
        assert_eq!(config.listen_window(), Duration::from_secs(30));
        assert_eq!(config.elevator.unwrap().timeout_secs, 120);
        assert_eq!(config.plugins.len(), 1);
    }

    #[test]
    fn defaults_apply() {
        let config: BotConfig = toml::from_str("").unwrap();
        assert_eq!(config.name, "clatter");
        assert_eq!(config.listen_window_secs, 77);
        assert!(config.elevator.is_none());
        assert!(config.plugins.is_empty());
    }
}
