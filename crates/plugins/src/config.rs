//! TOML plugin-set configuration: raw serde shapes plus compilation into
//! validated [`PluginSpec`]s with pre-compiled patterns.

use std::path::Path;

use {
    regex::Regex,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    plugin::{InputMatcher, PluginSpec},
};

/// One command or ambient matcher as written in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatcherConfig {
    pub command: String,
    pub pattern: String,
    /// Context labels aligned with the pattern's capture groups; empty
    /// string = no substitution for that group.
    #[serde(default)]
    pub contexts: Vec<String>,
}

/// One plugin definition as written in config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PluginConfig {
    pub name: String,
    pub direct_only: bool,
    pub allow_direct: bool,
    pub require_admin: bool,
    pub users: Vec<String>,
    pub channels: Vec<String>,
    pub all_channels: bool,
    pub commands: Vec<MatcherConfig>,
    pub ambient: Vec<MatcherConfig>,
    pub catch_all: bool,
    pub authorizer: Option<String>,
    pub auth_require: String,
    pub elevated_commands: Vec<String>,
    pub elevate_immediate_commands: Vec<String>,
    pub trust_all_plugins: bool,
    pub trusted_plugins: Vec<String>,
    pub exec: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PluginSetFile {
    #[serde(default)]
    plugins: Vec<PluginConfig>,
}

/// Load a plugin-set TOML file and compile it.
pub fn load_plugin_set(path: &Path) -> Result<Vec<PluginSpec>> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file: PluginSetFile = toml::from_str(&raw)?;
    compile_plugins(file.plugins)
}

/// Compile raw plugin definitions into validated specs.
///
/// Fails on unnamed or duplicate plugins, uncompilable patterns, and
/// matchers declaring more context labels than the pattern has capture
/// groups.
pub fn compile_plugins(configs: Vec<PluginConfig>) -> Result<Vec<PluginSpec>> {
    let mut specs = Vec::with_capacity(configs.len());
    for config in configs {
        if config.name.is_empty() {
            return Err(Error::UnnamedPlugin);
        }
        if specs.iter().any(|s: &PluginSpec| s.name == config.name) {
            return Err(Error::DuplicatePlugin { name: config.name });
        }
        let commands = compile_matchers(&config.name, config.commands)?;
        let ambient = compile_matchers(&config.name, config.ambient)?;
        debug!(
            plugin = %config.name,
            commands = commands.len(),
            ambient = ambient.len(),
            "compiled plugin"
        );
        specs.push(PluginSpec {
            name: config.name,
            direct_only: config.direct_only,
            allow_direct: config.allow_direct,
            require_admin: config.require_admin,
            users: config.users,
            channels: config.channels,
            all_channels: config.all_channels,
            commands,
            ambient,
            catch_all: config.catch_all,
            authorizer: config.authorizer,
            auth_require: config.auth_require,
            elevated_commands: config.elevated_commands,
            elevate_immediate_commands: config.elevate_immediate_commands,
            trust_all_plugins: config.trust_all_plugins,
            trusted_plugins: config.trusted_plugins,
            exec: config.exec,
        });
    }
    Ok(specs)
}

fn compile_matchers(plugin: &str, matchers: Vec<MatcherConfig>) -> Result<Vec<InputMatcher>> {
    matchers
        .into_iter()
        .map(|m| {
            let pattern = Regex::new(&m.pattern).map_err(|source| Error::InvalidPattern {
                plugin: plugin.to_string(),
                command: m.command.clone(),
                source,
            })?;
            // captures_len counts the implicit whole-match group.
            let groups = pattern.captures_len() - 1;
            if m.contexts.len() > groups {
                return Err(Error::ContextArity {
                    plugin: plugin.to_string(),
                    command: m.command,
                    contexts: m.contexts.len(),
                    groups,
                });
            }
            Ok(InputMatcher {
                command: m.command,
                pattern,
                contexts: m.contexts,
            })
        })
        .collect()
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(command: &str, pattern: &str, contexts: &[&str]) -> MatcherConfig {
        MatcherConfig {
            command: command.into(),
            pattern: pattern.into(),
            contexts: contexts.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn compiles_a_minimal_plugin() {
        let specs = compile_plugins(vec![PluginConfig {
            name: "ping".into(),
            commands: vec![matcher("ping", r"(?i:ping)", &[])],
            all_channels: true,
            ..Default::default()
        }])
        .unwrap();
        assert_eq!(specs.len(), 1);
        assert!(specs[0].commands[0].pattern.is_match("PING"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let dup = PluginConfig {
            name: "ping".into(),
            ..Default::default()
        };
        let err = compile_plugins(vec![dup.clone(), dup]).unwrap_err();
        assert!(matches!(err, Error::DuplicatePlugin { .. }));
    }

    #[test]
    fn rejects_bad_pattern() {
        let err = compile_plugins(vec![PluginConfig {
            name: "bad".into(),
            commands: vec![matcher("x", r"(unclosed", &[])],
            ..Default::default()
        }])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn rejects_context_arity_mismatch() {
        let err = compile_plugins(vec![PluginConfig {
            name: "remember".into(),
            commands: vec![matcher("store", r"store (\S+)", &["thing", "place"])],
            ..Default::default()
        }])
        .unwrap_err();
        assert!(matches!(err, Error::ContextArity { groups: 1, .. }));
    }

    #[test]
    fn parses_toml_plugin_set() {
        let raw = r#"
            [[plugins]]
            name = "weather"
            all-channels = true
            catch-all = false

            [[plugins.commands]]
            command = "forecast"
            pattern = "forecast for (\\S+)"
            contexts = ["city"]
        "#;
        let file: PluginSetFile = toml::from_str(raw).unwrap();
        let specs = compile_plugins(file.plugins).unwrap();
        assert_eq!(specs[0].commands[0].contexts, vec!["city".to_string()]);
    }
}
