//! Runtime configuration, read from TOML with `OFFSPRING_*` env overrides
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// What to do when a patch walks a terminal financial or paperwork state
/// (`PAID_IN_FULL`, `SIGNED`) back to an earlier value.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminalRegressionPolicy {
    #[default]
    Reject,
    /// Accept the correction and clear the terminal timestamp with it.
    Allow,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub normalizer: NormalizerConfig,
    pub store: StoreConfig,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    pub terminal_regression: TerminalRegressionPolicy,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub cas_retries: u32,
    pub flush_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("offspring.db"),
            cas_retries: 8,
            flush_on_write: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Config> {
        toml::from_str(contents).context("failed to parse offspring config")
    }

    /// Read `path` if it exists, fall back to defaults otherwise, then layer
    /// the environment on top.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml_str(&contents)
                .with_context(|| format!("in {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("OFFSPRING_TERMINAL_REGRESSION") {
            match raw.trim() {
                "" => {}
                "reject" => self.normalizer.terminal_regression = TerminalRegressionPolicy::Reject,
                "allow" => self.normalizer.terminal_regression = TerminalRegressionPolicy::Allow,
                other => {
                    tracing::warn!("invalid OFFSPRING_TERMINAL_REGRESSION {other:?}, ignoring")
                }
            }
        }

        if let Some(raw) = lookup("OFFSPRING_STORE_CAS_RETRIES") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match trimmed.parse::<u32>() {
                    Ok(value) => self.store.cas_retries = value,
                    Err(err) => {
                        tracing::warn!("invalid OFFSPRING_STORE_CAS_RETRIES, ignoring: {err}")
                    }
                }
            }
        }

        if let Some(raw) = lookup("OFFSPRING_STORE_PATH") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.store.path = PathBuf::from(trimmed);
            }
        }
    }
}
