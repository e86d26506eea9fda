use std::path::PathBuf;

use thiserror::Error;

use crate::agent::ToolMode;
use crate::agent::openai::DEFAULT_API_BASE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Config {
    pub services_file: PathBuf,
    pub ledger_path: PathBuf,
    pub model: String,
    pub api_base: String,
    pub api_key: String,
    pub tool_mode: ToolMode,
    pub max_tokens: u32,
    pub metrics_port: Option<u16>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("services_file", &self.services_file)
            .field("ledger_path", &self.ledger_path)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &"[REDACTED]")
            .field("tool_mode", &self.tool_mode)
            .field("max_tokens", &self.max_tokens)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let tool_mode = match get("SLOTBOOK_TOOL_MODE") {
            Some(v) => parse_var("SLOTBOOK_TOOL_MODE", v)?,
            None => ToolMode::default(),
        };
        let max_tokens: u32 = match get("SLOTBOOK_MAX_TOKENS") {
            Some(v) => parse_var("SLOTBOOK_MAX_TOKENS", v)?,
            None => 1024,
        };
        if max_tokens == 0 {
            return Err(ConfigError::Invalid {
                var: "SLOTBOOK_MAX_TOKENS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        let metrics_port = get("SLOTBOOK_METRICS_PORT")
            .map(|v| parse_var("SLOTBOOK_METRICS_PORT", v))
            .transpose()?;

        Ok(Self {
            services_file: get("SLOTBOOK_SERVICES_FILE").unwrap_or_else(|| "services.json".into()).into(),
            ledger_path: get("SLOTBOOK_LEDGER_PATH").unwrap_or_else(|| "records.wal".into()).into(),
            model: get("SLOTBOOK_MODEL").unwrap_or_else(|| "gpt-4o".into()),
            api_base: get("SLOTBOOK_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            api_key,
            tool_mode,
            max_tokens,
            metrics_port,
        })
    }
}
