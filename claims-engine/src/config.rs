use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClaimsError, Result};

pub const DEFAULT_MAX_TOOL_CALLS: usize = claim_graph::DEFAULT_MAX_STEPS;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runtime settings for claim processing, read from `CLAIMS_*` variables
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    pub max_tool_calls: usize,
    /// Overrides the business-rules table when set
    pub auto_approval_limit: Option<f64>,
    pub coverage_service_url: Option<String>,
    pub remote_timeout: Duration,
    pub lookup_timeout: Duration,
    /// Directory holding the JSON rule tables and seed data
    pub data_dir: Option<PathBuf>,
    pub parallel: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            auto_approval_limit: None,
            coverage_service_url: None,
            remote_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            lookup_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            data_dir: None,
            parallel: false,
        }
    }
}

impl ProcessingConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset or blank keys keep their
    /// defaults; unparsable values are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(raw) = get("CLAIMS_MAX_TOOL_CALLS") {
            let value: usize = parse(&raw, "CLAIMS_MAX_TOOL_CALLS")?;
            if value == 0 {
                return Err(ClaimsError::Config(
                    "CLAIMS_MAX_TOOL_CALLS must be at least 1".to_string(),
                ));
            }
            config.max_tool_calls = value;
        }

        if let Some(raw) = get("CLAIMS_AUTO_APPROVAL_LIMIT") {
            let value: f64 = parse(&raw, "CLAIMS_AUTO_APPROVAL_LIMIT")?;
            if !value.is_finite() || value < 0.0 {
                return Err(ClaimsError::Config(format!(
                    "CLAIMS_AUTO_APPROVAL_LIMIT must be a non-negative amount, got {}",
                    raw
                )));
            }
            config.auto_approval_limit = Some(value);
        }

        config.coverage_service_url = get("CLAIMS_COVERAGE_URL");

        if let Some(raw) = get("CLAIMS_REMOTE_TIMEOUT_SECS") {
            config.remote_timeout =
                Duration::from_secs(parse(&raw, "CLAIMS_REMOTE_TIMEOUT_SECS")?);
        }
        if let Some(raw) = get("CLAIMS_LOOKUP_TIMEOUT_SECS") {
            config.lookup_timeout =
                Duration::from_secs(parse(&raw, "CLAIMS_LOOKUP_TIMEOUT_SECS")?);
        }

        config.data_dir = get("CLAIMS_DATA_DIR").map(PathBuf::from);

        if let Some(raw) = get("CLAIMS_PARALLEL") {
            config.parallel = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ClaimsError::Config(format!(
                        "CLAIMS_PARALLEL must be a boolean, got {}",
                        raw
                    )));
                }
            };
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| ClaimsError::Config(format!("{} has invalid value {:?}", key, raw)))
}
