// ⚙️ Configuration - TOML file, then environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::writer::DEFAULT_SHEET_NAME;

pub const ENV_OUTPUT_DIR: &str = "LOAN_PORTFOLIO_OUTPUT_DIR";
pub const ENV_OWNER_TOKEN: &str = "LOAN_PORTFOLIO_OWNER_TOKEN";
pub const ENV_BIND: &str = "LOAN_PORTFOLIO_BIND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Where processed extracts are written
    pub output_dir: PathBuf,
    /// Shared token required to upload; uploads are refused while unset
    pub owner_token: Option<String>,
    pub sheet_name: String,
    /// Appended to the timestamp in extract file names
    pub file_suffix: String,
    pub bind_addr: String,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        PortfolioConfig {
            output_dir: PathBuf::from("uploads"),
            owner_token: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            file_suffix: "Loan_Portfolio".to_string(),
            bind_addr: "0.0.0.0:8501".to_string(),
        }
    }
}

impl PortfolioConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Defaults, then `path` if given, then environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::from_toml_str(&content)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?
            }
            None => Self::default(),
        };

        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from a variable lookup (the process environment in `load`)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(token) = lookup(ENV_OWNER_TOKEN).filter(|v| !v.is_empty()) {
            self.owner_token = Some(token);
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.is_empty()) {
            self.bind_addr = bind;
        }
        self
    }

    /// True only when a token is configured and `token` equals it
    pub fn is_owner(&self, token: Option<&str>) -> bool {
        match (&self.owner_token, token) {
            (Some(expected), Some(given)) => !expected.is_empty() && expected == given,
            _ => false,
        }
    }
}
