//! Process configuration.
//!
//! Settings come from CLI flags with environment-variable fallbacks. The
//! tracked repository list lives in a small JSON file so it can be edited
//! without restarting with new environment variables.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::error::AppError;

/// Runtime settings for the tracker service.
#[derive(Debug, Clone, Parser)]
#[command(name = "pr-tracker", about = "PR review tracking dashboard backend")]
pub struct Settings {
    /// GitHub personal access token used for API calls.
    #[arg(long, env = "GITHUB_TOKEN", default_value = "", hide_env_values = true)]
    pub github_token: String,

    /// Base URL of the GitHub API.
    #[arg(long, env = "GITHUB_API_BASE", default_value = "https://api.github.com")]
    pub github_api_base: String,

    /// Address the dashboard API binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    pub bind_addr: String,

    /// Path to the JSON file listing tracked repositories.
    #[arg(long, env = "CONFIG_PATH", default_value = "config.json")]
    pub config_path: PathBuf,

    /// Browser origin allowed to call the API.
    #[arg(long, env = "DASHBOARD_ORIGIN", default_value = "http://localhost:5173")]
    pub dashboard_origin: String,
}

/// Shape of the repository config file: `{"repos": ["org/repo", ...]}`.
#[derive(Debug, Default, Deserialize)]
struct RepoFile {
    #[serde(default)]
    repos: Vec<String>,
}

impl Settings {
    /// Load the tracked repository list from the config file.
    ///
    /// A missing file yields an empty list, not an error; the service then
    /// serves empty result sets until repositories are configured.
    pub fn load_repos(&self) -> Result<Vec<String>, AppError> {
        if !self.config_path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.config_path).map_err(|e| {
            AppError::config(format!(
                "Failed to read {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let parsed: RepoFile = serde_json::from_str(&raw)
            .map_err(|e| AppError::config(format!("Invalid repository config: {}", e)))?;

        Ok(parsed.repos)
    }
}
