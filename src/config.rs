//! Credential and device configuration for the external tool.
//!
//! Values come from the environment (with `.env` loaded by `main`); the
//! crate materializes them into the YAML config file the external tool
//! expects before every operation.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Error;

/// Binary name used when `CLOUDPULL_BIN` is not set; resolved on `PATH`.
pub const DEFAULT_TOOL: &str = "cloudcli";

const DEFAULT_DEVICE_NAME: &str = "cloudpull";

/// Credentials, device identifiers and proxy settings for the external tool.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub refresh_token: String,
    pub proxy: String,
    pub device_id: String,
    pub device_name: String,
}

impl Config {
    /// Read configuration from the environment. Absent variables become
    /// empty strings; only [`Config::validate`] decides whether that is a
    /// problem.
    pub fn from_env() -> Self {
        let var = |key: &str| env::var(key).unwrap_or_default();

        let mut device_name = var("CLOUDPULL_DEVICE_NAME");
        if device_name.is_empty() {
            device_name = DEFAULT_DEVICE_NAME.to_string();
        }

        let config = Config {
            username: var("CLOUDPULL_USERNAME"),
            password: var("CLOUDPULL_PASSWORD"),
            refresh_token: var("CLOUDPULL_REFRESH_TOKEN"),
            proxy: var("CLOUDPULL_PROXY"),
            device_id: var("CLOUDPULL_DEVICE_ID"),
            device_name,
        };
        debug!(
            has_refresh_token = !config.refresh_token.is_empty(),
            has_username = !config.username.is_empty(),
            device_name = %config.device_name,
            "loaded configuration from environment"
        );
        config
    }

    /// A refresh token alone is enough; otherwise both username and
    /// password are required.
    pub fn is_configured(&self) -> bool {
        !self.refresh_token.is_empty() || (!self.username.is_empty() && !self.password.is_empty())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.is_configured() {
            return Err(Error::Config(
                "set CLOUDPULL_REFRESH_TOKEN or CLOUDPULL_USERNAME/CLOUDPULL_PASSWORD \
                 in the environment or a .env file"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Materialize the external tool's `config.yml` under `dir`, creating
    /// the directory as needed. Returns the written path.
    pub fn write_tool_config(&self, dir: &Path) -> Result<PathBuf, Error> {
        fs::create_dir_all(dir)?;
        let file = dir.join("config.yml");

        let rendered = ToolConfig {
            username: &self.username,
            password: &self.password,
            refresh_token: &self.refresh_token,
            device_id: &self.device_id,
            device_name: &self.device_name,
            proxy: &self.proxy,
            download_path: "./downloads",
            max_concurrent: 3,
            log_level: "info",
        };
        let yaml = serde_yaml::to_string(&rendered)
            .map_err(|e| Error::Config(format!("failed to render tool config: {e}")))?;
        fs::write(&file, yaml)?;

        info!(path = %file.display(), "materialized external tool config");
        Ok(file)
    }
}

/// The external tool's own config file shape. Download defaults mirror what
/// the tool ships with; the authoritative concurrency lives in the adaptive
/// controller and is passed per invocation via `--count`.
#[derive(Serialize)]
struct ToolConfig<'a> {
    username: &'a str,
    password: &'a str,
    refresh_token: &'a str,
    device_id: &'a str,
    device_name: &'a str,
    proxy: &'a str,
    download_path: &'a str,
    max_concurrent: u32,
    log_level: &'a str,
}

/// Path to the external tool binary: `CLOUDPULL_BIN` or the default name.
pub fn tool_path() -> PathBuf {
    env::var_os("CLOUDPULL_BIN")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL))
}

/// Directory the external tool reads its config from:
/// `CLOUDPULL_TOOL_CONFIG_DIR`, else `$HOME/.config/cloudcli`.
pub fn tool_config_dir() -> PathBuf {
    if let Some(dir) = env::var_os("CLOUDPULL_TOOL_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    let home = env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join(".config").join(DEFAULT_TOOL)
}
