use crate::domain::constants::{
    CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, REGISTRY_TOKEN_ENV, REGISTRY_URL_ENV, REGISTRY_USER_ENV,
};
use crate::domain::models::{DriverConfig, FixtureSection, WaitSection};
use crate::services::invoker::{Credentials, ToolContext};
use crate::services::poller::PollTimeout;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("tool.command_prefix is empty")]
    EmptyCommandPrefix,
}

impl ConfigError {
    /// Stable code for the `--json` error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::EmptyCommandPrefix => "config_invalid",
        }
    }
}

/// Finds and parses the config file. Explicit paths must exist; the default file is optional.
pub fn load_config(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<DriverConfig, ConfigError> {
    let path = match explicit
        .map(Path::to_path_buf)
        .or_else(|| env(CONFIG_PATH_ENV).filter(|p| !p.is_empty()).map(PathBuf::from))
    {
        Some(p) => p,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(DriverConfig::default());
            }
            default
        }
    };
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
}

/// Command-line values that win over the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryAccess {
    pub url: String,
    pub user: String,
    pub token: String,
}

impl RegistryAccess {
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| env(key).filter(|v| !v.is_empty());
        Some(Self {
            url: get(REGISTRY_URL_ENV)?,
            user: get(REGISTRY_USER_ENV)?,
            token: get(REGISTRY_TOKEN_ENV)?,
        })
    }
}

/// Fully resolved run settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub command_prefix: String,
    pub api_url: String,
    pub admin: Credentials,
    pub tool_timeout: Option<Duration>,
    pub fixtures: FixtureSection,
    pub wait: WaitSection,
    pub log_file: PathBuf,
    pub dump_responses: bool,
    pub registry: Option<RegistryAccess>,
}

impl Settings {
    /// `ci` switches to the CI url and prepends the CI command prefix.
    pub fn resolve(
        config: DriverConfig,
        overrides: Overrides,
        ci: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let DriverConfig {
            tool,
            service,
            credentials,
            fixtures,
            wait,
            log,
        } = config;

        let command_prefix = if ci && !tool.ci_command_prefix.trim().is_empty() {
            format!("{} {}", tool.ci_command_prefix.trim(), tool.command_prefix.trim())
        } else {
            tool.command_prefix.trim().to_string()
        };
        if command_prefix.is_empty() {
            return Err(ConfigError::EmptyCommandPrefix);
        }

        let api_url = overrides
            .url
            .unwrap_or(if ci { service.ci_url } else { service.local_url });
        let timeout_secs = overrides.timeout_secs.unwrap_or(tool.timeout_secs);

        Ok(Self {
            command_prefix,
            api_url,
            admin: Credentials {
                user: overrides.user.unwrap_or(credentials.admin_user),
                password: overrides.password.unwrap_or(credentials.admin_password),
            },
            tool_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            fixtures,
            wait,
            log_file: overrides.log_file.unwrap_or_else(|| PathBuf::from(log.file)),
            dump_responses: log.dump_responses,
            registry: RegistryAccess::from_env(env),
        })
    }

    pub fn root_context(&self) -> ToolContext {
        ToolContext::new(&self.command_prefix, self.admin.clone(), &self.api_url)
    }

    pub fn system_wait(&self) -> (PollTimeout, Duration) {
        (
            PollTimeout::from_secs(self.wait.system_timeout_secs),
            Duration::from_secs(self.wait.system_interval_secs),
        )
    }

    pub fn image_wait(&self) -> (PollTimeout, Duration) {
        (
            PollTimeout::from_secs(self.wait.image_timeout_secs),
            Duration::from_secs(self.wait.image_interval_secs),
        )
    }
}
