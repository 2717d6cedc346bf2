use crate::error::ConfigError;
use crate::manifest::TrustedKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.skillget.dev/v1";

pub const API_URL_ENV: &str = "SKILLGET_API_URL";
pub const INSTALL_DIR_ENV: &str = "SKILLGET_INSTALL_DIR";
pub const TIMEOUT_ENV: &str = "SKILLGET_TIMEOUT_MS";
pub const MAX_CONCURRENT_ENV: &str = "SKILLGET_MAX_CONCURRENT";
pub const TRUSTED_KEY_ENV: &str = "SKILLGET_TRUSTED_KEY";
pub const DEBUG_ENV: &str = "SKILLGET_DEBUG";

const ENV_PREFIX: &str = "SKILLGET_";
const CLAUDE_DIR: &str = ".claude";
const CONFIG_FILE: &str = "skillget.toml";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_CONCURRENT: usize = 5;
const DEFAULT_RETRIES: u32 = 2;

/// Immutable settings for one invocation. `install_dir` is always absolute.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub install_dir: PathBuf,
    pub timeout: Duration,
    pub max_concurrent: usize,
    pub retries: u32,
    pub skip_verify: bool,
    pub skip_hash_verify: bool,
    pub dry_run: bool,
    pub overwrite: bool,
    pub trusted_key: Option<TrustedKey>,
    pub debug: bool,
}

/// Caller-supplied values, applied on top of every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub install_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub retries: Option<u32>,
    pub skip_verify: bool,
    pub skip_hash_verify: bool,
    pub dry_run: bool,
    pub overwrite: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    api_base_url: Option<String>,
    install_dir: Option<PathBuf>,
    timeout_ms: Option<u64>,
    max_concurrent: Option<usize>,
    retries: Option<u32>,
}

/// Builds a [`Config`] from defaults, the optional config file, environment
/// and caller overrides, in that order of precedence.
///
/// Home directory and environment are injected so tests never touch process
/// state.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    home: PathBuf,
    env: HashMap<String, String>,
    config_file: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let config_file = Some(home.join(CLAUDE_DIR).join(CONFIG_FILE));
        Self {
            home,
            env: HashMap::new(),
            config_file,
        }
    }

    /// Resolver bound to the real home directory and `SKILLGET_*` variables.
    pub fn from_process() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        let mut resolver = Self::new(home);
        for (key, value) in std::env::vars() {
            if key.starts_with(ENV_PREFIX) {
                resolver.env.insert(key, value);
            }
        }
        Ok(resolver)
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<Config, ConfigError> {
        let file = self.load_file()?;

        let api_base_url = overrides
            .api_base_url
            .clone()
            .or_else(|| self.env_value(API_URL_ENV))
            .or(file.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = normalize_base_url(&api_base_url)?;

        let install_dir = match overrides
            .install_dir
            .clone()
            .or_else(|| self.env_value(INSTALL_DIR_ENV).map(PathBuf::from))
            .or(file.install_dir)
        {
            Some(dir) => resolve_install_dir(&self.home, &dir),
            None => default_install_dir(&self.home),
        };

        let timeout_ms = match overrides.timeout_ms {
            Some(ms) => ms,
            None => match self.env_value(TIMEOUT_ENV) {
                Some(raw) => parse_number(TIMEOUT_ENV, &raw)?,
                None => file.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            },
        };
        if timeout_ms == 0 {
            return Err(invalid("timeout_ms", "0", "must be greater than zero"));
        }

        let max_concurrent = match overrides.max_concurrent {
            Some(n) => n,
            None => match self.env_value(MAX_CONCURRENT_ENV) {
                Some(raw) => parse_number(MAX_CONCURRENT_ENV, &raw)?,
                None => file.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT),
            },
        };
        if max_concurrent == 0 {
            return Err(invalid("max_concurrent", "0", "must be a positive integer"));
        }

        let trusted_key = self
            .env_value(TRUSTED_KEY_ENV)
            .map(|raw| TrustedKey::parse(&raw))
            .transpose()?;

        let debug = self
            .env_value(DEBUG_ENV)
            .is_some_and(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"));

        Ok(Config {
            api_base_url,
            install_dir,
            timeout: Duration::from_millis(timeout_ms),
            max_concurrent,
            retries: overrides
                .retries
                .or(file.retries)
                .unwrap_or(DEFAULT_RETRIES),
            skip_verify: overrides.skip_verify,
            skip_hash_verify: overrides.skip_hash_verify,
            dry_run: overrides.dry_run,
            overwrite: overrides.overwrite,
            trusted_key,
            debug,
        })
    }

    fn env_value(&self, key: &str) -> Option<String> {
        self.env
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn load_file(&self) -> Result<FileConfig, ConfigError> {
        let Some(path) = &self.config_file else {
            return Ok(FileConfig::default());
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(FileConfig::default());
            }
            Err(e) => {
                return Err(ConfigError::File {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        toml::from_str(&content).map_err(|e| ConfigError::File {
            path: path.clone(),
            reason: e.to_string(),
        })
    }
}

/// `<home>/.claude/skills`
pub fn default_install_dir(home: &Path) -> PathBuf {
    home.join(CLAUDE_DIR).join("skills")
}

/// Relative paths (and `~/...`) land under `home`, never under the working
/// directory. Absolute paths are returned unchanged.
pub fn resolve_install_dir(home: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    match dir.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => home.join(dir),
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(
            raw.to_string(),
            format!("unsupported scheme {}", parsed.scheme()),
        ));
    }
    Ok(trimmed.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
