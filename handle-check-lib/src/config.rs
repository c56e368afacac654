//! Configuration file parsing and management.
//!
//! Settings come from four layers, lowest to highest precedence: built-in
//! defaults, TOML files, `HC_*` environment variables, and finally CLI flags
//! (applied by the binary). This module handles the first three.

use crate::error::HandleCheckError;
use crate::generate::GenerationConfig;
use crate::types::RunConfig;
use crate::utils::parse_duration_string;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout for remote checks.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Default values for run options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Remote service settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checker: Option<CheckerConfig>,

    /// Variant generation defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationDefaults>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Number of concurrent workers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Base delay between remote calls (e.g. "3s", "500ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay: Option<String>,

    /// Attempts per identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Checkpoint file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Remote service settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckerConfig {
    /// Endpoint template containing `{username}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Per-request timeout (e.g. "10s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Variant generation settings as written in a config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefixes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffixes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    home: Option<PathBuf>,
    xdg_config_home: Option<PathBuf>,
    working_dir: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Manager that searches the locations named by the process environment.
    pub fn new() -> Self {
        Self {
            home: env::var_os("HOME").map(PathBuf::from),
            xdg_config_home: env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            working_dir: PathBuf::from("."),
        }
    }

    /// Manager searching explicit directories instead of the environment.
    pub fn with_dirs(
        home: Option<PathBuf>,
        xdg_config_home: Option<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            home,
            xdg_config_home,
            working_dir: working_dir.into(),
        }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// `FileError` if the file is missing or unreadable, `ConfigError` if it
    /// is not valid TOML or fails validation.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, HandleCheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(HandleCheckError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            HandleCheckError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            HandleCheckError::config(format!(
                "Failed to parse TOML configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "Loaded configuration file");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config, then `~/.handle-check.toml`, then `./handle-check.toml`;
    /// later files override earlier ones field by field. A file that exists
    /// but is invalid is an error.
    pub fn discover_and_load(&self) -> Result<FileConfig, HandleCheckError> {
        let mut merged_config = FileConfig::default();

        for path in self.candidate_paths() {
            if path.exists() {
                let config = self.load_file(&path)?;
                merged_config = self.merge_configs(merged_config, config);
            }
        }

        Ok(merged_config)
    }

    /// Candidate locations, lowest precedence first.
    fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        let xdg_dir = self
            .xdg_config_home
            .clone()
            .or_else(|| self.home.as_ref().map(|home| home.join(".config")));
        if let Some(dir) = xdg_dir {
            paths.push(dir.join("handle-check").join("config.toml"));
        }
        if let Some(home) = &self.home {
            paths.push(home.join(".handle-check.toml"));
        }
        paths.push(self.working_dir.join("handle-check.toml"));

        paths
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower_defaults), Some(higher_defaults)) => Some(DefaultsConfig {
                    workers: higher_defaults.workers.or(lower_defaults.workers),
                    base_delay: higher_defaults.base_delay.or(lower_defaults.base_delay),
                    max_retries: higher_defaults.max_retries.or(lower_defaults.max_retries),
                    state: higher_defaults.state.or(lower_defaults.state),
                    output: higher_defaults.output.or(lower_defaults.output),
                }),
                (lower_defaults, higher_defaults) => higher_defaults.or(lower_defaults),
            },
            checker: match (lower.checker, higher.checker) {
                (Some(lower_checker), Some(higher_checker)) => Some(CheckerConfig {
                    endpoint: higher_checker.endpoint.or(lower_checker.endpoint),
                    timeout: higher_checker.timeout.or(lower_checker.timeout),
                }),
                (lower_checker, higher_checker) => higher_checker.or(lower_checker),
            },
            generation: match (lower.generation, higher.generation) {
                (Some(lower_gen), Some(higher_gen)) => Some(GenerationDefaults {
                    prefixes: higher_gen.prefixes.or(lower_gen.prefixes),
                    suffixes: higher_gen.suffixes.or(lower_gen.suffixes),
                    min_length: higher_gen.min_length.or(lower_gen.min_length),
                    max_length: higher_gen.max_length.or(lower_gen.max_length),
                }),
                (lower_gen, higher_gen) => higher_gen.or(lower_gen),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), HandleCheckError> {
        if let Some(defaults) = &config.defaults {
            if let Some(workers) = defaults.workers {
                if workers == 0 || workers > 100 {
                    return Err(HandleCheckError::config(
                        "Workers must be between 1 and 100",
                    ));
                }
            }

            if defaults.max_retries == Some(0) {
                return Err(HandleCheckError::config("max_retries must be at least 1"));
            }

            if let Some(delay) = &defaults.base_delay {
                check_duration("base_delay", delay)?;
            }
        }

        if let Some(checker) = &config.checker {
            if let Some(timeout) = &checker.timeout {
                check_duration("timeout", timeout)?;
            }
            if let Some(endpoint) = &checker.endpoint {
                if !endpoint.contains(crate::protocols::USERNAME_PLACEHOLDER) {
                    return Err(HandleCheckError::config(format!(
                        "Endpoint '{}' must contain {}",
                        endpoint,
                        crate::protocols::USERNAME_PLACEHOLDER
                    )));
                }
            }
        }

        if let Some(generation) = &config.generation {
            if let (Some(min), Some(max)) = (generation.min_length, generation.max_length) {
                if min > max {
                    return Err(HandleCheckError::config(format!(
                        "min_length ({}) cannot exceed max_length ({})",
                        min, max
                    )));
                }
            }
        }

        Ok(())
    }
}

fn check_duration(field: &str, value: &str) -> Result<(), HandleCheckError> {
    match parse_duration_string(value) {
        Some(_) => Ok(()),
        None => Err(HandleCheckError::config(format!(
            "Invalid {} '{}'. Use format like '500ms', '3s', '2m'",
            field, value
        ))),
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// Values come from `HC_*` variables. Invalid values are logged and ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub workers: Option<usize>,
    pub base_delay: Option<Duration>,
    pub max_retries: Option<u32>,
    pub state: Option<String>,
    pub output: Option<String>,
    pub endpoint: Option<String>,
    pub input: Option<String>,
    pub config: Option<String>,
}

impl EnvConfig {
    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env_config = EnvConfig::default();

        // HC_WORKERS - concurrent workers
        if let Some(val) = lookup("HC_WORKERS") {
            match val.trim().parse::<usize>() {
                Ok(workers) if (1..=100).contains(&workers) => {
                    env_config.workers = Some(workers);
                    debug!(workers, "Using HC_WORKERS");
                }
                _ => warn!(value = %val, "Invalid HC_WORKERS, must be 1-100"),
            }
        }

        // HC_BASE_DELAY - base delay between calls
        if let Some(val) = lookup("HC_BASE_DELAY") {
            match parse_duration_string(&val) {
                Some(delay) => {
                    env_config.base_delay = Some(delay);
                    debug!(delay = ?delay, "Using HC_BASE_DELAY");
                }
                None => warn!(value = %val, "Invalid HC_BASE_DELAY, use format like '3s'"),
            }
        }

        // HC_MAX_RETRIES - attempts per identifier
        if let Some(val) = lookup("HC_MAX_RETRIES") {
            match val.trim().parse::<u32>() {
                Ok(retries) if retries > 0 => {
                    env_config.max_retries = Some(retries);
                    debug!(retries, "Using HC_MAX_RETRIES");
                }
                _ => warn!(value = %val, "Invalid HC_MAX_RETRIES, must be at least 1"),
            }
        }

        env_config.state = non_empty(lookup("HC_STATE"));
        env_config.output = non_empty(lookup("HC_OUTPUT"));
        env_config.input = non_empty(lookup("HC_INPUT"));
        env_config.config = non_empty(lookup("HC_CONFIG"));

        // HC_ENDPOINT - endpoint template
        if let Some(endpoint) = non_empty(lookup("HC_ENDPOINT")) {
            if endpoint.contains(crate::protocols::USERNAME_PLACEHOLDER) {
                env_config.endpoint = Some(endpoint);
            } else {
                warn!(value = %endpoint, "Invalid HC_ENDPOINT, missing {{username}}");
            }
        }

        env_config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Load configuration from the process's `HC_*` environment variables.
pub fn load_env_config() -> EnvConfig {
    EnvConfig::from_lookup(|key| env::var(key).ok())
}

/// Settings resolved from defaults, files and environment.
///
/// The binary layers CLI flags on top of this.
#[derive(Debug, Clone)]
pub struct Settings {
    pub run: RunConfig,
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub input: Option<PathBuf>,
    pub generation: GenerationConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            endpoint: None,
            timeout: DEFAULT_CHECK_TIMEOUT,
            input: None,
            generation: GenerationConfig::default(),
        }
    }
}

impl Settings {
    /// Apply file values, then environment values, over the defaults.
    pub fn resolve(file: &FileConfig, env_config: &EnvConfig) -> Self {
        let mut settings = Settings::default();

        if let Some(defaults) = &file.defaults {
            if let Some(workers) = defaults.workers {
                settings.run = settings.run.with_workers(workers);
            }
            if let Some(delay) = defaults.base_delay.as_deref().and_then(parse_duration_string) {
                settings.run = settings.run.with_base_delay(delay);
            }
            if let Some(retries) = defaults.max_retries {
                settings.run = settings.run.with_max_retries(retries);
            }
            if let Some(state) = &defaults.state {
                settings.run = settings.run.with_state_path(state);
            }
            if let Some(output) = &defaults.output {
                settings.run = settings.run.with_output_dir(output);
            }
        }

        if let Some(checker) = &file.checker {
            settings.endpoint = checker.endpoint.clone();
            if let Some(timeout) = checker.timeout.as_deref().and_then(parse_duration_string) {
                settings.timeout = timeout;
            }
        }

        if let Some(generation) = &file.generation {
            if let Some(prefixes) = &generation.prefixes {
                settings.generation.prefixes = prefixes.clone();
            }
            if let Some(suffixes) = &generation.suffixes {
                settings.generation.suffixes = suffixes.clone();
            }
            let min = generation.min_length.unwrap_or(settings.generation.min_length);
            let max = generation.max_length.unwrap_or(settings.generation.max_length);
            settings.generation = settings.generation.with_length_range(min, max);
        }

        if let Some(workers) = env_config.workers {
            settings.run = settings.run.with_workers(workers);
        }
        if let Some(delay) = env_config.base_delay {
            settings.run = settings.run.with_base_delay(delay);
        }
        if let Some(retries) = env_config.max_retries {
            settings.run = settings.run.with_max_retries(retries);
        }
        if let Some(state) = &env_config.state {
            settings.run = settings.run.with_state_path(state);
        }
        if let Some(output) = &env_config.output {
            settings.run = settings.run.with_output_dir(output);
        }
        if let Some(endpoint) = &env_config.endpoint {
            settings.endpoint = Some(endpoint.clone());
        }
        if let Some(input) = &env_config.input {
            settings.input = Some(PathBuf::from(input));
        }

        settings
    }
}
