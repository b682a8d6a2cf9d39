use crate::cli::{Cli, OutputFormat};
use crate::layout::DatasetFileCategory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const ENV_PREFIX: &str = "VALIDATE_OSW_";

const CONFIG_NAMES: [&str; 4] = [
    "validate-osw.toml",
    "validate-osw.json",
    ".validate-osw.toml",
    ".validate-osw.json",
];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

/// Validation-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Schema errors collected before the schema stage stops
    pub max_errors: usize,
    /// Schema used for every file instead of the built-in ones
    pub schema: Option<PathBuf>,
    /// Categories every archive must contain
    pub required_categories: Vec<DatasetFileCategory>,
    /// Offending values listed per integrity message
    pub display_limit: usize,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
}

/// Dataset file discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// File extensions treated as dataset layers
    pub extensions: Vec<String>,
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,
    /// Maximum depth below the staged root
    pub max_depth: Option<usize>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_errors: 20,
            schema: None,
            required_categories: Vec::new(),
            display_limit: 20,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["geojson".to_string()],
            exclude_dirs: vec!["__MACOSX".to_string()],
            max_depth: None,
        }
    }
}

fn parse_env<T: FromStr>(env: &impl EnvProvider, name: &str) -> Result<Option<T>> {
    let key = format!("{ENV_PREFIX}{name}");
    match env.get(&key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Environment(format!("Invalid {key} value: {value}"))),
        None => Ok(None),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Find a configuration file in the current directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        for name in &CONFIG_NAMES {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("validate-osw");
            for name in &CONFIG_NAMES {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply `VALIDATE_OSW_*` overrides from a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(max_errors) = parse_env(env, "MAX_ERRORS")? {
            config.validation.max_errors = max_errors;
        }

        if let Some(schema) = env.get(&format!("{ENV_PREFIX}SCHEMA")) {
            config.validation.schema = Some(PathBuf::from(schema));
        }

        if let Some(required) = env.get(&format!("{ENV_PREFIX}REQUIRED")) {
            config.validation.required_categories = split_list(&required)
                .iter()
                .map(|name| name.parse::<DatasetFileCategory>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    ConfigError::Environment(format!("Invalid {ENV_PREFIX}REQUIRED value: {e}"))
                })?;
        }

        if let Some(display_limit) = parse_env(env, "DISPLAY_LIMIT")? {
            config.validation.display_limit = display_limit;
        }

        if let Some(verbose) = parse_env(env, "VERBOSE")? {
            config.output.verbose = verbose;
        }

        if let Some(quiet) = parse_env(env, "QUIET")? {
            config.output.quiet = quiet;
        }

        if let Some(format) = env.get(&format!("{ENV_PREFIX}FORMAT")) {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                "summary" => OutputFormat::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {ENV_PREFIX}FORMAT value: {format}"
                    )));
                }
            };
        }

        if let Some(extensions) = env.get(&format!("{ENV_PREFIX}EXTENSIONS")) {
            config.files.extensions = split_list(&extensions);
        }

        if let Some(exclude_dirs) = env.get(&format!("{ENV_PREFIX}EXCLUDE_DIRS")) {
            config.files.exclude_dirs = split_list(&exclude_dirs);
        }

        if let Some(max_depth) = parse_env(env, "MAX_DEPTH")? {
            config.files.max_depth = Some(max_depth);
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(schema) = &cli.schema {
            config.validation.schema = Some(schema.clone());
        }
        if let Some(max_errors) = cli.max_errors {
            config.validation.max_errors = max_errors;
        }

        if let Some(format) = cli.format {
            config.output.format = format;
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        config
    }

    /// Merge two configurations (second takes precedence)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        base.validation.max_errors = override_config.validation.max_errors;
        base.validation.display_limit = override_config.validation.display_limit;
        if override_config.validation.schema.is_some() {
            base.validation.schema = override_config.validation.schema;
        }
        if !override_config.validation.required_categories.is_empty() {
            base.validation.required_categories = override_config.validation.required_categories;
        }

        base.output = override_config.output;

        if !override_config.files.extensions.is_empty() {
            base.files.extensions = override_config.files.extensions;
        }
        base.files.exclude_dirs = override_config.files.exclude_dirs;
        if override_config.files.max_depth.is_some() {
            base.files.max_depth = override_config.files.max_depth;
        }

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.validation.max_errors == 0 {
            return Err(ConfigError::Validation(
                "max_errors must be greater than 0".to_string(),
            ));
        }

        if config.validation.display_limit == 0 {
            return Err(ConfigError::Validation(
                "display_limit must be greater than 0".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }

        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        Ok(())
    }
}
