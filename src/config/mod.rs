use crate::models::UserConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Environment, File, FileFormat};
use std::fs;

/// Prefix of environment variables that override the user config,
/// e.g. `AUTOTEST_OUTPUT_FOLDER` or `AUTOTEST_SELECTED_MODULES="Data Extraction,Auto Drawing Creation"`.
pub const ENV_PREFIX: &str = "AUTOTEST";

/// Configuration manager for loading and saving the YAML user config.
///
/// Manages a single file, `AutoTest Config.yaml`, inside the configuration
/// directory. [`load_effective_config`](Self::load_effective_config) layers
/// environment overrides on top of it.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "AutoTest Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join("AutoTest Config.yaml"),
            config_dir,
        })
    }

    /// Load the user configuration file.
    ///
    /// # Returns
    /// The loaded UserConfig, or default if file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Load the user config with `AUTOTEST_*` environment overrides applied.
    ///
    /// The YAML file is optional; a missing file yields defaults plus
    /// whatever the environment sets.
    pub fn load_effective_config(&self) -> Result<UserConfig> {
        self.effective_config(None)
    }

    /// Layer `env` (or the process environment when `None`) over the YAML file
    fn effective_config(&self, env: Option<config::Map<String, String>>) -> Result<UserConfig> {
        let settings = config::Config::builder()
            .add_source(
                File::from(self.user_config_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("selected_modules")
                    .source(env),
            )
            .build()
            .with_context(|| {
                format!("Failed to build effective config from {}", self.user_config_path)
            })?;

        let config: UserConfig = settings
            .try_deserialize()
            .context("Failed to deserialize effective user config")?;

        tracing::debug!("Effective config: {:?}", config);
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the user config file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.user_config_path
    }
}
