use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub worker: WorkerConfig,
    pub storage: StorageConfig,
    pub alerts: AlertConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub check_interval_seconds: u64,
    pub rotation_interval_seconds: u64,
    pub max_concurrent_probes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: path::PathBuf,
    pub logs_dir: path::PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertProvider {
    #[default]
    Log,
    Twilio,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub provider: AlertProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twilio: Option<TwilioConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    pub from_phone: String,
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormatConfig>,
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".into()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 60,
            rotation_interval_seconds: 60 * 60 * 24,
            max_concurrent_probes: 32,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: ".data".into(), logs_dir: ".logs".into() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: None }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe-worker/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe-worker/config.toml"))
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "********" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Worker")?;
        write_1(f, "Check Interval (s)", &self.worker.check_interval_seconds)?;
        write_1(f, "Rotation Interval (s)", &self.worker.rotation_interval_seconds)?;
        write_1(f, "Max Concurrent Probes", &self.worker.max_concurrent_probes)?;

        write_title_1(f, "Storage")?;
        write_1(f, "Data Directory", &self.storage.data_dir.display())?;
        write_1(f, "Logs Directory", &self.storage.logs_dir.display())?;

        write_title_1(f, "Alerts")?;
        write_1(f, "Provider", &format!("{:?}", self.alerts.provider).to_lowercase())?;
        if let Some(twilio) = &self.alerts.twilio {
            write_1(f, "Twilio Account", &twilio.account_sid)?;
            write_1(f, "Twilio Token", &mask(&twilio.auth_token))?;
            write_1(f, "Twilio From", &twilio.from_phone)?;
            write_1(f, "Twilio API", &twilio.api_base)?;
        }

        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        if let Some(format) = self.logging.format {
            write_1(f, "Format", &format!("{format:?}").to_lowercase())?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe-worker/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// # use uppe_worker::config::Config;
    /// let cfg = Config::from_config(None::<&std::path::Path>).unwrap();
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let mut config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(|source| {
                ConfigError::ReadFailed { path: config_path.display().to_string(), source }
            })?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the worker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.check_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker.check_interval_seconds",
                reason: "must be at least 1",
            });
        }
        if self.worker.rotation_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker.rotation_interval_seconds",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Secrets may come from the environment instead of the file
    fn apply_env(&mut self) {
        if let (Some(twilio), Ok(token)) =
            (self.alerts.twilio.as_mut(), env::var("TWILIO_AUTH_TOKEN"))
        {
            twilio.auth_token = token;
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed =
            |source| ConfigError::WriteFailed { path: path.display().to_string(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        std::fs::write(path, config_str).map_err(write_failed)
    }
}
