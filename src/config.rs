use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application name used for per-user directories
pub const APP_NAME: &str = "Vaulture";

/// Prefix of environment variables that override configuration keys
pub const ENV_PREFIX: &str = "VAULTURE";

/// Default maximum log file size before rotation (1 MiB)
pub const DEFAULT_LOG_MAX_BYTES: u64 = 1_048_576;

/// Default number of rotated log files kept on disk
pub const DEFAULT_LOG_BACKUP_COUNT: usize = 5;

/// How the application is deployed, which decides where its files live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Installed binary: per-user data directory, migrations next to the executable
    Packaged,
    /// Running from a source checkout: everything under the project root
    Source,
}

impl DeploymentMode {
    /// Release builds are packaged, debug builds run from source
    pub fn detect() -> Self {
        if cfg!(debug_assertions) {
            DeploymentMode::Source
        } else {
            DeploymentMode::Packaged
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Packaged => write!(f, "packaged"),
            DeploymentMode::Source => write!(f, "source"),
        }
    }
}

impl FromStr for DeploymentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "packaged" | "frozen" => Ok(DeploymentMode::Packaged),
            "source" | "dev" => Ok(DeploymentMode::Source),
            _ => Err(anyhow!(
                "Unknown deployment mode '{}', expected 'packaged' or 'source'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VaultureConfig {
    /// Where the application's files are resolved from
    pub mode: DeploymentMode,

    /// Directory holding the database (and logs in packaged mode)
    pub data_dir: Option<PathBuf>,

    /// Explicit database file location
    pub db_path: Option<PathBuf>,

    /// Explicit migrations directory
    pub migrations_dir: Option<PathBuf>,

    /// Explicit log directory
    pub log_dir: Option<PathBuf>,

    /// Log file size that triggers rotation
    pub log_max_bytes: u64,

    /// Number of rotated log files to keep
    pub log_backup_count: usize,

    /// Mirror INFO-level logs to stdout
    pub console_log: bool,
}

const EMPTY_CONFIG: &str = r#"### vaulture configuration file

### deployment mode: "packaged" or "source" (default depends on the build)
# mode = "packaged"

### locations (defaults depend on the deployment mode)
# data_dir = "~/.local/share/Vaulture"
# db_path = "~/.local/share/Vaulture/vault.db"
# migrations_dir = "/opt/vaulture/migrations"
# log_dir = "~/.local/share/Vaulture"

### log rotation
# log_max_bytes = 1048576     # 1 MiB
# log_backup_count = 5

### mirror logs to the console (default: on in source mode)
# console_log = true
"#;

impl Default for VaultureConfig {
    fn default() -> Self {
        let mode = DeploymentMode::detect();
        Self {
            mode,
            data_dir: None,
            db_path: None,
            migrations_dir: None,
            log_dir: None,
            log_max_bytes: DEFAULT_LOG_MAX_BYTES,
            log_backup_count: DEFAULT_LOG_BACKUP_COUNT,
            console_log: mode == DeploymentMode::Source,
        }
    }
}

impl VaultureConfig {
    /// Function to create and initialize a new configuration
    ///
    /// Without an explicit path, `<config dir>/Vaulture/vaulture.toml` is used
    /// and a commented template is written there on first use.
    pub fn new(path: &Option<String>) -> Result<VaultureConfig> {
        let file = match path {
            Some(p) => PathBuf::from(p),
            None => {
                let file = Self::config_file_path()?;
                if let Some(dir) = file.parent() {
                    std::fs::create_dir_all(dir)
                        .map_err(|e| anyhow!("Unable to create config directory: {}", e))?;
                }
                file
            }
        };

        if !file.exists() {
            std::fs::write(&file, EMPTY_CONFIG).map_err(|e| {
                anyhow!("Unable to create config file {}: {}", file.display(), e)
            })?;
        }

        Self::load(Some(&file))
    }

    /// Load configuration from an optional TOML file plus `VAULTURE_*` variables
    ///
    /// E.g., `VAULTURE_DB_PATH=/tmp/vault.db vaulture migrate` overrides the
    /// database location.
    pub fn load(file: Option<&Path>) -> Result<VaultureConfig> {
        Self::load_with_env_prefix(file, ENV_PREFIX)
    }

    fn load_with_env_prefix(file: Option<&Path>, env_prefix: &str) -> Result<VaultureConfig> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            let path_str = path
                .to_str()
                .ok_or_else(|| anyhow!("Could not convert config path to string"))?;
            builder = builder.add_source(
                config::File::with_name(path_str)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(config::Environment::with_prefix(env_prefix));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_values(&values)
    }

    fn from_values(values: &HashMap<String, String>) -> Result<VaultureConfig> {
        let defaults = VaultureConfig::default();

        let mode = match values.get("mode") {
            Some(m) => m.parse()?,
            None => defaults.mode,
        };

        let path_value = |key: &str| values.get(key).map(|v| expand_home(v));

        let log_max_bytes = match values.get("log_max_bytes") {
            Some(v) => v
                .parse()
                .map_err(|e| anyhow!("Invalid log_max_bytes '{}': {}", v, e))?,
            None => DEFAULT_LOG_MAX_BYTES,
        };
        if log_max_bytes == 0 {
            return Err(anyhow!("log_max_bytes must be greater than zero"));
        }

        let log_backup_count = match values.get("log_backup_count") {
            Some(v) => v
                .parse()
                .map_err(|e| anyhow!("Invalid log_backup_count '{}': {}", v, e))?,
            None => DEFAULT_LOG_BACKUP_COUNT,
        };

        // Console output follows the resolved mode unless set explicitly
        let console_log = match values.get("console_log") {
            Some(v) => parse_bool(v)?,
            None => mode == DeploymentMode::Source,
        };

        Ok(VaultureConfig {
            mode,
            data_dir: path_value("data_dir"),
            db_path: path_value("db_path"),
            migrations_dir: path_value("migrations_dir"),
            log_dir: path_value("log_dir"),
            log_max_bytes,
            log_backup_count,
            console_log,
        })
    }

    /// Get the default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not find configuration directory"))?;
        Ok(config_dir.join(APP_NAME).join("vaulture.toml"))
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default)".to_string())
        };

        [
            format!("Mode:               {}", self.mode),
            format!("Data Directory:     {}", show(&self.data_dir)),
            format!("Database Path:      {}", show(&self.db_path)),
            format!("Migrations Dir:     {}", show(&self.migrations_dir)),
            format!("Log Directory:      {}", show(&self.log_dir)),
            format!("Log Rotation:       {} bytes x {}", self.log_max_bytes, self.log_backup_count),
            format!("Console Log:        {}", self.console_log),
        ]
        .join("\n")
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("Invalid boolean value '{}'", value)),
    }
}

/// Expand a leading `~` to the home directory
fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(value),
        },
        _ => PathBuf::from(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultureConfig::default();
        assert_eq!(config.log_max_bytes, 1_048_576);
        assert_eq!(config.log_backup_count, 5);
        assert_eq!(config.console_log, config.mode == DeploymentMode::Source);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "packaged".parse::<DeploymentMode>().unwrap(),
            DeploymentMode::Packaged
        );
        assert_eq!(
            "Source".parse::<DeploymentMode>().unwrap(),
            DeploymentMode::Source
        );
        assert!("portable".parse::<DeploymentMode>().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vaulture.toml");
        std::fs::write(
            &file,
            r#"
mode = "packaged"
db_path = "/srv/vaulture/vault.db"
migrations_dir = "/srv/vaulture/migrations"
log_backup_count = 2
"#,
        )
        .unwrap();

        let config =
            VaultureConfig::load_with_env_prefix(Some(&file), "VAULTURE_TEST_FILE").unwrap();
        assert_eq!(config.mode, DeploymentMode::Packaged);
        assert_eq!(config.db_path, Some(PathBuf::from("/srv/vaulture/vault.db")));
        assert_eq!(
            config.migrations_dir,
            Some(PathBuf::from("/srv/vaulture/migrations"))
        );
        assert_eq!(config.log_backup_count, 2);
        assert_eq!(config.log_max_bytes, DEFAULT_LOG_MAX_BYTES);
        assert!(!config.console_log);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vaulture.toml");
        std::fs::write(&file, "db_path = \"/from/file.db\"\nconsole_log = false\n").unwrap();

        std::env::set_var("VAULTURE_TEST_ENV_DB_PATH", "/from/env.db");
        std::env::set_var("VAULTURE_TEST_ENV_CONSOLE_LOG", "yes");
        let config =
            VaultureConfig::load_with_env_prefix(Some(&file), "VAULTURE_TEST_ENV").unwrap();
        std::env::remove_var("VAULTURE_TEST_ENV_DB_PATH");
        std::env::remove_var("VAULTURE_TEST_ENV_CONSOLE_LOG");

        assert_eq!(config.db_path, Some(PathBuf::from("/from/env.db")));
        assert!(config.console_log);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultureConfig::load_with_env_prefix(
            Some(&dir.path().join("absent.toml")),
            "VAULTURE_TEST_MISSING",
        )
        .unwrap();
        assert!(config.migrations_dir.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut values = HashMap::new();
        values.insert("log_max_bytes".to_string(), "lots".to_string());
        assert!(VaultureConfig::from_values(&values).is_err());

        let mut values = HashMap::new();
        values.insert("log_max_bytes".to_string(), "0".to_string());
        assert!(VaultureConfig::from_values(&values).is_err());

        let mut values = HashMap::new();
        values.insert("console_log".to_string(), "maybe".to_string());
        assert!(VaultureConfig::from_values(&values).is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("~user/x"), PathBuf::from("~user/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/vault"), home.join("vault"));
        }
    }

    #[test]
    fn test_new_writes_template_for_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fresh.toml");
        let config = VaultureConfig::new(&Some(file.to_string_lossy().to_string())).unwrap();

        assert!(file.exists());
        assert_eq!(config.log_backup_count, DEFAULT_LOG_BACKUP_COUNT);
    }
}
