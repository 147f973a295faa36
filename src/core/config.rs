use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

/// Environment variable overriding the database location.
pub const DB_PATH_ENV: &str = "OTE_DB_PATH";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OteProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CnbProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WeatherProviderConfig {
    pub forecast_url: String,
    pub archive_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ote: OteProviderConfig,
    pub cnb: CnbProviderConfig,
    pub weather: WeatherProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            ote: OteProviderConfig {
                base_url: "https://www.ote-cr.cz".to_string(),
            },
            cnb: CnbProviderConfig {
                base_url: "https://www.cnb.cz".to_string(),
            },
            weather: WeatherProviderConfig {
                forecast_url: "https://api.open-meteo.com".to_string(),
                archive_url: "https://archive-api.open-meteo.com".to_string(),
            },
        }
    }
}

/// Coordinates used for weather lookups. Defaults to Prague.
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        LocationConfig {
            latitude: 50.08,
            longitude: 14.43,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig { port: 8501 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            retries: 2,
            retry_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    pub db_path: Option<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults when
    /// it has not been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("cz", "ote", "ote").context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Resolves the SQLite database path: `OTE_DB_PATH`, then `db_path` from
    /// the config, then `prices.db` in the project data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var(DB_PATH_ENV)
            && !env_path.is_empty()
        {
            return Ok(PathBuf::from(env_path));
        }
        if let Some(custom_path) = &self.db_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs =
            ProjectDirs::from("cz", "ote", "ote").context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("prices.db"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
db_path: "/tmp/ote/prices.db"
providers:
  ote:
    base_url: "http://example.com/ote"
  cnb:
    base_url: "http://example.com/cnb"
  weather:
    forecast_url: "http://example.com/forecast"
    archive_url: "http://example.com/archive"
location:
  latitude: 49.19
  longitude: 16.61
dashboard:
  port: 9000
http:
  retries: 0
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.db_path.as_deref(), Some("/tmp/ote/prices.db"));
        assert_eq!(config.providers.ote.base_url, "http://example.com/ote");
        assert_eq!(config.providers.cnb.base_url, "http://example.com/cnb");
        assert_eq!(
            config.providers.weather.archive_url,
            "http://example.com/archive"
        );
        assert_eq!(config.location.latitude, 49.19);
        assert_eq!(config.dashboard.port, 9000);
        assert_eq!(config.http.retries, 0);
        // Unset keys in a partially specified section keep their defaults
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert!(config.db_path.is_none());
        assert_eq!(config.providers.ote.base_url, "https://www.ote-cr.cz");
        assert_eq!(config.providers.cnb.base_url, "https://www.cnb.cz");
        assert_eq!(config.location.latitude, 50.08);
        assert_eq!(config.dashboard.port, 8501);
        assert_eq!(config.http.retries, 2);
    }

    #[test]
    fn test_db_path_env_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "db_path: \"/tmp/ote/from-config.db\"\n").unwrap();
        let config = AppConfig::load_from_path(&config_path).unwrap();
        let env_db = dir.path().join("from-env.db");

        // SAFETY: no other test in this binary reads OTE_DB_PATH
        unsafe { std::env::set_var(DB_PATH_ENV, &env_db) };
        let overridden = config.database_path();
        unsafe { std::env::remove_var(DB_PATH_ENV) };

        assert_eq!(overridden.unwrap(), env_db);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/ote/from-config.db")
        );
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load_from_path(dir.path().join("missing.yaml"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
