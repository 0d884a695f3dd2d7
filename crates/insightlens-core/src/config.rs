use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_ASK_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SAVE_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default = "default_ask_timeout")]
    pub ask_timeout_secs: u64,
    #[serde(default = "default_save_timeout")]
    pub save_timeout_secs: u64,
    pub default_context_product: Option<i64>,
}

fn default_ask_timeout() -> u64 {
    DEFAULT_ASK_TIMEOUT_SECS
}

fn default_save_timeout() -> u64 {
    DEFAULT_SAVE_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_base_url: None,
            ask_timeout_secs: DEFAULT_ASK_TIMEOUT_SECS,
            save_timeout_secs: DEFAULT_SAVE_TIMEOUT_SECS,
            default_context_product: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Remember the context product for the next chat screen.
    pub fn save_default_context_product(config_path: &Path, product_id: Option<i64>) -> Result<()> {
        let mut config = Self::load_from(config_path).unwrap_or_else(|_| Self::new());
        config.default_context_product = product_id;
        config.save_to(config_path)
    }

    /// `INSIGHTLENS_API_URL` wins over the config file.
    pub fn api_url(&self) -> String {
        std::env::var("INSIGHTLENS_API_URL")
            .ok()
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_secs(self.ask_timeout_secs)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_secs(self.save_timeout_secs)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.json"))
    }
}

/// `<config_dir>/insightlens`, home of the config, session and log files.
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;

    Ok(config_dir.join("insightlens"))
}

/// Logged-in session: the bearer token every API call carries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub email: Option<String>,
}

impl Session {
    /// `INSIGHTLENS_TOKEN` wins over the session file.
    pub fn load() -> Result<Option<Self>> {
        if let Ok(token) = std::env::var("INSIGHTLENS_TOKEN") {
            return Ok(Some(Self { token, email: None }));
        }
        Self::load_from(&Self::get_session_path()?)
    }

    pub fn load_from(session_path: &Path) -> Result<Option<Self>> {
        if !session_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(session_path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_session_path()?)
    }

    pub fn save_to(&self, session_path: &Path) -> Result<()> {
        if let Some(parent) = session_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(session_path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Forget the stored token. Missing file is fine.
    pub fn clear() -> Result<()> {
        Self::clear_at(&Self::get_session_path()?)
    }

    pub fn clear_at(session_path: &Path) -> Result<()> {
        match fs::remove_file(session_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_session_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("session.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.api_base_url.is_none());
        assert_eq!(config.ask_timeout(), Duration::from_secs(60));
        assert_eq!(config.save_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.api_base_url = Some("https://insights.example.com".to_string());
        config.default_context_product = Some(12);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url.as_deref(), Some("https://insights.example.com"));
        assert_eq!(loaded.default_context_product, Some(12));
    }

    #[test]
    fn test_partial_config_fills_timeouts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_base_url": null, "default_context_product": 3}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.ask_timeout_secs, 60);
        assert_eq!(config.default_context_product, Some(3));
    }

    #[test]
    fn test_default_context_product_keeps_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::new();
        config.api_base_url = Some("http://analytics.internal:8000".to_string());
        config.save_to(&path).unwrap();

        Config::save_default_context_product(&path, Some(7)).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.default_context_product, Some(7));
        assert_eq!(loaded.api_base_url.as_deref(), Some("http://analytics.internal:8000"));

        Config::save_default_context_product(&path, None).unwrap();
        assert!(Config::load_from(&path).unwrap().default_context_product.is_none());
    }

    #[test]
    fn test_session_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert!(Session::load_from(&path).unwrap().is_none());

        let session = Session {
            token: "jwt".to_string(),
            email: Some("ana@example.com".to_string()),
        };
        session.save_to(&path).unwrap();
        assert_eq!(Session::load_from(&path).unwrap(), Some(session));

        Session::clear_at(&path).unwrap();
        assert!(Session::load_from(&path).unwrap().is_none());
        Session::clear_at(&path).unwrap();
    }
}
