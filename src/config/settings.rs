use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub football: FootballSettings,
    pub predictor: PredictorSettings,
    pub payment: PaymentSettings,
    pub server: ServerConfig,
    pub http: HttpSettings,
}

/// The platform backend. One base URL for every service façade; the
/// divergent hosts found across the legacy clients collapse here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FootballSettings {
    pub base_url: String,
    pub api_key: String,
}

impl Default for FootballSettings {
    fn default() -> Self {
        Self {
            base_url: "https://apiv3.apifootball.com/".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub cache_max_age_minutes: i64,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            // Low temperature favours stable, repeatable verdicts
            temperature: 0.3,
            cache_max_age_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    /// "sandbox" or "live"; selects the FedaPay host unless base_url is set.
    pub environment: String,
    pub secret_key: String,
    pub base_url: Option<String>,
    pub callback_url: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            secret_key: String::new(),
            base_url: None,
            callback_url: "https://example.com/callback".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut settings = match Self::find_config_file() {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content).map_err(|e| ApiError::Config(e.to_string()))?
            }
            None => Settings::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Secrets and the listen port always come from the environment when set.
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PARIBOT_API_URL")
            && !url.trim().is_empty()
        {
            self.api.base_url = url;
        }
        if let Ok(key) = std::env::var("FOOTBALL_API_KEY")
            && !key.trim().is_empty()
        {
            self.football.api_key = key;
        }
        if let Ok(key) = std::env::var("DEEPSEEK_API_KEY")
            && !key.trim().is_empty()
        {
            self.predictor.api_key = key;
        }
        if let Ok(key) = std::env::var("FEDAPAY_SECRET_KEY")
            && !key.trim().is_empty()
        {
            self.payment.secret_key = key;
        }
        if let Ok(env) = std::env::var("FEDAPAY_ENV")
            && !env.trim().is_empty()
        {
            self.payment.environment = env;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            self.server.port = port;
        }
    }

    fn find_config_file() -> Option<String> {
        let possible_names = ["custom-config.toml", "config.toml"];

        possible_names
            .iter()
            .find(|name| Path::new(name).exists())
            .map(|name| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.payment.environment, "sandbox");
        assert_eq!(settings.predictor.model, "deepseek-chat");
        assert_eq!(settings.http.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [api]
            base_url = "https://api.paribot.test"

            [server]
            port = 4000
            "#,
        )
        .unwrap();
        assert_eq!(settings.api.base_url, "https://api.paribot.test");
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.football.base_url, "https://apiv3.apifootball.com/");
    }
}
