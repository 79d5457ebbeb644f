use push_stream::StreamingConfig;
use push_stream_auth::HttpAuthConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub streaming: StreamingConfig,
    pub auth: HttpAuthConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_yaml(&content)?
        } else {
            Self {
                streaming: StreamingConfig::default(),
                auth: HttpAuthConfig::new(String::new(), String::new()),
            }
        };

        // Environment overrides the file
        if let Ok(url) = std::env::var("STREAMING_URL") {
            config.streaming.streaming_url = url;
        }
        if let Ok(url) = std::env::var("AUTH_URL") {
            config.auth.auth_url = url;
        }
        if let Ok(key) = std::env::var("API_KEY") {
            config.auth.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.api_key.is_empty() {
            anyhow::bail!("API_KEY environment variable is required");
        }
        if self.auth.auth_url.is_empty() {
            anyhow::bail!("AUTH_URL environment variable is required");
        }
        self.streaming.validate()?;
        Ok(())
    }
}
