use std::path::Path;

use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load the configuration from a YAML file.
    pub fn load(yml_path: &str) -> anyhow::Result<Self> {
        let yml = std::fs::read_to_string(yml_path)?;
        let config = serde_yaml::from_str(&yml)?;
        Ok(config)
    }

    /// Load the configuration file if there is one, otherwise run on defaults.
    pub fn load_or_default(yml_path: &str) -> anyhow::Result<Self> {
        if Path::new(yml_path).exists() {
            Self::load(yml_path)
        } else {
            tracing::warn!("No config at {}, using defaults", yml_path);
            Ok(Self::default())
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub tls: Option<TLSConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8000".into(),
            tls: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TLSConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/foodgram.db".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the rolling access log. Logs go to stdout when unset.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: Some("logs".into()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Page size when the client does not pass `limit`.
    pub page_size: usize,
    /// Upper bound on `limit`.
    pub max_page_size: usize,
    /// Recipes shown per author in subscription listings, unless `recipes_limit` is given.
    pub recipes_preview: usize,
    /// Prefix for media URLs in API responses, e.g. `https://example.org`.
    pub media_base_url: String,
    /// Largest request body accepted, in bytes. Recipe images arrive base64-encoded
    /// inside JSON, so this must leave room for a 20 MB image.
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            page_size: 6,
            max_page_size: 100,
            recipes_preview: 3,
            media_base_url: String::new(),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: Config = serde_yaml::from_str(
            "
server:
  address: 127.0.0.1:9000
api:
  page_size: 10
",
        )
        .unwrap();
        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert!(config.server.tls.is_none());
        assert_eq!(config.api.page_size, 10);
        assert_eq!(config.api.recipes_preview, 3);
        assert_eq!(config.api.max_body_bytes, 32 * 1024 * 1024);
        assert_eq!(config.database.path, "data/foodgram.db");
    }

    #[test]
    fn missing_file_runs_on_defaults() {
        let config = Config::load_or_default("/nonexistent/foodgram.yml").unwrap();
        assert_eq!(config.server.address, "0.0.0.0:8000");
    }
}
