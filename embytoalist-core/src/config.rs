use config::{Config as ConfigBuilder, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Application configuration, read from the process environment.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address
    pub host: String,
    pub port: u16,

    /// Metadata server base URL (`EMBY_SERVER`)
    pub emby_server: String,

    /// Link server base URL and token (`ALIST_SERVER`, `ALIST_API_KEY`)
    pub alist_server: String,
    pub alist_api_key: String,

    /// Mount-path to link-path translation (`MOUNT_PATH_PREFIX_REMOVE`/`_ADD`)
    pub mount_path_prefix_remove: String,
    pub mount_path_prefix_add: String,

    /// Mount-path prefixes that bypass the shim entirely (`IGNORE_PATH`)
    pub ignore_path: Vec<String>,

    /// Range cache (`CACHE_ENABLE`, `CACHE_PATH`, `CACHE_NEXT_EPISODE`)
    pub cache_enable: bool,
    pub cache_path: String,
    pub cache_next_episode: bool,

    /// Terminate splice responses shortly past the cache frontier
    /// (`FORCE_CLIENT_RECONNECT`)
    pub force_client_reconnect: bool,

    /// Logging (`LOG_LEVEL`, `LOG_FORMAT`)
    pub log_level: String,
    pub log_format: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("emby_server", &self.emby_server)
            .field("alist_server", &self.alist_server)
            .field("alist_api_key", &"<redacted>")
            .field("mount_path_prefix_remove", &self.mount_path_prefix_remove)
            .field("mount_path_prefix_add", &self.mount_path_prefix_add)
            .field("ignore_path", &self.ignore_path)
            .field("cache_enable", &self.cache_enable)
            .field("cache_path", &self.cache_path)
            .field("cache_next_episode", &self.cache_next_episode)
            .field("force_client_reconnect", &self.force_client_reconnect)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 60001,
            emby_server: String::new(),
            alist_server: String::new(),
            alist_api_key: String::new(),
            mount_path_prefix_remove: String::new(),
            mount_path_prefix_add: String::new(),
            ignore_path: Vec::new(),
            cache_enable: false,
            cache_path: "./cache".to_string(),
            cache_next_episode: false,
            force_client_reconnect: false,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::builder()
            .add_source(
                Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ignore_path"),
            )
            .build()?;

        let mut config: Self = builder.try_deserialize()?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Strip trailing slashes from server URLs so path concatenation is
    /// uniform everywhere.
    fn normalize(&mut self) {
        while self.emby_server.ends_with('/') {
            self.emby_server.pop();
        }
        while self.alist_server.ends_with('/') {
            self.alist_server.pop();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.emby_server.is_empty() {
            return Err(ConfigError::Message("EMBY_SERVER is required".to_string()));
        }
        if self.alist_server.is_empty() {
            return Err(ConfigError::Message("ALIST_SERVER is required".to_string()));
        }
        Ok(())
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 60001);
        assert_eq!(config.cache_path, "./cache");
        assert!(!config.cache_enable);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_normalize_strips_trailing_slashes() {
        let mut config = Config {
            emby_server: "http://emby.local:8096/".to_string(),
            alist_server: "http://alist.local:5244//".to_string(),
            ..Config::default()
        };
        config.normalize();
        assert_eq!(config.emby_server, "http://emby.local:8096");
        assert_eq!(config.alist_server, "http://alist.local:5244");
    }

    #[test]
    fn test_validate_requires_servers() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            emby_server: "http://emby.local".to_string(),
            alist_server: "http://alist.local".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_address() {
        let config = Config::default();
        assert_eq!(config.http_address(), "0.0.0.0:60001");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            alist_api_key: "secret-token".to_string(),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
