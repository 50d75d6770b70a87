use api::config::{ApiConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// Default filter directive, used when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub api: ApiConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Command line values take precedence over the file.
    pub fn apply_overrides(&mut self, api_port: Option<u16>, namespace: Option<String>) {
        if let Some(port) = api_port {
            self.api.listener.port = port;
        }
        if let Some(namespace) = namespace {
            self.api.namespace = namespace;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use storage::config::StoreType;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
            api:
                listener:
                    host: 127.0.0.1
                    port: 9000
                namespace: ci
                cors:
                    allowed_origins: ["https://ui.example.com"]
                aggregator:
                    max_concurrency: 16
                store:
                    type: filesystem
                    base_dir: /var/lib/brigade
                    timeout_ms: 5000
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        let metrics = config.common.metrics.as_ref().expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        let logging = config.common.logging.as_ref().expect("logging config");
        assert_eq!(logging.level, "info");

        assert_eq!(config.api.listener.port, 9000);
        assert_eq!(config.api.namespace, "ci");
        assert_eq!(config.api.aggregator.max_concurrency, 16);
        assert_eq!(
            config.api.store.r#type,
            StoreType::Filesystem {
                base_dir: "/var/lib/brigade".into()
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn minimal_config_and_overrides() {
        let yaml = r#"
            api:
                store:
                    type: filesystem
                    base_dir: /tmp/brigade
            "#;
        let tmp = write_tmp_file(yaml);
        let mut config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.common, CommonConfig::default());
        assert_eq!(config.api.listener.host, "0.0.0.0");
        assert_eq!(config.api.listener.port, 7745);
        assert_eq!(config.api.namespace, "default");
        assert_eq!(config.api.cors.allowed_origins, ["*"]);

        config.apply_overrides(Some(8080), Some("staging".into()));
        assert_eq!(config.api.listener.port, 8080);
        assert_eq!(config.api.namespace, "staging");

        config.apply_overrides(None, None);
        assert_eq!(config.api.listener.port, 8080);
    }

    #[test]
    fn invalid_config() {
        let yaml = r#"
            api:
                namespace: ../etc
                store:
                    type: filesystem
                    base_dir: /tmp/brigade
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let tmp = write_tmp_file("api: {}\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/brigade.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}
