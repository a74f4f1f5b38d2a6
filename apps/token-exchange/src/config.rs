use std::path::Path;

use anyhow::Context as _;
use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Yaml};
use figment::value::UncasedStr;
use keycloak_token::TokenServiceConfig;
use secrecy::ExposeSecret as _;
use serde::{Deserialize, Serialize};

/// Environment variable prefix; `__` separates nested keys.
pub const ENV_PREFIX: &str = "APP__";

/// Keys whose environment values are taken as plain strings. Everything else
/// goes through figment's value parsing, so `123456` would become a number.
const VERBATIM_ENV_KEYS: &[&str] = &[
    "token_service.client_id",
    "token_service.client_secret",
    "token_service.redirect_uri",
];

fn is_verbatim(key: &UncasedStr) -> bool {
    VERBATIM_ENV_KEYS
        .iter()
        .any(|verbatim| key.as_str().eq_ignore_ascii_case(verbatim))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_owned()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Effective configuration of the `token-exchange` binary.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub token_service: TokenServiceConfig,
}

impl AppConfig {
    /// Layered load: defaults, then the YAML file (if any), then `APP__*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the merged result does
    /// not describe a complete configuration.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::from_figment(Self::figment(path)).context("failed to load configuration")
    }

    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment =
            Figment::new().merge(Serialized::default("logging", LoggingConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }

        let env = Env::prefixed(ENV_PREFIX).split("__");
        figment = figment.merge(env.clone().filter(|key| !is_verbatim(key)));

        let verbatim = env.filter(is_verbatim);
        for (key, value) in verbatim.iter() {
            figment = figment.merge(Serialized::default(&key.as_str().to_ascii_lowercase(), value));
        }
        figment
    }

    /// # Errors
    ///
    /// Returns the figment extraction error.
    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    /// Render the effective configuration as YAML with the secret redacted.
    ///
    /// # Errors
    ///
    /// Returns an error if YAML serialization fails.
    pub fn to_redacted_yaml(&self) -> anyhow::Result<String> {
        let ts = &self.token_service;
        let secret = if ts.client_secret.expose_secret().is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        let view = serde_json::json!({
            "logging": self.logging,
            "token_service": {
                "token_endpoint": ts.token_endpoint.as_str(),
                "client_id": ts.client_id,
                "client_secret": secret,
                "redirect_uri": ts.redirect_uri,
                "connect_timeout": format!("{}ms", ts.connect_timeout.as_millis()),
                "request_timeout": ts.request_timeout.map(|d| format!("{}ms", d.as_millis())),
                "max_body_size": ts.max_body_size,
                "allow_insecure_http": ts.allow_insecure_http,
                "tls_roots": ts.tls_roots,
                "user_agent": ts.user_agent,
            }
        });
        serde_saphyr::to_string(&view).context("failed to render configuration")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Duration;

    const YAML: &str = r"
logging:
  level: debug
token_service:
  token_endpoint: http://keycloak:8080/realms/template/protocol/openid-connect/token
  client_id: template-client
  client_secret: from-file
  redirect_uri: http://localhost:3000/home
  connect_timeout: 5s
  allow_insecure_http: true
";

    #[test]
    fn loads_yaml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("app.yaml", YAML)?;
            let cfg = AppConfig::from_figment(AppConfig::figment(Some(Path::new("app.yaml"))))?;
            assert_eq!(cfg.logging.level, "debug");
            assert_eq!(cfg.logging.format, LogFormat::Text);
            assert_eq!(cfg.token_service.client_id, "template-client");
            assert_eq!(cfg.token_service.client_secret.expose_secret(), "from-file");
            assert_eq!(cfg.token_service.connect_timeout, Duration::from_secs(5));
            assert!(cfg.token_service.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("app.yaml", YAML)?;
            jail.set_env("APP__TOKEN_SERVICE__CLIENT_SECRET", "from-env");
            jail.set_env("APP__LOGGING__FORMAT", "json");
            let cfg = AppConfig::from_figment(AppConfig::figment(Some(Path::new("app.yaml"))))?;
            assert_eq!(cfg.token_service.client_secret.expose_secret(), "from-env");
            assert_eq!(cfg.logging.format, LogFormat::Json);
            Ok(())
        });
    }

    #[test]
    fn numeric_credentials_from_env_stay_strings() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("app.yaml", YAML)?;
            jail.set_env("APP__TOKEN_SERVICE__CLIENT_SECRET", "000123");
            jail.set_env("APP__TOKEN_SERVICE__CLIENT_ID", "4242");
            jail.set_env("APP__TOKEN_SERVICE__ALLOW_INSECURE_HTTP", "false");
            let cfg = AppConfig::from_figment(AppConfig::figment(Some(Path::new("app.yaml"))))?;
            assert_eq!(cfg.token_service.client_secret.expose_secret(), "000123");
            assert_eq!(cfg.token_service.client_id, "4242");
            assert!(!cfg.token_service.allow_insecure_http);
            Ok(())
        });
    }

    #[test]
    fn boolean_looking_secret_from_env_stays_string() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("app.yaml", YAML)?;
            jail.set_env("APP__TOKEN_SERVICE__CLIENT_SECRET", "true");
            let cfg = AppConfig::from_figment(AppConfig::figment(Some(Path::new("app.yaml"))))?;
            assert_eq!(cfg.token_service.client_secret.expose_secret(), "true");
            Ok(())
        });
    }

    #[test]
    fn env_only_configuration() {
        figment::Jail::expect_with(|jail| {
            jail.set_env(
                "APP__TOKEN_SERVICE__TOKEN_ENDPOINT",
                "https://sso.example.com/realms/template/protocol/openid-connect/token",
            );
            jail.set_env("APP__TOKEN_SERVICE__CLIENT_ID", "template-client");
            jail.set_env("APP__TOKEN_SERVICE__CLIENT_SECRET", "env-secret");
            jail.set_env("APP__TOKEN_SERVICE__REDIRECT_URI", "https://app.example.com/home");
            let cfg = AppConfig::from_figment(AppConfig::figment(None))?;
            assert_eq!(cfg.logging, LoggingConfig::default());
            assert_eq!(
                cfg.token_service.connect_timeout,
                keycloak_token::config::DEFAULT_CONNECT_TIMEOUT
            );
            Ok(())
        });
    }

    #[test]
    fn missing_token_service_is_an_error() {
        figment::Jail::expect_with(|_jail| {
            assert!(AppConfig::from_figment(AppConfig::figment(None)).is_err());
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn redacted_yaml_hides_secret() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("app.yaml", YAML)?;
            let cfg = AppConfig::from_figment(AppConfig::figment(Some(Path::new("app.yaml"))))?;
            let yaml = cfg.to_redacted_yaml().map_err(|e| e.to_string())?;
            assert!(yaml.contains("[REDACTED]"));
            assert!(!yaml.contains("from-file"));
            assert!(yaml.contains("template-client"));
            Ok(())
        });
    }
}
