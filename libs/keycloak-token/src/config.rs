use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TokenError;

/// Default connection-establishment timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on bytes read from a token endpoint response.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default `User-Agent` sent to the token endpoint.
pub const DEFAULT_USER_AGENT: &str = concat!("keycloak-token/", env!("CARGO_PKG_VERSION"));

/// Root certificate source for HTTPS token endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsRoots {
    /// Mozilla's root certificates (no OS dependency).
    #[default]
    Webpki,
    /// The OS native certificate store.
    Native,
}

/// Configuration for a [`TokenService`](crate::TokenService).
///
/// Supplied at construction; nothing is read from ambient state.
/// `Debug` is manually implemented to redact [`client_secret`](Self::client_secret).
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenServiceConfig {
    // ---- identity provider --------------------------------------------------
    /// Token endpoint, e.g.
    /// `http://keycloak:8080/realms/template/protocol/openid-connect/token`.
    pub token_endpoint: Url,

    /// `OAuth2` client identifier.
    pub client_id: String,

    /// `OAuth2` client secret, sent as a form field.
    pub client_secret: SecretString,

    /// Redirect URI registered for the authorization-code flow. Must match the
    /// one used when the code was issued.
    pub redirect_uri: String,

    // ---- transport ----------------------------------------------------------
    /// Bound on TCP connection establishment (default: 10 s).
    #[serde(default = "default_connect_timeout", with = "humantime_duration")]
    pub connect_timeout: Duration,

    /// Optional bound on the whole request. `None` leaves reads bounded only
    /// by the transport; callers may impose their own deadline instead.
    #[serde(default, with = "humantime_duration::option")]
    pub request_timeout: Option<Duration>,

    /// Maximum response body size in bytes (default: 1 MiB).
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Permit plain `http://` token endpoints.
    #[serde(default)]
    pub allow_insecure_http: bool,

    /// Root certificates used for `https://` endpoints.
    #[serde(default)]
    pub tls_roots: TlsRoots,

    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

impl TokenServiceConfig {
    /// Create a configuration with default transport settings.
    #[must_use]
    pub fn new(
        token_endpoint: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            token_endpoint,
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_uri: redirect_uri.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            allow_insecure_http: false,
            tls_roots: TlsRoots::default(),
            user_agent: default_user_agent(),
        }
    }

    /// Validate that the configuration is usable before the first call.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Config`] if:
    /// - `client_id`, `client_secret` or `redirect_uri` is empty,
    /// - the endpoint scheme is neither `http` nor `https`,
    /// - the endpoint is `http` and `allow_insecure_http` is off,
    /// - `max_body_size` or `connect_timeout` is zero.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.client_id.trim().is_empty() {
            return Err(TokenError::Config("client_id must not be empty".into()));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(TokenError::Config("client_secret must not be empty".into()));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(TokenError::Config("redirect_uri must not be empty".into()));
        }
        match self.token_endpoint.scheme() {
            "https" => {}
            "http" if self.allow_insecure_http => {}
            "http" => {
                return Err(TokenError::Config(format!(
                    "token_endpoint '{}' uses plain http; set allow_insecure_http to permit it",
                    self.token_endpoint
                )));
            }
            other => {
                return Err(TokenError::Config(format!(
                    "token_endpoint scheme '{other}' is not supported"
                )));
            }
        }
        if self.max_body_size == 0 {
            return Err(TokenError::Config("max_body_size must be positive".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(TokenError::Config("connect_timeout must be positive".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for TokenServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenServiceConfig")
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_body_size", &self.max_body_size)
            .field("allow_insecure_http", &self.allow_insecure_http)
            .field("tls_roots", &self.tls_roots)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Deserialize durations written as humantime strings (`"10s"`, `"1m 30s"`).
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, de};

    pub(super) fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(|e| {
            de::Error::invalid_value(de::Unexpected::Str(&raw), &e.to_string().as_str())
        })
    }

    pub(super) mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, de};

        pub(in super::super) fn deserialize<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let Some(raw) = Option::<String>::deserialize(d)? else {
                return Ok(None);
            };
            humantime::parse_duration(&raw).map(Some).map_err(|e| {
                de::Error::invalid_value(de::Unexpected::Str(&raw), &e.to_string().as_str())
            })
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn valid() -> TokenServiceConfig {
        TokenServiceConfig::new(
            Url::parse("https://sso.example.com/realms/template/protocol/openid-connect/token")
                .unwrap(),
            "template-client",
            "s3cr3t",
            "https://app.example.com/home",
        )
    }

    #[test]
    fn defaults() {
        let cfg = valid();
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
        assert!(cfg.request_timeout.is_none());
        assert_eq!(cfg.max_body_size, 1024 * 1024);
        assert!(!cfg.allow_insecure_http);
        assert_eq!(cfg.tls_roots, TlsRoots::Webpki);
        assert!(cfg.user_agent.starts_with("keycloak-token/"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_client_id() {
        let cfg = TokenServiceConfig {
            client_id: "  ".into(),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("client_id"), "got: {err}");
    }

    #[test]
    fn validate_rejects_empty_secret() {
        let cfg = TokenServiceConfig {
            client_secret: SecretString::from(String::new()),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("client_secret"), "got: {err}");
    }

    #[test]
    fn validate_rejects_empty_redirect_uri() {
        let cfg = TokenServiceConfig {
            redirect_uri: String::new(),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("redirect_uri"), "got: {err}");
    }

    #[test]
    fn validate_rejects_plain_http_by_default() {
        let cfg = TokenServiceConfig {
            token_endpoint: Url::parse("http://keycloak:8080/token").unwrap(),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("allow_insecure_http"), "got: {err}");

        let cfg = TokenServiceConfig {
            allow_insecure_http: true,
            ..cfg
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_scheme() {
        let cfg = TokenServiceConfig {
            token_endpoint: Url::parse("ftp://keycloak/token").unwrap(),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("ftp"), "got: {err}");
    }

    #[test]
    fn debug_redacts_client_secret() {
        let dbg = format!("{:?}", valid());
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("s3cr3t"), "Debug must not contain the raw secret");
        assert!(dbg.contains("template-client"));
    }

    #[test]
    fn deserializes_with_humantime_durations() {
        let cfg: TokenServiceConfig = serde_json::from_value(serde_json::json!({
            "token_endpoint": "http://keycloak:8080/realms/template/protocol/openid-connect/token",
            "client_id": "template-client",
            "client_secret": "s3cr3t",
            "redirect_uri": "http://localhost:3000/home",
            "connect_timeout": "3s",
            "request_timeout": "1m 30s",
            "allow_insecure_http": true,
            "tls_roots": "native"
        }))
        .unwrap();
        assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(cfg.tls_roots, TlsRoots::Native);
        assert_eq!(cfg.client_secret.expose_secret(), "s3cr3t");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialize_rejects_bad_duration() {
        let res = serde_json::from_value::<TokenServiceConfig>(serde_json::json!({
            "token_endpoint": "https://sso.example.com/token",
            "client_id": "c",
            "client_secret": "s",
            "redirect_uri": "https://app/home",
            "connect_timeout": "soon"
        }));
        assert!(res.is_err());
    }
}
