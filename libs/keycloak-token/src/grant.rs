//! Form encoding of `OAuth2` token grant requests.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::error::TokenError;

/// `grant_type` value for the authorization-code flow.
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

/// `grant_type` value for the refresh-token flow.
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Grant-specific part of a token request.
#[derive(Clone)]
pub enum Grant {
    /// Exchange an authorization code issued to `redirect_uri`.
    AuthorizationCode { code: String, redirect_uri: String },
    /// Exchange a refresh token for a new token set.
    RefreshToken { refresh_token: String },
}

impl Grant {
    /// The `grant_type` form value for this grant.
    #[must_use]
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode { .. } => GRANT_AUTHORIZATION_CODE,
            Grant::RefreshToken { .. } => GRANT_REFRESH_TOKEN,
        }
    }
}

/// Codes and tokens are credentials; only the grant type is printed.
impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::AuthorizationCode { redirect_uri, .. } => f
                .debug_struct("AuthorizationCode")
                .field("code", &"[REDACTED]")
                .field("redirect_uri", redirect_uri)
                .finish(),
            Grant::RefreshToken { .. } => f
                .debug_struct("RefreshToken")
                .field("refresh_token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// A complete token request: client credentials plus a [`Grant`].
#[derive(Clone)]
pub struct GrantRequest {
    client_id: String,
    client_secret: SecretString,
    grant: Grant,
}

impl GrantRequest {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: SecretString, grant: Grant) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            grant,
        }
    }

    /// Serialize into an `application/x-www-form-urlencoded` body.
    ///
    /// Keys are emitted in a fixed order: `client_id`, `client_secret`,
    /// `grant_type`, then `code` and `redirect_uri` or `refresh_token`. Every
    /// value is percent-encoded exactly once; spaces become `+`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidRequest`] naming the first empty field.
    /// The field's value is never included.
    pub fn to_form(&self) -> Result<String, TokenError> {
        let secret = self.client_secret.expose_secret();
        let mut fields: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", secret),
            ("grant_type", self.grant.grant_type()),
        ];

        match &self.grant {
            Grant::AuthorizationCode { code, redirect_uri } => {
                fields.push(("code", code.as_str()));
                fields.push(("redirect_uri", redirect_uri.as_str()));
            }
            Grant::RefreshToken { refresh_token } => {
                fields.push(("refresh_token", refresh_token.as_str()));
            }
        }

        if let Some((name, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
            return Err(TokenError::InvalidRequest(format!("{name} must not be empty")));
        }

        serde_urlencoded::to_string(fields.as_slice())
            .map_err(|e| TokenError::InvalidRequest(format!("form encoding failed: {e}")))
    }
}

impl fmt::Debug for GrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantRequest")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("grant", &self.grant)
            .finish()
    }
}
