use std::sync::Arc;

use crate::claims::decode_claims;
use crate::client::TokenExchangeClient;
use crate::config::TokenServiceConfig;
use crate::error::TokenError;
use crate::grant::{Grant, GrantRequest};
use crate::response::TokenResponse;
use crate::roles::extract_realm_roles;

/// Exchanges authorization codes and refresh tokens at the identity provider.
///
/// Holds only immutable configuration and a pooled HTTP client; clones share
/// both and may be used concurrently from any number of tasks.
#[derive(Clone, Debug)]
pub struct TokenService {
    config: Arc<TokenServiceConfig>,
    client: TokenExchangeClient,
}

impl TokenService {
    /// Validate `config` and build the service.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Config`] if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: TokenServiceConfig) -> Result<Self, TokenError> {
        config.validate()?;
        let client = TokenExchangeClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TokenServiceConfig {
        &self.config
    }

    /// Exchange an authorization code for tokens and attach realm roles.
    ///
    /// When the response carries a string `access_token`, its payload is
    /// decoded and `realm_access.roles` is attached under `roles`. Without an
    /// access token the response is returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidRequest`] if `code` is empty
    /// - [`TokenError::UpstreamAuth`], [`TokenError::MalformedResponse`] or
    ///   [`TokenError::Transport`] from the exchange
    /// - [`TokenError::MalformedToken`] if the access token cannot be decoded
    #[tracing::instrument(skip_all, fields(grant_type = "authorization_code"))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, TokenError> {
        let grant = Grant::AuthorizationCode {
            code: code.to_owned(),
            redirect_uri: self.config.redirect_uri.clone(),
        };
        let mut response = self.exchange(grant).await?;

        let Some(access_token) = response.access_token() else {
            tracing::debug!("token response has no access_token; roles not attached");
            return Ok(response);
        };

        let claims = decode_claims(access_token).inspect_err(|e| {
            tracing::warn!(stage = %e.stage(), error = %e, "failed to decode access token");
        })?;
        let roles = extract_realm_roles(&claims);
        tracing::debug!(roles = roles.len(), "attached realm roles");
        response.set_roles(roles);

        Ok(response)
    }

    /// Exchange a refresh token for a new token set.
    ///
    /// The response is returned exactly as received: no claims are decoded and
    /// no `roles` key is added, even when it contains an `access_token`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidRequest`] if `refresh_token` is empty
    /// - [`TokenError::UpstreamAuth`], [`TokenError::MalformedResponse`] or
    ///   [`TokenError::Transport`] from the exchange
    #[tracing::instrument(skip_all, fields(grant_type = "refresh_token"))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, TokenError> {
        let grant = Grant::RefreshToken {
            refresh_token: refresh_token.to_owned(),
        };
        self.exchange(grant).await
    }

    async fn exchange(&self, grant: Grant) -> Result<TokenResponse, TokenError> {
        let request = GrantRequest::new(
            self.config.client_id.clone(),
            self.config.client_secret.clone(),
            grant,
        );

        let result = match request.to_form() {
            Ok(form) => self.client.send(form).await,
            Err(e) => Err(e),
        };

        result.inspect_err(|e| {
            tracing::warn!(stage = %e.stage(), error = %e, "token exchange failed");
        })
    }
}
