use std::fmt;

use thiserror::Error;

/// Pipeline stage an error originated from.
///
/// Used for diagnostics only; [`TokenService`](crate::TokenService) does not
/// wrap errors, it attributes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Configuration validation or client construction.
    Configuration,
    /// Building the form-encoded grant request.
    BuildRequest,
    /// The HTTP exchange with the token endpoint.
    Exchange,
    /// Decoding the issued access token's claims.
    DecodeClaims,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Configuration => "configuration",
            Stage::BuildRequest => "build_request",
            Stage::Exchange => "exchange",
            Stage::DecodeClaims => "decode_claims",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the token exchange pipeline.
///
/// No variant ever renders the client secret, the authorization code, or a
/// token value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// The JWT is structurally invalid or its payload could not be decoded.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The token endpoint answered 200 with a body that is not a JSON object.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// The token endpoint answered with a non-200 status.
    ///
    /// `body` holds the raw response body for diagnostics
    /// (e.g. `{"error":"invalid_grant"}`).
    #[error("identity provider returned HTTP {status}: {body}")]
    UpstreamAuth {
        status: http::StatusCode,
        body: String,
    },

    /// Network-level failure reaching the token endpoint.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A grant request field required for encoding is missing or empty.
    #[error("invalid grant request: {0}")]
    InvalidRequest(String),

    /// The service configuration is invalid.
    #[error("token service config error: {0}")]
    Config(String),
}

impl TokenError {
    /// The pipeline stage this error belongs to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            TokenError::Config(_) => Stage::Configuration,
            TokenError::InvalidRequest(_) => Stage::BuildRequest,
            TokenError::MalformedResponse(_)
            | TokenError::UpstreamAuth { .. }
            | TokenError::Transport(_) => Stage::Exchange,
            TokenError::MalformedToken(_) => Stage::DecodeClaims,
        }
    }

    pub(crate) fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TokenError::Transport(err.into())
    }
}

impl From<hyper_util::client::legacy::Error> for TokenError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        TokenError::Transport(Box::new(err))
    }
}
