use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderValue, USER_AGENT};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use serde_json::Value;
use url::Url;

use crate::util::json_kind;
use crate::config::TokenServiceConfig;
use crate::error::TokenError;
use crate::response::TokenResponse;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// HTTP client for a single token endpoint.
///
/// Cloning is cheap and clones share one connection pool, so a single instance
/// can serve any number of concurrent calls.
#[derive(Clone)]
pub struct TokenExchangeClient {
    inner: HyperClient,
    endpoint: Arc<Url>,
    user_agent: HeaderValue,
    request_timeout: Option<Duration>,
    max_body_size: usize,
}

impl TokenExchangeClient {
    /// Build a client for `config.token_endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Config`] if the TLS connector cannot be built or
    /// the user agent is not a valid header value.
    pub fn new(config: &TokenServiceConfig) -> Result<Self, TokenError> {
        let https = crate::tls::https_connector(
            config.tls_roots,
            config.allow_insecure_http,
            config.connect_timeout,
        )?;

        let inner = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build::<_, Full<Bytes>>(https);

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| TokenError::Config(format!("invalid user_agent: {e}")))?;

        Ok(Self {
            inner,
            endpoint: Arc::new(config.token_endpoint.clone()),
            user_agent,
            request_timeout: config.request_timeout,
            max_body_size: config.max_body_size,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST `form_body` to the token endpoint and parse the JSON object reply.
    ///
    /// Dropping the returned future aborts the request.
    ///
    /// # Errors
    ///
    /// - [`TokenError::UpstreamAuth`] for any status other than 200, carrying the body
    /// - [`TokenError::MalformedResponse`] if a 200 body is not a JSON object
    /// - [`TokenError::Transport`] for connection, timeout, TLS or body read failures
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint()))]
    pub async fn send(&self, form_body: String) -> Result<TokenResponse, TokenError> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.round_trip(form_body))
                .await
                .map_err(|_| {
                    TokenError::transport(format!("token request timed out after {limit:?}"))
                })?,
            None => self.round_trip(form_body).await,
        }
    }

    async fn round_trip(&self, form_body: String) -> Result<TokenResponse, TokenError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.as_str())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.user_agent.clone())
            .body(Full::new(Bytes::from(form_body)))
            .map_err(|e| TokenError::Config(format!("invalid token request: {e}")))?;

        tracing::debug!("sending token request");
        let response = self.inner.request(request).await?;
        let (parts, body) = response.into_parts();

        if parts.status != StatusCode::OK {
            let (prefix, truncated) = read_prefix(body, self.max_body_size).await?;
            tracing::warn!(status = %parts.status, truncated, "token endpoint rejected the request");
            return Err(TokenError::UpstreamAuth {
                status: parts.status,
                body: String::from_utf8_lossy(&prefix).into_owned(),
            });
        }

        let bytes = Limited::new(body, self.max_body_size)
            .collect()
            .await
            .map_err(TokenError::Transport)?
            .to_bytes();

        parse_token_response(&bytes)
    }
}

/// Read at most `limit` bytes of `body`; the flag reports whether more was
/// available. The remainder is left unread.
async fn read_prefix(mut body: Incoming, limit: usize) -> Result<(Vec<u8>, bool), TokenError> {
    let mut buf = Vec::new();
    while let Some(frame) = body.frame().await {
        let Ok(data) = frame.map_err(TokenError::transport)?.into_data() else {
            continue;
        };
        let room = limit - buf.len();
        if data.len() > room {
            buf.extend_from_slice(&data[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&data);
    }
    Ok((buf, false))
}

impl std::fmt::Debug for TokenExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchangeClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

fn parse_token_response(body: &[u8]) -> Result<TokenResponse, TokenError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(TokenResponse::from_map(fields)),
        Ok(other) => Err(TokenError::MalformedResponse(format!(
            "expected a JSON object, got a JSON {}",
            json_kind(&other)
        ))),
        Err(e) => Err(TokenError::MalformedResponse(format!(
            "body is not valid JSON: {e}"
        ))),
    }
}
