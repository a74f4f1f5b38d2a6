#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Backend leg of the Keycloak authorization-code flow.
//!
//! [`TokenService`] exchanges an authorization code (or a refresh token) at
//! the identity provider's token endpoint and, for the authorization-code
//! flow, attaches the realm roles found in the issued access token:
//!
//! - [`grant`] builds the `application/x-www-form-urlencoded` request body
//! - [`TokenExchangeClient`] posts it over a pooled hyper/rustls client
//! - [`claims::decode_claims`] reads the access token payload (no signature check)
//! - [`roles::extract_realm_roles`] pulls `realm_access.roles`, tolerating bad shapes
//!
//! # Example
//!
//! ```ignore
//! use keycloak_token::{TokenService, TokenServiceConfig};
//!
//! let config = TokenServiceConfig::new(
//!     "https://sso.example.com/realms/template/protocol/openid-connect/token".parse()?,
//!     "template-client",
//!     client_secret,
//!     "https://app.example.com/home",
//! );
//! let service = TokenService::new(config)?;
//!
//! let tokens = service.exchange_code(&code).await?;
//! let roles = tokens.roles().unwrap_or_default();
//! ```

pub mod claims;
mod client;
pub mod config;
pub mod error;
pub mod grant;
pub mod response;
pub mod roles;
mod service;
mod tls;
mod util;

pub use claims::{Claims, decode_claims};
pub use client::TokenExchangeClient;
pub use config::{TlsRoots, TokenServiceConfig};
pub use error::{Stage, TokenError};
pub use grant::{Grant, GrantRequest};
pub use response::TokenResponse;
pub use roles::extract_realm_roles;
pub use service::TokenService;
