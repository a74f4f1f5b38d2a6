//! Connector construction for the token endpoint client.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::pki_types::CertificateDer;

use crate::config::TlsRoots;
use crate::error::TokenError;

/// Native roots are loaded once per process; an empty vec means none found.
static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(|| {
        let result = rustls_native_certs::load_native_certs();
        for err in &result.errors {
            tracing::warn!(error = %err, "error loading native root certificate");
        }
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
        result.certs
    })
}

/// Use an already-installed process-wide provider if there is one, otherwise
/// aws-lc-rs without installing it globally.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn native_roots_client_config() -> Result<rustls::ClientConfig, TokenError> {
    let certs = native_root_certs();
    if certs.is_empty() {
        return Err(TokenError::Config(
            "no native root CA certificates found in OS certificate store".into(),
        ));
    }

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(TokenError::Config(format!(
            "no valid native root CA certificates parsed (found {})",
            certs.len()
        )));
    }

    rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| TokenError::Config(format!("failed to set TLS protocol versions: {e}")))
        .map(|builder| {
            builder
                .with_root_certificates(root_store)
                .with_no_client_auth()
        })
}

/// Build the HTTPS connector used for token endpoint calls.
///
/// `connect_timeout` bounds TCP connection establishment only. With
/// `allow_http` the connector also accepts plain `http://` URIs.
///
/// # Errors
///
/// Returns [`TokenError::Config`] if the selected root store is unusable.
pub fn https_connector(
    roots: TlsRoots,
    allow_http: bool,
    connect_timeout: Duration,
) -> Result<HttpsConnector<HttpConnector>, TokenError> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(connect_timeout));
    http.set_nodelay(true);

    let builder = match roots {
        TlsRoots::Webpki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| TokenError::Config(format!("TLS setup failed: {e}")))?,
        TlsRoots::Native => HttpsConnectorBuilder::new().with_tls_config(native_roots_client_config()?),
    };

    let connector = if allow_http {
        builder.https_or_http().enable_all_versions().wrap_connector(http)
    } else {
        builder.https_only().enable_all_versions().wrap_connector(http)
    };
    Ok(connector)
}
