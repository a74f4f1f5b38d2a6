//! Decoding of compact JWT payloads.
//!
//! Only the payload segment is read. Header and signature are neither
//! validated nor verified: the token comes straight from the token endpoint
//! over the configured transport and is used for role display, not for
//! authorization decisions.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

use crate::error::TokenError;
use crate::util::json_kind;

/// Claims decoded from a JWT payload.
pub type Claims = Map<String, Value>;

/// Decode the payload (second segment) of a compact-serialized JWT.
///
/// Base64url padding is optional: `=` characters at the end of the segment
/// are accepted and ignored.
///
/// # Errors
///
/// Returns [`TokenError::MalformedToken`] if the token has no payload segment,
/// the segment is not valid base64url, or it does not hold a UTF-8 JSON
/// object.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let _header = segments.next();
    let Some(payload) = segments.next() else {
        return Err(TokenError::MalformedToken(
            "expected dot-separated header and payload segments".into(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::MalformedToken(format!("payload is not base64url: {e}")))?;

    let json = std::str::from_utf8(&bytes)
        .map_err(|e| TokenError::MalformedToken(format!("payload is not UTF-8: {e}")))?;

    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(other) => Err(TokenError::MalformedToken(format!(
            "payload is a JSON {}, expected an object",
            json_kind(&other)
        ))),
        Err(e) => Err(TokenError::MalformedToken(format!(
            "payload is not valid JSON: {e}"
        ))),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;

    fn jwt_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn decodes_payload_object() {
        let token = jwt_with_payload(r#"{"sub":"u1","realm_access":{"roles":["a","b"]}}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims["sub"], "u1");
        assert_eq!(claims["realm_access"]["roles"][1], "b");
    }

    #[test]
    fn padded_and_unpadded_payloads_decode_identically() {
        // 7 bytes of JSON -> base64 needs "==" padding.
        let payload = r#"{"a":1}"#;
        let padded = format!("h.{}.s", URL_SAFE.encode(payload));
        assert!(padded.contains('='), "fixture must carry padding");
        let unpadded = format!("h.{}.s", URL_SAFE_NO_PAD.encode(payload));
        assert_eq!(
            decode_claims(&padded).unwrap(),
            decode_claims(&unpadded).unwrap()
        );
    }

    #[test]
    fn url_safe_alphabet_is_used() {
        // "??>>" encodes with a '-' in the url-safe alphabet.
        let token = jwt_with_payload(r#"{"q":"??>>"}"#);
        assert_eq!(decode_claims(&token).unwrap()["q"], "??>>");
    }

    #[test]
    fn two_segments_are_enough() {
        let token = format!("h.{}", URL_SAFE_NO_PAD.encode("{}"));
        assert!(decode_claims(&token).unwrap().is_empty());
    }

    #[test]
    fn no_dots_is_malformed() {
        let err = decode_claims("not-a-jwt").unwrap_err();
        assert!(matches!(err, TokenError::MalformedToken(_)), "got: {err}");
    }

    #[test]
    fn invalid_base64_is_malformed() {
        let err = decode_claims("h.***.s").unwrap_err();
        assert!(
            matches!(err, TokenError::MalformedToken(ref m) if m.contains("base64url")),
            "got: {err}"
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        let token = jwt_with_payload("{not json");
        let err = decode_claims(&token).unwrap_err();
        assert!(
            matches!(err, TokenError::MalformedToken(ref m) if m.contains("JSON")),
            "got: {err}"
        );
    }

    #[test]
    fn non_utf8_is_malformed() {
        let token = format!("h.{}.s", URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]));
        let err = decode_claims(&token).unwrap_err();
        assert!(
            matches!(err, TokenError::MalformedToken(ref m) if m.contains("UTF-8")),
            "got: {err}"
        );
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let token = jwt_with_payload("[1,2]");
        let err = decode_claims(&token).unwrap_err();
        assert!(
            matches!(err, TokenError::MalformedToken(ref m) if m.contains("array")),
            "got: {err}"
        );
    }
}
