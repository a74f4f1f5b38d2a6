use serde_json::Value;

use crate::claims::Claims;
use crate::util::json_kind;

/// Claim holding realm-scoped access information.
pub const REALM_ACCESS_CLAIM: &str = "realm_access";

/// Key under [`REALM_ACCESS_CLAIM`] listing realm role names.
pub const ROLES_KEY: &str = "roles";

/// Extract realm role names from `realm_access.roles`.
///
/// Extraction is tolerant: a missing claim yields an empty list, and so does a
/// claim of the wrong shape (`realm_access` not an object, `roles` not an
/// array, or any role that is not a string). Shape mismatches are reported at
/// `warn` level. Order is preserved as issued.
#[must_use]
pub fn extract_realm_roles(claims: &Claims) -> Vec<String> {
    let realm_access = match claims.get(REALM_ACCESS_CLAIM) {
        None => return Vec::new(),
        Some(Value::Object(realm_access)) => realm_access,
        Some(other) => {
            tracing::warn!(
                claim = REALM_ACCESS_CLAIM,
                found = json_kind(other),
                "unexpected structure in token claims; expected an object"
            );
            return Vec::new();
        }
    };

    let roles = match realm_access.get(ROLES_KEY) {
        None => return Vec::new(),
        Some(Value::Array(roles)) => roles,
        Some(other) => {
            tracing::warn!(
                claim = "realm_access.roles",
                found = json_kind(other),
                "unexpected structure in token claims; expected an array"
            );
            return Vec::new();
        }
    };

    let names: Option<Vec<String>> = roles
        .iter()
        .map(|role| role.as_str().map(ToOwned::to_owned))
        .collect();

    names.unwrap_or_else(|| {
        tracing::warn!(
            claim = "realm_access.roles",
            "unexpected structure in token claims; expected an array of strings"
        );
        Vec::new()
    })
}
