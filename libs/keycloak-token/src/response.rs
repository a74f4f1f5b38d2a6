use serde::Serialize;
use serde_json::{Map, Value};

/// Key under which realm roles are attached to an authorization-code response.
pub const ROLES_FIELD: &str = "roles";

/// Token endpoint response, kept as the provider returned it.
///
/// Any provider-specific keys are preserved. Serializes as the plain JSON
/// object, so it can be handed to a frontend unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TokenResponse(Map<String, Value>);

impl TokenResponse {
    #[must_use]
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The `access_token` value, if present as a string.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.0.get("access_token").and_then(Value::as_str)
    }

    /// The `refresh_token` value, if present as a string.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.0.get("refresh_token").and_then(Value::as_str)
    }

    /// Realm roles attached by [`TokenService::exchange_code`](crate::TokenService::exchange_code).
    ///
    /// `None` when no `roles` key is present (refresh responses, or responses
    /// without an access token).
    #[must_use]
    pub fn roles(&self) -> Option<Vec<&str>> {
        self.0
            .get(ROLES_FIELD)?
            .as_array()?
            .iter()
            .map(Value::as_str)
            .collect()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub(crate) fn set_roles(&mut self, roles: Vec<String>) {
        self.0.insert(
            ROLES_FIELD.to_owned(),
            Value::Array(roles.into_iter().map(Value::String).collect()),
        );
    }
}

impl From<TokenResponse> for Value {
    fn from(resp: TokenResponse) -> Self {
        Value::Object(resp.0)
    }
}
