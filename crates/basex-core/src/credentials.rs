use std::fmt;

use crate::action::Node;
use crate::error::{GatewayError, Result};

/// Where and as whom to reach a BaseX server.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    /// Server root, without a trailing `/`.
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolve the address and login of the database described by `target`.
///
/// The address comes from `url`, then `additionalProperty.url` or
/// `additionalProperty.baseUrl`. Username and password are taken from
/// top-level fields first, then from `additionalProperty`; a missing login
/// resolves to an empty string. `field` names the property `target` was read
/// from, for error messages.
pub fn extract(target: Option<Node<'_>>, field: &str) -> Result<DatabaseCredentials> {
    let target = target.ok_or_else(|| GatewayError::MissingTarget(field.to_string()))?;

    let base_url = target
        .str("url")
        .or_else(|| target.additional("url"))
        .or_else(|| target.additional("baseUrl"))
        .ok_or_else(|| {
            GatewayError::MissingCredentials(format!("{field} has no url to reach the database"))
        })?;

    let login = |key: &str| {
        target
            .str(key)
            .or_else(|| target.additional(key))
            .unwrap_or_default()
            .to_string()
    };

    Ok(DatabaseCredentials {
        base_url: base_url.trim().trim_end_matches('/').to_string(),
        username: login("username"),
        password: login("password"),
    })
}

/// The database name carried by `target`: its `identifier`, else its `name`.
///
/// The name becomes one REST path segment, so `/`, `?` and `#` are refused.
pub fn database_name<'a>(target: Option<Node<'a>>, field: &str) -> Result<&'a str> {
    let target = target.ok_or_else(|| GatewayError::MissingTarget(field.to_string()))?;
    let name = target
        .str("identifier")
        .or_else(|| target.str("name"))
        .map(str::trim)
        .ok_or_else(|| GatewayError::MissingField(format!("{field}.identifier")))?;
    if name.contains(['/', '?', '#']) {
        return Err(GatewayError::invalid_field(
            format!("{field}.identifier"),
            format!("'{name}' is not a valid database name"),
        ));
    }
    Ok(name)
}
