// Service principal credentials, read from the file named by AZURE_AUTH_LOCATION.
// Both the JSON "sdk-auth" file and the older properties file are accepted.

use crate::error::AuthError;
use crate::paths;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, PartialEq)]
pub struct AuthFile {
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
    pub tenant_id: String,
}

impl fmt::Debug for AuthFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthFile")
            .field("client_id", &self.client_id)
            .field("client_secret", &"********")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SdkAuth {
    client_id: Option<String>,
    client_secret: Option<String>,
    subscription_id: Option<String>,
    tenant_id: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, AuthError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(AuthError::MissingField(field)),
    }
}

impl AuthFile {
    pub fn parse(text: &str) -> Result<Self, AuthError> {
        if text.trim_start().starts_with('{') {
            Self::parse_json(text)
        } else {
            Self::parse_properties(text)
        }
    }

    fn parse_json(text: &str) -> Result<Self, AuthError> {
        let raw: SdkAuth = serde_json::from_str(text)?;
        Ok(Self {
            client_id: required(raw.client_id, "clientId")?,
            client_secret: required(raw.client_secret, "clientSecret")?,
            subscription_id: required(raw.subscription_id, "subscriptionId")?,
            tenant_id: required(raw.tenant_id, "tenantId")?,
        })
    }

    /// `key=value` lines, `#` starts a comment. Values may contain '='.
    fn parse_properties(text: &str) -> Result<Self, AuthError> {
        let mut props: HashMap<&str, &str> = HashMap::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(idx) = line.find('=') {
                props.insert(line[..idx].trim(), line[idx + 1..].trim());
            }
        }
        let mut take = |key: &str| props.remove(key).map(String::from);
        Ok(Self {
            client_id: required(take("client"), "client")?,
            client_secret: required(take("key"), "key")?,
            subscription_id: required(take("subscription"), "subscription")?,
            tenant_id: required(take("tenant"), "tenant")?,
        })
    }

    pub fn load(path: &str) -> Result<Self, AuthError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| AuthError::Io { path: path.to_string(), source })?;
        Self::parse(&text)
    }
}

/// Credentials named by AZURE_AUTH_LOCATION, or None when the variable is not
/// set and the current CLI session should be used instead
pub fn auth_file_from_env() -> Result<Option<AuthFile>, AuthError> {
    match std::env::var(paths::AUTH_LOCATION_ENV) {
        Ok(path) if !path.trim().is_empty() => AuthFile::load(path.trim()).map(Some),
        _ => Ok(None),
    }
}
