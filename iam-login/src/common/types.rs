use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Header name to every value sent under that name, in transmission order
pub type RequestHeaders = BTreeMap<String, Vec<String>>;

/// Flat key/value payload of a login request
pub type LoginData = HashMap<String, String>;

/// Snapshot of a signed STS request, replayed byte-for-byte by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequestDescriptor {
    pub method: String,
    pub url: String,
    pub headers: RequestHeaders,
    pub body: Vec<u8>,
}

impl SignedRequestDescriptor {
    /// Values of every entry whose name matches `name` case-insensitively
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter().map(String::as_str))
            .collect()
    }
}

/// How a role expects its callers to authenticate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    Iam,
    Ec2,
}

/// A configured login role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RoleEntry {
    #[serde(default)]
    pub auth_type: AuthType,

    /// Canonical principal ARNs allowed to log in with this role
    #[serde(default)]
    pub bound_iam_principal_arn: Vec<String>,
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub role: String,
    pub canonical_arn: String,
    pub account_id: String,

    /// ARN exactly as returned by STS
    pub client_arn: String,

    /// Opaque principal id (`UserId` in the STS response)
    pub client_user_id: String,
}
