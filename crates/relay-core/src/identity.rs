use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, externally supplied name of one logical user.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The identity bound when credentials carry none.
    pub fn placeholder() -> Self {
        Self(String::new())
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Credential bundle presented by a connection at handshake time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Derives an identity from a connection's credentials.
///
/// Implementations must be pure and cheap: the coordinator calls this on
/// every lifecycle event instead of caching the result.
pub trait IdentityExtractor: Send + Sync {
    fn extract(&self, credentials: &Credentials) -> Option<Identity>;
}

/// Reads the identity from a single named credential field.
#[derive(Clone, Debug)]
pub struct AuthFieldExtractor {
    field: String,
}

impl AuthFieldExtractor {
    pub const DEFAULT_FIELD: &'static str = "userId";

    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Default for AuthFieldExtractor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FIELD)
    }
}

impl IdentityExtractor for AuthFieldExtractor {
    fn extract(&self, credentials: &Credentials) -> Option<Identity> {
        let value = credentials.get(&self.field)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(Identity::new(value))
        }
    }
}
