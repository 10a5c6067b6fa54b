use std::time::Duration;

use relay_core::AuthFieldExtractor;
use serde::{Deserialize, Serialize};

/// What the coordinator does when a connection's credentials carry no identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingIdentityPolicy {
    /// Bind the empty placeholder identity.
    #[default]
    Placeholder,
    /// Leave the connection unidentified and ignore its private messages.
    Reject,
}

/// Registry hygiene choices. Defaults keep join/disconnect strictly
/// identity-addressed: nothing is unbound that the event did not name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorPolicy {
    /// Unbind the connection's other identities before binding a new one on `joinChat`.
    pub rebind_on_join: bool,
    pub missing_identity: MissingIdentityPolicy,
    /// On disconnect, remove every binding that still points at the closing connection.
    pub sweep_on_disconnect: bool,
}

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Credential field the identity is read from.
    pub identity_field: String,
    pub policy: CoordinatorPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 9091,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            client_timeout_secs: 90,
            cleanup_interval_secs: 60,
            identity_field: AuthFieldExtractor::DEFAULT_FIELD.into(),
            policy: CoordinatorPolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 9091);
        assert_eq!(config.bind_addr(), "0.0.0.0:9091");
        assert_eq!(config.identity_field, "userId");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.client_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn default_policy_keeps_dangling_entries() {
        let policy = CoordinatorPolicy::default();
        assert!(!policy.rebind_on_join);
        assert!(!policy.sweep_on_disconnect);
        assert_eq!(policy.missing_identity, MissingIdentityPolicy::Placeholder);
    }

    #[test]
    fn policy_serializes_snake_case() {
        let json = serde_json::to_value(CoordinatorPolicy {
            missing_identity: MissingIdentityPolicy::Reject,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["missing_identity"], "reject");
        assert_eq!(json["rebind_on_join"], false);
    }
}
