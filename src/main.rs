use anyhow::Context;
use clap::{Parser, ValueEnum};
use relay_server::{CoordinatorPolicy, MissingIdentityPolicy, ServerConfig};
use relay_telemetry::{LogFormat, TelemetryConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MissingIdentity {
    Placeholder,
    Reject,
}

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Presence-aware WebSocket message relay")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, default_value_t = 9091)]
    port: u16,

    /// Outbound queue depth per connection.
    #[arg(long, default_value_t = 256)]
    max_send_queue: usize,

    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,

    /// Close connections that have not answered a ping for this long.
    #[arg(long, default_value_t = 90)]
    client_timeout_secs: u64,

    /// Handshake credential field holding the user identity.
    #[arg(long, default_value = "userId")]
    identity_field: String,

    /// Release a connection's previous identities when it joins under a new one.
    #[arg(long)]
    rebind_on_join: bool,

    /// Remove every identity bound to a connection when it disconnects.
    #[arg(long)]
    sweep_on_disconnect: bool,

    #[arg(long, value_enum, default_value_t = MissingIdentity::Placeholder)]
    missing_identity: MissingIdentity,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            max_send_queue: self.max_send_queue,
            heartbeat_interval_secs: self.heartbeat_secs,
            client_timeout_secs: self.client_timeout_secs,
            identity_field: self.identity_field.clone(),
            policy: CoordinatorPolicy {
                rebind_on_join: self.rebind_on_join,
                sweep_on_disconnect: self.sweep_on_disconnect,
                missing_identity: match self.missing_identity {
                    MissingIdentity::Placeholder => MissingIdentityPolicy::Placeholder,
                    MissingIdentity::Reject => MissingIdentityPolicy::Reject,
                },
            },
            ..ServerConfig::default()
        }
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level,
            format: if self.json_logs { LogFormat::Json } else { LogFormat::Pretty },
            ..TelemetryConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    relay_telemetry::init_telemetry(&args.telemetry_config()).context("initializing logging")?;

    tracing::info!("Starting relay server");

    let handle = relay_server::start(args.server_config())
        .await
        .context("starting server")?;

    tracing::info!(port = handle.port(), "Relay server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl+c")?;

    tracing::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_defaults() {
        let args = Args::parse_from(["relay"]);
        let config = args.server_config();
        let defaults = ServerConfig::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.identity_field, defaults.identity_field);
        assert_eq!(config.policy, CoordinatorPolicy::default());
    }

    #[test]
    fn policy_flags() {
        let args = Args::parse_from([
            "relay",
            "--rebind-on-join",
            "--sweep-on-disconnect",
            "--missing-identity",
            "reject",
            "--port",
            "8080",
        ]);
        let config = args.server_config();
        assert_eq!(config.port, 8080);
        assert!(config.policy.rebind_on_join);
        assert!(config.policy.sweep_on_disconnect);
        assert_eq!(config.policy.missing_identity, MissingIdentityPolicy::Reject);
    }

    #[test]
    fn log_flags() {
        let args = Args::parse_from(["relay", "--log-level", "debug", "--json-logs"]);
        let telemetry = args.telemetry_config();
        assert_eq!(telemetry.log_level, tracing::Level::DEBUG);
        assert_eq!(telemetry.format, LogFormat::Json);
    }
}
