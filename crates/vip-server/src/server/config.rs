use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;

/// Health check method polled by orchestrators; excluded from request logs by
/// default.
pub const HEALTH_CHECK_PATH: &str = "/grpc.health.v1.Health/Check";

/// Default cap on inbound message size (10 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 << 20;

/// Identifiers served by the built-in static resolver.
pub const DEFAULT_VIP_IDS: [&str; 3] = ["Shahar", "Yonatan", "Kiddon"];

/// Output format of the console log layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line, human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Runtime configuration for the `vip-server` binary.
///
/// Every option can be given on the command line or through an `MS_`-prefixed
/// environment variable (a `.env` file in the working directory is loaded
/// first). The parsed arguments are validated once into a [`ServerConfig`],
/// which is then handed to every component explicitly.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "vip-server",
    version,
    about = "A gRPC service answering whether an identifier is a VIP"
)]
pub struct CliArgs {
    /// Interface to bind.
    ///
    /// Environment variable: `MS_HOST`
    #[arg(long, env = "MS_HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// TCP port the gRPC server listens on.
    ///
    /// Environment variable: `MS_PORT`
    #[arg(long, env = "MS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between two health monitor ticks.
    ///
    /// Environment variable: `MS_HEALTH_CHECK_INTERVAL`
    #[arg(long, env = "MS_HEALTH_CHECK_INTERVAL", default_value_t = 3)]
    pub health_check_interval: u64,

    /// Comma-separated gRPC method paths excluded from request logging. A
    /// trailing `*` matches any path with that prefix.
    ///
    /// Environment variable: `MS_ELASTIC_APM_IGNORE_URLS`
    #[arg(
        long,
        env = "MS_ELASTIC_APM_IGNORE_URLS",
        default_value_t = String::from(HEALTH_CHECK_PATH)
    )]
    pub ignored_methods: String,

    /// Largest inbound message, in bytes. Larger requests are rejected with
    /// `RESOURCE_EXHAUSTED` before reaching the handler.
    ///
    /// Environment variable: `MS_MAX_MESSAGE_SIZE`
    #[arg(long, env = "MS_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Upper bound, in seconds, on the time a single request may take.
    /// Clients may ask for less through `grpc-timeout`.
    ///
    /// Environment variable: `MS_REQUEST_TIMEOUT`
    #[arg(long, env = "MS_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Seconds to wait for in-flight requests during a graceful shutdown.
    ///
    /// Environment variable: `MS_SHUTDOWN_TIMEOUT`
    #[arg(long, env = "MS_SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,

    /// Comma-separated identifiers served by the static resolver.
    ///
    /// Environment variable: `MS_VIP_IDS`
    #[arg(long, env = "MS_VIP_IDS", default_value_t = DEFAULT_VIP_IDS.join(","))]
    pub vip_ids: String,

    /// Ask the resolver backend for its health on every tick instead of
    /// reporting `SERVING` unconditionally.
    ///
    /// Environment variable: `MS_PROBE_BACKEND`
    #[arg(long, env = "MS_PROBE_BACKEND", default_value_t = false)]
    pub probe_backend: bool,

    /// Console log format.
    ///
    /// Environment variable: `MS_LOG_FORMAT`
    #[arg(long, env = "MS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Serve the gRPC reflection API.
    ///
    /// Environment variable: `MS_REFLECTION`
    #[arg(
        long,
        env = "MS_REFLECTION",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub reflection: bool,
}

/// Validated, immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub health_check_interval: Duration,
    pub ignored_methods: Vec<String>,
    pub max_message_size: usize,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub vip_ids: Vec<String>,
    pub probe_backend: bool,
    pub log_format: LogFormat,
    pub reflection: bool,
}

impl ServerConfig {
    /// `host:port` string the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            health_check_interval: Duration::from_secs(3),
            ignored_methods: vec![HEALTH_CHECK_PATH.to_string()],
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
            vip_ids: DEFAULT_VIP_IDS.iter().map(|id| id.to_string()).collect(),
            probe_backend: false,
            log_format: LogFormat::Pretty,
            reflection: true,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.health_check_interval == 0 {
            bail!("MS_HEALTH_CHECK_INTERVAL must be greater than 0");
        }

        if args.max_message_size == 0 {
            bail!("MS_MAX_MESSAGE_SIZE must be greater than 0");
        }

        if args.request_timeout == 0 {
            bail!("MS_REQUEST_TIMEOUT must be greater than 0");
        }

        Ok(Self {
            host: args.host,
            port: args.port,
            health_check_interval: Duration::from_secs(args.health_check_interval),
            ignored_methods: split_list(&args.ignored_methods),
            max_message_size: args.max_message_size,
            request_timeout: Duration::from_secs(args.request_timeout),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            vip_ids: split_list(&args.vip_ids),
            probe_backend: args.probe_backend,
            log_format: args.log_format,
            reflection: args.reflection,
        })
    }
}

/// Splits a comma-separated option, dropping blanks and surrounding spaces.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(core::iter::once("vip-server").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_match_reference_service() {
        let config = ServerConfig::try_from(parse(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.health_check_interval, Duration::from_secs(3));
        assert_eq!(config.ignored_methods, vec![HEALTH_CHECK_PATH.to_string()]);
        assert_eq!(config.max_message_size, 10 * 1024 * 1024);
        assert_eq!(config.vip_ids, vec!["Shahar", "Yonatan", "Kiddon"]);
        assert!(!config.probe_backend);
        assert!(config.reflection);
    }

    #[test]
    fn splits_ignored_methods() {
        let config = ServerConfig::try_from(parse(&[
            "--ignored-methods",
            " /grpc.health.v1.Health/Check, ,/grpc.reflection.*",
        ]))
        .unwrap();
        assert_eq!(
            config.ignored_methods,
            vec!["/grpc.health.v1.Health/Check", "/grpc.reflection.*"]
        );
    }

    #[test]
    fn rejects_zero_interval() {
        let err = ServerConfig::try_from(parse(&["--health-check-interval", "0"])).unwrap_err();
        assert!(err.to_string().contains("MS_HEALTH_CHECK_INTERVAL"));
    }

    #[test]
    fn rejects_zero_message_size() {
        assert!(ServerConfig::try_from(parse(&["--max-message-size", "0"])).is_err());
    }

    #[test]
    fn listen_addr_joins_host_and_port() {
        let config = ServerConfig::try_from(parse(&["--host", "127.0.0.1", "--port", "9090"])).unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn reflection_can_be_disabled() {
        let config = ServerConfig::try_from(parse(&["--reflection", "false"])).unwrap();
        assert!(!config.reflection);
    }
}
