//! Runtime configuration: CLI flags with environment-variable fallbacks,
//! resolved once at startup via `clap`'s `env` feature (no TOML layer —
//! every field here is either operational (port, log level) or a secret
//! that belongs in the environment, not a checked-in file).

use clap::Parser;

const DEFAULT_HTTP_PORT: u16 = 4300;
const DEFAULT_GATEWAY_HEARTBEAT_INTERVAL_SECS: u32 = 60;
const DEFAULT_GOVERNOR_INTERVAL_SECS: u64 = 300;

#[derive(Parser, Debug, Clone)]
#[command(name = "corelayd", about = "Corelay coordination-plane server", version)]
pub struct Config {
    /// HTTP/WS/SSE bind port.
    #[arg(long, env = "COREL_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub port: u16,

    /// Postgres connection string.
    #[arg(long, env = "COREL_DATABASE_URL")]
    pub database_url: String,

    /// Log level filter string, e.g. "info", "debug,corelay=trace".
    #[arg(long, env = "COREL_LOG", default_value = "info")]
    pub log: String,

    /// Write logs to this file path too (rotated daily), in addition to stdout.
    #[arg(long, env = "COREL_LOG_FILE")]
    pub log_file: Option<std::path::PathBuf>,

    /// HMAC secret used to sign/verify end-user access tokens.
    #[arg(long, env = "COREL_END_USER_JWT_SECRET")]
    pub end_user_jwt_secret: String,

    /// Shared secret accepted from operator board-sync connections, in
    /// addition to a structurally valid external JWT.
    #[arg(long, env = "COREL_OPERATOR_SHARED_SECRET")]
    pub operator_shared_secret: String,

    /// Suggested heartbeat interval handed to newly registered gateways.
    #[arg(long, env = "COREL_GATEWAY_HEARTBEAT_INTERVAL_SECS", default_value_t = DEFAULT_GATEWAY_HEARTBEAT_INTERVAL_SECS)]
    pub gateway_heartbeat_interval_seconds: u32,

    /// Heartbeat Governor tick interval in seconds (floored at 30s).
    #[arg(long, env = "COREL_GOVERNOR_INTERVAL_SECS", default_value_t = DEFAULT_GOVERNOR_INTERVAL_SECS)]
    pub governor_interval_seconds: u64,
}

impl Config {
    pub fn parse_from_env() -> Self {
        Self::parse()
    }
}
