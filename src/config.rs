use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Marketplace realtime chat/notification server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "market-server", version, about = "Marketplace realtime core")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "MARKET_PORT", default_value = "3200")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "MARKET_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./market.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "MARKET_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys, uploads)
    #[arg(long, env = "MARKET_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Fallback locale for greetings and new guest records
    #[arg(long, env = "MARKET_DEFAULT_LANGUAGE", default_value = "en")]
    pub default_language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3200,
            bind_address: "0.0.0.0".to_string(),
            config: "./market.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            default_language: "en".to_string(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (MARKET_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("MARKET_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Marketplace realtime server configuration
# Place this file at ./market.toml or specify with --config <path>
# All settings can be overridden via environment variables (MARKET_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3200)
# port = 3200

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database, JWT signing key, and message files
# data_dir = "./data"

# Fallback locale for canned greetings and new guest records
# default_language = "en"
"#
    .to_string()
}
