//! CLI for this application
//!
use std::path::PathBuf;

use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    // Server listen address
    #[clap(
        long,
        default_value = settings::DEFAULT_LISTEN_ADDRESS,
        env("TRAFFICSYNC_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("TRAFFICSYNC_HTTP_LISTEN_PORT"),
        help = "Port to bind the HTTP API server to"
    )]
    pub listen_port: u16,

    // Pre-provisioned node keys
    #[clap(
        long,
        env("TRAFFICSYNC_NODE_KEYS"),
        value_delimiter = ',',
        help = "Comma-separated keys of nodes allowed to sync"
    )]
    pub node_keys: Vec<String>,

    // Seed file with users and nodes
    #[clap(
        long,
        env("TRAFFICSYNC_SEED_FILE"),
        help = "JSON file with initial users and node keys"
    )]
    pub seed_file: Option<PathBuf>,

    // Admin bearer token
    #[clap(
        long,
        env("TRAFFICSYNC_ADMIN_TOKEN"),
        help = "Bearer token required on /admin routes"
    )]
    pub admin_token: Option<String>,

    // Request timeout
    #[clap(
        long,
        default_value = settings::DEFAULT_REQUEST_TIMEOUT_SECS,
        env("TRAFFICSYNC_REQUEST_TIMEOUT_SECS"),
        help = "Seconds before an HTTP request is abandoned"
    )]
    pub request_timeout_secs: u64,

    // Store timeout
    #[clap(
        long,
        default_value = settings::DEFAULT_STORE_TIMEOUT_MS,
        env("TRAFFICSYNC_STORE_TIMEOUT_MS"),
        help = "Milliseconds before a traffic store call counts as unavailable"
    )]
    pub store_timeout_ms: u64,

    // Report id deduplication window
    #[clap(
        long,
        default_value = settings::DEFAULT_REPORT_DEDUPE_WINDOW,
        env("TRAFFICSYNC_REPORT_DEDUPE_WINDOW"),
        help = "Report ids remembered per node to drop replayed reports (0 disables)"
    )]
    pub report_dedupe_window: usize,

    // Body limit
    #[clap(
        long,
        default_value = settings::DEFAULT_MAX_BODY_BYTES,
        env("TRAFFICSYNC_MAX_BODY_BYTES"),
        help = "Maximum accepted request body size in bytes"
    )]
    pub max_body_bytes: usize,

    // Log format
    #[clap(long, env("TRAFFICSYNC_LOG_JSON"), help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            node_keys: self.node_keys,
            seed_file: self.seed_file,
            admin_token: self.admin_token,
            request_timeout_secs: self.request_timeout_secs,
            store_timeout_ms: self.store_timeout_ms,
            report_dedupe_window: self.report_dedupe_window,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parses_defaults() {
        let cli = Cli::try_parse_from(["trafficsync"]).unwrap();
        let settings = cli.into_settings();
        assert_eq!(settings.listen_port, settings::STANDARD_PORT_HTTP);
        assert_eq!(settings.store_timeout_ms, 2000);
        assert_eq!(settings.report_dedupe_window, 1024);
        assert!(settings.node_keys.is_empty());
        assert!(settings.admin_token.is_none());
    }

    #[test]
    fn parses_node_key_list() {
        let cli = Cli::try_parse_from([
            "trafficsync",
            "--node-keys",
            "edge-a,edge-b",
            "--admin-token",
            "s3cret",
        ])
        .unwrap();
        let settings = cli.into_settings();
        assert_eq!(settings.node_keys, vec!["edge-a", "edge-b"]);
        assert_eq!(settings.admin_token.as_deref(), Some("s3cret"));
    }
}
