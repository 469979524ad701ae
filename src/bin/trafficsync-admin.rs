use std::time::Duration;

use clap::{Parser, Subcommand};

use trafficsync::admin::TrafficChange;
use trafficsync::client::SyncClient;
use trafficsync::events::EventBody;

#[derive(Parser)]
#[command(name = "trafficsync-admin")]
#[command(about = "trafficsync operator and node tool")]
struct Cli {
    /// Authority base URL
    #[arg(long, env("TRAFFICSYNC_URL"), default_value = "http://127.0.0.1:8420")]
    url: String,

    /// Bearer token for admin endpoints
    #[arg(long, env("TRAFFICSYNC_ADMIN_TOKEN"))]
    admin_token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the authority is up
    Health,
    /// Send usage reports as a node and print the events returned
    Sync {
        /// Node key
        #[arg(long)]
        key: String,
        /// Usage report as user_id:bytes[:report_id], repeatable
        #[arg(long = "report")]
        reports: Vec<String>,
    },
    /// Overwrite a user's quota and/or usage
    SetTraffic {
        #[arg(long)]
        user_id: String,
        /// New quota in bytes
        #[arg(long)]
        total: Option<u64>,
        /// New usage in bytes
        #[arg(long)]
        used: Option<u64>,
    },
    /// List registered nodes and their cursors
    Nodes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = SyncClient::new(&cli.url, Duration::from_secs(cli.timeout_secs))?
        .with_admin_token(cli.admin_token.clone());

    match cli.command {
        Commands::Health => {
            if client.health().await? {
                println!("✅ {} is healthy", cli.url);
            } else {
                println!("❌ {} is not healthy", cli.url);
            }
        }
        Commands::Sync { key, reports } => {
            let reports = reports
                .iter()
                .map(|r| parse_report(r))
                .collect::<Result<Vec<_>, _>>()?;
            println!("📤 Sending {} usage reports", reports.len());
            let events = client.sync(&key, &reports).await?;
            println!("📥 Received {} events", events.len());
            for event in events {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Commands::SetTraffic {
            user_id,
            total,
            used,
        } => {
            let applied = client
                .set_traffic(&TrafficChange {
                    user_id,
                    total_traffic: total,
                    used_traffic: used,
                })
                .await?;
            println!(
                "✅ {}: total={} used={} (event #{})",
                applied.record.user_id, applied.record.total, applied.record.used, applied.sequence
            );
        }
        Commands::Nodes => {
            for node in client.nodes().await? {
                let cursor = node
                    .cursor
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "never synced".to_string());
                println!("{}  cursor={}  syncs={}", node.key, cursor, node.sync_count);
            }
        }
    }

    Ok(())
}

fn parse_report(raw: &str) -> Result<EventBody, Box<dyn std::error::Error>> {
    let mut parts = raw.splitn(3, ':');
    let user_id = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Invalid report '{}': missing user id", raw))?;
    let dt = parts
        .next()
        .ok_or_else(|| format!("Invalid report '{}': missing byte count", raw))?
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("Invalid report '{}': {}", raw, e))?;
    let report_id = parts.next().map(str::to_string);
    Ok(EventBody::IncUsedTraffic {
        user_id: user_id.to_string(),
        dt,
        report_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let report = parse_report("u1:1024").unwrap();
        assert_eq!(
            report,
            EventBody::IncUsedTraffic {
                user_id: "u1".into(),
                dt: 1024,
                report_id: None
            }
        );

        let report = parse_report("u1:5:edge-a-17").unwrap();
        assert!(matches!(
            report,
            EventBody::IncUsedTraffic { report_id: Some(id), .. } if id == "edge-a-17"
        ));
    }

    #[test]
    fn test_invalid_report() {
        assert!(parse_report("u1").is_err());
        assert!(parse_report(":5").is_err());
        assert!(parse_report("u1:lots").is_err());
    }
}
