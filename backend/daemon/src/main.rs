use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use armdeck_broker::{BrokerSettings, ClassifierSettings, SessionRegistry};
use armdeck_config::ArmdeckConfig;
use armdeck_devices::{DeviceStreamRegistry, VideoNodeBackend};
use armdeck_gateway::GatewayState;

#[derive(Parser)]
#[command(name = "armdeck")]
#[command(about = "Session broker bridging a web dashboard to robot-arm CLI operations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the broker server
    Serve {
        /// Port to bind, overriding the config file
        #[arg(short, long)]
        port: Option<u16>,
        /// Config file path, overriding the default location
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Query a running broker's health endpoint
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port, config } => {
            let path = config.unwrap_or_else(armdeck_config::config_file_path);
            let mut config = armdeck_config::load_config(&path).await?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            run_server(config).await?;
        }
        Commands::Status { port } => {
            let port = match port {
                Some(port) => port,
                None => {
                    let path = armdeck_config::config_file_path();
                    armdeck_config::load_config(&path).await?.gateway.port
                }
            };
            let client = reqwest::Client::new();
            match client
                .get(format!("http://localhost:{port}/api/health"))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("armdeck is not running on port {port}");
                }
            }
        }
    }
    Ok(())
}

async fn run_server(config: ArmdeckConfig) -> Result<()> {
    armdeck_logging::init(&config.logging.level, config.logging.dir.as_deref());

    let classifier = ClassifierSettings {
        prompt_phrases: config.classifier.prompt_phrases.clone(),
        table_flush: Duration::from_millis(config.classifier.table_flush_ms),
    };
    let settings = BrokerSettings {
        channel_capacity: config.broker.channel_capacity,
        stop_grace: Duration::from_secs(config.broker.stop_grace_secs),
        error_tail_lines: config.broker.error_tail_lines,
    };
    let sessions = Arc::new(SessionRegistry::new(
        config.launcher.clone(),
        classifier,
        settings,
    ));
    let backend = Arc::new(VideoNodeBackend::with_root(config.devices.dev_root.clone()));
    let devices = Arc::new(DeviceStreamRegistry::new(backend));

    // Background sweep of terminal sessions nobody watches anymore.
    let reap_interval = Duration::from_secs(config.broker.reap_interval_secs.max(1));
    let reaper = Arc::clone(&sessions);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reap_interval);
        loop {
            ticker.tick().await;
            reaper.reap_terminal().await;
        }
    });

    let state = GatewayState {
        sessions: Arc::clone(&sessions),
        devices: Arc::clone(&devices),
    };
    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port).parse()?;
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    };
    armdeck_gateway::serve(addr, state, shutdown).await?;

    // Connections are drained; tear down anything still live.
    sessions.shutdown().await;
    devices.stop_all().await;
    info!("shutdown complete");
    Ok(())
}
