//! rokucast Daemon - Main entry point
//!
//! Finds players on the local network, keeps the selected one, casts to it
//! and serves the REST/WebSocket API used by the options page.

mod api;
mod config;
mod server;
mod state;
mod ws;

use anyhow::{bail, Result};
use clap::Parser;
use rokucast_core::MessageCode;
use rokucast_discovery::DiscoveryEvent;
use rokucast_ecp::CastTarget;
use std::path::PathBuf;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rokucast")]
#[command(about = "Discover Roku players on the local network and cast streams to them")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rokucast.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single scan and exit
    #[arg(long)]
    scan_once: bool,

    /// Check that a device answers at this address and save it
    #[arg(long, value_name = "ADDR")]
    set_device: Option<String>,

    /// Save the channel variant that receives casts ("0" is the primary channel)
    #[arg(long, value_name = "ID")]
    app_id: Option<String>,

    /// Cast a channel's live stream to the saved device
    #[arg(long, value_name = "LOGIN", conflicts_with = "cast_video")]
    cast_channel: Option<String>,

    /// Cast a recorded video to the saved device
    #[arg(long, value_name = "ID")]
    cast_video: Option<String>,

    /// Start position in seconds
    #[arg(long, value_name = "SECS")]
    time: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("rokucast v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        port = config.discovery.port,
        probe_timeout_ms = config.discovery.probe_timeout_ms,
        max_in_flight = ?config.discovery.max_in_flight,
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone())?;

    if let Some(app_id) = args.app_id.as_deref() {
        if let Err(code) = state.set_app_id(app_id).await {
            bail!("{}", code);
        }
        info!(app_id = %app_id, "Channel variant saved");
    }

    if let Some(address) = args.set_device {
        return match state.set_device(&address).await {
            Ok(info) => {
                println!("{} ({})", MessageCode::SetIp, info.display_name());
                Ok(())
            }
            Err(code) => bail!("{}", code),
        };
    }

    let target = CastTarget::from_parts(args.cast_channel.as_deref(), args.cast_video.as_deref());
    if let Some(target) = target {
        return match state.cast(target, args.time).await {
            Ok(msg) => {
                println!("{}", msg);
                Ok(())
            }
            Err(msg) => bail!("{}", msg),
        };
    }

    if args.scan_once {
        // Single scan mode
        info!("Running single discovery scan");
        let mut events = state.subscribe();
        let ticket = state.setup().await?;
        println!("Scanning {} prefix(es)...", ticket.prefixes.len());

        match report_scan(&mut events).await {
            Some(found) => println!("Discovered {} devices", found),
            None => println!("Scan cancelled"),
        }
    } else {
        // Daemon mode - run web server and discovery
        server::run(state, &config.daemon.bind).await?;
    }

    Ok(())
}

/// Print devices as they are found; the device count once the scan completes
async fn report_scan(events: &mut broadcast::Receiver<DiscoveryEvent>) -> Option<usize> {
    loop {
        match events.recv().await {
            Ok(DiscoveryEvent::DeviceFound { device, .. }) => println!("  - {}", device.label()),
            Ok(DiscoveryEvent::ScanCompleted(summary)) => return Some(summary.devices.len()),
            Ok(DiscoveryEvent::ScanCancelled { .. }) => return None,
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "Missed discovery events"),
            Err(RecvError::Closed) => return None,
        }
    }
}
