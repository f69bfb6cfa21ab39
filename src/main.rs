//! # Receipt Printer Bridge CLI
//!
//! Headless front end for the printer bridge.
//!
//! ## Usage
//!
//! ```bash
//! # Find printers in range
//! receipt-printer-bridge scan
//!
//! # Connect and remember a printer
//! receipt-printer-bridge connect <device-id>
//!
//! # Print a receipt file ({"text": "...", "autoCut": true})
//! receipt-printer-bridge print receipt.json
//!
//! # Keep the printer connected and print queued orders until Ctrl-C
//! receipt-printer-bridge run
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};
use tokio_util::sync::CancellationToken;

use receipt_printer_bridge::{
    AppState, commands,
    core::background::BackgroundTaskOptions,
    core::bluetooth::{BluestAdapter, DEFAULT_BACKGROUND_INTERVAL_SECS, ReceiptPayload},
    core::orders::JsonOrderFile,
    logging,
    storage::JsonFileStore,
    utils::ensure_directory_exists,
};

const ORDERS_FILE: &str = "orders.json";
const DRAIN_INTERVAL: Duration = Duration::from_secs(5);

/// Receipt Printer Bridge - keeps a BLE receipt printer connected
#[derive(Parser, Debug)]
#[command(name = "receipt-printer-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory for the saved printer, config and print queues
    #[arg(long, env = "PRINTER_BRIDGE_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Log more
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan for printers in range
    Scan,
    /// Connect to a printer and remember it
    Connect {
        /// Device id as printed by `scan`
        device_id: String,
    },
    /// Show the saved printer and the print queue
    Status,
    /// Print a receipt JSON file on the saved printer
    Print {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Disconnect and forget the saved printer
    Forget,
    /// Restore the saved printer, scan orders and print until Ctrl-C
    Run {
        /// Background order scan interval in seconds
        #[arg(long, default_value_t = DEFAULT_BACKGROUND_INTERVAL_SECS)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    ensure_directory_exists(&cli.data_dir).await?;
    let orders = Arc::new(JsonOrderFile::new(cli.data_dir.join(ORDERS_FILE)));
    let adapter = Arc::new(BluestAdapter::new().await?);
    let state = AppState::new(
        adapter,
        Arc::new(JsonFileStore::new(&cli.data_dir)),
        orders.clone(),
        orders,
    )
    .await?;

    match cli.command {
        Commands::Scan => {
            let found = commands::scan_printers(&state).await.map_err(|e| anyhow!(e))?;
            if found.is_empty() {
                println!("No printers found.");
            }
            for printer in found {
                println!(
                    "{}  {}  rssi={}",
                    printer.id,
                    printer.name,
                    printer.rssi.map_or("?".to_string(), |r| r.to_string())
                );
            }
        }
        Commands::Connect { device_id } => {
            let session = commands::connect_printer(&state, &device_id)
                .await
                .map_err(|e| anyhow!(e))?;
            println!(
                "Connected to {} ({}), writing to {}",
                session.peripheral.name, session.peripheral.id, session.characteristic.characteristic
            );
            state.shutdown().await;
        }
        Commands::Status => {
            let status = commands::printer_status(&state).await.map_err(|e| anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Print { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let receipt: ReceiptPayload = serde_json::from_str(&raw)?;
            state.activate().await;
            commands::print_receipt(&state, &receipt)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("Printed.");
            state.shutdown().await;
        }
        Commands::Forget => {
            commands::disconnect_printer(&state)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("Saved printer forgotten.");
        }
        Commands::Run { interval } => serve(&state, interval).await?,
    }
    Ok(())
}

async fn serve(state: &AppState, interval: u64) -> Result<()> {
    let outcome = state.activate().await;
    info!("Startup restore: {:?}", outcome);

    let cancel = CancellationToken::new();
    let watcher = state.supervisor.watch_lost_sessions(cancel.clone());
    let drainer = state.printer.spawn(DRAIN_INTERVAL, cancel.clone());
    state.scheduler.register(
        state.scan_task.clone(),
        BackgroundTaskOptions {
            minimum_interval: Duration::from_secs(interval),
            ..Default::default()
        },
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down.");
    cancel.cancel();
    let _ = tokio::join!(watcher, drainer);
    state.scheduler.shutdown_all();
    state.shutdown().await;
    Ok(())
}
