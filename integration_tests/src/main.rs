//! Integration tests for the NUS peripheral firmware.
//!
//! Run after flashing the peripheral binary. The host OS handles pairing;
//! accept the numeric comparison prompt when it appears.

mod ble_client;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::NusClient;
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for the NUS peripheral firmware")]
struct Args {
    /// Advertised device name
    #[arg(long, default_value = "NUS Peripheral")]
    name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,

    /// Notifications to collect in the TX test
    #[arg(long, default_value = "5")]
    ticks: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "NUS Peripheral Integration Tests".bold());
    println!("Scanning for \"{}\"...", args.name);

    let mut device = NusClient::connect_by_name(&args.name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&mut device, args.ticks).await;
    print_results(&results);

    device.disconnect().await?;

    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
