//! Command-line entry point: connect to the instrument and stream updates.

use anyhow::Result;
use clap::Parser;
use log::info;

use rga_daq::command::Command;
use rga_daq::config::Settings;
use rga_daq::RgaDriver;

#[derive(Parser, Debug)]
#[command(name = "rga_daq", about = "RGA instrument driver")]
struct Args {
    /// Configuration name under config/ (default "default").
    #[arg(long)]
    config: Option<String>,

    /// Override the instrument host.
    #[arg(long)]
    host: Option<String>,

    /// Override the instrument port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::new(args.config.as_deref())?;
    if let Some(host) = args.host {
        settings.instrument.host = host;
    }
    if let Some(port) = args.port {
        settings.instrument.port = port;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    info!(
        "Connecting to RGA at {}:{}",
        settings.instrument.host, settings.instrument.port
    );
    let mut driver = RgaDriver::new(&settings);
    let mut updates = driver.subscribe();
    driver.start()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => {
                if let Ok(update) = update {
                    // One line per cycle, not per channel.
                    if update.channel == 1 {
                        let pressure = driver.read(Command::TotalPressure, 0).await?;
                        info!("{} total pressure {pressure:?}", update.timestamp);
                    }
                }
            }
        }
    }

    info!("Shutting down");
    driver.shutdown().await;

    let stats = driver.stats().await;
    info!(
        "Exchanges: {} reads, {} writes, {} I/O errors, {} protocol errors over {} cycles",
        stats.reads_ok, stats.writes_ok, stats.io_errors, stats.protocol_errors, stats.cycles
    );
    Ok(())
}
