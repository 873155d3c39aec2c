//! Ingest daemon: accepts signalling records over the framed-TCP stream
//! and appends them to the spool.

use std::process;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use s1watch_cli::signal::install_signal_handlers;
use s1watch_engine::ingest::{IngestAdapter, TcpIngestAdapter};
use s1watch_engine::spool::{Spool, SpoolConfig};

#[derive(Parser)]
#[command(name = "spoolerd", about = "s1watch ingest daemon")]
struct Cli {
    /// Address to listen on.
    #[arg(default_value = "0.0.0.0:50051")]
    listen_address: String,

    /// Spool directory.
    #[arg(default_value = "spool_data")]
    spool_dir: String,
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!("spoolerd: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    info!(
        "spoolerd listening on {} (spool: {})",
        cli.listen_address, cli.spool_dir
    );

    let spool = Arc::new(
        Spool::new(SpoolConfig {
            base_dir: cli.spool_dir.clone().into(),
            ..SpoolConfig::default()
        })
        .context("opening spool")?,
    );

    let mut adapter = TcpIngestAdapter::new(cli.listen_address.clone(), Arc::clone(&spool));
    adapter.start().context("starting ingest adapter")?;
    let running = install_signal_handlers();

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    info!("spoolerd shutting down");
    adapter.stop();
    spool.flush().context("flushing spool")?;
    Ok(())
}
