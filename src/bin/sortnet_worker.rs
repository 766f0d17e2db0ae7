use std::{error::Error, net::SocketAddr, num::NonZeroUsize, process};

use clap::Parser;
use log::info;
use sortnet::{Config, protocol::WorkerServer};

#[derive(Debug, Parser)]
#[command(version, about = "Sort segments dispatched by a sortnet coordinator")]
struct Cli {
    /// Listen for new connection at address
    address: SocketAddr,
    /// Sorting threads; defaults to the available parallelism
    #[arg(short, long)]
    threads: Option<NonZeroUsize>,
    /// Largest segment sorted without forking
    #[arg(long)]
    threshold: Option<usize>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::default()
        .with_parallelism(cli.threads)
        .with_sequential_threshold(cli.threshold);

    ctrlc::set_handler(|| {
        info!("interrupted, shutting down worker");
        process::exit(0);
    })?;

    info!("available parallelism: {}", config.parallelism);
    let server = WorkerServer::bind(cli.address, &config)?;
    server.listen()?;
    Ok(())
}
