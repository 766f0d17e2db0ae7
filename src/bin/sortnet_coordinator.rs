use std::{
    error::Error,
    fs::File,
    io::{self, BufWriter},
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
};

use clap::Parser;
use log::{error, info};
use sortnet::{Config, CoordinatorError, sequence, sort_distributed};

#[derive(Debug, Parser)]
#[command(version, about = "Sort a random byte sequence across sortnet workers")]
struct Cli {
    /// Number of elements to generate and sort
    #[arg(short, long)]
    size: usize,
    /// Worker address; repeat once per worker
    #[arg(
        short,
        long = "worker",
        env = "SORTNET_WORKERS",
        value_delimiter = ',',
        required = true
    )]
    workers: Vec<SocketAddr>,
    /// Seed for a reproducible input sequence
    #[arg(long)]
    seed: Option<u64>,
    /// Merge threads; defaults to the available parallelism
    #[arg(short, long)]
    threads: Option<NonZeroUsize>,
    /// Largest segment sorted without forking
    #[arg(long)]
    threshold: Option<usize>,
    /// Print the sorted sequence
    #[arg(long)]
    show: bool,
    /// Save the sorted sequence to a file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.size == 0 {
        return Err(CoordinatorError::Configuration("size must be positive".to_string()).into());
    }
    let config = Config::default()
        .with_parallelism(cli.threads)
        .with_sequential_threshold(cli.threshold);

    info!("generating {} elements", cli.size);
    let input = sequence::generate(cli.size, cli.seed);

    let report = sort_distributed(&input, &cli.workers, &config)?;

    if cli.show {
        sequence::render(io::stdout().lock(), &report.sorted)?;
    }
    if let Some(path) = &cli.output {
        sequence::render(BufWriter::new(File::create(path)?), &report.sorted)?;
        info!("sorted sequence saved to {}", path.display());
    }

    let millis = report.elapsed.as_secs_f64() * 1000.0;
    info!("size: {}", cli.size);
    info!("workers: {}", cli.workers.len());
    info!("distributed sort time: {millis:.3} ms");
    info!("average time per element: {:.6} ms", millis / cli.size as f64);

    if !report.verified {
        error!("result is NOT sorted");
        return Err("distributed sort produced an unsorted sequence".into());
    }
    info!("result verified sorted");
    Ok(())
}
