use std::{
    error::Error,
    fs::File,
    io::{self, BufWriter},
    path::PathBuf,
    time::Instant,
};

use clap::Parser;
use log::{error, info};
use sortnet::{engine::sequential_sort, sequence};

/// Single-process baseline for comparing against distributed runs.
#[derive(Debug, Parser)]
#[command(version, about = "Sort a random byte sequence with a sequential merge sort")]
struct Cli {
    /// Number of elements to generate and sort
    #[arg(short, long)]
    size: usize,
    /// Seed for a reproducible input sequence
    #[arg(long)]
    seed: Option<u64>,
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
        return Err("size must be positive".into());
    }

    let input = sequence::generate(cli.size, cli.seed);

    let started = Instant::now();
    let sorted = sequential_sort(&input);
    let millis = started.elapsed().as_secs_f64() * 1000.0;

    if cli.show {
        sequence::render(io::stdout().lock(), &sorted)?;
    }
    if let Some(path) = &cli.output {
        sequence::render(BufWriter::new(File::create(path)?), &sorted)?;
        info!("sorted sequence saved to {}", path.display());
    }

    info!("size: {}", cli.size);
    info!("sequential sort time: {millis:.3} ms");
    info!("average time per element: {:.6} ms", millis / cli.size as f64);

    if !sequence::verify(&sorted) {
        error!("result is NOT sorted");
        return Err("sequential sort produced an unsorted sequence".into());
    }
    info!("result verified sorted");
    Ok(())
}
