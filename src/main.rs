use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use one_brc_engine::{Engine, EngineConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    /// Memory-map the whole file and split it into byte ranges.
    Mmap,
    /// Read the file line by line and hand batches of lines to workers.
    Stream,
}

/// Prints min/mean/max per station for a `station;measurement` file.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Input file, one `key;value` record per line.
    #[arg(default_value = "measurements.txt")]
    path: PathBuf,

    /// Worker threads [default: number of CPUs]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Target chunk size in bytes for the mmap source.
    #[arg(long)]
    chunk_bytes: Option<usize>,

    /// Lines per chunk for the stream source.
    #[arg(long)]
    chunk_lines: Option<usize>,

    /// Values buffered per key before a batched fold; 0 folds one at a time.
    #[arg(long)]
    batch: Option<usize>,

    #[arg(long, value_enum, default_value_t = Source::Mmap)]
    source: Source,
}

impl Args {
    fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(n) = self.workers {
            config = config.with_workers(n);
        }
        if let Some(bytes) = self.chunk_bytes {
            config = config.with_chunk_bytes(bytes);
        }
        if let Some(lines) = self.chunk_lines {
            config = config.with_chunk_lines(lines);
        }
        if let Some(capacity) = self.batch {
            config = config.with_batch_capacity(capacity);
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let engine = Engine::new(args.config()).context("failed to start engine")?;
    tracing::debug!(
        workers = engine.config().workers,
        accumulation = ?engine.config().accumulation,
        source = ?args.source,
        path = %args.path.display(),
        "starting aggregation"
    );

    let summary = match args.source {
        Source::Mmap => engine.aggregate_path(&args.path),
        Source::Stream => {
            let file = File::open(&args.path)
                .with_context(|| format!("failed to open {}", args.path.display()))?;
            engine.aggregate_reader(BufReader::with_capacity(1024 * 1024, file))
        }
    }
    .with_context(|| format!("failed to aggregate {}", args.path.display()))?;

    let mut out = BufWriter::new(io::stdout().lock());
    writeln!(out, "{summary}")?;
    out.flush()?;
    Ok(())
}
