use anyhow::Result;
use clap::Parser;
use locus_rs::cli::Args;
use locus_rs::config::AssemblyConfig;
use locus_rs::pipeline;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = AssemblyConfig::from_args(&args)?;
    let stats = pipeline::run(&args, &config)?;
    tracing::info!(
        records = stats.bundler.records,
        bundles = stats.bundler.bundles,
        chromosomes = stats.bundler.chromosomes,
        transcripts = stats.merge.transcripts,
        genes = stats.counters.genes,
        queue_high_water = stats.queue.high_water,
        "locus-rs: assembly complete"
    );
    Ok(())
}
