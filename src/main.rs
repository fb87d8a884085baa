//! flatshard CLI
//!
//! Sharded flat vector index with multi-query weighted search.
//!
//! # Usage
//!
//! ```bash
//! # Index worker: document text on stdin, one shard per ~chunks_size vectors
//! flatshard index --index_filename out/index_%d.shard --model msmarco-bert \
//!     --vector_size 768 --max_tokens 512 --similarity dot \
//!     --batch_size 32 --chunks_size 1000000
//!
//! # Search worker: weighted multi-query requests on stdin
//! flatshard search --index_filename out/index_%d.shard --docs_filename out/docs.txt \
//!     --refs_filename out/refs.txt --model msmarco-bert --vector_size 768 \
//!     --max_tokens 512 --similarity dot
//!
//! # Build a complete index directory from a TSV corpus
//! flatshard build --input corpus.tsv --index_dir out --model msmarco-bert \
//!     --vector_size 768 --max_tokens 512
//!
//! # Inspect shards
//! flatshard stats --index_filename out/index_%d.shard
//! ```

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use flatshard::config::{BuildArgs, IndexArgs, SearchArgs};
use flatshard::corpus::{index_corpus, TsvCorpus};
use flatshard::logging::{self, LogTarget};
use flatshard::{
    run_build_worker, run_search_worker, IndexBuilder, IndexConfig, IndexLayout, SearchConfig, SearchEngine,
};
use flatshard_core::catalog::CatalogStats;
use flatshard_core::{DocumentStore, ShardCatalog, ShardStore, ShardTemplate};
use flatshard_encoder::CachedEncoder;

#[derive(Parser)]
#[command(name = "flatshard")]
#[command(about = "Sharded flat vector index with multi-query weighted search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index worker: encode stdin lines into numbered shard files
    Index(IndexArgs),

    /// Search worker: answer weighted multi-query requests from stdin
    Search(SearchArgs),

    /// Build shards plus docs.txt/refs.txt from a TSV corpus
    Build(BuildArgs),

    /// Display statistics about a shard file or a whole shard template
    Stats {
        /// Path to a single .shard file
        #[arg(short, long, conflicts_with = "index_filename")]
        file: Option<PathBuf>,

        /// Shard filename template with one %d
        #[arg(long = "index_filename")]
        index_filename: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn error_log(&self) -> Option<PathBuf> {
        match self {
            Commands::Index(args) => args.common.error_log(),
            Commands::Search(args) => args.common.error_log(),
            Commands::Build(_) | Commands::Stats { .. } => None,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let error_log = cli.command.error_log();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            logging::report_fatal(&err, error_log.as_deref());
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Index(args) => run_index(args),
        Commands::Search(args) => run_search(args),
        Commands::Build(args) => run_build(args),
        Commands::Stats {
            file,
            index_filename,
            json,
        } => {
            logging::init(&LogTarget::Stderr)?;
            let stats = match (file, index_filename) {
                (Some(file), _) => single_shard_stats(&file)?,
                (None, Some(template)) => template_stats(&ShardTemplate::parse(&template)?)?,
                (None, None) => bail!("Pass --file or --index_filename"),
            };
            print_stats(&stats, json)
        }
    }
}

fn run_index(args: IndexArgs) -> Result<()> {
    logging::init(&LogTarget::for_worker(args.common.log_file.clone()))?;

    let config = IndexConfig::try_from(&args)?;
    let encoder = args.common.encoding.config().open()?;
    tracing::info!(
        "Index worker: template {}, dim {}, {}, batch {}, chunks {}",
        config.template,
        config.dim,
        config.similarity,
        config.batch_size,
        config.chunks_size
    );
    let builder = IndexBuilder::new(config, encoder)?;

    let stdin = io::stdin();
    let summary = run_build_worker(builder, stdin.lock(), &mut io::stdout().lock(), &mut io::stderr().lock())?;
    tracing::info!(
        "Indexed {} vectors into {} shard(s)",
        summary.total_vectors,
        summary.shard_sizes.len()
    );
    Ok(())
}

fn run_search(args: SearchArgs) -> Result<()> {
    logging::init(&LogTarget::for_worker(args.common.log_file.clone()))?;

    let config = SearchConfig::try_from(&args)?;
    let encoder = CachedEncoder::new(args.common.encoding.config().open()?, config.cache_size);

    let documents = DocumentStore::open(&config.docs_path, &config.refs_path)
        .with_context(|| format!("opening documents {:?} / {:?}", config.docs_path, config.refs_path))?;
    let catalog = ShardCatalog::load(&config.template, config.dim, config.similarity)
        .with_context(|| format!("loading shards {}", config.template))?;
    let mut engine = SearchEngine::new(catalog, documents, encoder)?;

    let stdin = io::stdin();
    run_search_worker(
        &mut engine,
        &mut stdin.lock(),
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )?;
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<()> {
    logging::init(&LogTarget::Stderr)?;

    std::fs::create_dir_all(&args.index_dir)
        .with_context(|| format!("creating index directory {:?}", args.index_dir))?;
    let layout = IndexLayout::in_dir(&args.index_dir)?;

    let config = IndexConfig::new(
        &layout.template.to_string(),
        args.encoding.vector_size,
        args.similarity.into(),
        args.batch_size,
        args.chunks_size,
    )?;
    let encoder = args.encoding.config().open()?;
    let input = File::open(&args.input).with_context(|| format!("opening corpus {:?}", args.input))?;
    let corpus = TsvCorpus::new(BufReader::new(input));

    // Stale shards past the new last one would otherwise be loaded at search time
    let stale = layout.template.count_existing();
    for sequence in 1..=stale {
        let path = layout.template.path_for(sequence);
        std::fs::remove_file(&path).with_context(|| format!("removing stale shard {:?}", path))?;
    }
    if stale > 0 {
        tracing::info!("Removed {} existing shard(s) from {:?}", stale, args.index_dir);
    }

    tracing::info!("Building index from {:?} into {:?}", args.input, args.index_dir);
    let started = Instant::now();
    let summary = index_corpus(corpus, &layout, config, encoder)?;
    let elapsed = started.elapsed();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Index directory: {:?}", args.index_dir);
        println!("  Documents: {}", summary.total_vectors);
        println!("  Shards: {}", summary.shard_sizes.len());
        for (i, size) in summary.shard_sizes.iter().enumerate() {
            println!("    Shard {}: {} vectors", i + 1, size);
        }
        println!("  Build time: {:.2}s", elapsed.as_secs_f64());
    }
    Ok(())
}

fn single_shard_stats(file: &Path) -> Result<CatalogStats> {
    let store = ShardStore::open(file).with_context(|| format!("opening shard {:?}", file))?;
    let mut catalog = ShardCatalog::empty(store.dim, store.similarity());
    catalog.push(store)?;
    Ok(catalog.stats())
}

fn template_stats(template: &ShardTemplate) -> Result<CatalogStats> {
    // Shard 1 decides the dimensions and metric for the rest
    let first = template.path_for(1);
    if !first.is_file() {
        bail!("No shard files match {}", template);
    }
    let store = ShardStore::open(&first).with_context(|| format!("opening shard {:?}", first))?;
    let catalog = ShardCatalog::load(template, store.dim, store.similarity())?;
    Ok(catalog.stats())
}

fn print_stats(stats: &CatalogStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("Shards: {}", stats.shards.len());
    println!("  Vectors: {}", stats.total_vectors);
    println!("  Dimensions: {}", stats.dim);
    println!("  Similarity: {}", stats.similarity);
    for shard in &stats.shards {
        println!(
            "    Shard {}: {} vectors from ordinal {} ({}, {:.2} MB)",
            shard.sequence,
            shard.count,
            shard.start,
            shard.similarity,
            shard.bytes as f64 / (1024.0 * 1024.0)
        );
    }
    Ok(())
}
