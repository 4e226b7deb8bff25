//! # Main: CLI Entry Point
//!
//! Parses the command line, sets up logging and the rayon pool, and routes
//! each subcommand to its runner in `cli.rs`.
//!
//! ## Subcommands
//!
//! - `search`: the multi-threaded Hunter search (flags override `--config`).
//! - `units`: print the work units a search would hand out.
//! - `congruences`: generate a congruence file from a discriminant tree.
//! - `verify`: re-test the result lines of an output file.
//!
//! ## Global Options
//!
//! - `--threads`: rayon pool size used while building engines and reading
//!   inputs (0 or unset = all cores).
//! - `LOG_FORMAT=json`: JSON log lines instead of human-readable stderr.
//! - `RUST_LOG`: log filter (default `info`).

mod cli;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "hunter",
    version,
    about = "Hunter search for number fields with a prescribed discriminant"
)]
struct Cli {
    /// Number of rayon threads (defaults to all logical cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Degree, discriminant and divisors shared by every subcommand that builds
/// a generator.
#[derive(Args, Debug, Clone)]
struct FieldArgs {
    /// Polynomial degree (5, 6, 7, 8, 10 or 11)
    #[arg(long)]
    degree: usize,
    /// Target discriminant
    #[arg(long, allow_hyphen_values = true)]
    discriminant: i64,
    /// Divisors by degree, a_1 first (comma separated; default all 1)
    #[arg(long, value_delimiter = ',')]
    divisors: Vec<i64>,
}

#[derive(Args, Debug, Clone, Default)]
struct SearchArgs {
    /// TOML file with search parameters; flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// Polynomial degree (5, 6, 7, 8, 10 or 11)
    #[arg(long)]
    degree: Option<usize>,
    /// Target discriminant
    #[arg(long, allow_hyphen_values = true)]
    discriminant: Option<i64>,
    /// Divisors by degree, a_1 first (comma separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    divisors: Option<Vec<i64>>,
    /// Native values of the first levels shared by every unit (comma separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    fixed: Option<Vec<i64>>,
    /// Levels after the fixed ones enumerated into work units
    #[arg(long)]
    locked: Option<usize>,
    /// Primes used as on-the-fly congruence filters (comma separated)
    #[arg(long, value_delimiter = ',')]
    filter: Option<Vec<i64>>,
    /// Stop handing out work units after this many
    #[arg(long)]
    limit: Option<u64>,
    /// Discriminant tree file
    #[arg(long)]
    tree: Option<PathBuf>,
    /// Congruence files (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    congruences: Option<Vec<PathBuf>>,
    /// Result file; results are appended
    #[arg(long)]
    output: Option<PathBuf>,
    /// Worker threads (0 = all cores)
    #[arg(long, env = "HUNTER_WORKERS")]
    workers: Option<usize>,
    /// Checkpoint file for resuming an interrupted search
    #[arg(long)]
    checkpoint: Option<PathBuf>,
    /// Time the inner phases (Eval, SquareTest, Generate, Crt, Lagrange)
    #[arg(long)]
    detailed_stats: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for polynomials whose discriminant is the target times a square
    Search(SearchArgs),
    /// Print the work units of a search without running it
    Units {
        #[command(flatten)]
        field: FieldArgs,
        /// Native values of the first levels (comma separated)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        fixed: Vec<i64>,
        /// Levels after the fixed ones to enumerate
        #[arg(long, default_value_t = 1)]
        locked: usize,
        /// Print at most this many units
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Generate the congruence file of a discriminant tree modulo m
    Congruences {
        /// Polynomial degree (5, 6, 7, 8, 10 or 11)
        #[arg(long)]
        degree: usize,
        /// Discriminant tree file
        #[arg(long)]
        tree: PathBuf,
        /// Modulus, at least 2
        #[arg(long)]
        modulus: i64,
        /// Output file (stdout if omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-test the result lines of an output file with the exact tree
    Verify {
        #[command(flatten)]
        field: FieldArgs,
        /// Discriminant tree file
        #[arg(long)]
        tree: PathBuf,
        /// Result file to check
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for log collectors, human-readable otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    cli::configure_rayon(cli.threads);

    match &cli.command {
        Commands::Search(args) => cli::run_search(args),
        Commands::Units {
            field,
            fixed,
            locked,
            limit,
        } => cli::run_units(field, fixed, *locked, *limit),
        Commands::Congruences {
            degree,
            tree,
            modulus,
            output,
        } => cli::run_congruences(*degree, tree, *modulus, output.as_deref()),
        Commands::Verify { field, tree, input } => cli::run_verify(field, tree, input),
    }
}
