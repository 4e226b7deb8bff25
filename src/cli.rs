//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Contains the
//! execution logic of each subcommand: config resolution and the search
//! itself, unit listing, congruence generation, result verification and
//! rayon configuration.

use anyhow::{bail, Context, Result};
use hunter_search::{
    config::SearchConfig,
    congruence::{CongruenceGenerator, CongruenceSet},
    coordinator::{self, SearchPlan},
    degree::Degree,
    output::{format_coefficients, parse_result_line, ResultSink},
    polgen::{EngineConfig, PolGenerator},
    progress::Progress,
    simple::SimplePolGenerator,
    stats::{Phase, Statistics},
    with_degree,
};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use super::{FieldArgs, SearchArgs};

// ── Config Resolution ───────────────────────────────────────────

/// Start from `--config` (or defaults) and apply every flag that was given.
fn resolve_config(args: &SearchArgs) -> Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => SearchConfig::from_toml_file(path)?,
        None => SearchConfig::default(),
    };
    if let Some(v) = args.degree {
        config.degree = v;
    }
    if let Some(v) = args.discriminant {
        config.discriminant = v;
    }
    if let Some(v) = &args.divisors {
        config.divisors = v.clone();
    }
    if let Some(v) = &args.fixed {
        config.fixed = v.clone();
    }
    if let Some(v) = args.locked {
        config.locked = v;
    }
    if let Some(v) = &args.filter {
        config.filter = v.clone();
    }
    if args.limit.is_some() {
        config.limit = args.limit;
    }
    if let Some(v) = &args.tree {
        config.tree = v.clone();
    }
    if let Some(v) = &args.congruences {
        config.congruences = v.clone();
    }
    if let Some(v) = &args.output {
        config.output = v.clone();
    }
    if let Some(v) = args.workers {
        config.workers = v;
    }
    if args.checkpoint.is_some() {
        config.checkpoint = args.checkpoint.clone();
    }
    config.detailed_stats |= args.detailed_stats;

    if config.degree == 0 {
        bail!("a degree is required (--degree or `degree` in --config)");
    }
    config.validate()?;
    Ok(config)
}

fn field_config(field: &FieldArgs) -> Result<SearchConfig> {
    let config = SearchConfig {
        degree: field.degree,
        discriminant: field.discriminant,
        divisors: field.divisors.clone(),
        ..SearchConfig::default()
    };
    config.validate()?;
    Ok(config)
}

// ── Search ──────────────────────────────────────────────────────

/// Run a complete search: read the inputs, launch the coordinator and its
/// workers, and append the summary and statistics to the result file.
pub fn run_search(args: &SearchArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let mut stats = Statistics::new(config.detailed_stats);
    stats.start(Phase::Total);

    stats.start(Phase::InputRead);
    let inputs = config.load_inputs()?;
    stats.stop(Phase::InputRead);

    let workers = config.worker_count();
    let plan = SearchPlan {
        engine: config.engine_config(&inputs),
        fixed: config.fixed.clone(),
        width: config.unit_width(),
        workers,
        limit: config.limit,
        checkpoint: config.checkpoint.clone(),
        fingerprint: config.fingerprint(&inputs),
    };

    let mut sink = ResultSink::open(Some(&config.output), true)?;
    let argv: Vec<String> = std::env::args().collect();
    sink.write_start(workers, &argv)?;
    info!(
        degree = config.degree,
        discriminant = config.discriminant,
        workers,
        congruences = inputs.congruences.len(),
        filter = ?config.filter,
        output = %config.output.display(),
        "hunter starting"
    );

    let progress = Progress::new();
    let reporter = progress.start_reporter();
    let result = with_degree!(config.degree, D => {
        coordinator::run::<D>(&plan, &mut sink, &progress, &mut stats)
    });
    progress.stop();
    let _ = reporter.join();
    progress.print_status();
    let summary = result?;

    if summary.resumed_from > 0 {
        sink.write_info(&format!(
            "Resumed after {} completed units",
            summary.resumed_from
        ))?;
    }
    sink.write_info(&format!(
        "Search {}: {} units, {} polynomials tested, {} found",
        if summary.exhausted { "complete" } else { "stopped at limit" },
        summary.units,
        summary.tested,
        summary.found
    ))?;
    stats.stop(Phase::Total);
    sink.write_statistics(&stats)?;
    Ok(())
}

// ── Units ───────────────────────────────────────────────────────

fn write_units<D: Degree>(config: &SearchConfig, limit: Option<usize>) -> Result<usize> {
    let units = SimplePolGenerator::<D>::new(
        &config.fixed,
        config.unit_width(),
        config.level_divisors(),
        config.discriminant,
    )
    .into_units();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut count = 0;
    for unit in units.take(limit.unwrap_or(usize::MAX)) {
        writeln!(out, "{}", format_coefficients(&unit))?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

/// Print the work units of a search, one per line.
pub fn run_units(field: &FieldArgs, fixed: &[i64], locked: usize, limit: Option<usize>) -> Result<()> {
    let config = SearchConfig {
        fixed: fixed.to_vec(),
        locked,
        ..field_config(field)?
    };
    config.validate()?;
    let count = with_degree!(config.degree, D => write_units::<D>(&config, limit))?;
    info!(units = count, "units listed");
    Ok(())
}

// ── Congruences ─────────────────────────────────────────────────

/// Generate every residue tuple for which the tree is a square modulo
/// `modulus` and write it in congruence-file format.
pub fn run_congruences(
    degree: usize,
    tree: &Path,
    modulus: i64,
    output: Option<&Path>,
) -> Result<()> {
    let config = SearchConfig {
        degree,
        discriminant: 1,
        ..SearchConfig::default()
    };
    config.validate()?;
    let text = std::fs::read_to_string(tree)
        .with_context(|| format!("reading tree file {}", tree.display()))?;
    let mut generator = CongruenceGenerator::new(&text, modulus)?;
    if generator.depth() > degree {
        bail!(
            "tree depth {} exceeds the degree {}",
            generator.depth(),
            degree
        );
    }
    let set = CongruenceSet {
        moduli: generator.moduli(),
        tuples: generator.generate(&[])?,
    };
    if set.tuples.is_empty() {
        bail!("no residue tuple modulo {} makes the tree a square", modulus);
    }
    match output {
        Some(path) => set.write(degree, path)?,
        None => print!("{}", set.render(degree)),
    }
    info!(modulus, tuples = set.tuples.len(), "congruence file generated");
    Ok(())
}

// ── Verify ──────────────────────────────────────────────────────

/// Polynomials among `results` that fail the exact square test.
fn failing_results<D: Degree>(engine: &EngineConfig, results: &[Vec<i64>]) -> Result<Vec<Vec<i64>>> {
    let mut gen = PolGenerator::<D>::new(engine)?;
    let mut failing = Vec::new();
    for coeffs in results {
        gen.assign(coeffs)
            .with_context(|| format!("result {}", format_coefficients(coeffs)))?;
        if !gen.disc_is_square() {
            failing.push(coeffs.clone());
        }
    }
    Ok(failing)
}

/// Re-test every `R` line of a result file.
pub fn run_verify(field: &FieldArgs, tree: &Path, input: &Path) -> Result<()> {
    let config = field_config(field)?;
    let tree_text = std::fs::read_to_string(tree)
        .with_context(|| format!("reading tree file {}", tree.display()))?;
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading result file {}", input.display()))?;
    let results: Vec<Vec<i64>> = text.lines().filter_map(parse_result_line).collect();

    let engine = EngineConfig {
        divisors: config.level_divisors(),
        discriminant: config.discriminant,
        tree: tree_text,
        congruences: Vec::new(),
        filter_primes: Vec::new(),
        detailed_stats: false,
    };
    let failing = with_degree!(config.degree, D => failing_results::<D>(&engine, &results))?;
    for coeffs in &failing {
        warn!(polynomial = %format_coefficients(coeffs), "result fails the square test");
    }
    println!(
        "{} of {} results verified",
        results.len() - failing.len(),
        results.len()
    );
    if !failing.is_empty() {
        bail!("{} results failed verification", failing.len());
    }
    Ok(())
}

// ── Rayon Configuration ─────────────────────────────────────────

/// Configure the rayon global thread pool size.
pub fn configure_rayon(threads: Option<usize>) {
    let num_threads = threads.unwrap_or(0);
    if num_threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
        {
            warn!(error = %e, "Could not configure rayon thread pool");
        }
    }
}
