//! # Coordinator: Work Distribution over Worker Threads
//!
//! One coordinator and `workers` worker threads, each worker owning its own
//! [`PolGenerator`]. The coordinator enumerates work units with a
//! [`SimplePolGenerator`] and hands them out on request; it is also the
//! only writer of the result file, the checkpoint and the merged
//! statistics.
//!
//! ## Lifecycle
//!
//! 1. Build every engine in parallel (rayon); any error aborts the run
//!    before a single unit is dispatched.
//! 2. Spawn the workers in a thread scope. They share one channel to the
//!    coordinator; each has a private reply channel.
//! 3. Serve requests until the unit supply or the limit runs out, then
//!    answer every further request with `Terminate`.
//! 4. Return once every worker has acknowledged termination.
//!
//! ## Checkpointing
//!
//! Units complete out of order. The checkpoint records the length of the
//! contiguous completed prefix, so a resumed run skips exactly the units
//! known to be done (at most `workers - 1` finished units are redone).

use anyhow::{bail, Result};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::checkpoint::{self, SearchCheckpoint};
use crate::degree::Degree;
use crate::output::{format_coefficients, ResultSink};
use crate::polgen::{EngineConfig, PolGenerator};
use crate::progress::Progress;
use crate::protocol::{Envelope, ToCoordinator, ToWorker};
use crate::simple::SimplePolGenerator;
use crate::stats::{Phase, Statistics};

const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the coordinator needs besides its sinks.
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub engine: EngineConfig,
    /// Native values shared by every unit.
    pub fixed: Vec<i64>,
    /// Length of a work unit.
    pub width: usize,
    pub workers: usize,
    pub limit: Option<u64>,
    pub checkpoint: Option<PathBuf>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSummary {
    /// Units skipped because a checkpoint covered them.
    pub resumed_from: u64,
    /// Units processed in this run.
    pub units: u64,
    pub tested: u64,
    pub found: u64,
    /// Whether the unit supply ran out (as opposed to the limit).
    pub exhausted: bool,
}

/// Run every unit of a unit prefix through `engine`. Returns the
/// polynomials passing the square test and the number tested.
pub fn process_unit<D: Degree>(engine: &mut PolGenerator<D>, unit: &[i64]) -> (Vec<Vec<i64>>, u64) {
    let mut found = Vec::new();
    let mut tested = 0;
    let mut available = engine.init(unit);
    while available {
        tested += 1;
        if engine.disc_is_square() {
            engine.stats_mut().start(Phase::Save);
            found.push(engine.coefficients());
            engine.stats_mut().stop(Phase::Save);
        }
        engine.stats_mut().start(Phase::Generate);
        available = engine.configure_next();
        engine.stats_mut().stop(Phase::Generate);
    }
    (found, tested)
}

fn worker_loop<D: Degree>(
    id: usize,
    mut engine: PolGenerator<D>,
    tx: Sender<Envelope>,
    rx: Receiver<ToWorker>,
) {
    let send = |message: ToCoordinator| -> bool {
        match tx.send(Envelope { worker: id, message }) {
            Ok(()) => true,
            Err(_) => {
                warn!(worker = id, "coordinator channel closed, worker exiting");
                false
            }
        }
    };

    engine.stats_mut().start(Phase::Worker);
    loop {
        if !send(ToCoordinator::WorkRequest) {
            return;
        }
        engine.stats_mut().start(Phase::Wait);
        let reply = rx.recv();
        engine.stats_mut().stop(Phase::Wait);

        match reply {
            Ok(ToWorker::WorkUnit { index, values }) => {
                engine.stats_mut().start(Phase::Unit);
                let (polynomials, tested) = process_unit(&mut engine, &values);
                engine.stats_mut().stop(Phase::Unit);

                if !polynomials.is_empty() {
                    engine.stats_mut().start(Phase::Send);
                    let sent = send(ToCoordinator::ResultBatch { polynomials });
                    engine.stats_mut().stop(Phase::Send);
                    if !sent {
                        return;
                    }
                }
                let stats = engine.take_statistics();
                if !send(ToCoordinator::StatsDelta {
                    unit: index,
                    tested,
                    stats,
                }) {
                    return;
                }
            }
            Ok(ToWorker::Terminate) => break,
            Err(_) => {
                warn!(worker = id, "coordinator hung up without terminating");
                return;
            }
        }
    }
    engine.stats_mut().stop(Phase::Worker);

    let stats = engine.take_statistics();
    if send(ToCoordinator::StatsFinal { stats }) {
        send(ToCoordinator::TerminationAck);
    }
}

/// Contiguous completed-unit prefix over out-of-order completions.
#[derive(Debug, Default)]
struct CompletedPrefix {
    prefix: u64,
    ahead: BTreeSet<u64>,
}

impl CompletedPrefix {
    fn starting_at(prefix: u64) -> Self {
        CompletedPrefix {
            prefix,
            ahead: BTreeSet::new(),
        }
    }

    fn complete(&mut self, unit: u64) {
        if unit < self.prefix {
            return;
        }
        self.ahead.insert(unit);
        while self.ahead.remove(&self.prefix) {
            self.prefix += 1;
        }
    }
}

fn save_checkpoint(plan: &SearchPlan, completed: u64, found: u64) {
    let Some(path) = &plan.checkpoint else {
        return;
    };
    let cp = SearchCheckpoint {
        fingerprint: plan.fingerprint.clone(),
        completed_units: completed,
        found,
    };
    if let Err(e) = checkpoint::save(path, &cp) {
        warn!(path = %path.display(), error = %e, "failed to save checkpoint");
    }
}

/// Run a complete search. Coordinator timings and the merged worker
/// statistics are accumulated into `stats`.
pub fn run<D: Degree>(
    plan: &SearchPlan,
    sink: &mut ResultSink,
    progress: &Arc<Progress>,
    stats: &mut Statistics,
) -> Result<SearchSummary> {
    if plan.workers == 0 {
        bail!("at least one worker is required");
    }

    let engines = (0..plan.workers)
        .into_par_iter()
        .map(|_| PolGenerator::<D>::new(&plan.engine))
        .collect::<Result<Vec<_>>>()?;
    let fixed_level = engines[0].fixed();
    if plan.width + 1 < fixed_level {
        bail!(
            "work units cover {} levels but the tree leaves levels before {} unassigned; \
             increase fixed or locked",
            plan.width,
            fixed_level
        );
    }

    let mut skip = 0;
    let mut found_before = 0;
    if let Some(path) = &plan.checkpoint {
        if let Some(cp) = checkpoint::load(path) {
            match cp.resume_from(&plan.fingerprint) {
                Some(done) => {
                    skip = done;
                    found_before = cp.found;
                    info!(units = done, found = cp.found, "resuming from checkpoint");
                }
                None => warn!(
                    path = %path.display(),
                    "checkpoint belongs to a different search, starting over"
                ),
            }
        }
    }

    let mut units = SimplePolGenerator::<D>::new(
        &plan.fixed,
        plan.width,
        plan.engine.divisors.clone(),
        plan.engine.discriminant,
    )
    .into_units()
    .skip(skip as usize);

    info!(
        workers = plan.workers,
        degree = D::N,
        discriminant = plan.engine.discriminant,
        width = plan.width,
        "search launched"
    );

    let summary = thread::scope(|scope| -> Result<SearchSummary> {
        let (tx, rx) = mpsc::channel::<Envelope>();
        let mut replies = Vec::with_capacity(plan.workers);
        for (id, engine) in engines.into_iter().enumerate() {
            let (wtx, wrx) = mpsc::channel::<ToWorker>();
            replies.push(wtx);
            let tx = tx.clone();
            scope.spawn(move || worker_loop(id, engine, tx, wrx));
        }
        drop(tx);

        let mut summary = SearchSummary {
            resumed_from: skip,
            ..SearchSummary::default()
        };
        let mut next_index = skip;
        let mut dispatched = 0u64;
        let mut finished = false;
        let mut terminated = 0;
        let mut completed = CompletedPrefix::starting_at(skip);
        let mut last_save = Instant::now();

        while terminated < plan.workers {
            stats.start(Phase::WaitServer);
            let received = rx.recv();
            stats.stop(Phase::WaitServer);
            let Ok(Envelope { worker, message }) = received else {
                bail!(
                    "{} of {} workers exited without acknowledging termination",
                    plan.workers - terminated,
                    plan.workers
                );
            };

            match message {
                ToCoordinator::WorkRequest => {
                    let reply = if finished {
                        ToWorker::Terminate
                    } else {
                        stats.start(Phase::GenerateServer);
                        let unit = units.next();
                        stats.stop(Phase::GenerateServer);
                        match unit {
                            Some(values) => {
                                let index = next_index;
                                next_index += 1;
                                dispatched += 1;
                                if plan.limit.is_some_and(|l| dispatched >= l) {
                                    finished = true;
                                }
                                progress.set_current(format!(
                                    "unit {} {}",
                                    index,
                                    format_coefficients(&values)
                                ));
                                debug!(worker, index, "dispatching unit");
                                ToWorker::WorkUnit { index, values }
                            }
                            None => {
                                finished = true;
                                summary.exhausted = true;
                                ToWorker::Terminate
                            }
                        }
                    };
                    if replies[worker].send(reply).is_err() {
                        warn!(worker, "worker channel closed");
                    }
                }
                ToCoordinator::ResultBatch { polynomials } => {
                    for p in &polynomials {
                        sink.write_result(p)?;
                        info!(worker, polynomial = %format_coefficients(p), "square discriminant");
                    }
                    sink.flush()?;
                    summary.found += polynomials.len() as u64;
                    progress
                        .found
                        .fetch_add(polynomials.len() as u64, Ordering::Relaxed);
                }
                ToCoordinator::StatsDelta {
                    unit,
                    tested,
                    stats: delta,
                } => {
                    stats.merge(&delta);
                    summary.units += 1;
                    summary.tested += tested;
                    progress.units.fetch_add(1, Ordering::Relaxed);
                    progress.tested.fetch_add(tested, Ordering::Relaxed);
                    completed.complete(unit);
                    if last_save.elapsed() >= CHECKPOINT_INTERVAL {
                        save_checkpoint(plan, completed.prefix, found_before + summary.found);
                        last_save = Instant::now();
                    }
                }
                ToCoordinator::StatsFinal { stats: last } => stats.merge(&last),
                ToCoordinator::TerminationAck => {
                    terminated += 1;
                    debug!(worker, terminated, "worker terminated");
                }
            }
        }
        Ok(summary)
    })?;

    if let Some(path) = &plan.checkpoint {
        if summary.exhausted {
            checkpoint::clear(path);
        } else {
            save_checkpoint(
                plan,
                summary.resumed_from + summary.units,
                found_before + summary.found,
            );
        }
    }

    info!(
        units = summary.units,
        tested = summary.tested,
        found = summary.found,
        exhausted = summary.exhausted,
        "search complete"
    );
    Ok(summary)
}
