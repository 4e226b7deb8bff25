//! # Stats: Per-Phase Timing Statistics
//!
//! Each worker engine records count, total, fastest and slowest duration (in
//! microseconds) for the instrumented phases of a search. Workers ship a
//! delta after every work unit and a final record on shutdown; the
//! coordinator merges them and prints the table at the end of the run.
//!
//! Cheap phases that fire once per unit are always timed. Phases inside the
//! enumeration hot loop (discriminant evaluation, square test, CRT, Lagrange)
//! are timed only when the statistics were created with `detailed = true`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::time::Instant;

/// An instrumented phase of the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Total,
    Worker,
    WaitServer,
    Wait,
    InputRead,
    Init,
    Unit,
    Eval,
    SquareTest,
    Generate,
    GenerateServer,
    Crt,
    Send,
    Save,
    Lagrange,
}

impl Phase {
    pub const COUNT: usize = 15;

    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::Total,
        Phase::Worker,
        Phase::WaitServer,
        Phase::Wait,
        Phase::InputRead,
        Phase::Init,
        Phase::Unit,
        Phase::Eval,
        Phase::SquareTest,
        Phase::Generate,
        Phase::GenerateServer,
        Phase::Crt,
        Phase::Send,
        Phase::Save,
        Phase::Lagrange,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Hot-loop phases, timed only in detailed mode.
    pub fn is_detailed(self) -> bool {
        matches!(
            self,
            Phase::Eval | Phase::SquareTest | Phase::Generate | Phase::Crt | Phase::Lagrange
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Total => "Total:",
            Phase::Worker => "Workers:",
            Phase::WaitServer => "Idle:",
            Phase::Wait => "Idle:",
            Phase::InputRead => "Read input:",
            Phase::Init => "Init:",
            Phase::Unit => "Work units:",
            Phase::Eval => "Disc. eval.:",
            Phase::SquareTest => "Disc. sq. test:",
            Phase::Generate => "Generate:",
            Phase::GenerateServer => "Generate:",
            Phase::Crt => "Last coeff.:",
            Phase::Send => "Send results:",
            Phase::Save => "Save results:",
            Phase::Lagrange => "Lagrange:",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Aggregated durations of one phase, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStat {
    pub count: u64,
    pub total_us: u64,
    pub min_us: u64,
    pub max_us: u64,
}

impl Default for PhaseStat {
    fn default() -> Self {
        PhaseStat {
            count: 0,
            total_us: 0,
            min_us: u64::MAX,
            max_us: 0,
        }
    }
}

impl PhaseStat {
    pub fn record(&mut self, us: u64) {
        self.count += 1;
        self.total_us += us;
        self.min_us = self.min_us.min(us);
        self.max_us = self.max_us.max(us);
    }

    /// Record the time elapsed since `started`.
    pub fn record_since(&mut self, started: Instant) {
        self.record(started.elapsed().as_micros() as u64);
    }

    pub fn merge(&mut self, other: &PhaseStat) {
        self.count += other.count;
        self.total_us += other.total_us;
        // min/max only carry information when the phase happened
        if other.count > 0 {
            self.min_us = self.min_us.min(other.min_us);
            self.max_us = self.max_us.max(other.max_us);
        }
    }

    pub fn average_us(&self) -> Option<u64> {
        (self.count > 0).then(|| self.total_us / self.count)
    }
}

/// Per-phase statistics with running timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    phases: Vec<PhaseStat>,
    detailed: bool,
    #[serde(skip)]
    timers: Vec<Option<Instant>>,
}

impl Default for Statistics {
    fn default() -> Self {
        Statistics::new(false)
    }
}

impl Statistics {
    pub fn new(detailed: bool) -> Self {
        Statistics {
            phases: vec![PhaseStat::default(); Phase::COUNT],
            detailed,
            timers: vec![None; Phase::COUNT],
        }
    }

    pub fn detailed(&self) -> bool {
        self.detailed
    }

    fn enabled(&self, phase: Phase) -> bool {
        self.detailed || !phase.is_detailed()
    }

    pub fn start(&mut self, phase: Phase) {
        if !self.enabled(phase) {
            return;
        }
        if self.timers.len() != Phase::COUNT {
            self.timers = vec![None; Phase::COUNT];
        }
        self.timers[phase.index()] = Some(Instant::now());
    }

    pub fn stop(&mut self, phase: Phase) {
        if !self.enabled(phase) {
            return;
        }
        if let Some(started) = self.timers.get_mut(phase.index()).and_then(Option::take) {
            self.phases[phase.index()].record_since(started);
        }
    }

    pub fn get(&self, phase: Phase) -> &PhaseStat {
        &self.phases[phase.index()]
    }

    pub fn get_mut(&mut self, phase: Phase) -> &mut PhaseStat {
        &mut self.phases[phase.index()]
    }

    pub fn merge(&mut self, other: &Statistics) {
        for (mine, theirs) in self.phases.iter_mut().zip(&other.phases) {
            mine.merge(theirs);
        }
    }

    /// Clear all recorded durations; running timers are kept.
    pub fn reset(&mut self) {
        for p in &mut self.phases {
            *p = PhaseStat::default();
        }
    }

    /// Return the recorded durations and reset them.
    pub fn take(&mut self) -> Statistics {
        let out = Statistics {
            phases: self.phases.clone(),
            detailed: self.detailed,
            timers: vec![None; Phase::COUNT],
        };
        self.reset();
        out
    }

    /// Write the coordinator and worker tables.
    pub fn write_table<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "Total elapsed time: {}us",
            self.get(Phase::Total).total_us
        )?;
        let header = format!(
            "{:<16}{:<16}{:<20}{:<20}{:<20}{:<16}",
            "", "Amount", "Total Time (us)", "Fastest Time (us)", "Slowest Time (us)", "Avg Time (us)"
        );
        writeln!(out, "Coordinator{}", &header[11..])?;
        self.write_line(out, Phase::WaitServer)?;
        self.write_line(out, Phase::GenerateServer)?;
        writeln!(out)?;
        writeln!(out, "Workers    {}", &header[11..])?;
        for phase in [
            Phase::Worker,
            Phase::InputRead,
            Phase::Wait,
            Phase::Unit,
            Phase::Init,
            Phase::Generate,
            Phase::Crt,
            Phase::Eval,
            Phase::Lagrange,
            Phase::Send,
            Phase::Save,
            Phase::SquareTest,
        ] {
            self.write_line(out, phase)?;
        }
        Ok(())
    }

    fn write_line<W: Write>(&self, out: &mut W, phase: Phase) -> io::Result<()> {
        let s = self.get(phase);
        match s.average_us() {
            Some(avg) => writeln!(
                out,
                "{:<16}{:<16}{:<20}{:<20}{:<20}{:<16}",
                phase.label(),
                s.count,
                s.total_us,
                s.min_us,
                s.max_us,
                avg
            ),
            None => writeln!(
                out,
                "{:<16}{:<16}{:<20}{:<20}{:<20}{:<16}",
                phase.label(),
                s.count,
                s.total_us,
                "N/A",
                "N/A",
                "N/A"
            ),
        }
    }
}
