//! # Output: Marker Lines and the Result File
//!
//! Every line the search writes starts with a marker: a letter and the local
//! time, e.g. `[R Thu Oct 15 09:12:44 2026] [1, 0, -3, 1, 2, -1]`.
//!
//! | Mark | Meaning |
//! |------|---------|
//! | `A`  | command-line arguments of the run |
//! | `I`  | informational (launch, resume, completion) |
//! | `R`  | a polynomial that passed the square test |
//!
//! The statistics table is appended once the run completes.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::stats::Statistics;

pub const MARK_ARG: &str = "A";
pub const MARK_INFO: &str = "I";
pub const MARK_RESULT: &str = "R";

/// `[<mark> <local time>] `
pub fn marker(mark: &str) -> String {
    format!("[{} {}] ", mark, Local::now().format("%c"))
}

/// `[c0, c1, ..., cn]`
pub fn format_coefficients(coeffs: &[i64]) -> String {
    let parts: Vec<String> = coeffs.iter().map(|c| c.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Coefficients of an `R` line, None for any other line.
pub fn parse_result_line(line: &str) -> Option<Vec<i64>> {
    let rest = line.trim().strip_prefix("[R ")?;
    let (_, list) = rest.split_once("] ")?;
    let inner = list.trim().strip_prefix('[')?.strip_suffix(']')?;
    inner
        .split(',')
        .map(|t| t.trim().parse::<i64>().ok())
        .collect()
}

/// Destination of marker lines; the coordinator is its only writer.
pub struct ResultSink {
    out: Box<dyn Write + Send>,
    results: u64,
}

impl ResultSink {
    /// Open `path` (truncating unless `append`), or stdout for None.
    pub fn open(path: Option<&Path>, append: bool) -> Result<Self> {
        let out: Box<dyn Write + Send> = match path {
            Some(p) => {
                let file: File = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(append)
                    .truncate(!append)
                    .open(p)
                    .with_context(|| format!("opening output file {}", p.display()))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(io::stdout()),
        };
        Ok(ResultSink::from_writer(out))
    }

    pub fn from_writer(out: Box<dyn Write + Send>) -> Self {
        ResultSink { out, results: 0 }
    }

    /// Number of result lines written through this sink.
    pub fn results(&self) -> u64 {
        self.results
    }

    pub fn write_start(&mut self, workers: usize, args: &[String]) -> io::Result<()> {
        writeln!(
            self.out,
            "{}Program launch: {} workers",
            marker(MARK_INFO),
            workers
        )?;
        writeln!(self.out, "{}{}", marker(MARK_ARG), args.join(" "))?;
        self.out.flush()
    }

    pub fn write_info(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{}{}", marker(MARK_INFO), message)?;
        self.out.flush()
    }

    pub fn write_result(&mut self, coeffs: &[i64]) -> io::Result<()> {
        writeln!(
            self.out,
            "{}{}",
            marker(MARK_RESULT),
            format_coefficients(coeffs)
        )?;
        self.results += 1;
        Ok(())
    }

    pub fn write_statistics(&mut self, stats: &Statistics) -> io::Result<()> {
        stats.write_table(&mut self.out)?;
        self.out.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
