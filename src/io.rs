//! Input/Output operations for loan summarisation.
//!
//! This module streams raw lines out of a loans file, turns them into loans,
//! and publishes the rendered report without ever overwriting an existing file.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info, warn};
use tempfile::{NamedTempFile, PersistError};
use thiserror::Error;

use crate::engine::Summary;
use crate::normalize::{ParsedLine, parse_line};
use crate::report::render_report;
use crate::types::Loan;

/// An iterator over the trimmed lines of a loans file.
///
/// Lines are read one at a time; the file is never loaded whole. Bytes that
/// are not valid UTF-8 are replaced rather than failing the run.
pub struct LoanLines<R> {
    reader: R,
    source: String,
    line_num: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> LoanLines<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        LoanLines {
            reader,
            source: source.into(),
            line_num: 0,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LoanLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_num += 1;
                Some(Ok(trim_line(&String::from_utf8_lossy(&self.buf)).to_string()))
            }
            Err(err) => Some(Err(anyhow::Error::new(err).context(format!(
                "Failed to read line {} from: {}",
                self.line_num + 1,
                self.source
            )))),
        }
    }
}

/// Strips the line terminator, then leading and trailing spaces and commas.
fn trim_line(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n']).trim_matches([' ', ','])
}

/// Opens a loans file for line-by-line reading.
///
/// # Errors
///
/// Returns an error if the file cannot be opened. Read errors further into the
/// file surface while iterating.
pub fn read_loans_file(path: &Path) -> Result<LoanLines<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to read loans file: {}", path.display()))?;
    Ok(LoanLines::new(BufReader::new(file), path.display().to_string()))
}

/// Counters collected while loading a file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub lines: usize,
    pub headers: usize,
    pub rejected: usize,
    pub loans: usize,
}

/// An iterator that turns raw lines into loans, skipping headers and rejects.
pub struct Loans<I> {
    lines: I,
    stats: LoadStats,
}

impl<I> Loans<I> {
    pub fn stats(&self) -> LoadStats {
        self.stats
    }
}

impl<I> Iterator for Loans<I>
where
    I: Iterator<Item = Result<String>>,
{
    type Item = Result<Loan>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err)),
            };
            self.stats.lines += 1;

            match parse_line(&line) {
                ParsedLine::Loan(loan) => {
                    self.stats.loans += 1;
                    return Some(Ok(loan));
                }
                ParsedLine::Header => self.stats.headers += 1,
                ParsedLine::Rejected(_) => self.stats.rejected += 1,
            }
        }
    }
}

/// Wraps a line iterator so that it yields only valid loans.
pub fn load_loans<I>(lines: I) -> Loans<I::IntoIter>
where
    I: IntoIterator<Item = Result<String>>,
{
    Loans {
        lines: lines.into_iter(),
        stats: LoadStats::default(),
    }
}

/// Why a rendered report was not published.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create temporary report in {}", .dir.display())]
    TempFile {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render report: {0:#}")]
    Render(anyhow::Error),

    #[error("failed to sync temporary report {}", .temp.display())]
    Sync {
        temp: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output file {} already exists, report left at {}", .dest.display(), .temp.display())]
    DestinationExists { dest: PathBuf, temp: PathBuf },

    #[error("failed to mv {} to {}", .temp.display(), .dest.display())]
    Persist {
        dest: PathBuf,
        temp: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Keeps a temporary report on disk for manual recovery and returns its path.
fn keep_temp(temp: NamedTempFile) -> PathBuf {
    let path = temp.path().to_path_buf();
    if let Err(err) = temp.keep() {
        warn!("failed to keep temporary report {}: {}", path.display(), err);
    }
    path
}

/// Renders `summary` to a temporary file and moves it to `dest`.
///
/// The temporary file is created in the destination directory so the final
/// rename stays on one filesystem. An existing `dest` is never overwritten:
/// the write fails and the rendered temporary file is left in place. A failed
/// rename also leaves the temporary file behind.
pub fn write_report(summary: &Summary, dest: &Path) -> Result<(), ReportError> {
    let dir = dest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut temp = tempfile::Builder::new()
        .prefix(".loan-summary-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| ReportError::TempFile {
            dir: dir.to_path_buf(),
            source,
        })?;

    render_report(summary, temp.as_file_mut()).map_err(ReportError::Render)?;
    temp.as_file()
        .sync_all()
        .map_err(|source| ReportError::Sync {
            temp: temp.path().to_path_buf(),
            source,
        })?;

    if dest.exists() {
        let temp = keep_temp(temp);
        error!(
            "output file {} already exists, report left at {}",
            dest.display(),
            temp.display()
        );
        return Err(ReportError::DestinationExists {
            dest: dest.to_path_buf(),
            temp,
        });
    }

    publish(temp, dest)
}

/// Moves a rendered temporary report to `dest` unless something is already
/// there. On failure the temporary file is kept and its path reported.
fn publish(temp: NamedTempFile, dest: &Path) -> Result<(), ReportError> {
    match temp.persist_noclobber(dest) {
        Ok(_) => {
            info!("{} is done.", dest.display());
            Ok(())
        }
        Err(PersistError { error, file }) if error.kind() == io::ErrorKind::AlreadyExists => {
            let temp = keep_temp(file);
            error!(
                "output file {} already exists, report left at {}",
                dest.display(),
                temp.display()
            );
            Err(ReportError::DestinationExists {
                dest: dest.to_path_buf(),
                temp,
            })
        }
        Err(PersistError { error, file }) => {
            let temp = keep_temp(file);
            error!(
                "failed to mv {} to {}: {}",
                temp.display(),
                dest.display(),
                error
            );
            Err(ReportError::Persist {
                dest: dest.to_path_buf(),
                temp,
                source: error,
            })
        }
    }
}
