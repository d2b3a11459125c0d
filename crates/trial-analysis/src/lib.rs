//! Scrapes outcome markers out of trial logs and rolls them up per instance.
//!
//! Only the log file naming convention ties this crate to the runner: the
//! scan sees whichever `behavior_log_{repeat}_{instance}.log` files exist,
//! not the grid that was meant to produce them.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use trial_core::is_log_file_name;
use walkdir::WalkDir;

mod report;
mod scrape;
mod summary;

pub use report::{render_report, Report};
pub use scrape::{LogResult, LogScraper};
pub use summary::{summarize, BatchSummary, InstanceSummary, Rollup};

#[derive(Error, Debug)]
pub enum LogParseError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No log files found in {}", .0.display())]
    NoLogFiles(PathBuf),

    #[error("No valid results found in log files")]
    NoValidResults,

    #[error("failed to list {}: {}", .dir.display(), .source)]
    ListDir {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A log that matched the naming convention but could not be used.
#[derive(Debug, Clone, Serialize)]
pub struct ReadFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub matched_files: usize,
    pub records: Vec<LogResult>,
    /// One entry per failing file. Files with missing markers are not listed.
    pub failures: Vec<ReadFailure>,
}

/// Lists direct children of `dir` named like trial logs, in name order. A
/// missing directory simply has no logs.
pub fn list_log_files(dir: &Path) -> Result<Vec<PathBuf>, AnalysisError> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| AnalysisError::ListDir {
            dir: dir.to_path_buf(),
            source,
        })?;
        // Lossy so names that are not UTF-8 are still enumerated.
        if is_log_file_name(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub fn scan_log_dir(dir: &Path) -> Result<ScanReport, AnalysisError> {
    let scraper = LogScraper::new()?;
    let files = list_log_files(dir)?;
    let mut report = ScanReport {
        matched_files: files.len(),
        ..ScanReport::default()
    };
    for path in files {
        match scraper.parse_file(&path) {
            Ok(Some(record)) => report.records.push(record),
            Ok(None) => debug!("skipping {}: markers or identity missing", path.display()),
            Err(err) => report.failures.push(ReadFailure {
                message: err.to_string(),
                path,
            }),
        }
    }
    Ok(report)
}

impl ScanReport {
    /// Failures should be reported before calling this; having no files or
    /// no usable records at all is an error.
    pub fn into_summary(self, dir: &Path) -> Result<BatchSummary, AnalysisError> {
        if self.matched_files == 0 {
            return Err(AnalysisError::NoLogFiles(dir.to_path_buf()));
        }
        if self.records.is_empty() {
            return Err(AnalysisError::NoValidResults);
        }
        Ok(summarize(self.records))
    }
}
