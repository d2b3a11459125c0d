use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

mod config;

pub use config::{load_config, BatchConfig, InstanceSet};

pub const LOG_FILE_PREFIX: &str = "behavior_log_";
pub const LOG_FILE_SUFFIX: &str = ".log";

/// One grid cell: the outer repeat pass and the instance index within it.
///
/// The identity is encoded losslessly into the log file name, which is the
/// only thing the runner and the aggregator share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrialIdentity {
    pub repeat: u32,
    pub instance: u32,
}

impl TrialIdentity {
    pub fn new(repeat: u32, instance: u32) -> Self {
        Self { repeat, instance }
    }

    /// `behavior_log_{repeat}_{instance}`, handed to the evaluated program as
    /// its own log prefix.
    pub fn log_stem(&self) -> String {
        format!("{}{}_{}", LOG_FILE_PREFIX, self.repeat, self.instance)
    }

    pub fn log_file_name(&self) -> String {
        format!("{}{}", self.log_stem(), LOG_FILE_SUFFIX)
    }

    /// Recovers the identity from a file name. The pattern is searched, not
    /// anchored, and indices that overflow `u32` do not parse.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let caps = file_name_pattern().captures(name)?;
        let repeat = caps.get(1)?.as_str().parse().ok()?;
        let instance = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { repeat, instance })
    }
}

impl fmt::Display for TrialIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repeat={} instance={}", self.repeat, self.instance)
    }
}

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"behavior_log_(\d+)_(\d+)\.log").expect("static log file pattern compiles")
    })
}

/// Enumeration filter, equivalent to the glob `behavior_log_*.log`.
pub fn is_log_file_name(name: &str) -> bool {
    name.len() >= LOG_FILE_PREFIX.len() + LOG_FILE_SUFFIX.len()
        && name.starts_with(LOG_FILE_PREFIX)
        && name.ends_with(LOG_FILE_SUFFIX)
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}
