use crate::LogParseError;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use trial_core::TrialIdentity;

/// Outcome numbers scraped from one trial log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogResult {
    pub repeat: u32,
    pub instance: u32,
    pub success_trials: u64,
    pub total_trials: u64,
    /// Kept on whatever scale the log reports it.
    pub success_rate: f64,
}

impl LogResult {
    pub fn identity(&self) -> TrialIdentity {
        TrialIdentity::new(self.repeat, self.instance)
    }

    /// At least one sub-trial succeeded. Independent of the rate's scale.
    pub fn succeeded(&self) -> bool {
        self.success_rate > 0.0
    }
}

/// Finds the three outcome markers anywhere in a log, in any order.
#[derive(Debug, Clone)]
pub struct LogScraper {
    success_trials: Regex,
    total_trials: Regex,
    success_rate: Regex,
}

impl LogScraper {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            success_trials: Regex::new(r"Total success trials:\s*(\d+)")?,
            total_trials: Regex::new(r"Total trials:\s*(\d+)")?,
            success_rate: Regex::new(r"Success rate:\s*([\d.]+)")?,
        })
    }

    /// `Ok(None)` when any marker is missing. A marker whose number does not
    /// convert is an error, not a skip.
    pub fn parse_text(
        &self,
        identity: TrialIdentity,
        text: &str,
    ) -> Result<Option<LogResult>, LogParseError> {
        let (Some(success), Some(total), Some(rate)) = (
            capture(&self.success_trials, text),
            capture(&self.total_trials, text),
            capture(&self.success_rate, text),
        ) else {
            return Ok(None);
        };
        Ok(Some(LogResult {
            repeat: identity.repeat,
            instance: identity.instance,
            success_trials: parse_number(success)?,
            total_trials: parse_number(total)?,
            success_rate: parse_number(rate)?,
        }))
    }

    /// Reads first, then checks the name, so an unreadable file is reported
    /// even when its name would not have parsed.
    pub fn parse_file(&self, path: &Path) -> Result<Option<LogResult>, LogParseError> {
        let text = fs::read_to_string(path)?;
        let identity = match path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(TrialIdentity::from_file_name)
        {
            Some(identity) => identity,
            None => return Ok(None),
        };
        self.parse_text(identity, &text)
    }
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T, LogParseError> {
    raw.parse::<T>()
        .map_err(|_| LogParseError::InvalidNumber(raw.to_string()))
}
