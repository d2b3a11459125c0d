use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Ordered set of instance indices visited inside every repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceSet {
    /// Half-open range `start..end`.
    Range { start: u32, end: u32 },
    List(Vec<u32>),
}

impl InstanceSet {
    pub fn indices(&self) -> Vec<u32> {
        match self {
            InstanceSet::Range { start, end } => (*start..*end).collect(),
            InstanceSet::List(list) => list.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            InstanceSet::Range { start, end } => start >= end,
            InstanceSet::List(list) => list.is_empty(),
        }
    }
}

impl FromStr for InstanceSet {
    type Err = anyhow::Error;

    /// Accepts `a..b` or a comma separated list `a,b,c`.
    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Some((start, end)) = raw.split_once("..") {
            let start = start
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid instance range start in '{}'", raw))?;
            let end = end
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid instance range end in '{}'", raw))?;
            return Ok(InstanceSet::Range { start, end });
        }
        let list = raw
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|_| anyhow!("invalid instance index '{}' in '{}'", part, raw))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(InstanceSet::List(list))
    }
}

/// Everything the batch needs that used to be a literal in control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Directory holding `behavior_log_{repeat}_{instance}.log` files.
    pub log_dir: PathBuf,
    /// Program argv prefix, interpreter first when the program is a script.
    pub command: Vec<String>,
    pub base_args: Vec<String>,
    pub repeats: u32,
    pub instances: InstanceSet,
    pub instance_flag: String,
    pub log_path_key: String,
    pub device_env_var: String,
    pub device_id: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/mnt/public/quanlu"),
            command: vec![
                "python3".to_string(),
                "/opt/BEHAVIOR-1K/OmniGibson/omnigibson/learning/zql_eval.py".to_string(),
            ],
            base_args: vec![
                "policy=websocket".to_string(),
                "task.name=turning_on_radio".to_string(),
                "env_wrapper._target_=behavior.learning.wrappers.RGBWrapper".to_string(),
            ],
            repeats: 4,
            instances: InstanceSet::Range { start: 10, end: 19 },
            instance_flag: "--instance_index".to_string(),
            log_path_key: "log_path".to_string(),
            device_env_var: "CUDA_VISIBLE_DEVICES".to_string(),
            device_id: "0".to_string(),
        }
    }
}

impl BatchConfig {
    /// Reports every problem at once rather than the first one found.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            problems.push("command must name a program");
        }
        if self.instances.is_empty() {
            problems.push("instances must not be empty");
        }
        if self.device_env_var.trim().is_empty() {
            problems.push("device_env_var must not be empty");
        }
        if self.log_path_key.trim().is_empty() {
            problems.push("log_path_key must not be empty");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "invalid batch config:\n{}",
                problems
                    .iter()
                    .map(|p| format!("  - {}", p))
                    .collect::<Vec<_>>()
                    .join("\n")
            ))
        }
    }

    pub fn total_trials(&self) -> usize {
        self.repeats as usize * self.instances.indices().len()
    }
}

/// Loads a YAML config; fields not present keep their defaults.
pub fn load_config(path: Option<&Path>) -> Result<BatchConfig> {
    let config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str::<BatchConfig>(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => BatchConfig::default(),
    };
    Ok(config)
}
