use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;
use tracing::{info, warn};
use trial_core::{ensure_dir, BatchConfig, TrialIdentity};

/// Repeat-major walk over the grid: every instance of repeat 0, then every
/// instance of repeat 1, and so on.
#[derive(Debug, Clone)]
pub struct TrialGrid {
    repeats: u32,
    instances: Vec<u32>,
}

impl TrialGrid {
    pub fn new(repeats: u32, instances: Vec<u32>) -> Self {
        Self { repeats, instances }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.repeats, config.instances.indices())
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    pub fn len(&self) -> usize {
        (self.repeats as usize).saturating_mul(self.instances.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cells(&self) -> impl Iterator<Item = TrialIdentity> + '_ {
        (0..self.repeats).flat_map(move |repeat| {
            self.instances
                .iter()
                .map(move |&instance| TrialIdentity::new(repeat, instance))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialInvocation {
    pub identity: TrialIdentity,
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub log_file: PathBuf,
}

impl TrialInvocation {
    /// argv order: program prefix, instance selector, base arguments, then
    /// the instance-scoped `log_path=` argument.
    pub fn build(config: &BatchConfig, identity: TrialIdentity) -> Self {
        let log_stem = config.log_dir.join(identity.log_stem());
        let mut argv = config.command.clone();
        argv.push(config.instance_flag.clone());
        argv.push(identity.instance.to_string());
        argv.extend(config.base_args.iter().cloned());
        argv.push(format!("{}={}", config.log_path_key, log_stem.display()));
        Self {
            identity,
            argv,
            env: vec![(config.device_env_var.clone(), config.device_id.clone())],
            log_file: config.log_dir.join(identity.log_file_name()),
        }
    }

    /// Shell-ready rendering, env override first.
    pub fn display_command(&self) -> String {
        let env = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect::<Vec<_>>();
        let mut parts = env;
        parts.push(shell_join(&self.argv));
        parts.join(" ")
    }
}

/// Exit of one child. `code` is zero on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialExit {
    pub code: i32,
}

impl TrialExit {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self { code };
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self { code: 128 + signal };
            }
        }
        Self { code: 1 }
    }
}

pub trait TrialExecutor {
    fn execute(&mut self, invocation: &TrialInvocation) -> Result<TrialExit>;
}

/// Runs each invocation as a blocking child process. stdout and stderr share
/// one handle on the log file, so the file keeps the child's write order.
#[derive(Debug, Default)]
pub struct ProcessExecutor;

impl TrialExecutor for ProcessExecutor {
    fn execute(&mut self, invocation: &TrialInvocation) -> Result<TrialExit> {
        let (program, args) = invocation
            .argv
            .split_first()
            .ok_or_else(|| anyhow!("empty argv for {}", invocation.identity))?;
        let log = fs::File::create(&invocation.log_file)
            .with_context(|| format!("failed to create {}", invocation.log_file.display()))?;
        let log_err = log.try_clone()?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::from(log));
        cmd.stderr(Stdio::from(log_err));

        let status = cmd
            .status()
            .with_context(|| format!("failed to spawn {}", program))?;
        Ok(TrialExit::from_status(status))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialRecord {
    pub identity: TrialIdentity,
    pub log_file: PathBuf,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed {
        trials: Vec<TrialRecord>,
    },
    /// Stopped at the first failing cell; later cells were never attempted.
    Aborted {
        completed: Vec<TrialRecord>,
        failed: TrialRecord,
    },
}

impl BatchOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            BatchOutcome::Completed { .. } => 0,
            BatchOutcome::Aborted { failed, .. } => failed.exit_code,
        }
    }

    pub fn attempted(&self) -> usize {
        match self {
            BatchOutcome::Completed { trials } => trials.len(),
            BatchOutcome::Aborted { completed, .. } => completed.len() + 1,
        }
    }
}

pub fn plan_batch(config: &BatchConfig) -> Vec<TrialInvocation> {
    TrialGrid::from_config(config)
        .cells()
        .map(|identity| TrialInvocation::build(config, identity))
        .collect()
}

/// Runs the grid strictly in order and stops on the first non-zero exit.
pub fn run_batch(config: &BatchConfig, executor: &mut dyn TrialExecutor) -> Result<BatchOutcome> {
    config.validate()?;
    ensure_dir(&config.log_dir)?;

    let grid = TrialGrid::from_config(config);
    let mut completed = Vec::new();
    let mut current_repeat = None;

    for identity in grid.cells() {
        if current_repeat != Some(identity.repeat) {
            current_repeat = Some(identity.repeat);
            info!("Repeat {}/{}", identity.repeat + 1, grid.repeats());
        }

        let invocation = TrialInvocation::build(config, identity);
        info!("Running: {}", invocation.display_command());
        info!("Logging to: {}", invocation.log_file.display());

        let started_at = Utc::now();
        let started = Instant::now();
        let exit = executor.execute(&invocation)?;
        let record = TrialRecord {
            identity,
            log_file: invocation.log_file,
            exit_code: exit.code,
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if !exit.success() {
            warn!(
                "command failed with code {}, aborting ({})",
                exit.code, identity
            );
            return Ok(BatchOutcome::Aborted {
                completed,
                failed: record,
            });
        }
        completed.push(record);
    }

    Ok(BatchOutcome::Completed { trials: completed })
}

fn shell_join(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| shell_quote(p))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}
