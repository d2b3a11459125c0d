use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trial_analysis::AnalysisError;
use trial_core::{BatchConfig, InstanceSet};
use trial_runner::{BatchOutcome, ProcessExecutor};

#[derive(Parser)]
#[command(name = "trials", version, about = "Batch trial runner and log summarizer")]
struct Cli {
    /// YAML batch config; unset fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every (repeat, instance) cell in order, stopping at the first failure.
    Run {
        #[arg(long)]
        repeats: Option<u32>,
        /// `start..end` or `a,b,c`.
        #[arg(long)]
        instances: Option<InstanceSet>,
        #[arg(long)]
        device: Option<String>,
    },
    /// Print the invocations `run` would execute.
    Plan {
        #[arg(long)]
        repeats: Option<u32>,
        #[arg(long)]
        instances: Option<InstanceSet>,
        #[arg(long)]
        json: bool,
    },
    /// Summarize success outcomes scraped from the log directory.
    Summarize {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                // stderr carries the diagnostic in both modes.
                eprintln!("Error: {:#}", err);
                emit_json(&json_error(error_code(&err), err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn run_command(cli: Cli) -> Result<Option<Value>> {
    let mut config = trial_core::load_config(cli.config.as_deref())?;
    if let Some(log_dir) = cli.log_dir {
        config.log_dir = log_dir;
    }

    match cli.command {
        Commands::Run {
            repeats,
            instances,
            device,
        } => {
            apply_grid_overrides(&mut config, repeats, instances);
            if let Some(device) = device {
                config.device_id = device;
            }
            let outcome = trial_runner::run_batch(&config, &mut ProcessExecutor)?;
            match &outcome {
                BatchOutcome::Completed { trials } => {
                    println!("completed: {} trials", trials.len());
                    println!("log_dir: {}", config.log_dir.display());
                }
                BatchOutcome::Aborted { failed, .. } => {
                    eprintln!("Command failed with code {}, aborting.", failed.exit_code);
                    eprintln!("Check log file: {}", failed.log_file.display());
                    std::process::exit(outcome.exit_code());
                }
            }
        }
        Commands::Plan {
            repeats,
            instances,
            json,
        } => {
            apply_grid_overrides(&mut config, repeats, instances);
            config.validate()?;
            let plan = trial_runner::plan_batch(&config);
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "plan",
                    "config": config_to_json(&config),
                    "trials": plan.iter().map(|inv| json!({
                        "repeat": inv.identity.repeat,
                        "instance": inv.identity.instance,
                        "argv": inv.argv,
                        "env": inv.env.iter().map(|(k, v)| json!({ k.as_str(): v })).collect::<Vec<_>>(),
                        "log_file": inv.log_file.display().to_string(),
                    })).collect::<Vec<_>>(),
                })));
            }
            println!("log_dir: {}", config.log_dir.display());
            println!("repeats: {}", config.repeats);
            println!("instances: {:?}", config.instances.indices());
            println!("total_trials: {}", plan.len());
            for inv in &plan {
                println!("{}", inv.display_command());
            }
        }
        Commands::Summarize { json } => {
            let scan = trial_analysis::scan_log_dir(&config.log_dir)?;
            for failure in &scan.failures {
                eprintln!("Error parsing {}: {}", failure.path.display(), failure.message);
            }
            let failures = scan.failures.clone();
            let matched_files = scan.matched_files;
            let summary = scan.into_summary(&config.log_dir)?;
            let overall_rate = summary.overall.rate_percent();
            if json {
                let summary = serde_json::to_value(&summary)?;
                return Ok(Some(json!({
                    "ok": true,
                    "command": "summarize",
                    "generated_at": Utc::now().to_rfc3339(),
                    "log_dir": config.log_dir.display().to_string(),
                    "matched_files": matched_files,
                    "failures": failures,
                    "summary": summary,
                    "overall_rate": overall_rate,
                })));
            }
            print!("{}", trial_analysis::render_report(&summary));
        }
    }
    Ok(None)
}

fn apply_grid_overrides(
    config: &mut BatchConfig,
    repeats: Option<u32>,
    instances: Option<InstanceSet>,
) {
    if let Some(repeats) = repeats {
        config.repeats = repeats;
    }
    if let Some(instances) = instances {
        config.instances = instances;
    }
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn error_code(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<AnalysisError>() {
        Some(AnalysisError::NoLogFiles(_)) => "no_log_files",
        Some(AnalysisError::NoValidResults) => "no_valid_results",
        _ => "command_failed",
    }
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Plan { json, .. } | Commands::Summarize { json } => *json,
        Commands::Run { .. } => false,
    }
}

fn config_to_json(config: &BatchConfig) -> Value {
    json!({
        "log_dir": config.log_dir.display().to_string(),
        "command": config.command,
        "base_args": config.base_args,
        "repeats": config.repeats,
        "instances": config.instances.indices(),
        "device": { config.device_env_var.as_str(): config.device_id },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "trials",
            "run",
            "--instances",
            "0..3",
            "--repeats",
            "2",
            "--log-dir",
            "/tmp/logs",
        ])
        .expect("parse");
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/logs")));
        match cli.command {
            Commands::Run {
                repeats, instances, ..
            } => {
                assert_eq!(repeats, Some(2));
                assert_eq!(instances, Some(InstanceSet::Range { start: 0, end: 3 }));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn bad_instance_list_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["trials", "plan", "--instances", "a,b"]).is_err());
    }

    #[test]
    fn analysis_errors_map_to_stable_codes() {
        let err = anyhow::Error::new(AnalysisError::NoValidResults);
        assert_eq!(error_code(&err), "no_valid_results");
        let err = anyhow::Error::new(AnalysisError::NoLogFiles(PathBuf::from("/logs")));
        assert_eq!(error_code(&err), "no_log_files");
        assert_eq!(error_code(&anyhow::anyhow!("boom")), "command_failed");
    }

    #[test]
    fn json_mode_is_per_command() {
        let cli = Cli::try_parse_from(["trials", "summarize", "--json"]).expect("parse");
        assert!(command_json_mode(&cli.command));
        let cli = Cli::try_parse_from(["trials", "run"]).expect("parse");
        assert!(!command_json_mode(&cli.command));
    }
}
