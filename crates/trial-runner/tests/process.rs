#![cfg(unix)]

use std::fs;
use trial_core::{BatchConfig, InstanceSet, TrialIdentity};
use trial_runner::{run_batch, BatchOutcome, ProcessExecutor, TrialExecutor, TrialInvocation};

fn shell_config(log_dir: &std::path::Path, script: &str, instances: Vec<u32>) -> BatchConfig {
    // `sh -c script` sees the appended arguments as $0, $1, ...
    BatchConfig {
        log_dir: log_dir.to_path_buf(),
        command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        base_args: vec!["policy=websocket".to_string()],
        repeats: 2,
        instances: InstanceSet::List(instances),
        device_id: "3".to_string(),
        ..BatchConfig::default()
    }
}

#[test]
fn stdout_and_stderr_land_in_one_log_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = shell_config(
        dir.path(),
        "echo out-line; echo err-line >&2; echo \"device=$CUDA_VISIBLE_DEVICES\"",
        vec![0],
    );
    let invocation = TrialInvocation::build(&config, TrialIdentity::new(0, 0));
    let exit = ProcessExecutor.execute(&invocation).expect("spawn");
    assert!(exit.success());

    let text = fs::read_to_string(dir.path().join("behavior_log_0_0.log")).expect("log");
    assert_eq!(text, "out-line\nerr-line\ndevice=3\n");
}

#[test]
fn child_exit_code_is_reported_verbatim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = shell_config(dir.path(), "exit 7", vec![0]);
    let invocation = TrialInvocation::build(&config, TrialIdentity::new(0, 0));
    let exit = ProcessExecutor.execute(&invocation).expect("spawn");
    assert_eq!(exit.code, 7);
}

#[test]
fn batch_aborts_on_failing_instance_with_its_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    // $0 is the instance flag and $1 the instance index; instance 1 fails.
    let config = shell_config(
        dir.path(),
        "echo \"instance $1\"; [ \"$1\" = 1 ] && exit 42; exit 0",
        vec![0, 1, 2],
    );
    let outcome = run_batch(&config, &mut ProcessExecutor).expect("batch");
    assert_eq!(outcome.exit_code(), 42);
    assert!(matches!(outcome, BatchOutcome::Aborted { .. }));

    assert!(dir.path().join("behavior_log_0_0.log").exists());
    assert!(dir.path().join("behavior_log_0_1.log").exists());
    assert!(!dir.path().join("behavior_log_0_2.log").exists());
    assert!(!dir.path().join("behavior_log_1_0.log").exists());
}

#[test]
fn missing_program_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = shell_config(dir.path(), "", vec![0]);
    config.command = vec!["/nonexistent/trial-program".to_string()];
    let invocation = TrialInvocation::build(&config, TrialIdentity::new(0, 0));
    let err = ProcessExecutor.execute(&invocation).expect_err("spawn fails");
    assert!(err.to_string().contains("failed to spawn"));
}
