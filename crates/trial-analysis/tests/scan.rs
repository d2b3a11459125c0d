use std::fs;
use std::path::Path;
use trial_analysis::{render_report, scan_log_dir, AnalysisError};

fn write_log(dir: &Path, name: &str, success: u64, total: u64, rate: &str) {
    let text = format!(
        "loading policy\nTotal success trials: {}\nTotal trials: {}\nSuccess rate: {}\n",
        success, total, rate
    );
    fs::write(dir.join(name), text).expect("write log");
}

#[test]
fn scan_keeps_complete_logs_and_ignores_foreign_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_log(dir.path(), "behavior_log_0_3.log", 1, 2, "50.00");
    write_log(dir.path(), "behavior_log_1_1.log", 2, 2, "100.00");
    write_log(dir.path(), "behavior_log_0_1.log", 0, 2, "0.00");
    fs::write(dir.path().join("notes.txt"), "Total trials: 9").expect("write");
    fs::write(dir.path().join("behavior_log_0_2.log"), "crashed before summary\n").expect("write");

    let scan = scan_log_dir(dir.path()).expect("scan");
    assert_eq!(scan.matched_files, 4);
    assert_eq!(scan.records.len(), 3);
    assert!(scan.failures.is_empty(), "missing markers are skipped silently");

    let summary = scan.into_summary(dir.path()).expect("summary");
    let order = summary
        .instances
        .iter()
        .map(|i| (i.instance, i.records.iter().map(|r| r.repeat).collect::<Vec<_>>()))
        .collect::<Vec<_>>();
    assert_eq!(order, vec![(1, vec![0, 1]), (3, vec![0])]);
    assert_eq!(summary.overall.success_trials, 3);
    assert_eq!(summary.overall.total_trials, 6);

    let report = render_report(&summary);
    assert!(report.contains("Overall: 3/6 (50.0%)"), "{}", report);
}

#[test]
fn unreadable_log_yields_one_failure_naming_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_log(dir.path(), "behavior_log_0_0.log", 1, 1, "100.00");
    // Invalid UTF-8 cannot be read as text.
    fs::write(dir.path().join("behavior_log_0_1.log"), [0xff, 0xfe, 0x00]).expect("write");

    let scan = scan_log_dir(dir.path()).expect("scan");
    assert_eq!(scan.records.len(), 1);
    assert_eq!(scan.failures.len(), 1);
    assert!(scan.failures[0].path.ends_with("behavior_log_0_1.log"));
}

#[test]
fn empty_directory_has_no_log_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scan = scan_log_dir(dir.path()).expect("scan");
    let err = scan.into_summary(dir.path()).expect_err("no logs");
    assert!(matches!(err, AnalysisError::NoLogFiles(_)));
    assert!(err.to_string().starts_with("No log files found in"));
}

#[test]
fn missing_directory_has_no_log_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent");
    let err = scan_log_dir(&missing)
        .expect("scan")
        .into_summary(&missing)
        .expect_err("no logs");
    assert!(matches!(err, AnalysisError::NoLogFiles(_)));
}

#[test]
fn only_incomplete_logs_is_no_valid_results() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("behavior_log_0_0.log"), "Total trials: 3\n").expect("write");
    let scan = scan_log_dir(dir.path()).expect("scan");
    let err = scan.into_summary(dir.path()).expect_err("no records");
    assert!(matches!(err, AnalysisError::NoValidResults));
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_log_names_are_enumerated() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().expect("tempdir");
    write_log(dir.path(), "behavior_log_0_0.log", 1, 2, "50.00");
    let odd = OsStr::from_bytes(b"behavior_log_\xff_1.log");
    fs::write(dir.path().join(odd), "Total success trials: 1\n").expect("write");

    let scan = scan_log_dir(dir.path()).expect("scan");
    assert_eq!(scan.matched_files, 2);
    assert_eq!(scan.records.len(), 1);
    assert!(scan.failures.is_empty());
}
