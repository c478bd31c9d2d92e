use std::path::{Path, PathBuf};
use std::process::Command;

use libquads_calib::error::GoldenError;
use libquads_calib::golden::{check_case, compare_files, run_tool, GoldenCase};
use libquads_calib::tdac_file::TdacFile;
use libquads_calib::tdac_pattern::PatternMode;

fn writetdacs() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_writetdacs"))
}

fn golden_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "writetdacs-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

#[test]
fn checkerboard_matches_golden() {
    let dir = unique_temp_dir("checker");
    let case = GoldenCase::new(PatternMode::Checker, 16);
    let produced = check_case(writetdacs(), &golden_dir(), &dir, &case)
        .unwrap_or_else(|e| panic!("Checkerboard TDAC mismatch: {e}"));
    assert_eq!(produced, dir.join("checker.bin"));
    std::fs::remove_dir_all(&dir).expect("temp dir should be removable");
}

#[test]
fn wave_matches_golden() {
    let dir = unique_temp_dir("wave");
    let case = GoldenCase::new(PatternMode::Wave, 16);
    check_case(writetdacs(), &golden_dir(), &dir, &case)
        .unwrap_or_else(|e| panic!("Wave TDAC mismatch: {e}"));
    std::fs::remove_dir_all(&dir).expect("temp dir should be removable");
}

#[test]
fn golden_files_are_tdac_images() {
    for name in ["checker_16.bin", "wave_16.bin"] {
        let file = TdacFile::load_from_file(&golden_dir().join(name))
            .expect("golden file should load as a TDAC image");
        assert_eq!(file.pixel(0, 0), 0x47);
        assert_eq!(file.pixel(0, 253), 0xff);
    }
}

#[test]
fn different_size_does_not_match() {
    let dir = unique_temp_dir("size8");
    let output = dir.join("checker.bin");
    run_tool(
        writetdacs(),
        &GoldenCase::new(PatternMode::Checker, 8),
        &output,
    )
    .expect("writetdacs should succeed");
    assert!(matches!(
        compare_files(&output, &golden_dir().join("checker_16.bin")),
        Err(GoldenError::Mismatch { .. })
    ));
    std::fs::remove_dir_all(&dir).expect("temp dir should be removable");
}

#[test]
fn zero_size_fails_with_output_captured() {
    let dir = unique_temp_dir("zero");
    match run_tool(
        writetdacs(),
        &GoldenCase::new(PatternMode::Wave, 0),
        &dir.join("wave.bin"),
    ) {
        Err(GoldenError::ToolFailed { stderr, status, .. }) => {
            assert!(!status.success());
            assert!(stderr.contains("at least 1"), "stderr was: {stderr}");
        }
        other => panic!("Expected tool failure, got {other:?}"),
    }
    std::fs::remove_dir_all(&dir).expect("temp dir should be removable");
}

#[test]
fn missing_reference_is_reported() {
    let dir = unique_temp_dir("missing");
    let case = GoldenCase::new(PatternMode::Checker, 4);
    assert!(matches!(
        check_case(writetdacs(), &golden_dir(), &dir, &case),
        Err(GoldenError::MissingReference(_))
    ));
    std::fs::remove_dir_all(&dir).expect("temp dir should be removable");
}

#[test]
fn stdout_output_is_raw_image() {
    let result = Command::new(writetdacs())
        .args(["--checker", "0x10", "--output", "-"])
        .output()
        .expect("writetdacs should start");
    assert!(result.status.success());
    let golden = std::fs::read(golden_dir().join("checker_16.bin")).expect("golden readable");
    assert_eq!(result.stdout, golden);
}

#[test]
fn unknown_argument_prints_usage() {
    let result = Command::new(writetdacs())
        .arg("--stripes")
        .output()
        .expect("writetdacs should start");
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("Unknown argument '--stripes'"));
    assert!(stderr.contains("--checker <value>"));
}
