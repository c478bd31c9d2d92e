//! Regression checks of pattern writer output against committed reference files.
//!
//! A case runs the tool as `<exe> --<mode> <size> --output <path>` and then compares
//! the produced file byte for byte with `<mode>_<size>.bin` in the reference directory.
use std::path::{Path, PathBuf};
use std::process::Command;

use super::error::GoldenError;
use super::tdac_pattern::PatternMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoldenCase {
    pub mode: PatternMode,
    pub size: u8,
}

impl GoldenCase {
    pub fn new(mode: PatternMode, size: u8) -> Self {
        Self { mode, size }
    }

    /// The name of the reference file, i.e. `checker_16.bin`
    pub fn reference_name(&self) -> String {
        format!("{}_{}.bin", self.mode, self.size)
    }
}

/// Run the tool for a case, writing to output.
///
/// A non-zero exit is an error carrying everything the tool printed.
pub fn run_tool(exe: &Path, case: &GoldenCase, output: &Path) -> Result<(), GoldenError> {
    let result = Command::new(exe)
        .arg(case.mode.flag())
        .arg(case.size.to_string())
        .arg("--output")
        .arg(output)
        .output()?;

    if !result.status.success() {
        return Err(GoldenError::ToolFailed {
            exe: exe.to_path_buf(),
            status: result.status,
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Exact comparison of two files
pub fn compare_files(produced: &Path, golden: &Path) -> Result<(), GoldenError> {
    if !golden.exists() {
        return Err(GoldenError::MissingReference(golden.to_path_buf()));
    }
    let produced_bytes = std::fs::read(produced)?;
    let golden_bytes = std::fs::read(golden)?;
    if produced_bytes == golden_bytes {
        return Ok(());
    }

    let offset = produced_bytes
        .iter()
        .zip(golden_bytes.iter())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| produced_bytes.len().min(golden_bytes.len()));
    Err(GoldenError::Mismatch {
        produced: produced.to_path_buf(),
        golden: golden.to_path_buf(),
        offset,
        produced_len: produced_bytes.len(),
        golden_len: golden_bytes.len(),
    })
}

/// Run a case in work_dir and check it against its reference in golden_dir.
///
/// Returns the path of the produced file.
pub fn check_case(
    exe: &Path,
    golden_dir: &Path,
    work_dir: &Path,
    case: &GoldenCase,
) -> Result<PathBuf, GoldenError> {
    let golden = golden_dir.join(case.reference_name());
    if !golden.exists() {
        return Err(GoldenError::MissingReference(golden));
    }
    let output = work_dir.join(format!("{}.bin", case.mode));
    run_tool(exe, case, &output)?;
    compare_files(&output, &golden)?;
    log::info!("{} matches {}", output.to_string_lossy(), golden.to_string_lossy());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("golden-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_reference_name() {
        assert_eq!(
            GoldenCase::new(PatternMode::Checker, 16).reference_name(),
            "checker_16.bin"
        );
        assert_eq!(
            GoldenCase::new(PatternMode::Wave, 16).reference_name(),
            "wave_16.bin"
        );
    }

    #[test]
    fn test_compare_files() {
        let dir = unique_temp_dir("compare");
        let a = dir.join("a.bin");
        let b = dir.join("b.bin");
        let c = dir.join("c.bin");
        std::fs::write(&a, [1u8, 2, 3, 4]).unwrap();
        std::fs::write(&b, [1u8, 2, 3, 4]).unwrap();
        std::fs::write(&c, [1u8, 2, 9]).unwrap();

        assert!(compare_files(&a, &b).is_ok());
        match compare_files(&a, &c) {
            Err(GoldenError::Mismatch {
                offset,
                produced_len,
                golden_len,
                ..
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(produced_len, 4);
                assert_eq!(golden_len, 3);
            }
            other => panic!("Expected mismatch, got {other:?}"),
        }
        assert!(matches!(
            compare_files(&a, &dir.join("missing.bin")),
            Err(GoldenError::MissingReference(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_truncated_output_mismatch() {
        let dir = unique_temp_dir("truncated");
        let a = dir.join("a.bin");
        let b = dir.join("b.bin");
        std::fs::write(&a, [1u8, 2]).unwrap();
        std::fs::write(&b, [1u8, 2, 3]).unwrap();
        assert!(matches!(
            compare_files(&a, &b),
            Err(GoldenError::Mismatch { offset: 2, .. })
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool() {
        let dir = unique_temp_dir("failing");
        let case = GoldenCase::new(PatternMode::Checker, 16);
        match run_tool(Path::new("false"), &case, &dir.join("out.bin")) {
            Err(GoldenError::ToolFailed { status, .. }) => assert!(!status.success()),
            other => panic!("Expected tool failure, got {other:?}"),
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
