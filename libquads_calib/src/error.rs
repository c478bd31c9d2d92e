use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

use super::constants::PIXEL_IMAGE_SIZE;
use super::scan_status::ScanStatus;

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("MaskVector failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("MaskVector failed to serialize to JSON: {0}")]
    ParsingError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TdacFileError {
    #[error("TdacFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not open TdacFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("TdacFile received {0} bytes; expected at least {size}", size=PIXEL_IMAGE_SIZE)]
    IncorrectSize(usize),
}

#[derive(Debug, Clone, Error)]
pub enum PatternError {
    #[error("Pattern size must be at least 1")]
    ZeroSize,
    #[error("Could not convert the parameter '{0}' to a number")]
    BadParameter(String),
    #[error("Unknown pattern mode '{0}'")]
    BadMode(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config parameter {0} has an invalid value: {1}")]
    BadParameter(String, String),
    #[error("Config failed due to session error: {0}")]
    SessionError(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,
    #[error("Session could not find parameter {0}")]
    MissingParameter(String),
    #[error("Session received an invalid ODB path: {0:?}")]
    BadPath(String),
    #[error("Session RPC failed: {0}")]
    Rpc(String),
}

#[derive(Debug, Error)]
pub enum NoiseScanError {
    #[error("NoiseScan failed due to session error: {0}")]
    SessionError(#[from] SessionError),
    #[error("NoiseScan failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("NoiseScan failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<ScanStatus>),
}

#[derive(Debug, Error)]
pub enum GoldenError {
    #[error("Golden harness failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Golden reference file {0:?} is missing")]
    MissingReference(PathBuf),
    #[error("Tool {exe:?} failed with {status}:\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    ToolFailed {
        exe: PathBuf,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    #[error("Output {produced:?} differs from {golden:?} at byte {offset} (sizes {produced_len} and {golden_len})")]
    Mismatch {
        produced: PathBuf,
        golden: PathBuf,
        offset: usize,
        produced_len: usize,
        golden_len: usize,
    },
}
