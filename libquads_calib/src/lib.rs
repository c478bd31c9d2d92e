//! # quads_calib
//!
//! quads_calib is a small collection of calibration utilities for the MuPix Quads
//! readout, written in Rust. It produces the pixel masks and TDAC images that are loaded
//! onto the sensors, runs the threshold noise scan against the data acquisition, and
//! checks the TDAC pattern writer against reference files.
//!
//! ## Building & Install
//!
//! To build and install the tools use `cargo install --path ./quads_calib_cli` from the
//! top level repository. This installs two binaries, `quads_calib` and `writetdacs`.
//!
//! ## Pixel Mask
//!
//! `quads_calib mask --output mask_edge.h` writes the edge mask as a JSON array of
//! 65536 integers. For every one of the 256 columns there are 250 row bytes (`0x40`
//! enabled, `0x00` masked) followed by a six byte trailer:
//!
//! ```text
//! 0xda 0xda   end of column
//! 0xda col    column number
//! 0xda 0x00   LVDS error flag (unused)
//! ```
//!
//! A border of 10 pixels is masked on the low edges (9 on the high edges) along with the
//! known defective pixel at column 44, row 19.
//!
//! ## TDAC Files
//!
//! TDAC files use the same column layout but store raw bytes, with the per-pixel enable
//! bit (`0x40`), the ThHigh trim (`0x38`) and the ThLow trim (`0x07`). `writetdacs`
//! writes test patterns:
//!
//! ```bash
//! writetdacs --checker 16 --output checker.bin
//! writetdacs --wave 0x10 -o -
//! ```
//!
//! ## Noise Scan
//!
//! The noise scan is configured with a YAML file. A template can be made with
//! `quads_calib new --path noise_scan.yml`:
//!
//! ```yml
//! max_hits: 3
//! run_time: 3
//! start_threshold: 130
//! stop_threshold: 118
//! step_threshold: 1
//! max_iterations: 10
//! max_errorrate_retries: 5
//! max_link_errors: 500
//! reset_masks: true
//! do_tuning: false
//! pll_settle_time: 1
//! chips: [0, 1, 2, 3]
//! odb:
//!   vdacs: /Equipment/Quads/Settings/Config/VDACS
//!   confdacs: /Equipment/Quads/Settings/Config/CONFDACS
//!   commands: /Equipment/Quads/Settings/DAQ/Commands
//!   minalyzer_settings: /Equipment/MinAna/Settings
//!   minalyzer_output: /Equipment/MinAna/Output/
//! ```
//!
//! The scan itself only talks to the experiment through a
//! [`session::SequencerSession`]. `quads_calib noise-scan --path noise_scan.yml` runs it
//! against an [`session::OfflineSession`] which shows every ODB write the scan would make.
pub mod config;
pub mod constants;
pub mod error;
pub mod golden;
pub mod mask;
pub mod noise_scan;
pub mod scan_status;
pub mod session;
pub mod tdac_file;
pub mod tdac_pattern;
