//! # writetdacs
//!
//! Part of the quads_calib crate family.
//!
//! Small utility to write simple TDAC files for testing: all pixels the same, a
//! checkerboard, or a wave. Options are applied in the order they are given, so later
//! patterns overwrite earlier ones.
//!
//! ```bash
//! writetdacs --checker 16 --output checker.bin
//! ```
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use libquads_calib::tdac_file::TdacFile;
use libquads_calib::tdac_pattern::{apply_pattern, parse_pattern_value, PatternMode};

const DEFAULT_OUTPUT: &str = "tdac.bin";
/// Output name which means stdout
const STDOUT_OUTPUT: &str = "-";

const USAGE: &str = "writetdacs - small utility to write simple TDAC files for testing

--help or -h       print this message
--all <value>      set all pixels to <value>
--checker <value>  create a checkerboard pattern with squares of width <value>
--wave <value>     create a sine wave pattern with waves of width <value>
--output <path>    write the results to <path>. Use '-' for stdout. Default is 'tdac.bin'.
";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Invocation {
    Help,
    Write {
        patterns: Vec<(PatternMode, u8)>,
        output: String,
    },
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Invocation, String> {
    let mut patterns = Vec::new();
    let mut output = String::from(DEFAULT_OUTPUT);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Invocation::Help),
            "--all" | "--checker" | "--wave" => {
                let param = args
                    .next()
                    .ok_or_else(|| format!("The '{arg}' argument requires a parameter"))?;
                let value = parse_pattern_value(&param).map_err(|e| e.to_string())?;
                let mode = PatternMode::from_str(&arg).map_err(|e| e.to_string())?;
                patterns.push((mode, value));
            }
            "--output" | "-o" => {
                output = args
                    .next()
                    .ok_or_else(|| format!("The '{arg}' argument requires a parameter"))?;
            }
            _ => return Err(format!("Unknown argument '{arg}'")),
        }
    }

    Ok(Invocation::Write { patterns, output })
}

fn write_tdacs(patterns: &[(PatternMode, u8)], output: &str) -> Result<(), String> {
    let mut tdac_file = TdacFile::new();
    for (mode, value) in patterns {
        apply_pattern(&mut tdac_file, *mode, *value).map_err(|e| e.to_string())?;
    }

    if output == STDOUT_OUTPUT {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        tdac_file
            .save(&mut lock)
            .map_err(|e| format!("Got error '{e}' when writing to stdout"))?;
        lock.flush()
            .map_err(|e| format!("Got error '{e}' when writing to stdout"))?;
    } else {
        tdac_file
            .save_to_file(&PathBuf::from(output))
            .map_err(|e| format!("Got error '{e}' when saving to filename '{output}'"))?;
        println!("Wrote output to '{output}'");
    }
    Ok(())
}

// Logs go to stderr so that '-' output stays clean
fn init_logging() -> Result<(), log::SetLoggerError> {
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Warn,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
}

fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("Could not create logging: {e}");
        return ExitCode::FAILURE;
    }

    match parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Help) => {
            print!("{USAGE}");
            ExitCode::SUCCESS
        }
        Ok(Invocation::Write { patterns, output }) => match write_tdacs(&patterns, &output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("{e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprint!("{e}\n\n{USAGE}");
            ExitCode::FAILURE
        }
    }
}
