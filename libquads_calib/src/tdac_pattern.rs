use std::f64::consts::PI;
use std::fmt::Display;
use std::str::FromStr;

use super::constants::*;
use super::error::PatternError;
use super::tdac_file::TdacFile;

/// The test patterns which can be written into a TdacFile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    All,
    Checker,
    Wave,
}

impl PatternMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Checker => "checker",
            Self::Wave => "wave",
        }
    }

    /// The command line flag for this pattern, i.e. `--checker`
    pub fn flag(&self) -> String {
        format!("--{}", self.name())
    }
}

impl Display for PatternMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PatternMode {
    type Err = PatternError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches("--") {
            "all" => Ok(Self::All),
            "checker" => Ok(Self::Checker),
            "wave" => Ok(Self::Wave),
            _ => Err(PatternError::BadMode(s.to_string())),
        }
    }
}

/// Parse a pattern parameter. Decimal, or hex with a `0x`/`0X` prefix. Must fit in a byte.
pub fn parse_pattern_value(param: &str) -> Result<u8, PatternError> {
    let parsed = if let Some(hex) = param
        .strip_prefix("0x")
        .or_else(|| param.strip_prefix("0X"))
    {
        u8::from_str_radix(hex, 16)
    } else {
        param.parse::<u8>()
    };
    parsed.map_err(|_| PatternError::BadParameter(param.to_string()))
}

/// Apply a pattern with the default values (`0x47` and `0x00`).
///
/// For `All` the parameter is the pixel value, otherwise it is the pattern size.
pub fn apply_pattern(file: &mut TdacFile, mode: PatternMode, param: u8) -> Result<(), PatternError> {
    match mode {
        PatternMode::All => {
            write_all(file, param);
            Ok(())
        }
        PatternMode::Checker => write_checkerboard(
            file,
            param as u32,
            PATTERN_FIRST_VALUE,
            PATTERN_ALTERNATING_VALUE,
        ),
        PatternMode::Wave => write_wave(
            file,
            param as u32,
            PATTERN_FIRST_VALUE,
            PATTERN_ALTERNATING_VALUE,
        ),
    }
}

/// Set every pixel to the same value
pub fn write_all(file: &mut TdacFile, value: u8) {
    for column in 0..NUMBER_OF_COLUMNS {
        for row in 0..NUMBER_OF_ROWS {
            file.set_pixel(column, row, value);
        }
    }
}

/// Squares of width `size`. Only squares odd in both directions get the alternating value.
pub fn write_checkerboard(
    file: &mut TdacFile,
    size: u32,
    first_value: u8,
    alternating_value: u8,
) -> Result<(), PatternError> {
    if size == 0 {
        return Err(PatternError::ZeroSize);
    }
    for column in 0..NUMBER_OF_COLUMNS as u32 {
        for row in 0..NUMBER_OF_ROWS as u32 {
            let value = if (column / size) % 2 == 1 && (row / size) % 2 == 1 {
                alternating_value
            } else {
                first_value
            };
            file.set_pixel(column as usize, row as usize, value);
        }
    }
    Ok(())
}

/// Truncate to an unsigned the way a two's-complement cast does.
///
/// The reference files were produced with a wrapping cast, so `-1.0` becomes `u32::MAX`
/// instead of saturating to zero.
fn wrapping_truncate(value: f64) -> u32 {
    value as i64 as u32
}

/// Bands of width `size` along the columns, bent by a sine along the rows
pub fn write_wave(
    file: &mut TdacFile,
    size: u32,
    first_value: u8,
    alternating_value: u8,
) -> Result<(), PatternError> {
    if size == 0 {
        return Err(PatternError::ZeroSize);
    }
    for column in 0..NUMBER_OF_COLUMNS as u32 {
        for row in 0..NUMBER_OF_ROWS as u32 {
            let shift = (row as f64 * PI / 2.0 / size as f64).sin();
            let position = wrapping_truncate(column as f64 + shift);
            let value = if (position / size) % 2 == 1 {
                alternating_value
            } else {
                first_value
            };
            file.set_pixel(column as usize, row as usize, value);
        }
    }
    Ok(())
}
