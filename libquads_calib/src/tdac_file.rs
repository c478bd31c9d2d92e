use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::constants::*;
use super::error::TdacFileError;

/// TdacFile is the per-pixel trim and enable image loaded onto a sensor.
///
/// Data is stored column major, `COLUMN_BLOCK_SIZE` entries per column. Each pixel byte is
///
/// - `0x40` pixel enabled (cleared to mask it)
/// - `0x38` threshold high trim (ThHigh)
/// - `0x07` threshold low trim (ThLow)
///
/// The top bit is unused. Entries 250 to 255 of every column are not pixels; they hold the
/// column trailer that the readout expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdacFile {
    data: Box<[u8; PIXEL_IMAGE_SIZE]>,
}

impl Default for TdacFile {
    /// All pixels enabled with zero trims
    fn default() -> Self {
        let mut data = Box::new([PIXEL_ENABLED; PIXEL_IMAGE_SIZE]);
        for column in 0..NUMBER_OF_COLUMNS {
            let start = column * COLUMN_BLOCK_SIZE + NUMBER_OF_ROWS;
            data[start..start + COLUMN_TRAILER_SIZE].copy_from_slice(&[
                TRAILER_MARKER,
                TRAILER_MARKER,
                TRAILER_MARKER,
                TDAC_TRAILER_COLUMN_COUNT,
                TRAILER_MARKER,
                TRAILER_ERROR_FLAG,
            ]);
        }
        Self { data }
    }
}

impl TdacFile {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(column: usize, row: usize) -> usize {
        column * COLUMN_BLOCK_SIZE + row
    }

    pub fn pixel(&self, column: usize, row: usize) -> u8 {
        self.data[Self::index(column, row)]
    }

    pub fn pixel_mut(&mut self, column: usize, row: usize) -> &mut u8 {
        &mut self.data[Self::index(column, row)]
    }

    pub fn set_pixel(&mut self, column: usize, row: usize, value: u8) {
        *self.pixel_mut(column, row) = value;
    }

    pub fn is_enabled(&self, column: usize, row: usize) -> bool {
        self.pixel(column, row) & ENABLED_BITMASK != 0
    }

    pub fn set_enabled(&mut self, column: usize, row: usize, enabled: bool) {
        let current = self.pixel_mut(column, row);
        if enabled {
            *current |= ENABLED_BITMASK;
        } else {
            *current &= !ENABLED_BITMASK;
        }
    }

    pub fn is_masked(&self, column: usize, row: usize) -> bool {
        !self.is_enabled(column, row)
    }

    pub fn set_masked(&mut self, column: usize, row: usize, masked: bool) {
        self.set_enabled(column, row, !masked)
    }

    /// ThHigh trim, 3 bits
    pub fn th_high_trim(&self, column: usize, row: usize) -> u8 {
        (self.pixel(column, row) & TH_HIGH_TRIM_BITMASK) >> TH_HIGH_TRIM_SHIFT
    }

    pub fn set_th_high_trim(&mut self, column: usize, row: usize, value: u8) {
        let current = self.pixel_mut(column, row);
        *current = (*current & !TH_HIGH_TRIM_BITMASK)
            | ((value << TH_HIGH_TRIM_SHIFT) & TH_HIGH_TRIM_BITMASK);
    }

    /// ThLow trim, 3 bits
    pub fn th_low_trim(&self, column: usize, row: usize) -> u8 {
        self.pixel(column, row) & TH_LOW_TRIM_BITMASK
    }

    pub fn set_th_low_trim(&mut self, column: usize, row: usize, value: u8) {
        let current = self.pixel_mut(column, row);
        *current = (*current & !TH_LOW_TRIM_BITMASK) | (value & TH_LOW_TRIM_BITMASK);
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Read a full image from a reader. Anything past the image is ignored.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self, TdacFileError> {
        let mut file = Self::default();
        let mut read = 0;
        while read < PIXEL_IMAGE_SIZE {
            let n = reader.read(&mut file.data[read..])?;
            if n == 0 {
                return Err(TdacFileError::IncorrectSize(read));
            }
            read += n;
        }
        Ok(file)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, TdacFileError> {
        if !path.exists() {
            return Err(TdacFileError::BadFilePath(path.to_path_buf()));
        }
        let mut file = File::open(path)?;
        Self::load(&mut file)
    }

    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), TdacFileError> {
        writer.write_all(self.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Write the image to path, truncating any existing file
    pub fn save_to_file(&self, path: &Path) -> Result<(), TdacFileError> {
        let mut file = File::create(path)?;
        self.save(&mut file)
    }
}
