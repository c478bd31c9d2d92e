use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::constants::*;
use super::error::MaskError;

/// The per-pixel edge mask rule.
///
/// Disables a border of `MASK_BORDER` pixels on the low side of each axis. The
/// high side uses `>` against `size - border`, which leaves one pixel less masked
/// there; this matches the masks loaded onto the hardware so it is kept as is.
/// The single known defective pixel is always disabled.
pub fn pixel_state(col: usize, row: usize) -> u8 {
    let x = MASK_BORDER;
    if col < x
        || col > NUMBER_OF_COLUMNS - x
        || row < x
        || row > NUMBER_OF_ROWS - x
        || (col == MASK_DEFECT_COLUMN && row == MASK_DEFECT_ROW)
    {
        PIXEL_DISABLED
    } else {
        PIXEL_ENABLED
    }
}

/// The trailer appended after the rows of each column.
///
/// End-of-column sentinel, the column number, and the LVDS error flag (unused, always zero).
pub fn column_trailer(col: u8) -> [u8; COLUMN_TRAILER_SIZE] {
    [
        TRAILER_MARKER,
        TRAILER_MARKER,
        TRAILER_MARKER,
        col,
        TRAILER_MARKER,
        TRAILER_ERROR_FLAG,
    ]
}

/// MaskVector is the full pixel mask as it is sent to a sensor.
///
/// For every column there are `NUMBER_OF_ROWS` enable bytes followed by the
/// column trailer, so every column occupies exactly `COLUMN_BLOCK_SIZE` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskVector {
    data: Vec<u8>,
}

impl MaskVector {
    /// Get the whole mask in emission order
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the enable byte of a pixel. Returns None if out of the sensor
    pub fn pixel(&self, col: usize, row: usize) -> Option<u8> {
        if col >= NUMBER_OF_COLUMNS || row >= NUMBER_OF_ROWS {
            return None;
        }
        self.data.get(col * COLUMN_BLOCK_SIZE + row).copied()
    }

    /// Get the trailer bytes of a column
    pub fn trailer(&self, col: usize) -> Option<&[u8]> {
        if col >= NUMBER_OF_COLUMNS {
            return None;
        }
        let start = col * COLUMN_BLOCK_SIZE + NUMBER_OF_ROWS;
        self.data.get(start..start + COLUMN_TRAILER_SIZE)
    }

    /// Write the mask as a JSON array of integers, replacing anything at path
    pub fn write_json(&self, path: &Path) -> Result<(), MaskError> {
        log::info!("Writing mask to {}...", path.to_string_lossy());
        let mut writer = BufWriter::new(File::create(path)?);
        // Vec<u8> serializes as a sequence of integers, not as a byte string
        serde_json::to_writer(&mut writer, &self.data)?;
        writer.flush()?;
        Ok(())
    }
}

/// Build the edge mask in memory
pub fn generate_mask() -> MaskVector {
    let mut data: Vec<u8> = Vec::with_capacity(PIXEL_IMAGE_SIZE);
    for col in 0..NUMBER_OF_COLUMNS {
        for row in 0..NUMBER_OF_ROWS {
            data.push(pixel_state(col, row));
        }
        data.extend_from_slice(&column_trailer(col as u8));
    }
    MaskVector { data }
}
