// Geometry of a single MuPix sensor as seen by the readout
pub const NUMBER_OF_COLUMNS: usize = 256;
pub const NUMBER_OF_ROWS: usize = 250;
/// Every column block is padded to 256 entries; the last 6 are the trailer
pub const COLUMN_BLOCK_SIZE: usize = 256;
pub const COLUMN_TRAILER_SIZE: usize = COLUMN_BLOCK_SIZE - NUMBER_OF_ROWS;
pub const PIXEL_IMAGE_SIZE: usize = NUMBER_OF_COLUMNS * COLUMN_BLOCK_SIZE;

// Pixel byte values
pub const PIXEL_DISABLED: u8 = 0x00;
pub const PIXEL_ENABLED: u8 = 0x40;

// Column trailer markers
pub const TRAILER_MARKER: u8 = 0xda;
pub const TRAILER_ERROR_FLAG: u8 = 0x00;
/// The TDAC file stores a fixed column count in the trailer instead of the column number
pub const TDAC_TRAILER_COLUMN_COUNT: u8 = 255;

// Mask edge parameters
pub const MASK_BORDER: usize = 10;
pub const MASK_DEFECT_COLUMN: usize = 44;
pub const MASK_DEFECT_ROW: usize = 19;

// TDAC bit layout
pub const ENABLED_BITMASK: u8 = 0b0100_0000;
pub const TH_HIGH_TRIM_BITMASK: u8 = 0b0011_1000;
pub const TH_HIGH_TRIM_SHIFT: u8 = 3;
pub const TH_LOW_TRIM_BITMASK: u8 = 0b0000_0111;

// Default pattern values
pub const PATTERN_FIRST_VALUE: u8 = 0x47;
pub const PATTERN_ALTERNATING_VALUE: u8 = 0x00;

// Sequencer control
pub const SEQUENCER_STOP_IMMEDIATELY: &str = "/Sequencer/Command/Stop immediately";
