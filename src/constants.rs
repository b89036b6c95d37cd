//! Constants used throughout the library.
//!
//! The frame geometry values match the Red Book CD-DA format and the
//! corresponding libcdio definitions.

/// CD frame size in bytes (2352 bytes per sector)
pub const CDIO_CD_FRAMESIZE_RAW: usize = 2352;

/// Number of 16-bit samples per CD frame (2352 / 2 = 1176)
pub const CD_FRAMEWORDS: usize = CDIO_CD_FRAMESIZE_RAW / 2;

/// Maximum number of tracks on a CD
pub const MAXTRK: usize = 100;

/// Sample rate for CD audio (44.1 kHz)
pub const CD_SAMPLE_RATE: u32 = 44100;

/// Number of channels (stereo)
pub const CD_CHANNELS: u8 = 2;

/// Bits per sample
pub const CD_BITS_PER_SAMPLE: u8 = 16;

/// Invalid track marker reported by libcdio (`CDIO_INVALID_TRACK`)
pub const CDIO_INVALID_TRACK: u8 = 0xFF;

/// Read speed value meaning "use the drive default"
pub const READ_SPEED_DEFAULT: i32 = -1;

/// Maximum accepted read speed multiplier
pub const READ_SPEED_MAX: i32 = 100;

/// Version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
