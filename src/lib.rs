//! # cdio-cdda
//!
//! A CD-DA device session layer over libcdio for media pipeline sources.
//!
//! This library binds CD device access to the open/read/close lifecycle a
//! host pipeline element expects: open a device and enumerate its tracks
//! (with CD-TEXT where available), read raw 2352-byte audio sectors one at a
//! time, close. Track layout parsing and disc I/O are delegated to libcdio;
//! this crate adds the session state machine, the read-speed property and
//! error-code translation.
//!
//! ## Features
//!
//! - Track enumeration with audio/data classification and CD-TEXT metadata
//! - Per-sector raw audio reads returning fixed-size owned buffers
//! - Atomic read-speed property, applied once per open
//! - Best-effort device probing and default-device lookup
//! - Stub backend for hardware-free testing (`libcdio` feature gates the
//!   real backend)
//!
//! ## Example
//!
//! ```no_run
//! use cdio_cdda::DeviceSession;
//!
//! # fn main() -> cdio_cdda::Result<()> {
//! let mut session = DeviceSession::new();
//! session.set_read_speed(8);
//!
//! let tracks = session.open("/dev/cdrom")?;
//! for track in &tracks {
//!     println!("track {}: sectors {}..={}", track.number, track.start, track.end);
//! }
//!
//! if let Some(first) = tracks.iter().find(|t| t.is_audio) {
//!     let frame = session.read_sector(first.start)?;
//!     // Hand the 2352-byte frame to the pipeline...
//!     let _ = frame.as_bytes();
//! }
//!
//! session.close()?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod types;

mod drive;
mod session;

pub use constants::*;
pub use drive::{default_device, probe_devices, StubDisc};
pub use error::{Error, Result, TransportError};
pub use session::{AudioCdSource, DeviceSession, ReadSpeedControl};
pub use types::{DiscMode, Lsn, SectorBuffer, TrackDescriptor, TrackNum, TrackText};
