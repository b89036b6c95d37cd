//! Core type definitions.

use crate::constants::CDIO_CD_FRAMESIZE_RAW;

/// Logical Sector Number - absolute sector position on disc
pub type Lsn = i32;

/// Track number (1-99, or 0xAA for lead-out)
pub type TrackNum = u8;

/// Disc mode as reported by the drive.
///
/// Only [`DiscMode::CdDa`] and [`DiscMode::CdMixed`] carry raw audio that
/// this library can read; everything else is rejected at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscMode {
    /// Pure audio disc (Red Book CD-DA)
    CdDa,
    /// Data-only disc (mode 1 or mode 2)
    CdData,
    /// CD-ROM XA disc
    CdXa,
    /// Mixed-mode disc (audio and data sessions coexist)
    CdMixed,
    /// Any DVD variant
    Dvd,
    /// Drive reported no disc mode information
    NoInfo,
    /// Drive reported an error while querying the mode
    Error,
}

impl DiscMode {
    /// Whether raw CD-DA sectors can be read from a disc in this mode.
    #[must_use]
    pub fn is_cdda_readable(self) -> bool {
        matches!(self, DiscMode::CdDa | DiscMode::CdMixed)
    }
}

impl std::fmt::Display for DiscMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DiscMode::CdDa => "CD-DA",
            DiscMode::CdData => "CD-DATA",
            DiscMode::CdXa => "CD-XA",
            DiscMode::CdMixed => "CD-MIXED",
            DiscMode::Dvd => "DVD",
            DiscMode::NoInfo => "no-info",
            DiscMode::Error => "error",
        };
        f.write_str(name)
    }
}

/// Optional CD-TEXT metadata for a single track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackText {
    /// Track title, if present on the disc
    pub title: Option<String>,
    /// Track performer, if present on the disc
    pub performer: Option<String>,
}

impl TrackText {
    /// True when neither field carries any text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.performer.is_none()
    }
}

/// A single enumerated track.
///
/// Produced by [`DeviceSession::open`](crate::DeviceSession::open) and
/// immutable afterwards. `end` is inclusive: the track occupies the sector
/// range `[start, end]`, and for adjacent tracks `prev.end + 1 == next.start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    /// Track number as reported by the TOC (1-based, contiguous)
    pub number: TrackNum,
    /// First sector of the track (LSN)
    pub start: Lsn,
    /// Last sector of the track (LSN, inclusive)
    pub end: Lsn,
    /// Whether this is an audio track (false for data tracks on mixed discs)
    pub is_audio: bool,
    /// CD-TEXT metadata, when the drive and disc provide it
    pub text: Option<TrackText>,
}

impl TrackDescriptor {
    /// Number of sectors in the track.
    #[must_use]
    pub fn sector_count(&self) -> i32 {
        self.end - self.start + 1
    }

    /// Whether `lsn` falls inside this track's sector range.
    #[must_use]
    pub fn contains(&self, lsn: Lsn) -> bool {
        lsn >= self.start && lsn <= self.end
    }
}

/// One raw CD-DA audio frame (2352 bytes).
///
/// Returned by a successful sector read; ownership transfers to the caller
/// and the session keeps no reference to it. A `SectorBuffer` is always
/// completely filled - a failed read yields an error, never a partial frame.
#[derive(Clone, PartialEq, Eq)]
pub struct SectorBuffer {
    data: Box<[u8; CDIO_CD_FRAMESIZE_RAW]>,
}

impl SectorBuffer {
    /// Wrap a fully populated raw frame.
    pub(crate) fn new(data: Box<[u8; CDIO_CD_FRAMESIZE_RAW]>) -> Self {
        Self { data }
    }

    /// Raw frame bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..]
    }

    /// Frame length in bytes; always [`CDIO_CD_FRAMESIZE_RAW`].
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        CDIO_CD_FRAMESIZE_RAW
    }

    /// Decode the frame as 16-bit little-endian samples.
    ///
    /// CD-DA audio is interleaved stereo, 16 bits per channel, little-endian
    /// on the wire.
    #[must_use]
    pub fn samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect()
    }

    /// Consume the buffer and return the raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl std::fmt::Debug for SectorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectorBuffer")
            .field("len", &CDIO_CD_FRAMESIZE_RAW)
            .finish_non_exhaustive()
    }
}

impl AsRef<[u8]> for SectorBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CD_FRAMEWORDS;

    #[test]
    fn test_discmode_readability() {
        assert!(DiscMode::CdDa.is_cdda_readable());
        assert!(DiscMode::CdMixed.is_cdda_readable());
        assert!(!DiscMode::CdData.is_cdda_readable());
        assert!(!DiscMode::Dvd.is_cdda_readable());
        assert!(!DiscMode::NoInfo.is_cdda_readable());
    }

    #[test]
    fn test_track_descriptor_range() {
        let track = TrackDescriptor {
            number: 1,
            start: 150,
            end: 1149,
            is_audio: true,
            text: None,
        };
        assert_eq!(track.sector_count(), 1000);
        assert!(track.contains(150));
        assert!(track.contains(1149));
        assert!(!track.contains(149));
        assert!(!track.contains(1150));
    }

    #[test]
    fn test_sector_buffer_samples() {
        let mut raw = Box::new([0u8; CDIO_CD_FRAMESIZE_RAW]);
        // First sample: 0x0201 little-endian
        raw[0] = 0x01;
        raw[1] = 0x02;
        let buf = SectorBuffer::new(raw);
        assert_eq!(buf.len(), CDIO_CD_FRAMESIZE_RAW);
        let samples = buf.samples();
        assert_eq!(samples.len(), CD_FRAMEWORDS);
        assert_eq!(samples[0], 0x0201);
        assert_eq!(samples[1], 0);
    }

    #[test]
    fn test_track_text_empty() {
        assert!(TrackText::default().is_empty());
        let text = TrackText {
            title: Some("Title".to_string()),
            performer: None,
        };
        assert!(!text.is_empty());
    }
}
