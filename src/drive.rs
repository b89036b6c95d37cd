//! Disc handle abstraction.
//!
//! This module provides an abstraction layer for CD-ROM device access,
//! supporting both a stub implementation for testing and a real libcdio
//! backend when the `libcdio` feature is enabled.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::{
    constants::CDIO_CD_FRAMESIZE_RAW,
    error::{Error, Result, TransportError},
    types::{DiscMode, Lsn, SectorBuffer, TrackNum, TrackText},
};

#[cfg(feature = "libcdio")]
use std::{
    ffi::{CStr, CString},
    ptr,
};

#[cfg(feature = "libcdio")]
use libcdio_sys::{
    cdio_destroy, cdio_free_device_list, cdio_get_cdtext, cdio_get_default_device,
    cdio_get_devices, cdio_get_discmode, cdio_get_first_track_num, cdio_get_num_tracks,
    cdio_get_track_format, cdio_get_track_lsn, cdio_get_track_sec_count, cdio_open,
    cdio_read_audio_sectors, cdio_set_speed, cdtext_get_const,
    cdtext_field_t_CDTEXT_FIELD_PERFORMER, cdtext_field_t_CDTEXT_FIELD_TITLE,
    discmode_t_CDIO_DISC_MODE_CD_DA, discmode_t_CDIO_DISC_MODE_CD_DATA,
    discmode_t_CDIO_DISC_MODE_CD_MIXED, discmode_t_CDIO_DISC_MODE_CD_XA,
    discmode_t_CDIO_DISC_MODE_ERROR, discmode_t_CDIO_DISC_MODE_NO_INFO,
    driver_id_t_DRIVER_DEVICE, driver_id_t_DRIVER_UNKNOWN,
    driver_return_code_t_DRIVER_OP_SUCCESS, track_format_t_TRACK_FORMAT_AUDIO, CdIo_t,
    CDIO_INVALID_LSN,
};

/// An open disc device.
///
/// Exists between a successful open and the release of the handle; all
/// methods delegate to the selected backend.
#[derive(Debug)]
pub(crate) enum DiscHandle {
    /// Stub backend for testing and hardware-free development
    Stub(StubDisc),
    /// Real libcdio backend
    #[cfg(feature = "libcdio")]
    Libcdio(LibcdioHandle),
}

impl DiscHandle {
    /// Open a real device through libcdio.
    #[cfg(feature = "libcdio")]
    pub(crate) fn open(device: &str) -> Result<Self> {
        let device_cstr = CString::new(device)
            .map_err(|_| Error::InvalidDevicePath(device.to_string()))?;

        let p_cdio = unsafe { cdio_open(device_cstr.as_ptr(), driver_id_t_DRIVER_UNKNOWN) };
        if p_cdio.is_null() {
            return Err(Error::DeviceUnavailable {
                device: device.to_string(),
                cause: std::io::Error::last_os_error().to_string(),
            });
        }

        Ok(DiscHandle::Libcdio(LibcdioHandle { p_cdio }))
    }

    /// Open a real device - stub version when libcdio is not available.
    #[cfg(not(feature = "libcdio"))]
    pub(crate) fn open(device: &str) -> Result<Self> {
        Err(Error::DeviceUnavailable {
            device: device.to_string(),
            cause: "libcdio backend not compiled in".to_string(),
        })
    }

    /// Disc mode as reported by the drive.
    pub(crate) fn disc_mode(&self) -> DiscMode {
        match self {
            DiscHandle::Stub(disc) => disc.mode,
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => handle.disc_mode(),
        }
    }

    /// Number of the first track in the TOC.
    pub(crate) fn first_track_num(&self) -> TrackNum {
        match self {
            DiscHandle::Stub(disc) => disc.first_track,
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => unsafe { cdio_get_first_track_num(handle.p_cdio) },
        }
    }

    /// Number of tracks on the disc.
    pub(crate) fn num_tracks(&self) -> TrackNum {
        match self {
            DiscHandle::Stub(disc) => disc.tracks.len() as TrackNum,
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => unsafe { cdio_get_num_tracks(handle.p_cdio) },
        }
    }

    /// Start sector (LSN) of a track.
    pub(crate) fn track_start(&self, track: TrackNum) -> Result<Lsn> {
        match self {
            DiscHandle::Stub(disc) => disc
                .track(track)
                .map(|t| t.start)
                .ok_or_else(|| Error::TocReadError(format!("no such track: {track}"))),
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => {
                let lsn = unsafe { cdio_get_track_lsn(handle.p_cdio, track) };
                if lsn == CDIO_INVALID_LSN {
                    return Err(Error::TocReadError(format!("invalid LSN for track {track}")));
                }
                Ok(lsn)
            }
        }
    }

    /// Length of a track in sectors.
    pub(crate) fn track_sector_count(&self, track: TrackNum) -> Result<i32> {
        match self {
            DiscHandle::Stub(disc) => disc
                .track(track)
                .map(|t| t.sectors)
                .ok_or_else(|| Error::TocReadError(format!("no such track: {track}"))),
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => {
                let count = unsafe { cdio_get_track_sec_count(handle.p_cdio, track) };
                if count == 0 {
                    return Err(Error::TocReadError(format!(
                        "invalid sector count for track {track}"
                    )));
                }
                Ok(count as i32)
            }
        }
    }

    /// Whether a track holds CD-DA audio (as opposed to data).
    pub(crate) fn track_is_audio(&self, track: TrackNum) -> bool {
        match self {
            DiscHandle::Stub(disc) => disc.track(track).is_some_and(|t| t.is_audio),
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => {
                let format = unsafe { cdio_get_track_format(handle.p_cdio, track) };
                format == track_format_t_TRACK_FORMAT_AUDIO
            }
        }
    }

    /// CD-TEXT title and performer for a track.
    ///
    /// `Ok(None)` means the disc simply carries no text for this track;
    /// `Err(UnsupportedFeature)` means the backend cannot read CD-TEXT
    /// at all. Both are non-fatal to the caller.
    pub(crate) fn track_text(&self, track: TrackNum) -> Result<Option<TrackText>> {
        match self {
            DiscHandle::Stub(disc) => {
                if !disc.supports_cdtext {
                    return Err(Error::UnsupportedFeature("CD-TEXT"));
                }
                Ok(disc.track(track).and_then(|t| t.text.clone()))
            }
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => handle.track_text(track),
        }
    }

    /// Apply a drive read speed (multiplier, or -1 for default).
    pub(crate) fn set_speed(&mut self, speed: i32) -> Result<()> {
        match self {
            DiscHandle::Stub(disc) => {
                if !disc.supports_speed {
                    return Err(Error::UnsupportedFeature("drive speed control"));
                }
                disc.applied_speed = Some(speed);
                Ok(())
            }
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => {
                let result = unsafe { cdio_set_speed(handle.p_cdio, speed) };
                if result != driver_return_code_t_DRIVER_OP_SUCCESS {
                    return Err(Error::UnsupportedFeature("drive speed control"));
                }
                Ok(())
            }
        }
    }

    /// Read one raw 2352-byte audio sector.
    pub(crate) fn read_audio_sector(&self, lsn: Lsn) -> Result<SectorBuffer> {
        match self {
            DiscHandle::Stub(disc) => disc.read_sector(lsn),
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(handle) => {
                let mut buffer = Box::new([0u8; CDIO_CD_FRAMESIZE_RAW]);

                let result = unsafe {
                    cdio_read_audio_sectors(handle.p_cdio, buffer.as_mut_ptr().cast(), lsn, 1)
                };

                if result != driver_return_code_t_DRIVER_OP_SUCCESS {
                    return Err(Error::ReadFailure {
                        sector: lsn,
                        cause: TransportError::from(result as i32),
                    });
                }

                Ok(SectorBuffer::new(buffer))
            }
        }
    }

    /// Access the stub backend for test assertions.
    #[cfg(test)]
    pub(crate) fn as_stub(&self) -> Option<&StubDisc> {
        match self {
            DiscHandle::Stub(disc) => Some(disc),
            #[cfg(feature = "libcdio")]
            DiscHandle::Libcdio(_) => None,
        }
    }
}

/// Real libcdio device handle.
#[cfg(feature = "libcdio")]
pub(crate) struct LibcdioHandle {
    /// libcdio handle
    p_cdio: *mut CdIo_t,
}

// LibcdioHandle contains a raw pointer but is safe to move across threads;
// libcdio functions are thread-safe when called on distinct CdIo_t handles.
#[cfg(feature = "libcdio")]
unsafe impl Send for LibcdioHandle {}

#[cfg(feature = "libcdio")]
impl std::fmt::Debug for LibcdioHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibcdioHandle").finish_non_exhaustive()
    }
}

#[cfg(feature = "libcdio")]
impl Drop for LibcdioHandle {
    fn drop(&mut self) {
        if !self.p_cdio.is_null() {
            unsafe {
                cdio_destroy(self.p_cdio);
            }
        }
    }
}

#[cfg(feature = "libcdio")]
impl LibcdioHandle {
    fn disc_mode(&self) -> DiscMode {
        let mode = unsafe { cdio_get_discmode(self.p_cdio) };
        if mode == discmode_t_CDIO_DISC_MODE_CD_DA {
            DiscMode::CdDa
        } else if mode == discmode_t_CDIO_DISC_MODE_CD_MIXED {
            DiscMode::CdMixed
        } else if mode == discmode_t_CDIO_DISC_MODE_CD_DATA {
            DiscMode::CdData
        } else if mode == discmode_t_CDIO_DISC_MODE_CD_XA {
            DiscMode::CdXa
        } else if mode == discmode_t_CDIO_DISC_MODE_NO_INFO {
            DiscMode::NoInfo
        } else if mode == discmode_t_CDIO_DISC_MODE_ERROR {
            DiscMode::Error
        } else {
            // Everything else libcdio reports is a DVD variant
            DiscMode::Dvd
        }
    }

    fn track_text(&self, track: TrackNum) -> Result<Option<TrackText>> {
        let cdtext = unsafe { cdio_get_cdtext(self.p_cdio) };
        if cdtext.is_null() {
            return Ok(None);
        }

        let field = |field| {
            let value = unsafe { cdtext_get_const(cdtext, field, track) };
            if value.is_null() {
                return None;
            }
            unsafe { CStr::from_ptr(value) }
                .to_str()
                .ok()
                .map(String::from)
        };

        let text = TrackText {
            title: field(cdtext_field_t_CDTEXT_FIELD_TITLE),
            performer: field(cdtext_field_t_CDTEXT_FIELD_PERFORMER),
        };

        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

/// Get the default CD-ROM device path, if the platform knows one.
#[cfg(feature = "libcdio")]
pub fn default_device() -> Option<String> {
    let device_ptr = unsafe { cdio_get_default_device(ptr::null()) };
    if device_ptr.is_null() {
        return None;
    }

    let device = unsafe { CStr::from_ptr(device_ptr) }
        .to_str()
        .ok()
        .map(String::from);

    unsafe {
        libc::free(device_ptr.cast());
    }

    device
}

/// Get the default CD-ROM device path - stub version without libcdio.
#[cfg(not(feature = "libcdio"))]
pub fn default_device() -> Option<String> {
    None
}

/// Enumerate CD-ROM device paths, best effort.
///
/// An empty result means no devices were found; it is never an error.
/// The same physical drive may appear under more than one path (e.g.
/// /dev/cdrom and /dev/dvd).
#[cfg(feature = "libcdio")]
pub fn probe_devices() -> Vec<String> {
    let devices = unsafe { cdio_get_devices(driver_id_t_DRIVER_DEVICE) };
    if devices.is_null() {
        debug!("no CD devices found");
        return Vec::new();
    }

    let mut paths = Vec::new();

    // Null-terminated array of char*
    let mut i = 0;
    loop {
        let device_ptr = unsafe { *devices.offset(i) };
        if device_ptr.is_null() {
            break;
        }

        if let Ok(device) = unsafe { CStr::from_ptr(device_ptr) }.to_str() {
            debug!(device, "probed CD device");
            paths.push(device.to_string());
        }

        i += 1;
    }

    unsafe { cdio_free_device_list(devices) };

    paths
}

/// Enumerate CD-ROM device paths - stub version without libcdio.
#[cfg(not(feature = "libcdio"))]
pub fn probe_devices() -> Vec<String> {
    debug!("libcdio backend not compiled in, no devices to probe");
    Vec::new()
}

/// Synthetic disc for the stub backend.
///
/// Built up with the `with_*` methods and handed to
/// [`DeviceSession::with_stub`](crate::DeviceSession::with_stub); the session
/// clones it into a fresh handle on every open.
#[derive(Debug, Clone)]
pub struct StubDisc {
    mode: DiscMode,
    first_track: TrackNum,
    tracks: Vec<StubTrack>,
    sectors: HashMap<Lsn, Vec<u8>>,
    failing_sectors: HashSet<Lsn>,
    supports_speed: bool,
    supports_cdtext: bool,
    applied_speed: Option<i32>,
}

#[derive(Debug, Clone)]
struct StubTrack {
    start: Lsn,
    sectors: i32,
    is_audio: bool,
    text: Option<TrackText>,
}

impl StubDisc {
    /// Create an empty disc in the given mode.
    #[must_use]
    pub fn new(mode: DiscMode) -> Self {
        Self {
            mode,
            first_track: 1,
            tracks: Vec::new(),
            sectors: HashMap::new(),
            failing_sectors: HashSet::new(),
            supports_speed: true,
            supports_cdtext: true,
            applied_speed: None,
        }
    }

    /// Override the first track number reported by the TOC.
    #[must_use]
    pub fn with_first_track(mut self, first_track: TrackNum) -> Self {
        self.first_track = first_track;
        self
    }

    /// Append a track starting at `start` and spanning `sectors` sectors.
    #[must_use]
    pub fn with_track(mut self, start: Lsn, sectors: i32, is_audio: bool) -> Self {
        self.tracks.push(StubTrack {
            start,
            sectors,
            is_audio,
            text: None,
        });
        self
    }

    /// Attach CD-TEXT to the most recently added track.
    #[must_use]
    pub fn with_track_text(mut self, title: Option<&str>, performer: Option<&str>) -> Self {
        if let Some(track) = self.tracks.last_mut() {
            track.text = Some(TrackText {
                title: title.map(String::from),
                performer: performer.map(String::from),
            });
        }
        self
    }

    /// Preload the payload returned for a sector. Data shorter than a full
    /// frame is zero-padded.
    #[must_use]
    pub fn with_sector_data(mut self, lsn: Lsn, data: &[u8]) -> Self {
        self.sectors.insert(lsn, data.to_vec());
        self
    }

    /// Make reads of `lsn` fail with a driver error.
    #[must_use]
    pub fn with_failing_sector(mut self, lsn: Lsn) -> Self {
        self.failing_sectors.insert(lsn);
        self
    }

    /// Simulate a backend without drive speed control.
    #[must_use]
    pub fn without_speed_control(mut self) -> Self {
        self.supports_speed = false;
        self
    }

    /// Simulate a backend without CD-TEXT support.
    #[must_use]
    pub fn without_cdtext(mut self) -> Self {
        self.supports_cdtext = false;
        self
    }

    /// Speed last applied through the handle, if any.
    #[must_use]
    pub fn applied_speed(&self) -> Option<i32> {
        self.applied_speed
    }

    fn track(&self, number: TrackNum) -> Option<&StubTrack> {
        if number < self.first_track {
            return None;
        }
        self.tracks.get(usize::from(number - self.first_track))
    }

    fn read_sector(&self, lsn: Lsn) -> Result<SectorBuffer> {
        if self.failing_sectors.contains(&lsn) {
            return Err(Error::ReadFailure {
                sector: lsn,
                cause: TransportError::DriverError,
            });
        }

        let mut buffer = Box::new([0u8; CDIO_CD_FRAMESIZE_RAW]);
        if let Some(data) = self.sectors.get(&lsn) {
            let copy_len = data.len().min(CDIO_CD_FRAMESIZE_RAW);
            buffer[..copy_len].copy_from_slice(&data[..copy_len]);
        }
        Ok(SectorBuffer::new(buffer))
    }
}
