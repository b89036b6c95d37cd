//! Device session lifecycle.
//!
//! A [`DeviceSession`] owns one open/close cycle of a CD device on behalf of
//! a host pipeline element: open and enumerate tracks, read raw sectors one
//! at a time, close. The host serializes all calls; the only state shared
//! across threads is the read-speed property, which is a single atomic
//! integer sampled once per open.

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use tracing::{debug, warn};

use crate::{
    constants::{CDIO_INVALID_TRACK, MAXTRK, READ_SPEED_DEFAULT, READ_SPEED_MAX},
    drive::{self, DiscHandle, StubDisc},
    error::{Error, Result},
    types::{Lsn, SectorBuffer, TrackDescriptor},
};

/// Capability interface a host scheduler drives.
///
/// Mirrors the open/close/read/probe surface a pipeline source element
/// expects from its disc backend. [`DeviceSession`] is the libcdio adapter
/// implementing it.
pub trait AudioCdSource {
    /// Open a device and enumerate its tracks.
    ///
    /// # Errors
    ///
    /// See [`DeviceSession::open`].
    fn open(&mut self, device: &str) -> Result<Vec<TrackDescriptor>>;

    /// Read one raw audio sector.
    ///
    /// # Errors
    ///
    /// See [`DeviceSession::read_sector`].
    fn read_sector(&mut self, sector: Lsn) -> Result<SectorBuffer>;

    /// Release the device handle.
    ///
    /// # Errors
    ///
    /// See [`DeviceSession::close`].
    fn close(&mut self) -> Result<()>;

    /// Enumerate candidate device paths, best effort.
    fn probe_devices(&self) -> Vec<String>;

    /// Default device path, if the platform knows one.
    fn default_device(&self) -> Option<String>;
}

/// Cloneable handle to a session's read-speed property.
///
/// Lets property plumbing on another logical thread update the speed while
/// the session thread is inside open/read calls. The new value takes effect
/// on the next open; an already-open handle keeps the speed it was opened
/// with.
#[derive(Debug, Clone)]
pub struct ReadSpeedControl {
    speed: Arc<AtomicI32>,
}

impl ReadSpeedControl {
    /// Current speed setting (-1 means drive default).
    #[must_use]
    pub fn get(&self) -> i32 {
        self.speed.load(Ordering::SeqCst)
    }

    /// Update the speed setting, clamped to [-1, 100].
    pub fn set(&self, speed: i32) {
        self.speed
            .store(clamp_speed(speed), Ordering::SeqCst);
    }
}

/// Clamp policy for the read-speed property: out-of-range values are pulled
/// to the nearest bound rather than rejected.
fn clamp_speed(speed: i32) -> i32 {
    speed.clamp(READ_SPEED_DEFAULT, READ_SPEED_MAX)
}

/// One open/close cycle of a CD device.
///
/// State machine: `Closed --open(ok)--> Open --close()--> Closed`, and
/// `Closed --open(err)--> Closed` with no partial state. Reading sectors is
/// legal only while open. Track descriptors and sector buffers handed out
/// stay valid after close; they hold no reference to the device handle.
#[derive(Debug)]
pub struct DeviceSession {
    handle: Option<DiscHandle>,
    tracks: Vec<TrackDescriptor>,
    read_speed: Arc<AtomicI32>,
    stub_template: Option<StubDisc>,
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSession {
    /// Create a closed session backed by the real device backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: None,
            tracks: Vec::new(),
            read_speed: Arc::new(AtomicI32::new(READ_SPEED_DEFAULT)),
            stub_template: None,
        }
    }

    /// Create a closed session that opens the given synthetic disc instead
    /// of real hardware. Every open clones a fresh handle from the template.
    #[must_use]
    pub fn with_stub(disc: StubDisc) -> Self {
        Self {
            handle: None,
            tracks: Vec::new(),
            read_speed: Arc::new(AtomicI32::new(READ_SPEED_DEFAULT)),
            stub_template: Some(disc),
        }
    }

    /// Whether the session currently holds a device handle.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Track descriptors from the most recent successful open.
    #[must_use]
    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    /// Current read-speed setting (-1 means drive default).
    #[must_use]
    pub fn read_speed(&self) -> i32 {
        self.read_speed.load(Ordering::SeqCst)
    }

    /// Update the read-speed setting, clamped to [-1, 100].
    ///
    /// Takes effect on the next open; it is applied to the drive once, right
    /// after a successful open, and never re-read mid-session.
    pub fn set_read_speed(&self, speed: i32) {
        self.read_speed
            .store(clamp_speed(speed), Ordering::SeqCst);
    }

    /// Handle for updating the read speed from another thread.
    #[must_use]
    pub fn speed_control(&self) -> ReadSpeedControl {
        ReadSpeedControl {
            speed: Arc::clone(&self.read_speed),
        }
    }

    /// Open a device and enumerate its tracks, index-ascending.
    ///
    /// A disc with no tracks (or an invalid first-track number) is not an
    /// error at this layer: the session opens and the list comes back empty,
    /// for the host to turn into its own "disc has no tracks" error.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyDevicePath`] if `device` is empty
    /// - [`Error::AlreadyOpen`] if the session already holds a handle
    /// - [`Error::DeviceUnavailable`] if the device cannot be opened
    /// - [`Error::NotAudioDisc`] unless the disc is CD-DA or mixed mode
    /// - [`Error::TocReadError`] if track enumeration fails
    ///
    /// On any error the session is left closed with no partial state.
    pub fn open(&mut self, device: &str) -> Result<Vec<TrackDescriptor>> {
        if device.is_empty() {
            return Err(Error::EmptyDevicePath);
        }
        if self.handle.is_some() {
            return Err(Error::AlreadyOpen);
        }

        debug!(device, "opening CD device");

        let mut handle = match &self.stub_template {
            Some(disc) => DiscHandle::Stub(disc.clone()),
            None => DiscHandle::open(device)?,
        };

        let mode = handle.disc_mode();
        debug!(%mode, "disc mode");
        if !mode.is_cdda_readable() {
            // Dropping the handle releases the device
            return Err(Error::NotAudioDisc { mode });
        }

        let num_tracks = handle.num_tracks();
        let first_track = handle.first_track_num();

        // Backend-supplied values; a malformed TOC must degrade to "no
        // tracks", not arithmetic overflow. The highest usable track number
        // is 254 (255 is the invalid-track marker).
        let track_span = usize::from(first_track) + usize::from(num_tracks);
        if num_tracks == 0
            || first_track == CDIO_INVALID_TRACK
            || usize::from(num_tracks) > MAXTRK
            || track_span > usize::from(CDIO_INVALID_TRACK)
        {
            debug!(num_tracks, first_track, "disc reports no usable tracks");
            self.tracks.clear();
            self.handle = Some(handle);
            return Ok(Vec::new());
        }

        // Sampled once per open; later property updates only affect the
        // next open.
        let speed = self.read_speed.load(Ordering::SeqCst);
        if speed != READ_SPEED_DEFAULT {
            match handle.set_speed(speed) {
                Ok(()) => debug!(speed, "applied drive read speed"),
                Err(err) => warn!(speed, %err, "could not set drive read speed"),
            }
        }

        debug!(num_tracks, first_track, "enumerating tracks");

        let mut tracks = Vec::with_capacity(usize::from(num_tracks));
        for i in 0..num_tracks {
            let number = first_track + i;
            let start = handle.track_start(number)?;
            let len = handle.track_sector_count(number)?;
            let is_audio = handle.track_is_audio(number);

            let text = match handle.track_text(number) {
                Ok(Some(text)) => Some(text),
                Ok(None) => {
                    debug!(track = number, "no CD-TEXT for track");
                    None
                }
                Err(err) => {
                    debug!(track = number, %err, "CD-TEXT not available");
                    None
                }
            };

            tracks.push(TrackDescriptor {
                number,
                start,
                // Inclusive end: the last sector that belongs to this track
                end: start + len - 1,
                is_audio,
                text,
            });
        }

        self.tracks = tracks.clone();
        self.handle = Some(handle);
        Ok(tracks)
    }

    /// Read one raw audio sector.
    ///
    /// Callers are expected to pass sectors inside an enumerated track's
    /// range; out-of-range sectors are handed to the backend as-is and fail
    /// or succeed at its discretion.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if no handle is held
    /// - [`Error::ReadFailure`] if the backend read fails; no buffer is
    ///   returned in that case
    pub fn read_sector(&mut self, sector: Lsn) -> Result<SectorBuffer> {
        let handle = self.handle.as_ref().ok_or(Error::SessionClosed)?;

        handle.read_audio_sector(sector).inspect_err(|err| {
            warn!(sector, %err, "sector read failed");
        })
    }

    /// Release the device handle.
    ///
    /// Descriptors and buffers obtained earlier stay valid; only further
    /// reads require a new open.
    ///
    /// # Errors
    ///
    /// [`Error::SessionClosed`] if the session holds no handle.
    pub fn close(&mut self) -> Result<()> {
        if self.handle.take().is_none() {
            return Err(Error::SessionClosed);
        }
        debug!("closed CD device");
        Ok(())
    }

    /// Stub backend of the currently open handle, for test assertions.
    #[cfg(test)]
    fn open_stub(&self) -> Option<&StubDisc> {
        self.handle.as_ref().and_then(DiscHandle::as_stub)
    }
}

impl AudioCdSource for DeviceSession {
    fn open(&mut self, device: &str) -> Result<Vec<TrackDescriptor>> {
        DeviceSession::open(self, device)
    }

    fn read_sector(&mut self, sector: Lsn) -> Result<SectorBuffer> {
        DeviceSession::read_sector(self, sector)
    }

    fn close(&mut self) -> Result<()> {
        DeviceSession::close(self)
    }

    fn probe_devices(&self) -> Vec<String> {
        drive::probe_devices()
    }

    fn default_device(&self) -> Option<String> {
        drive::default_device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CDIO_CD_FRAMESIZE_RAW;
    use crate::types::DiscMode;

    fn mixed_disc() -> StubDisc {
        StubDisc::new(DiscMode::CdMixed)
            .with_track(0, 1000, true)
            .with_track(1000, 1000, false)
    }

    #[test]
    fn test_open_enumerates_mixed_disc() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        let tracks = session.open("/dev/cdrom").unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].number, 1);
        assert_eq!(tracks[0].start, 0);
        assert_eq!(tracks[0].end, 999);
        assert!(tracks[0].is_audio);
        assert_eq!(tracks[1].number, 2);
        assert_eq!(tracks[1].start, 1000);
        assert_eq!(tracks[1].end, 1999);
        assert!(!tracks[1].is_audio);

        assert!(session.is_open());
        assert_eq!(session.tracks(), &tracks[..]);
    }

    #[test]
    fn test_track_ranges_ordered_and_disjoint() {
        let disc = StubDisc::new(DiscMode::CdDa)
            .with_track(150, 10000, true)
            .with_track(10150, 20000, true)
            .with_track(30150, 5000, true);
        let mut session = DeviceSession::with_stub(disc);
        let tracks = session.open("/dev/cdrom").unwrap();

        for pair in tracks.windows(2) {
            assert!(pair[0].number < pair[1].number);
            assert!(pair[0].start <= pair[0].end);
            // Inclusive end: adjacent tracks are contiguous, never overlapping
            assert_eq!(pair[0].end + 1, pair[1].start);
        }
    }

    #[test]
    fn test_read_sector_inside_track() {
        let disc = mixed_disc().with_sector_data(500, &[0x5A; 32]);
        let mut session = DeviceSession::with_stub(disc);
        let tracks = session.open("/dev/cdrom").unwrap();
        assert!(tracks[0].contains(500));

        let buf = session.read_sector(500).unwrap();
        assert_eq!(buf.len(), CDIO_CD_FRAMESIZE_RAW);
        assert_eq!(buf.as_bytes()[0], 0x5A);

        // Data-track sector: backend-defined result, but no panic
        let _ = session.read_sector(1500);
    }

    #[test]
    fn test_read_failure_carries_sector() {
        let disc = mixed_disc().with_failing_sector(700);
        let mut session = DeviceSession::with_stub(disc);
        session.open("/dev/cdrom").unwrap();

        match session.read_sector(700) {
            Err(Error::ReadFailure { sector, .. }) => assert_eq!(sector, 700),
            other => panic!("expected ReadFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_non_audio_disc_rejected() {
        let disc = StubDisc::new(DiscMode::CdData).with_track(0, 1000, false);
        let mut session = DeviceSession::with_stub(disc);

        match session.open("/dev/cdrom") {
            Err(Error::NotAudioDisc { mode }) => assert_eq!(mode, DiscMode::CdData),
            other => panic!("expected NotAudioDisc, got {other:?}"),
        }

        // Handle released, session reusable
        assert!(!session.is_open());
        assert!(session.tracks().is_empty());
        assert!(matches!(session.close(), Err(Error::SessionClosed)));
    }

    #[test]
    fn test_zero_track_disc_opens_empty() {
        let mut session = DeviceSession::with_stub(StubDisc::new(DiscMode::CdDa));
        let tracks = session.open("/dev/cdrom").unwrap();
        assert!(tracks.is_empty());
        assert!(session.is_open());
        session.close().unwrap();
    }

    #[test]
    fn test_malformed_toc_track_span_opens_empty() {
        // first_track + num_tracks past the u8 track-number range must
        // degrade to an empty list, not overflow during enumeration
        let disc = (0..7).fold(
            StubDisc::new(DiscMode::CdDa).with_first_track(250),
            |disc, i| disc.with_track(i * 100, 100, true),
        );
        let mut session = DeviceSession::with_stub(disc);
        assert!(session.open("/dev/cdrom").unwrap().is_empty());
        assert!(session.is_open());
    }

    #[test]
    fn test_track_count_above_maxtrk_opens_empty() {
        let disc = (0..(MAXTRK as i32 + 20)).fold(
            StubDisc::new(DiscMode::CdDa),
            |disc, i| disc.with_track(i * 100, 100, true),
        );
        let mut session = DeviceSession::with_stub(disc);
        assert!(session.open("/dev/cdrom").unwrap().is_empty());
    }

    #[test]
    #[cfg(not(feature = "libcdio"))]
    fn test_open_without_backend_is_device_unavailable() {
        let mut session = DeviceSession::new();
        match session.open("/dev/nonexistent") {
            Err(Error::DeviceUnavailable { device, .. }) => {
                assert_eq!(device, "/dev/nonexistent");
            }
            other => panic!("expected DeviceUnavailable, got {other:?}"),
        }
        assert!(!session.is_open());
    }

    #[test]
    fn test_invalid_first_track_opens_empty() {
        let disc = StubDisc::new(DiscMode::CdDa)
            .with_first_track(CDIO_INVALID_TRACK)
            .with_track(0, 1000, true);
        let mut session = DeviceSession::with_stub(disc);
        assert!(session.open("/dev/cdrom").unwrap().is_empty());
    }

    #[test]
    fn test_empty_device_path_rejected() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        assert!(matches!(session.open(""), Err(Error::EmptyDevicePath)));
        assert!(!session.is_open());
    }

    #[test]
    fn test_double_open_rejected() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        session.open("/dev/cdrom").unwrap();
        assert!(matches!(
            session.open("/dev/cdrom"),
            Err(Error::AlreadyOpen)
        ));
        // First handle untouched
        assert!(session.is_open());
    }

    #[test]
    fn test_read_after_close_rejected() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        session.open("/dev/cdrom").unwrap();
        session.close().unwrap();

        assert!(matches!(
            session.read_sector(500),
            Err(Error::SessionClosed)
        ));
        assert!(matches!(session.close(), Err(Error::SessionClosed)));
    }

    #[test]
    fn test_descriptors_survive_close() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        let tracks = session.open("/dev/cdrom").unwrap();
        let buf = session.read_sector(0).unwrap();
        session.close().unwrap();

        // Obtained descriptors and buffers hold no handle reference
        assert_eq!(tracks[0].sector_count(), 1000);
        assert_eq!(buf.len(), CDIO_CD_FRAMESIZE_RAW);
    }

    #[test]
    fn test_reopen_after_close() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        session.open("/dev/cdrom").unwrap();
        session.close().unwrap();
        let tracks = session.open("/dev/cdrom").unwrap();
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_speed_clamp_policy() {
        let session = DeviceSession::with_stub(mixed_disc());
        assert_eq!(session.read_speed(), READ_SPEED_DEFAULT);

        session.set_read_speed(4);
        assert_eq!(session.read_speed(), 4);
        session.set_read_speed(150);
        assert_eq!(session.read_speed(), READ_SPEED_MAX);
        session.set_read_speed(-10);
        assert_eq!(session.read_speed(), READ_SPEED_DEFAULT);
    }

    #[test]
    fn test_speed_applied_once_at_open() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        session.set_read_speed(8);
        session.open("/dev/cdrom").unwrap();
        assert_eq!(session.open_stub().unwrap().applied_speed(), Some(8));

        // Changing the property mid-session leaves the open handle alone
        session.set_read_speed(16);
        session.read_sector(500).unwrap();
        assert_eq!(session.open_stub().unwrap().applied_speed(), Some(8));
    }

    #[test]
    fn test_default_speed_not_applied() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        session.open("/dev/cdrom").unwrap();
        assert_eq!(session.open_stub().unwrap().applied_speed(), None);
    }

    #[test]
    fn test_speed_set_failure_is_nonfatal() {
        let mut session =
            DeviceSession::with_stub(mixed_disc().without_speed_control());
        session.set_read_speed(8);
        // Open still succeeds; the failure is logged and swallowed
        let tracks = session.open("/dev/cdrom").unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(session.open_stub().unwrap().applied_speed(), None);
    }

    #[test]
    fn test_speed_control_handle_shares_property() {
        let session = DeviceSession::with_stub(mixed_disc());
        let control = session.speed_control();

        let updater = std::thread::spawn(move || control.set(12));
        updater.join().unwrap();

        assert_eq!(session.read_speed(), 12);
    }

    #[test]
    fn test_cdtext_enumeration() {
        let disc = StubDisc::new(DiscMode::CdDa)
            .with_track(0, 1000, true)
            .with_track_text(Some("So What"), Some("Miles Davis"))
            .with_track(1000, 1000, true);
        let mut session = DeviceSession::with_stub(disc);
        let tracks = session.open("/dev/cdrom").unwrap();

        let text = tracks[0].text.as_ref().unwrap();
        assert_eq!(text.title.as_deref(), Some("So What"));
        assert_eq!(text.performer.as_deref(), Some("Miles Davis"));
        assert!(tracks[1].text.is_none());
    }

    #[test]
    fn test_cdtext_unsupported_is_nonfatal() {
        let disc = mixed_disc().without_cdtext();
        let mut session = DeviceSession::with_stub(disc);
        let tracks = session.open("/dev/cdrom").unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| t.text.is_none()));
    }

    #[test]
    fn test_trait_object_dispatch() {
        let mut session = DeviceSession::with_stub(mixed_disc());
        let source: &mut dyn AudioCdSource = &mut session;

        let tracks = source.open("/dev/cdrom").unwrap();
        assert_eq!(tracks.len(), 2);
        source.read_sector(500).unwrap();
        source.close().unwrap();

        // Best effort, never an error
        let _ = source.probe_devices();
        let _ = source.default_device();
    }
}
