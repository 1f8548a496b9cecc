//! Local media: tracks, streams and the capture capability.

use crate::errors::CallError;
use common::protocol::CallType;
use std::fmt;
use std::sync::Arc;

/// Kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single audio or video track owned by the media engine.
///
/// Enabling or disabling a track only gates what it sends. It never
/// renegotiates.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> String;
    fn kind(&self) -> TrackKind;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Release the underlying source. A stopped track stays stopped.
    fn stop(&self);
}

/// Shared handle to a track.
pub type SharedTrack = Arc<dyn MediaTrack>;

/// What to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    /// Audio always, video only for video calls.
    #[must_use]
    pub const fn for_call(call_type: CallType) -> Self {
        Self {
            audio: true,
            video: call_type.wants_video(),
        }
    }

    /// A camera track alone, used when leaving screen share.
    #[must_use]
    pub const fn camera_only() -> Self {
        Self {
            audio: false,
            video: true,
        }
    }
}

/// Plain description of a track, for snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub enabled: bool,
}

impl TrackInfo {
    fn of(track: &SharedTrack) -> Self {
        Self {
            id: track.id(),
            kind: track.kind(),
            enabled: track.is_enabled(),
        }
    }
}

/// An ordered set of tracks.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<SharedTrack>,
}

impl MediaStream {
    #[must_use]
    pub fn new(tracks: Vec<SharedTrack>) -> Self {
        Self { tracks }
    }

    #[must_use]
    pub fn tracks(&self) -> &[SharedTrack] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &SharedTrack> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    /// First video track, if any.
    #[must_use]
    pub fn video_track(&self) -> Option<SharedTrack> {
        self.tracks_of(TrackKind::Video).next().cloned()
    }

    #[must_use]
    pub fn has_video(&self) -> bool {
        self.tracks_of(TrackKind::Video).next().is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Put `track` in place of the first track of the same kind, or append
    /// it. Returns the displaced track.
    pub fn set_track(&mut self, track: SharedTrack) -> Option<SharedTrack> {
        let kind = track.kind();
        match self.tracks.iter_mut().find(|t| t.kind() == kind) {
            Some(slot) => Some(std::mem::replace(slot, track)),
            None => {
                self.tracks.push(track);
                None
            }
        }
    }

    /// Enable or disable every track of `kind`.
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) {
        for track in self.tracks_of(kind) {
            track.set_enabled(enabled);
        }
    }

    /// Stop every track.
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    #[must_use]
    pub fn info(&self) -> Vec<TrackInfo> {
        self.tracks.iter().map(TrackInfo::of).collect()
    }
}

/// Capture capability provided by the media engine.
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Capture microphone and/or camera.
    ///
    /// # Errors
    ///
    /// `CallError::MediaAccessDenied` when the user or platform refuses.
    async fn get_user_media(&self, constraints: MediaConstraints)
        -> Result<MediaStream, CallError>;

    /// Capture a display surface.
    ///
    /// # Errors
    ///
    /// `CallError::MediaAccessDenied` when the user or platform refuses.
    async fn get_display_media(&self) -> Result<MediaStream, CallError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug)]
    struct Track {
        id: &'static str,
        kind: TrackKind,
        enabled: AtomicBool,
        stopped: AtomicBool,
    }

    impl Track {
        fn shared(id: &'static str, kind: TrackKind) -> Arc<Self> {
            Arc::new(Self {
                id,
                kind,
                enabled: AtomicBool::new(true),
                stopped: AtomicBool::new(false),
            })
        }
    }

    impl MediaTrack for Track {
        fn id(&self) -> String {
            self.id.to_string()
        }
        fn kind(&self) -> TrackKind {
            self.kind
        }
        fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
        }
        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_constraints_follow_call_type() {
        assert_eq!(
            MediaConstraints::for_call(CallType::Audio),
            MediaConstraints {
                audio: true,
                video: false
            }
        );
        assert_eq!(
            MediaConstraints::for_call(CallType::Video),
            MediaConstraints {
                audio: true,
                video: true
            }
        );
    }

    #[test]
    fn test_set_track_replaces_same_kind() {
        let mic = Track::shared("mic", TrackKind::Audio);
        let cam = Track::shared("cam", TrackKind::Video);
        let screen = Track::shared("screen", TrackKind::Video);
        let mut stream = MediaStream::new(vec![mic as SharedTrack, cam as SharedTrack]);

        let displaced = stream.set_track(screen);

        assert_eq!(displaced.unwrap().id(), "cam");
        let ids: Vec<_> = stream.tracks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["mic", "screen"]);
    }

    #[test]
    fn test_set_track_appends_missing_kind() {
        let mic: SharedTrack = Track::shared("mic", TrackKind::Audio);
        let mut stream = MediaStream::new(vec![mic]);

        assert!(stream.set_track(Track::shared("cam", TrackKind::Video)).is_none());
        assert!(stream.has_video());
    }

    #[test]
    fn test_set_enabled_only_touches_kind() {
        let mic = Track::shared("mic", TrackKind::Audio);
        let cam = Track::shared("cam", TrackKind::Video);
        let stream = MediaStream::new(vec![mic.clone() as SharedTrack, cam.clone() as SharedTrack]);

        stream.set_enabled(TrackKind::Audio, false);

        assert!(!mic.is_enabled());
        assert!(cam.is_enabled());
    }

    #[test]
    fn test_stop_all() {
        let mic = Track::shared("mic", TrackKind::Audio);
        let cam = Track::shared("cam", TrackKind::Video);
        let stream = MediaStream::new(vec![mic.clone() as SharedTrack, cam.clone() as SharedTrack]);

        stream.stop_all();

        assert!(mic.stopped.load(Ordering::SeqCst));
        assert!(cam.stopped.load(Ordering::SeqCst));
    }
}
