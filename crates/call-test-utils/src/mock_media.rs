//! Mock capture devices and tracks.

use call_client::errors::CallError;
use call_client::media::{
    MediaConstraints, MediaDevices, MediaStream, MediaTrack, SharedTrack, TrackKind,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A local track with observable enabled/stopped flags.
#[derive(Debug)]
pub struct MockTrack {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl MockTrack {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for MockTrack {
    fn id(&self) -> String {
        self.id.clone()
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

/// Mock capture devices.
///
/// Every capture creates fresh tracks named `{label}-mic-{n}`,
/// `{label}-cam-{n}` or `{label}-screen-{n}`, and keeps them for
/// inspection.
#[derive(Debug)]
pub struct MockDevices {
    label: String,
    deny_user_media: bool,
    deny_display_media: bool,
    user_media_calls: AtomicUsize,
    display_media_calls: AtomicUsize,
    tracks: Mutex<Vec<Arc<MockTrack>>>,
}

impl MockDevices {
    /// Devices that grant every request.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            deny_user_media: false,
            deny_display_media: false,
            user_media_calls: AtomicUsize::new(0),
            display_media_calls: AtomicUsize::new(0),
            tracks: Mutex::new(Vec::new()),
        }
    }

    /// Devices that refuse camera and microphone.
    #[must_use]
    pub fn denying(label: impl Into<String>) -> Self {
        Self {
            deny_user_media: true,
            ..Self::new(label)
        }
    }

    /// Devices that refuse screen capture only.
    #[must_use]
    pub fn denying_display(label: impl Into<String>) -> Self {
        Self {
            deny_display_media: true,
            ..Self::new(label)
        }
    }

    #[must_use]
    pub fn user_media_calls(&self) -> usize {
        self.user_media_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn display_media_calls(&self) -> usize {
        self.display_media_calls.load(Ordering::SeqCst)
    }

    /// Every track these devices produced, in creation order.
    #[must_use]
    pub fn tracks(&self) -> Vec<Arc<MockTrack>> {
        self.tracks.lock().unwrap().clone()
    }

    /// Look up a produced track by id.
    #[must_use]
    pub fn track(&self, id: &str) -> Option<Arc<MockTrack>> {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    fn capture(&self, source: &str, kind: TrackKind, n: usize) -> SharedTrack {
        let track = MockTrack::new(format!("{}-{source}-{n}", self.label), kind);
        self.tracks.lock().unwrap().push(track.clone());
        track
    }
}

#[async_trait::async_trait]
impl MediaDevices for MockDevices {
    async fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<MediaStream, CallError> {
        let n = self.user_media_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.deny_user_media {
            return Err(CallError::MediaAccessDenied(
                "permission denied by user".to_string(),
            ));
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(self.capture("mic", TrackKind::Audio, n));
        }
        if constraints.video {
            tracks.push(self.capture("cam", TrackKind::Video, n));
        }
        Ok(MediaStream::new(tracks))
    }

    async fn get_display_media(&self) -> Result<MediaStream, CallError> {
        let n = self.display_media_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.deny_display_media {
            return Err(CallError::MediaAccessDenied(
                "screen capture cancelled".to_string(),
            ));
        }

        Ok(MediaStream::new(vec![self.capture(
            "screen",
            TrackKind::Video,
            n,
        )]))
    }
}
