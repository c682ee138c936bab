//! Core types for adrelay

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A candidate media file for an ad, immutable once handed to `load()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSource {
    /// URI of the media file or creative script
    pub uri: Url,
    /// MIME type (e.g. "video/mp4", "application/javascript")
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Declared bitrate in kbps
    pub bitrate: u64,
    /// Declared width in pixels
    pub width: u32,
    /// Declared height in pixels
    pub height: u32,
}

impl MediaSource {
    /// Which playback backend this source requires
    pub fn kind(&self) -> SourceKind {
        if self.mime_type.eq_ignore_ascii_case("application/javascript") {
            SourceKind::Interactive
        } else {
            SourceKind::Media
        }
    }
}

/// Backend family a source is played through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// A media file driven directly through a media element
    Media,
    /// A third-party interactive creative run in a sandboxed frame
    Interactive,
}

/// Three-tier rating of whether an encoding can be played in the current
/// runtime. Ordered: `No < Maybe < Probably`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Playability {
    /// The encoding cannot be played
    No,
    /// The runtime may be able to play the encoding
    Maybe,
    /// The runtime can certainly play the encoding
    Probably,
}

impl Playability {
    /// Numeric score used by the selector sort
    pub fn score(&self) -> f64 {
        match self {
            Playability::No => 0.0,
            Playability::Maybe => 0.5,
            Playability::Probably => 1.0,
        }
    }
}

/// Playback adapter state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterState {
    /// No backend attached yet
    Unloaded,
    /// Backend attaching, waiting for metadata or handshake
    Loading,
    /// Backend confirmed ready, playback not yet requested
    Ready,
    /// Playback in progress
    Playing,
    /// Playback paused
    Paused,
    /// Terminal: backend detached after stop
    Stopped,
    /// Terminal: load or playback failed
    Error,
}

impl AdapterState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: AdapterState) -> bool {
        use AdapterState::*;
        matches!(
            (self, target),
            // From Unloaded
            (Unloaded, Loading) |
            // From Loading
            (Loading, Ready) | (Loading, Error) |
            // From Ready
            (Ready, Playing) | (Ready, Paused) | (Ready, Stopped) | (Ready, Error) |
            // From Playing
            (Playing, Paused) | (Playing, Stopped) |
            // From Paused
            (Paused, Playing) | (Paused, Stopped)
        )
    }

    /// Terminal states accept no further control calls
    pub fn is_terminal(&self) -> bool {
        matches!(self, AdapterState::Stopped | AdapterState::Error)
    }
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterState::Unloaded => write!(f, "unloaded"),
            AdapterState::Loading => write!(f, "loading"),
            AdapterState::Ready => write!(f, "ready"),
            AdapterState::Playing => write!(f, "playing"),
            AdapterState::Paused => write!(f, "paused"),
            AdapterState::Stopped => write!(f, "stopped"),
            AdapterState::Error => write!(f, "error"),
        }
    }
}

/// One value from the shared lifecycle vocabulary, with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    AdLoaded,
    AdStarted,
    AdStopped,
    AdSkipped,
    AdImpression,
    AdVideoStart,
    AdVideoFirstQuartile,
    AdVideoMidpoint,
    AdVideoThirdQuartile,
    AdVideoComplete,
    AdClickThru {
        url: Option<String>,
        id: Option<String>,
        player_handles: bool,
    },
    AdUserAcceptInvitation,
    AdUserMinimize,
    AdUserClose,
    AdPaused,
    AdPlaying,
    AdVolumeChange,
    AdDurationChange,
    AdError {
        message: String,
    },
}

impl LifecycleEvent {
    /// The payload-free tag of this event
    pub fn kind(&self) -> LifecycleEventKind {
        match self {
            LifecycleEvent::AdLoaded => LifecycleEventKind::AdLoaded,
            LifecycleEvent::AdStarted => LifecycleEventKind::AdStarted,
            LifecycleEvent::AdStopped => LifecycleEventKind::AdStopped,
            LifecycleEvent::AdSkipped => LifecycleEventKind::AdSkipped,
            LifecycleEvent::AdImpression => LifecycleEventKind::AdImpression,
            LifecycleEvent::AdVideoStart => LifecycleEventKind::AdVideoStart,
            LifecycleEvent::AdVideoFirstQuartile => LifecycleEventKind::AdVideoFirstQuartile,
            LifecycleEvent::AdVideoMidpoint => LifecycleEventKind::AdVideoMidpoint,
            LifecycleEvent::AdVideoThirdQuartile => LifecycleEventKind::AdVideoThirdQuartile,
            LifecycleEvent::AdVideoComplete => LifecycleEventKind::AdVideoComplete,
            LifecycleEvent::AdClickThru { .. } => LifecycleEventKind::AdClickThru,
            LifecycleEvent::AdUserAcceptInvitation => LifecycleEventKind::AdUserAcceptInvitation,
            LifecycleEvent::AdUserMinimize => LifecycleEventKind::AdUserMinimize,
            LifecycleEvent::AdUserClose => LifecycleEventKind::AdUserClose,
            LifecycleEvent::AdPaused => LifecycleEventKind::AdPaused,
            LifecycleEvent::AdPlaying => LifecycleEventKind::AdPlaying,
            LifecycleEvent::AdVolumeChange => LifecycleEventKind::AdVolumeChange,
            LifecycleEvent::AdDurationChange => LifecycleEventKind::AdDurationChange,
            LifecycleEvent::AdError { .. } => LifecycleEventKind::AdError,
        }
    }
}

/// Payload-free lifecycle event tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEventKind {
    AdLoaded,
    AdStarted,
    AdStopped,
    AdSkipped,
    AdImpression,
    AdVideoStart,
    AdVideoFirstQuartile,
    AdVideoMidpoint,
    AdVideoThirdQuartile,
    AdVideoComplete,
    AdClickThru,
    AdUserAcceptInvitation,
    AdUserMinimize,
    AdUserClose,
    AdPaused,
    AdPlaying,
    AdVolumeChange,
    AdDurationChange,
    AdError,
}

impl LifecycleEventKind {
    /// The complete fixed vocabulary, in the order creatives enumerate it
    pub const ALL: [LifecycleEventKind; 19] = [
        LifecycleEventKind::AdLoaded,
        LifecycleEventKind::AdStarted,
        LifecycleEventKind::AdStopped,
        LifecycleEventKind::AdSkipped,
        LifecycleEventKind::AdImpression,
        LifecycleEventKind::AdVideoStart,
        LifecycleEventKind::AdVideoFirstQuartile,
        LifecycleEventKind::AdVideoMidpoint,
        LifecycleEventKind::AdVideoThirdQuartile,
        LifecycleEventKind::AdVideoComplete,
        LifecycleEventKind::AdClickThru,
        LifecycleEventKind::AdUserAcceptInvitation,
        LifecycleEventKind::AdUserMinimize,
        LifecycleEventKind::AdUserClose,
        LifecycleEventKind::AdPaused,
        LifecycleEventKind::AdPlaying,
        LifecycleEventKind::AdVolumeChange,
        LifecycleEventKind::AdDurationChange,
        LifecycleEventKind::AdError,
    ];
}

impl std::fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// View mode reported to interactive creatives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Normal,
    Thumbnail,
    Fullscreen,
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewMode::Normal => write!(f, "normal"),
            ViewMode::Thumbnail => write!(f, "thumbnail"),
            ViewMode::Fullscreen => write!(f, "fullscreen"),
        }
    }
}

/// Protocol version negotiated with a sandboxed creative
///
/// Parsed leniently: missing or malformed components default to 0, matching
/// creatives that report versions like "2.0" or just "2".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a handshake string such as "2.0" or "2.1.5"
    pub fn parse(value: &str) -> Self {
        let mut parts = value.trim().split('.');
        let mut component = || {
            parts
                .next()
                .and_then(|p| p.trim().parse::<u32>().ok())
                .unwrap_or(0)
        };
        Self {
            major: component(),
            minor: component(),
            patch: component(),
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// View mode reported to interactive creatives
    pub view_mode: ViewMode,
    /// Desired bitrate in kbps reported to interactive creatives
    pub desired_bitrate: u64,
    /// Whether the environment permits autoplay with sound
    pub autoplay_allowed: bool,
    /// Protocol version requested in the creative handshake
    pub handshake_version: String,
    /// Highest creative protocol major version this shim supports
    pub max_supported_major: u32,
    /// Interval between nested-frame probes (milliseconds)
    pub nested_frame_poll_interval_ms: u64,
    /// Total window during which nested-frame probing runs (milliseconds)
    pub nested_frame_poll_window_ms: u64,
    /// Timeout applied to outbound pixel requests (milliseconds)
    pub pixel_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Normal,
            desired_bitrate: 0,
            autoplay_allowed: true,
            handshake_version: "2.0".to_string(),
            max_supported_major: 2,
            nested_frame_poll_interval_ms: 1_000,
            nested_frame_poll_window_ms: 30_000,
            pixel_timeout_ms: 10_000,
        }
    }
}
