//! External collaborator surfaces
//!
//! The shim drives two backend families through these traits:
//! - a native media element ([`MediaBackend`]) attached to a rendering
//!   container ([`AdContainer`])
//! - a third-party interactive creative ([`CreativeApi`]) running inside an
//!   isolated frame ([`SandboxFrame`])
//!
//! Implementations belong to the embedding application (a DOM bridge, a
//! desktop surface, a test double). The shim only assumes the discrete
//! signals and deferred play/pause outcomes documented here.

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::error::Result;
use crate::events::{BusEvent, EventBus, LifecycleBus};
use crate::types::{MediaSource, ViewMode};

/// Raw signal emitted by a media element backend
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSignal {
    /// Metadata (duration, dimensions) became available
    LoadedMetadata,
    /// Declared duration changed
    DurationChange,
    /// Volume or mute flag changed
    VolumeChange,
    /// Playback resumed after a pause request completed
    Play,
    /// Playback is actually progressing
    Playing,
    /// Playback paused
    Pause,
    /// Playback reached the end of the media
    Ended,
    /// Playback position advanced
    TimeUpdate { position: f64 },
    /// The rendered element was clicked
    Clicked,
    /// The backend failed to load or decode the media
    Error { message: String },
}

/// Payload-free media signal tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSignalKind {
    LoadedMetadata,
    DurationChange,
    VolumeChange,
    Play,
    Playing,
    Pause,
    Ended,
    TimeUpdate,
    Clicked,
    Error,
}

impl BusEvent for MediaSignal {
    type Kind = MediaSignalKind;

    fn kind(&self) -> MediaSignalKind {
        match self {
            MediaSignal::LoadedMetadata => MediaSignalKind::LoadedMetadata,
            MediaSignal::DurationChange => MediaSignalKind::DurationChange,
            MediaSignal::VolumeChange => MediaSignalKind::VolumeChange,
            MediaSignal::Play => MediaSignalKind::Play,
            MediaSignal::Playing => MediaSignalKind::Playing,
            MediaSignal::Pause => MediaSignalKind::Pause,
            MediaSignal::Ended => MediaSignalKind::Ended,
            MediaSignal::TimeUpdate { .. } => MediaSignalKind::TimeUpdate,
            MediaSignal::Clicked => MediaSignalKind::Clicked,
            MediaSignal::Error { .. } => MediaSignalKind::Error,
        }
    }
}

/// Bus carrying raw media element signals
pub type SignalBus = EventBus<MediaSignal>;

/// A native media element
///
/// `play`/`pause` return deferred outcomes; the confirming state change
/// arrives separately on [`MediaBackend::signals`]. Getters are synchronous
/// reads of the element's current properties.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Request playback start; resolves when the backend accepts the request
    async fn play(&self) -> Result<()>;

    /// Request playback pause
    async fn pause(&self) -> Result<()>;

    /// Current playback position in seconds
    fn position(&self) -> f64;

    /// Declared media duration in seconds
    fn duration(&self) -> f64;

    /// Current volume, 0.0 to 1.0
    fn volume(&self) -> f64;

    /// Set the volume
    fn set_volume(&self, volume: f64);

    /// Whether the element is muted
    fn muted(&self) -> bool;

    /// Set the mute flag
    fn set_muted(&self, muted: bool);

    /// The element's discrete signal source
    fn signals(&self) -> &SignalBus;
}

/// The rendering container an ad plays inside
///
/// Exclusively owned by the active adapter; the facade fully detaches one
/// adapter's elements before the next may attach.
pub trait AdContainer: Send + Sync {
    /// Current container bounds as (width, height) in pixels
    fn bounds(&self) -> (u32, u32);

    /// Create and attach a media element for the given source
    fn attach_media(&self, source: &MediaSource) -> Result<Arc<dyn MediaBackend>>;

    /// Remove the attached media element, if any
    fn detach_media(&self);

    /// Show or hide the unmute affordance overlay
    fn set_unmute_control_visible(&self, visible: bool);

    /// Create an isolated frame for a sandboxed creative
    fn create_frame(&self) -> Result<Arc<dyn SandboxFrame>>;
}

/// An isolated execution context hosting a third-party creative
#[async_trait]
pub trait SandboxFrame: Send + Sync {
    /// Current frame bounds as (width, height) in pixels
    fn bounds(&self) -> (u32, u32);

    /// Inject the creative's script and return its API entry point
    async fn inject_script(&self, uri: &Url) -> Result<Arc<dyn CreativeApi>>;

    /// The auxiliary media element provisioned inside the frame
    fn slot_media(&self) -> Arc<dyn MediaBackend>;

    /// Toggle frame visibility (frames load hidden, shown once the ad loads)
    fn set_visible(&self, visible: bool);

    /// Show or hide the unmute affordance inside the frame
    fn set_unmute_control_visible(&self, visible: bool);

    /// Whether the creative has embedded another frame of the same kind
    fn has_nested_frame(&self) -> bool;

    /// Remove the auxiliary media element and unmute affordance
    fn remove_slot_media(&self);

    /// Remove the frame itself from the container
    fn detach(&self);
}

/// Environment handed to a creative at init time
#[derive(Clone)]
pub struct CreativeEnvironment {
    /// The auxiliary media element the creative may render video into
    pub video_slot: Arc<dyn MediaBackend>,
    /// Whether that slot is permitted to autoplay
    pub slot_can_autoplay: bool,
}

/// A sandboxed third-party creative's control surface
///
/// The creative itself emits the full lifecycle vocabulary on
/// [`CreativeApi::events`]; its internal play/pause reacts to its own
/// subscriptions, so the shim never drives it directly beyond init.
pub trait CreativeApi: Send + Sync {
    /// Version negotiation; returns the creative's supported version string
    fn handshake_version(&self, requested: &str) -> String;

    /// Initialize the ad with geometry, bitrate, parameters and environment
    fn init_ad(
        &self,
        width: u32,
        height: u32,
        view_mode: ViewMode,
        desired_bitrate: u64,
        parameters: Option<String>,
        environment: CreativeEnvironment,
    );

    /// Notify the creative of a geometry change
    fn resize_ad(&self, width: u32, height: u32, view_mode: ViewMode);

    /// The creative's lifecycle event source
    fn events(&self) -> &LifecycleBus;
}
