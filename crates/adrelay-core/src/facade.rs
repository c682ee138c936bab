//! Player facade
//!
//! The object the embedding application holds. Owns at most one playback
//! adapter at a time, picks the backend family at load time, and relays the
//! uniform control surface 1:1. The lifecycle bus lives here so trackers
//! stay subscribed across adapter replacement.

use std::sync::{Arc, RwLock};
use tracing::{info, instrument, warn};

use crate::adapter::{CleanupHook, DirectMediaAdapter, PlaybackAdapter, SandboxedCreativeAdapter};
use crate::backend::AdContainer;
use crate::error::{Error, Result};
use crate::events::LifecycleBus;
use crate::selector::{MediaSourceSelector, MimePlayability, PlayabilityProbe};
use crate::types::{
    AdapterState, MediaSource, PlayerConfig, ProtocolVersion, SessionId, SourceKind,
};

/// Uniform player over heterogeneous ad-creative backends
pub struct Player {
    session_id: SessionId,
    container: Arc<dyn AdContainer>,
    config: PlayerConfig,
    selector: MediaSourceSelector,
    bus: Arc<LifecycleBus>,
    adapter: RwLock<Option<Arc<dyn PlaybackAdapter>>>,
}

impl Player {
    /// Create a player over a rendering container with the default
    /// playability probe
    pub fn new(container: Arc<dyn AdContainer>, config: PlayerConfig) -> Self {
        Self::with_probe(container, config, Arc::new(MimePlayability))
    }

    /// Create a player with a custom playability probe
    pub fn with_probe(
        container: Arc<dyn AdContainer>,
        config: PlayerConfig,
        probe: Arc<dyn PlayabilityProbe>,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            container,
            config,
            selector: MediaSourceSelector::new(probe),
            bus: Arc::new(LifecycleBus::new()),
            adapter: RwLock::new(None),
        }
    }

    /// This playback session's identifier
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The lifecycle event bus adapters publish into
    pub fn events(&self) -> &LifecycleBus {
        &self.bus
    }

    /// Load an ad from a candidate source list
    ///
    /// Any source declaring an interactive kind wins and is loaded through
    /// the sandboxed-creative adapter; otherwise the list goes to the
    /// direct-media adapter's selector. A previously loaded adapter is
    /// fully torn down first. On failure the facade holds no adapter and
    /// `load()` may be retried.
    #[instrument(skip_all, fields(session_id = %self.session_id, sources = sources.len()))]
    pub async fn load(
        &self,
        sources: &[MediaSource],
        parameters: Option<String>,
        cleanup_hook: Option<CleanupHook>,
    ) -> Result<()> {
        self.teardown_current().await;

        let interactive = sources.iter().find(|s| s.kind() == SourceKind::Interactive);

        let adapter: Arc<dyn PlaybackAdapter> = match interactive {
            Some(source) => {
                info!(uri = %source.uri, "Loading sandboxed creative");
                SandboxedCreativeAdapter::load(
                    Arc::clone(&self.container),
                    source,
                    parameters,
                    &self.config,
                    Arc::clone(&self.bus),
                    cleanup_hook,
                )
                .await?
            }
            None => {
                info!("Loading direct media");
                DirectMediaAdapter::load(
                    Arc::clone(&self.container),
                    &self.selector,
                    sources,
                    Arc::clone(&self.bus),
                )
                .await?
            }
        };

        *self.adapter.write().expect("adapter slot poisoned") = Some(adapter);
        Ok(())
    }

    /// Fully release the current adapter and its container resources
    async fn teardown_current(&self) {
        let previous = self.adapter.write().expect("adapter slot poisoned").take();
        if let Some(adapter) = previous {
            if !adapter.state().is_terminal() {
                if let Err(err) = adapter.stop_ad().await {
                    warn!(error = %err, "Teardown of previous adapter failed");
                }
            }
        }
    }

    fn current(&self) -> Result<Arc<dyn PlaybackAdapter>> {
        self.adapter
            .read()
            .expect("adapter slot poisoned")
            .clone()
            .ok_or(Error::NotLoaded)
    }

    /// Request first playback start
    pub async fn start_ad(&self) -> Result<()> {
        self.current()?.start_ad().await
    }

    /// Pause playback
    pub async fn pause_ad(&self) -> Result<()> {
        self.current()?.pause_ad().await
    }

    /// Resume paused playback
    pub async fn resume_ad(&self) -> Result<()> {
        self.current()?.resume_ad().await
    }

    /// Stop the ad and release the container
    pub async fn stop_ad(&self) -> Result<()> {
        self.current()?.stop_ad().await
    }

    /// Mute playback
    pub async fn mute(&self) -> Result<()> {
        self.current()?.mute().await
    }

    /// Unmute playback, restoring the pre-mute volume
    pub async fn unmute(&self) -> Result<()> {
        self.current()?.unmute().await
    }

    /// Declared ad duration in seconds
    pub fn ad_duration(&self) -> Result<f64> {
        self.current()?.ad_duration()
    }

    /// Remaining playback time in seconds
    pub fn ad_remaining_time(&self) -> Result<f64> {
        self.current()?.ad_remaining_time()
    }

    /// Current volume, 0.0 to 1.0
    pub fn ad_volume(&self) -> Result<f64> {
        self.current()?.ad_volume()
    }

    /// Set the volume
    pub fn set_ad_volume(&self, volume: f64) -> Result<()> {
        self.current()?.set_ad_volume(volume)
    }

    /// Negotiated creative protocol version, if a sandboxed creative is
    /// loaded
    pub fn protocol_version(&self) -> Result<ProtocolVersion> {
        self.current()?.protocol_version().ok_or(Error::NotLoaded)
    }

    /// Current adapter state, `Unloaded` with no adapter attached
    pub fn state(&self) -> AdapterState {
        self.adapter
            .read()
            .expect("adapter slot poisoned")
            .as_ref()
            .map(|a| a.state())
            .unwrap_or(AdapterState::Unloaded)
    }

    /// Whether playback has begun at least once this load
    pub fn has_played(&self) -> bool {
        self.adapter
            .read()
            .expect("adapter slot poisoned")
            .as_ref()
            .map(|a| a.has_played())
            .unwrap_or(false)
    }
}
