//! Direct media playback adapter
//!
//! Drives a native media element: wires the element's discrete signals into
//! the lifecycle vocabulary, gates first-start, and derives quartile
//! progress the backend does not report on its own.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, instrument, warn};

use super::PlaybackAdapter;

use crate::backend::{AdContainer, MediaBackend, MediaSignal, MediaSignalKind};
use crate::error::{Error, Result};
use crate::events::LifecycleBus;
use crate::selector::MediaSourceSelector;
use crate::tracker::QuartileTracker;
use crate::types::{AdapterState, LifecycleEvent, LifecycleEventKind, MediaSource, ProtocolVersion};

/// Adapter over a native media element
pub struct DirectMediaAdapter {
    container: Arc<dyn AdContainer>,
    media: Arc<dyn MediaBackend>,
    bus: Arc<LifecycleBus>,
    state: Arc<Mutex<AdapterState>>,
    has_played: Arc<AtomicBool>,
    unmute_volume: Mutex<Option<f64>>,
}

impl DirectMediaAdapter {
    /// Resolve a source and attach a media element for it
    ///
    /// Fails fast with `NoPlayableSource` before touching the container.
    /// Resolves once the element reports its metadata; a backend error
    /// during loading emits "ad error", detaches the element and fails the
    /// load, leaving the container free for a retry.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn load(
        container: Arc<dyn AdContainer>,
        selector: &MediaSourceSelector,
        sources: &[MediaSource],
        bus: Arc<LifecycleBus>,
    ) -> Result<Arc<Self>> {
        let (width, _) = container.bounds();
        let source = selector
            .select(sources, width)
            .ok_or(Error::NoPlayableSource)?
            .clone();

        let media = container.attach_media(&source)?;

        let adapter = Arc::new(Self {
            container: Arc::clone(&container),
            media: Arc::clone(&media),
            bus: Arc::clone(&bus),
            state: Arc::new(Mutex::new(AdapterState::Loading)),
            has_played: Arc::new(AtomicBool::new(false)),
            unmute_volume: Mutex::new(None),
        });

        Self::wire_signals(&adapter);

        // Await-until-signal: the one-shot metadata and error signals
        // decide the load outcome.
        let ready = media.signals().wait_for(MediaSignalKind::LoadedMetadata);
        let failed = bus.wait_for(LifecycleEventKind::AdError);

        tokio::select! {
            _ = ready => {
                adapter.set_state(AdapterState::Ready);
                bus.emit(LifecycleEvent::AdLoaded);
                adapter.wire_ready_forwards();
                debug!(uri = %source.uri, "Media element ready");
                Ok(adapter)
            }
            event = failed => {
                let message = match event {
                    Ok(LifecycleEvent::AdError { message }) => message,
                    _ => "media element failed to load".to_string(),
                };
                container.detach_media();
                Err(Error::BackendRuntime(message))
            }
        }
    }

    /// Wiring active for the whole adapter lifetime
    fn wire_signals(adapter: &Arc<Self>) {
        let signals = adapter.media.signals();

        // One-shot: backend error surfaces as "ad error" exactly once
        let bus = Arc::clone(&adapter.bus);
        let state = Arc::clone(&adapter.state);
        signals.once(MediaSignalKind::Error, move |signal| {
            let message = match signal {
                MediaSignal::Error { message } => message.clone(),
                _ => "unknown media error".to_string(),
            };
            let mut state = state.lock().expect("adapter state poisoned");
            if state.can_transition_to(AdapterState::Error) {
                *state = AdapterState::Error;
            }
            drop(state);
            bus.emit(LifecycleEvent::AdError { message });
        });

        // One-shot: the first confirmed playback marks the impression
        let bus = Arc::clone(&adapter.bus);
        let has_played = Arc::clone(&adapter.has_played);
        signals.once(MediaSignalKind::Playing, move |_| {
            has_played.store(true, Ordering::SeqCst);
            bus.emit(LifecycleEvent::AdImpression);
        });

        // Durable: reaching the end of the media stops the ad. Held weakly
        // so the element's signal registry cannot keep the adapter alive.
        let weak: Weak<Self> = Arc::downgrade(adapter);
        let tracker = Arc::new(QuartileTracker::new());
        let end_tracker = Arc::clone(&tracker);
        signals.on(MediaSignalKind::Ended, move |_| {
            if let Some(adapter) = weak.upgrade() {
                if let Some(event) = end_tracker.complete() {
                    adapter.bus.emit(event);
                }
                adapter.finish_stop();
            }
        });

        // Durable: derive quartile progress from position updates
        let bus = Arc::clone(&adapter.bus);
        let media = Arc::clone(&adapter.media);
        signals.on(MediaSignalKind::TimeUpdate, move |signal| {
            if let MediaSignal::TimeUpdate { position } = signal {
                for event in tracker.advance(*position, media.duration()) {
                    bus.emit(event);
                }
            }
        });

        // Durable: clicks pass through as player-handled click-throughs
        let bus = Arc::clone(&adapter.bus);
        signals.on(MediaSignalKind::Clicked, move |_| {
            bus.emit(LifecycleEvent::AdClickThru {
                url: None,
                id: None,
                player_handles: true,
            });
        });
    }

    /// Forwards wired only once the element is ready
    fn wire_ready_forwards(&self) {
        let signals = self.media.signals();

        let bus = Arc::clone(&self.bus);
        signals.on(MediaSignalKind::DurationChange, move |_| {
            bus.emit(LifecycleEvent::AdDurationChange);
        });

        let bus = Arc::clone(&self.bus);
        signals.on(MediaSignalKind::VolumeChange, move |_| {
            bus.emit(LifecycleEvent::AdVolumeChange);
        });
    }

    fn set_state(&self, target: AdapterState) {
        let mut state = self.state.lock().expect("adapter state poisoned");
        if state.can_transition_to(target) {
            *state = target;
        } else {
            warn!(from = %state, to = %target, "Ignoring invalid state transition");
        }
    }

    /// Control calls are only valid between `Ready` and the terminal states
    fn guard_loaded(&self) -> Result<AdapterState> {
        let state = *self.state.lock().expect("adapter state poisoned");
        match state {
            AdapterState::Unloaded | AdapterState::Loading => Err(Error::NotLoaded),
            s if s.is_terminal() => Err(Error::NotLoaded),
            s => Ok(s),
        }
    }

    /// Detach and emit "ad stopped"; safe to reach from both the control
    /// surface and the backend's ended signal
    fn finish_stop(&self) {
        {
            let state = self.state.lock().expect("adapter state poisoned");
            if state.is_terminal() {
                return;
            }
        }
        self.container.detach_media();
        self.set_state(AdapterState::Stopped);
        self.bus.emit(LifecycleEvent::AdStopped);
    }

    fn switch_mute(&self, muted: bool) {
        self.media.set_muted(muted);
        self.container.set_unmute_control_visible(muted);
        // Emitted regardless of whether the value actually changed
        self.bus.emit(LifecycleEvent::AdVolumeChange);
    }
}

#[async_trait]
impl PlaybackAdapter for DirectMediaAdapter {
    #[instrument(skip(self))]
    async fn start_ad(&self) -> Result<()> {
        self.guard_loaded()?;
        if self.has_played.load(Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        // Starting is best-effort: a blocked autoplay parks the ad paused
        // instead of failing the caller.
        match self.media.play().await {
            Ok(()) => {
                self.set_state(AdapterState::Playing);
                self.bus.emit(LifecycleEvent::AdStarted);
            }
            Err(err) => {
                warn!(error = %err, "Playback start rejected by backend");
                self.set_state(AdapterState::Paused);
                self.bus.emit(LifecycleEvent::AdPaused);
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn pause_ad(&self) -> Result<()> {
        let state = self.guard_loaded()?;
        if state != AdapterState::Playing {
            return Ok(());
        }

        let confirmed = self.media.signals().wait_for(MediaSignalKind::Pause);
        self.media.pause().await?;
        let _ = confirmed.await;

        self.set_state(AdapterState::Paused);
        self.bus.emit(LifecycleEvent::AdPaused);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn resume_ad(&self) -> Result<()> {
        let state = self.guard_loaded()?;
        if !self.has_played.load(Ordering::SeqCst) {
            return Err(Error::NotStarted);
        }
        if state == AdapterState::Playing {
            return Ok(());
        }

        let confirmed = self.media.signals().wait_for(MediaSignalKind::Play);
        self.media.play().await?;
        let _ = confirmed.await;

        self.set_state(AdapterState::Playing);
        self.bus.emit(LifecycleEvent::AdPlaying);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_ad(&self) -> Result<()> {
        self.guard_loaded()?;
        self.finish_stop();
        Ok(())
    }

    async fn mute(&self) -> Result<()> {
        self.guard_loaded()?;
        let volume = self.media.volume();
        if volume > 0.0 {
            *self.unmute_volume.lock().expect("unmute volume poisoned") = Some(volume);
        }
        self.switch_mute(true);
        Ok(())
    }

    async fn unmute(&self) -> Result<()> {
        self.guard_loaded()?;
        if let Some(volume) = *self.unmute_volume.lock().expect("unmute volume poisoned") {
            self.media.set_volume(volume);
        }
        self.switch_mute(false);
        Ok(())
    }

    fn ad_duration(&self) -> Result<f64> {
        self.guard_loaded()?;
        Ok(self.media.duration())
    }

    fn ad_remaining_time(&self) -> Result<f64> {
        self.guard_loaded()?;
        Ok(self.media.duration() - self.media.position())
    }

    fn ad_volume(&self) -> Result<f64> {
        self.guard_loaded()?;
        Ok(self.media.volume())
    }

    fn set_ad_volume(&self, volume: f64) -> Result<()> {
        self.guard_loaded()?;
        self.media.set_volume(volume);
        Ok(())
    }

    fn protocol_version(&self) -> Option<ProtocolVersion> {
        None
    }

    fn state(&self) -> AdapterState {
        *self.state.lock().expect("adapter state poisoned")
    }

    fn has_played(&self) -> bool {
        self.has_played.load(Ordering::SeqCst)
    }
}
