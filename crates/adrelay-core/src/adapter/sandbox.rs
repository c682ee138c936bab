//! Sandboxed creative playback adapter
//!
//! Runs a third-party interactive creative in an isolated frame: injects
//! its script, negotiates a protocol version, and relays the creative's
//! entire lifecycle vocabulary verbatim onto the player's bus. One
//! corrective rule applies: a creative that stops without ever starting is
//! reported as an error, since such creatives tend to fail silently.
//!
//! Teardown resources (the frame, plus an optional caller-supplied hook)
//! are released through a guard that runs exactly once even when an error
//! and a stop signal race.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::PlaybackAdapter;
use crate::backend::{
    AdContainer, CreativeApi, CreativeEnvironment, MediaBackend, MediaSignalKind, SandboxFrame,
};
use crate::error::{Error, Result};
use crate::events::LifecycleBus;
use crate::types::{
    AdapterState, LifecycleEvent, LifecycleEventKind, MediaSource, PlayerConfig, ProtocolVersion,
};

/// Optional caller-supplied teardown hook, invoked at most once
pub type CleanupHook = Box<dyn FnOnce() + Send>;

/// Exactly-once teardown of the frame and the caller's cleanup hook
struct CleanupGuard {
    done: AtomicBool,
    frame: Arc<dyn SandboxFrame>,
    hook: Mutex<Option<CleanupHook>>,
}

impl CleanupGuard {
    fn new(frame: Arc<dyn SandboxFrame>, hook: Option<CleanupHook>) -> Arc<Self> {
        Arc::new(Self {
            done: AtomicBool::new(false),
            frame,
            hook: Mutex::new(hook),
        })
    }

    fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        self.frame.detach();
        let hook = self.hook.lock().expect("cleanup hook poisoned").take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Adapter over a sandboxed third-party creative
pub struct SandboxedCreativeAdapter {
    frame: Arc<dyn SandboxFrame>,
    slot: Arc<dyn MediaBackend>,
    api: Arc<dyn CreativeApi>,
    bus: Arc<LifecycleBus>,
    state: Arc<Mutex<AdapterState>>,
    started: Arc<AtomicBool>,
    version: ProtocolVersion,
    unmute_volume: Mutex<Option<f64>>,
    cleanup: Arc<CleanupGuard>,
    config: PlayerConfig,
}

impl SandboxedCreativeAdapter {
    /// Create the frame, inject the creative and initialize it
    ///
    /// Resolves when the creative reports "ad loaded". Any terminal failure
    /// (script load, unsupported version, creative error) tears the frame
    /// down, fires the cleanup hook and fails the load, leaving the
    /// container free for a retry.
    #[instrument(skip_all, fields(uri = %source.uri))]
    pub async fn load(
        container: Arc<dyn AdContainer>,
        source: &MediaSource,
        parameters: Option<String>,
        config: &PlayerConfig,
        bus: Arc<LifecycleBus>,
        cleanup_hook: Option<CleanupHook>,
    ) -> Result<Arc<Self>> {
        let frame = container.create_frame()?;
        let cleanup = CleanupGuard::new(Arc::clone(&frame), cleanup_hook);

        let api = match frame.inject_script(&source.uri).await {
            Ok(api) => api,
            Err(err) => {
                warn!(error = %err, "Creative script injection failed");
                cleanup.run();
                return Err(Error::BackendLoad(format!(
                    "Failed to load creative [{}]",
                    source.uri
                )));
            }
        };

        let version = ProtocolVersion::parse(&api.handshake_version(&config.handshake_version));
        if version.major > config.max_supported_major {
            cleanup.run();
            return Err(Error::UnsupportedVersion {
                version: version.to_string(),
            });
        }
        debug!(%version, "Creative handshake complete");

        let state = Arc::new(Mutex::new(AdapterState::Loading));
        let started = Arc::new(AtomicBool::new(false));

        // Relay the entire fixed vocabulary from the creative's event
        // source onto the player's bus, verbatim except for the
        // stopped-before-started corrective rule.
        for kind in LifecycleEventKind::ALL {
            let bus = Arc::clone(&bus);
            let started = Arc::clone(&started);
            api.events().on(kind, move |event| {
                let event = match event {
                    LifecycleEvent::AdStarted => {
                        started.store(true, Ordering::SeqCst);
                        event.clone()
                    }
                    LifecycleEvent::AdStopped if !started.load(Ordering::SeqCst) => {
                        LifecycleEvent::AdError {
                            message: "The creative stopped before starting".to_string(),
                        }
                    }
                    other => other.clone(),
                };
                bus.emit(event);
            });
        }

        // The frame stays hidden until the creative reports in
        let visible_frame = Arc::clone(&frame);
        bus.once(LifecycleEventKind::AdLoaded, move |_| {
            visible_frame.set_visible(true);
        });

        // Either terminal event releases the frame and the caller hook
        let error_cleanup = Arc::clone(&cleanup);
        let error_state = Arc::clone(&state);
        bus.once(LifecycleEventKind::AdError, move |_| {
            let mut state = error_state.lock().expect("adapter state poisoned");
            if state.can_transition_to(AdapterState::Error) {
                *state = AdapterState::Error;
            }
            drop(state);
            error_cleanup.run();
        });
        let stop_cleanup = Arc::clone(&cleanup);
        let stop_state = Arc::clone(&state);
        bus.once(LifecycleEventKind::AdStopped, move |_| {
            let mut state = stop_state.lock().expect("adapter state poisoned");
            if state.can_transition_to(AdapterState::Stopped) {
                *state = AdapterState::Stopped;
            }
            drop(state);
            stop_cleanup.run();
        });

        Self::spawn_nested_frame_poll(Arc::clone(&frame), config);

        let ready = bus.wait_for(LifecycleEventKind::AdLoaded);
        let failed = bus.wait_for(LifecycleEventKind::AdError);

        let (width, height) = frame.bounds();
        let slot = frame.slot_media();
        api.init_ad(
            width,
            height,
            config.view_mode,
            config.desired_bitrate,
            parameters,
            CreativeEnvironment {
                video_slot: Arc::clone(&slot),
                slot_can_autoplay: config.autoplay_allowed,
            },
        );

        tokio::select! {
            _ = ready => {
                *state.lock().expect("adapter state poisoned") = AdapterState::Ready;
                Ok(Arc::new(Self {
                    frame,
                    slot,
                    api,
                    bus,
                    state,
                    started,
                    version,
                    unmute_volume: Mutex::new(None),
                    cleanup,
                    config: config.clone(),
                }))
            }
            event = failed => {
                let message = match event {
                    Ok(LifecycleEvent::AdError { message }) => message,
                    _ => "creative failed to load".to_string(),
                };
                *state.lock().expect("adapter state poisoned") = AdapterState::Error;
                Err(Error::BackendRuntime(message))
            }
        }
    }

    /// Bounded nested-frame watch
    ///
    /// A creative that embeds another frame of the same kind brings its own
    /// media; the auxiliary slot element would compete with it. Probe at the
    /// configured interval until either a nested frame appears (remove the
    /// slot media and stop) or the window elapses (stop unconditionally).
    fn spawn_nested_frame_poll(frame: Arc<dyn SandboxFrame>, config: &PlayerConfig) {
        let interval = Duration::from_millis(config.nested_frame_poll_interval_ms);
        let window = Duration::from_millis(config.nested_frame_poll_window_ms);

        tokio::spawn(async move {
            let probe = async {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    if frame.has_nested_frame() {
                        debug!("Nested frame detected, removing auxiliary media");
                        frame.remove_slot_media();
                        break;
                    }
                }
            };

            tokio::select! {
                _ = probe => {}
                _ = tokio::time::sleep(window) => {
                    debug!("Nested frame watch window elapsed");
                }
            }
        });
    }

    /// Notify the creative of a container geometry change
    pub fn resize(&self, width: u32, height: u32) {
        self.api.resize_ad(width, height, self.config.view_mode);
    }

    fn set_state(&self, target: AdapterState) {
        let mut state = self.state.lock().expect("adapter state poisoned");
        if state.can_transition_to(target) {
            *state = target;
        } else {
            warn!(from = %state, to = %target, "Ignoring invalid state transition");
        }
    }

    fn guard_loaded(&self) -> Result<AdapterState> {
        let state = *self.state.lock().expect("adapter state poisoned");
        match state {
            AdapterState::Unloaded | AdapterState::Loading => Err(Error::NotLoaded),
            s if s.is_terminal() => Err(Error::NotLoaded),
            s => Ok(s),
        }
    }
}

#[async_trait]
impl PlaybackAdapter for SandboxedCreativeAdapter {
    #[instrument(skip(self))]
    async fn start_ad(&self) -> Result<()> {
        self.guard_loaded()?;
        if self.started.load(Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        // The creative is a black box; playback control targets the
        // auxiliary slot element it renders into.
        match self.slot.play().await {
            Ok(()) => {
                self.started.store(true, Ordering::SeqCst);
                self.set_state(AdapterState::Playing);
                self.bus.emit(LifecycleEvent::AdStarted);
            }
            Err(err) => {
                warn!(error = %err, "Slot playback start rejected");
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

        let confirmed = self.slot.signals().wait_for(MediaSignalKind::Pause);
        self.slot.pause().await?;
        let _ = confirmed.await;

        self.set_state(AdapterState::Paused);
        self.bus.emit(LifecycleEvent::AdPaused);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn resume_ad(&self) -> Result<()> {
        let state = self.guard_loaded()?;
        if !self.started.load(Ordering::SeqCst) {
            return Err(Error::NotStarted);
        }
        if state == AdapterState::Playing {
            return Ok(());
        }

        let confirmed = self.slot.signals().wait_for(MediaSignalKind::Play);
        self.slot.play().await?;
        let _ = confirmed.await;

        self.set_state(AdapterState::Playing);
        self.bus.emit(LifecycleEvent::AdPlaying);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_ad(&self) -> Result<()> {
        self.guard_loaded()?;
        self.set_state(AdapterState::Stopped);
        self.cleanup.run();
        self.bus.emit(LifecycleEvent::AdStopped);
        Ok(())
    }

    async fn mute(&self) -> Result<()> {
        self.guard_loaded()?;
        let volume = self.slot.volume();
        if volume > 0.0 {
            *self.unmute_volume.lock().expect("unmute volume poisoned") = Some(volume);
        }
        self.slot.set_muted(true);
        self.frame.set_unmute_control_visible(true);
        // Emitted regardless of whether the value actually changed
        self.bus.emit(LifecycleEvent::AdVolumeChange);
        Ok(())
    }

    async fn unmute(&self) -> Result<()> {
        self.guard_loaded()?;
        if let Some(volume) = *self.unmute_volume.lock().expect("unmute volume poisoned") {
            self.slot.set_volume(volume);
        }
        self.slot.set_muted(false);
        self.frame.set_unmute_control_visible(false);
        self.bus.emit(LifecycleEvent::AdVolumeChange);
        Ok(())
    }

    fn ad_duration(&self) -> Result<f64> {
        self.guard_loaded()?;
        Ok(self.slot.duration())
    }

    fn ad_remaining_time(&self) -> Result<f64> {
        self.guard_loaded()?;
        Ok(self.slot.duration() - self.slot.position())
    }

    fn ad_volume(&self) -> Result<f64> {
        self.guard_loaded()?;
        Ok(self.slot.volume())
    }

    fn set_ad_volume(&self, volume: f64) -> Result<()> {
        self.guard_loaded()?;
        self.slot.set_volume(volume);
        Ok(())
    }

    fn protocol_version(&self) -> Option<ProtocolVersion> {
        Some(self.version)
    }

    fn state(&self) -> AdapterState {
        *self.state.lock().expect("adapter state poisoned")
    }

    fn has_played(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}
