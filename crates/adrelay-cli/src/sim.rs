//! Simulated playback backends
//!
//! Stand-ins for a real rendering surface: a media element that plays a
//! compressed scripted timeline, a container to attach it to, and a
//! sandbox frame hosting a scripted creative. Lets the real facade,
//! adapters and reporter run end-to-end without a browser.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use url::Url;

use adrelay_core::{
    AdContainer, CreativeApi, CreativeEnvironment, LifecycleBus, LifecycleEvent, MediaBackend,
    MediaSignal, MediaSource, Result, SandboxFrame, SignalBus, ViewMode,
};

/// Pace of the compressed scripted timeline
const TIMELINE_STEP: Duration = Duration::from_millis(40);

/// A media element that plays a compressed scripted timeline
pub struct SimMedia {
    me: Weak<SimMedia>,
    signals: SignalBus,
    duration: f64,
    position: Mutex<f64>,
    volume: Mutex<f64>,
    muted: AtomicBool,
    playing: AtomicBool,
}

impl SimMedia {
    pub fn new(duration: f64) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            signals: SignalBus::new(),
            duration,
            position: Mutex::new(0.0),
            volume: Mutex::new(1.0),
            muted: AtomicBool::new(false),
            playing: AtomicBool::new(false),
        })
    }

    /// Walk the quartile positions, then report the end of the media
    fn run_timeline(media: Arc<Self>) {
        tokio::spawn(async move {
            for fraction in [0.05, 0.25, 0.5, 0.75, 1.0] {
                tokio::time::sleep(TIMELINE_STEP).await;
                if !media.playing.load(Ordering::SeqCst) {
                    return;
                }
                let position = media.duration * fraction;
                *media.position.lock().unwrap() = position;
                media.signals.emit(MediaSignal::TimeUpdate { position });
            }
            media.signals.emit(MediaSignal::Ended);
        });
    }
}

#[async_trait]
impl MediaBackend for SimMedia {
    async fn play(&self) -> Result<()> {
        let first_play = !self.playing.swap(true, Ordering::SeqCst);
        self.signals.emit(MediaSignal::Play);
        self.signals.emit(MediaSignal::Playing);
        if first_play {
            if let Some(media) = self.me.upgrade() {
                Self::run_timeline(media);
            }
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.playing.store(false, Ordering::SeqCst);
        self.signals.emit(MediaSignal::Pause);
        Ok(())
    }

    fn position(&self) -> f64 {
        *self.position.lock().unwrap()
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn volume(&self) -> f64 {
        *self.volume.lock().unwrap()
    }

    fn set_volume(&self, volume: f64) {
        *self.volume.lock().unwrap() = volume;
        self.signals.emit(MediaSignal::VolumeChange);
    }

    fn muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
        self.signals.emit(MediaSignal::VolumeChange);
    }

    fn signals(&self) -> &SignalBus {
        &self.signals
    }
}

/// A scripted creative that loads, plays through and stops
pub struct SimCreative {
    me: Weak<SimCreative>,
    events: LifecycleBus,
}

impl SimCreative {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            events: LifecycleBus::new(),
        })
    }
}

impl CreativeApi for SimCreative {
    fn handshake_version(&self, requested: &str) -> String {
        requested.to_string()
    }

    fn init_ad(
        &self,
        _width: u32,
        _height: u32,
        _view_mode: ViewMode,
        _desired_bitrate: u64,
        _parameters: Option<String>,
        _environment: CreativeEnvironment,
    ) {
        self.events.emit(LifecycleEvent::AdLoaded);

        let Some(creative) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let script = [
                LifecycleEvent::AdImpression,
                LifecycleEvent::AdStarted,
                LifecycleEvent::AdVideoStart,
                LifecycleEvent::AdVideoFirstQuartile,
                LifecycleEvent::AdVideoMidpoint,
                LifecycleEvent::AdVideoThirdQuartile,
                LifecycleEvent::AdVideoComplete,
                LifecycleEvent::AdStopped,
            ];
            for event in script {
                tokio::time::sleep(TIMELINE_STEP).await;
                creative.events.emit(event);
            }
        });
    }

    fn resize_ad(&self, _width: u32, _height: u32, _view_mode: ViewMode) {}

    fn events(&self) -> &LifecycleBus {
        &self.events
    }
}

/// Frame hosting the scripted creative
pub struct SimFrame {
    bounds: (u32, u32),
    slot: Arc<SimMedia>,
}

impl SimFrame {
    pub fn new(bounds: (u32, u32), duration: f64) -> Arc<Self> {
        Arc::new(Self {
            bounds,
            slot: SimMedia::new(duration),
        })
    }
}

#[async_trait]
impl SandboxFrame for SimFrame {
    fn bounds(&self) -> (u32, u32) {
        self.bounds
    }

    async fn inject_script(&self, _uri: &Url) -> Result<Arc<dyn CreativeApi>> {
        Ok(SimCreative::new() as Arc<dyn CreativeApi>)
    }

    fn slot_media(&self) -> Arc<dyn MediaBackend> {
        Arc::clone(&self.slot) as Arc<dyn MediaBackend>
    }

    fn set_visible(&self, _visible: bool) {}

    fn set_unmute_control_visible(&self, _visible: bool) {}

    fn has_nested_frame(&self) -> bool {
        false
    }

    fn remove_slot_media(&self) {}

    fn detach(&self) {}
}

/// Simulated rendering container
pub struct SimContainer {
    bounds: (u32, u32),
    duration: f64,
    media: Mutex<Option<Arc<SimMedia>>>,
}

impl SimContainer {
    pub fn new(width: u32, height: u32, duration: f64) -> Arc<Self> {
        Arc::new(Self {
            bounds: (width, height),
            duration,
            media: Mutex::new(None),
        })
    }
}

impl AdContainer for SimContainer {
    fn bounds(&self) -> (u32, u32) {
        self.bounds
    }

    fn attach_media(&self, _source: &MediaSource) -> Result<Arc<dyn MediaBackend>> {
        let media = SimMedia::new(self.duration);
        *self.media.lock().unwrap() = Some(Arc::clone(&media));

        // Metadata arrives once the load is parked on its await point
        let ready = Arc::clone(&media);
        tokio::spawn(async move {
            ready.signals.emit(MediaSignal::LoadedMetadata);
        });

        Ok(media as Arc<dyn MediaBackend>)
    }

    fn detach_media(&self) {
        *self.media.lock().unwrap() = None;
    }

    fn set_unmute_control_visible(&self, _visible: bool) {}

    fn create_frame(&self) -> Result<Arc<dyn SandboxFrame>> {
        Ok(SimFrame::new(self.bounds, self.duration) as Arc<dyn SandboxFrame>)
    }
}
