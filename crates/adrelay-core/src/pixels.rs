//! Pixel reporting engine
//!
//! Subscribes to a player's lifecycle events and fires categorized
//! tracking notifications. Most categories map 1:1 to a lifecycle event;
//! `mute`/`unmute` are derived from volume deltas, and `error` templates
//! get a fixed numeric code substituted for their placeholder token.
//! Delivery is fire-and-forget through a pluggable transport.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::LifecycleBus;
use crate::facade::Player;
use crate::types::LifecycleEventKind;

/// Literal placeholder substituted in `error` category templates
pub const ERROR_CODE_TOKEN: &str = "[ERRORCODE]";

/// Fixed numeric code substituted for [`ERROR_CODE_TOKEN`]
pub const ERROR_PIXEL_CODE: u32 = 901;

/// Notification categories, keyed by the lifecycle moment that fires them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PixelCategory {
    Skip,
    CreativeView,
    Progress,
    Unmute,
    Mute,
    Impression,
    Start,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
    ClickThrough,
    AcceptInvitationLinear,
    Collapse,
    CloseLinear,
    Pause,
    Resume,
    Error,
}

impl std::fmt::Display for PixelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelCategory::Skip => "skip",
            PixelCategory::CreativeView => "creativeView",
            PixelCategory::Progress => "progress",
            PixelCategory::Unmute => "unmute",
            PixelCategory::Mute => "mute",
            PixelCategory::Impression => "impression",
            PixelCategory::Start => "start",
            PixelCategory::FirstQuartile => "firstQuartile",
            PixelCategory::Midpoint => "midpoint",
            PixelCategory::ThirdQuartile => "thirdQuartile",
            PixelCategory::Complete => "complete",
            PixelCategory::ClickThrough => "clickThrough",
            PixelCategory::AcceptInvitationLinear => "acceptInvitationLinear",
            PixelCategory::Collapse => "collapse",
            PixelCategory::CloseLinear => "closeLinear",
            PixelCategory::Pause => "pause",
            PixelCategory::Resume => "resume",
            PixelCategory::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// One (category, uri) registration from an ad document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelRecord {
    #[serde(rename = "event")]
    pub category: PixelCategory,
    pub uri: String,
}

/// Transform applied to every template before dispatch
pub type UriMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Hook invoked before any `start` category dispatch
pub type AdStartHook = Arc<dyn Fn() + Send + Sync>;

/// Hook invoked on every tracked category firing attempt
pub type EventHook = Arc<dyn Fn(PixelCategory) + Send + Sync>;

/// Black-box notification delivery; no retry, no result
pub trait PixelTransport: Send + Sync {
    fn send(&self, url: &str);
}

/// Default transport: fire-and-forget HTTP GET, the wire equivalent of a
/// 1x1 image request
pub struct HttpPixelTransport {
    client: reqwest::Client,
}

impl HttpPixelTransport {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpPixelTransport {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(10))
    }
}

impl PixelTransport for HttpPixelTransport {
    fn send(&self, url: &str) {
        let client = self.client.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            match client.get(&url).send().await {
                Ok(response) => debug!(url = %url, status = %response.status(), "Pixel fired"),
                Err(err) => debug!(url = %url, error = %err, "Pixel dispatch failed"),
            }
        });
    }
}

/// The pixel reporting engine
///
/// Construct from a flat record list, then attach to a player with
/// [`PixelReporter::track`]. Listeners live for the player's lifetime;
/// there is no detach.
#[derive(Clone)]
pub struct PixelReporter {
    inner: Arc<ReporterInner>,
}

struct ReporterInner {
    /// Category table; per-category URI order is registration order
    pixels: HashMap<PixelCategory, Vec<String>>,
    mapper: UriMapper,
    transport: Arc<dyn PixelTransport>,
    on_ad_start: Option<AdStartHook>,
    on_event: Option<EventHook>,
}

impl PixelReporter {
    /// Build the category table from a flat record list, silently dropping
    /// absent records
    pub fn new(records: impl IntoIterator<Item = Option<PixelRecord>>) -> Self {
        let mut pixels: HashMap<PixelCategory, Vec<String>> = HashMap::new();
        for record in records.into_iter().flatten() {
            pixels.entry(record.category).or_default().push(record.uri);
        }

        Self {
            inner: Arc::new(ReporterInner {
                pixels,
                mapper: Arc::new(|uri| uri.to_string()),
                transport: Arc::new(HttpPixelTransport::default()),
                on_ad_start: None,
                on_event: None,
            }),
        }
    }

    /// Replace the default identity URI mapper
    pub fn with_mapper(mut self, mapper: UriMapper) -> Self {
        self.inner_mut().mapper = mapper;
        self
    }

    /// Replace the default HTTP transport
    pub fn with_transport(mut self, transport: Arc<dyn PixelTransport>) -> Self {
        self.inner_mut().transport = transport;
        self
    }

    /// Install the optional ad-start integration hook
    pub fn with_ad_start_hook(mut self, hook: AdStartHook) -> Self {
        self.inner_mut().on_ad_start = Some(hook);
        self
    }

    /// Install the optional per-event integration hook
    pub fn with_event_hook(mut self, hook: EventHook) -> Self {
        self.inner_mut().on_event = Some(hook);
        self
    }

    fn inner_mut(&mut self) -> &mut ReporterInner {
        Arc::get_mut(&mut self.inner).expect("reporter configured after track()")
    }

    /// Attach listeners for every trackable lifecycle moment
    ///
    /// The fixed event-to-category table is wired here; `mute`/`unmute`
    /// are gated on volume transitions, with the last known volume updated
    /// after every volume-change event regardless of whether either fired.
    pub fn track(&self, player: &Arc<Player>) {
        let bus = player.events();
        let last_volume: Arc<Mutex<Option<f64>>> =
            Arc::new(Mutex::new(player.ad_volume().ok()));

        self.wire(bus, LifecycleEventKind::AdSkipped, PixelCategory::Skip);
        self.wire(bus, LifecycleEventKind::AdStarted, PixelCategory::CreativeView);
        self.wire(bus, LifecycleEventKind::AdStarted, PixelCategory::Progress);

        // Derived: unmute on a zero-to-positive volume transition
        {
            let last = Arc::clone(&last_volume);
            let observed = Arc::clone(player);
            self.wire_gated(bus, LifecycleEventKind::AdVolumeChange, PixelCategory::Unmute,
                move || {
                    *last.lock().expect("last volume poisoned") == Some(0.0)
                        && observed.ad_volume().map(|v| v > 0.0).unwrap_or(false)
                });
        }

        // Derived: mute on a positive-to-zero volume transition
        {
            let last = Arc::clone(&last_volume);
            let observed = Arc::clone(player);
            self.wire_gated(bus, LifecycleEventKind::AdVolumeChange, PixelCategory::Mute,
                move || {
                    matches!(*last.lock().expect("last volume poisoned"), Some(v) if v > 0.0)
                        && observed.ad_volume().map(|v| v == 0.0).unwrap_or(false)
                });
        }

        self.wire(bus, LifecycleEventKind::AdImpression, PixelCategory::Impression);
        self.wire(bus, LifecycleEventKind::AdVideoStart, PixelCategory::Start);
        self.wire(bus, LifecycleEventKind::AdVideoFirstQuartile, PixelCategory::FirstQuartile);
        self.wire(bus, LifecycleEventKind::AdVideoMidpoint, PixelCategory::Midpoint);
        self.wire(bus, LifecycleEventKind::AdVideoThirdQuartile, PixelCategory::ThirdQuartile);
        self.wire(bus, LifecycleEventKind::AdVideoComplete, PixelCategory::Complete);
        self.wire(bus, LifecycleEventKind::AdClickThru, PixelCategory::ClickThrough);
        self.wire(bus, LifecycleEventKind::AdUserAcceptInvitation, PixelCategory::AcceptInvitationLinear);
        self.wire(bus, LifecycleEventKind::AdUserMinimize, PixelCategory::Collapse);
        self.wire(bus, LifecycleEventKind::AdUserClose, PixelCategory::CloseLinear);
        self.wire(bus, LifecycleEventKind::AdPaused, PixelCategory::Pause);
        self.wire(bus, LifecycleEventKind::AdPlaying, PixelCategory::Resume);
        self.wire(bus, LifecycleEventKind::AdError, PixelCategory::Error);

        // Registered after every gated mapping so predicates observe the
        // previous volume within the same event turn
        let observed = Arc::clone(player);
        bus.on(LifecycleEventKind::AdVolumeChange, move |_| {
            *last_volume.lock().expect("last volume poisoned") = observed.ad_volume().ok();
        });
    }

    fn wire(&self, bus: &LifecycleBus, kind: LifecycleEventKind, category: PixelCategory) {
        let inner = Arc::clone(&self.inner);
        bus.on(kind, move |_| inner.fire(category, true));
    }

    fn wire_gated(
        &self,
        bus: &LifecycleBus,
        kind: LifecycleEventKind,
        category: PixelCategory,
        predicate: impl Fn() -> bool + Send + 'static,
    ) {
        let inner = Arc::clone(&self.inner);
        bus.on(kind, move |_| inner.fire(category, predicate()));
    }
}

impl ReporterInner {
    /// One category firing attempt: hooks always run, pixels only when the
    /// gate holds and URIs are registered
    fn fire(&self, category: PixelCategory, gate: bool) {
        if category == PixelCategory::Start {
            if let Some(hook) = &self.on_ad_start {
                guarded("ad_start", || hook());
            }
        }
        if let Some(hook) = &self.on_event {
            guarded("event", || hook(category));
        }

        if !gate {
            return;
        }
        let Some(templates) = self.pixels.get(&category) else {
            return;
        };

        for template in templates {
            let resolved = if category == PixelCategory::Error {
                let substituted =
                    template.replace(ERROR_CODE_TOKEN, &ERROR_PIXEL_CODE.to_string());
                (self.mapper)(&substituted)
            } else {
                (self.mapper)(template)
            };
            debug!(category = %category, url = %resolved, "Dispatching pixel");
            self.transport.send(&resolved);
        }
    }
}

/// Invoke an external hook, swallowing and logging any panic
fn guarded(label: &str, hook: impl FnOnce()) {
    if std::panic::catch_unwind(AssertUnwindSafe(hook)).is_err() {
        warn!(hook = label, "Integration hook panicked, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl PixelTransport for RecordingTransport {
        fn send(&self, url: &str) {
            self.sent.lock().unwrap().push(url.to_string());
        }
    }

    fn record(category: PixelCategory, uri: &str) -> Option<PixelRecord> {
        Some(PixelRecord {
            category,
            uri: uri.to_string(),
        })
    }

    #[test]
    fn test_absent_records_are_dropped() {
        let reporter = PixelReporter::new(vec![
            record(PixelCategory::Start, "https://t.example.com/start"),
            None,
            record(PixelCategory::Start, "https://t.example.com/start2"),
        ]);

        assert_eq!(reporter.inner.pixels[&PixelCategory::Start].len(), 2);
    }

    #[test]
    fn test_error_substitution_in_registration_order() {
        let transport = RecordingTransport::new();
        let reporter = PixelReporter::new(vec![
            record(PixelCategory::Error, "https://t.example.com/e1?code=[ERRORCODE]"),
            record(PixelCategory::Error, "https://t.example.com/e2?c=[ERRORCODE]&x=[ERRORCODE]"),
        ])
        .with_transport(transport.clone());

        reporter.inner.fire(PixelCategory::Error, true);

        assert_eq!(
            transport.sent(),
            vec![
                "https://t.example.com/e1?code=901".to_string(),
                "https://t.example.com/e2?c=901&x=901".to_string(),
            ]
        );
    }

    #[test]
    fn test_custom_mapper_applies_after_fixed_transform() {
        let transport = RecordingTransport::new();
        let reporter = PixelReporter::new(vec![record(
            PixelCategory::Error,
            "https://t.example.com/e?code=[ERRORCODE]",
        )])
        .with_mapper(Arc::new(|uri| format!("{}&mapped=1", uri)))
        .with_transport(transport.clone());

        reporter.inner.fire(PixelCategory::Error, true);

        assert_eq!(
            transport.sent(),
            vec!["https://t.example.com/e?code=901&mapped=1".to_string()]
        );
    }

    #[test]
    fn test_unregistered_category_is_noop() {
        let transport = RecordingTransport::new();
        let reporter =
            PixelReporter::new(vec![record(PixelCategory::Start, "https://t.example.com/s")])
                .with_transport(transport.clone());

        reporter.inner.fire(PixelCategory::Complete, true);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_gate_suppresses_dispatch_but_not_hooks() {
        let transport = RecordingTransport::new();
        let hook_calls = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::clone(&hook_calls);
        let reporter =
            PixelReporter::new(vec![record(PixelCategory::Mute, "https://t.example.com/m")])
                .with_transport(transport.clone())
                .with_event_hook(Arc::new(move |category| {
                    calls.lock().unwrap().push(category);
                }));

        reporter.inner.fire(PixelCategory::Mute, false);

        assert!(transport.sent().is_empty());
        assert_eq!(*hook_calls.lock().unwrap(), vec![PixelCategory::Mute]);
    }

    #[test]
    fn test_panicking_hook_does_not_interrupt_dispatch() {
        let transport = RecordingTransport::new();
        let reporter =
            PixelReporter::new(vec![record(PixelCategory::Start, "https://t.example.com/s")])
                .with_transport(transport.clone())
                .with_ad_start_hook(Arc::new(|| panic!("integration exploded")))
                .with_event_hook(Arc::new(|_| panic!("also exploded")));

        reporter.inner.fire(PixelCategory::Start, true);

        assert_eq!(transport.sent(), vec!["https://t.example.com/s".to_string()]);
    }
}
