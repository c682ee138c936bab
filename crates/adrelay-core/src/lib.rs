//! adrelay Core - Media-Ad Playback Shim
//!
//! This crate normalizes heterogeneous ad-creative backends into one
//! event-driven lifecycle contract and reports lifecycle moments as
//! categorized tracking pixels:
//! - Media source selection (playability filter + geometric tie-break)
//! - Direct media and sandboxed-creative playback adapters
//! - A uniform player facade with volume/mute bookkeeping
//! - Pixel reporting with derived mute/unmute and error-code templating
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        adrelay Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐   │
//! │  │    Source    │  │   DirectMedia    │  │ SandboxedCreative│   │
//! │  │   Selector   │  │     Adapter      │  │     Adapter      │   │
//! │  └──────┬───────┘  └────────┬─────────┘  └────────┬─────────┘   │
//! │         │                   │                     │             │
//! │         └───────────────────┼─────────────────────┘             │
//! │                             │                                   │
//! │                      ┌──────┴──────┐                            │
//! │                      │   Player    │                            │
//! │                      │   Facade    │                            │
//! │                      └──────┬──────┘                            │
//! │                             │                                   │
//! │                      ┌──────┴──────┐     ┌──────────────┐       │
//! │                      │    Event    │────▶│    Pixel     │       │
//! │                      │     Bus     │     │   Reporter   │       │
//! │                      └─────────────┘     └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod backend;
pub mod error;
pub mod events;
pub mod facade;
pub mod pixels;
pub mod selector;
pub mod tracker;
pub mod types;

pub use adapter::{CleanupHook, DirectMediaAdapter, PlaybackAdapter, SandboxedCreativeAdapter};
pub use backend::{
    AdContainer, CreativeApi, CreativeEnvironment, MediaBackend, MediaSignal, MediaSignalKind,
    SandboxFrame, SignalBus,
};
pub use error::{Error, Result};
pub use events::{BusEvent, EventBus, LifecycleBus};
pub use facade::Player;
pub use pixels::{
    HttpPixelTransport, PixelCategory, PixelRecord, PixelReporter, PixelTransport,
    ERROR_CODE_TOKEN, ERROR_PIXEL_CODE,
};
pub use selector::{MediaSourceSelector, MimePlayability, PlayabilityProbe};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "adrelay Core initialized");
}
