//! Playback adapters
//!
//! Each adapter drives one concrete creative backend and republishes its
//! native signals as the shared lifecycle vocabulary on the player's bus.
//! The facade holds exactly one adapter at a time through the
//! [`PlaybackAdapter`] trait.

mod direct;
mod sandbox;

pub use direct::DirectMediaAdapter;
pub use sandbox::{CleanupHook, SandboxedCreativeAdapter};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AdapterState, ProtocolVersion};

/// Uniform control surface over a loaded ad creative
///
/// Control calls on an adapter that is not yet `Ready`, or that has reached
/// a terminal state, fail with `NotLoaded`.
#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Request first playback start; best-effort (autoplay denial emits
    /// "ad paused" rather than failing). Fails with `AlreadyStarted` once
    /// the ad has played.
    async fn start_ad(&self) -> Result<()>;

    /// Pause playback; no-op when already paused
    async fn pause_ad(&self) -> Result<()>;

    /// Resume playback; fails with `NotStarted` before the first start
    async fn resume_ad(&self) -> Result<()>;

    /// Detach the backend and end the ad; terminal
    async fn stop_ad(&self) -> Result<()>;

    /// Mute, remembering the volume to restore on unmute
    async fn mute(&self) -> Result<()>;

    /// Unmute, restoring the remembered volume
    async fn unmute(&self) -> Result<()>;

    /// Declared ad duration in seconds
    fn ad_duration(&self) -> Result<f64>;

    /// Remaining playback time in seconds
    fn ad_remaining_time(&self) -> Result<f64>;

    /// Current volume, 0.0 to 1.0
    fn ad_volume(&self) -> Result<f64>;

    /// Set the volume
    fn set_ad_volume(&self, volume: f64) -> Result<()>;

    /// Negotiated creative protocol version (sandboxed creatives only)
    fn protocol_version(&self) -> Option<ProtocolVersion>;

    /// Current lifecycle state
    fn state(&self) -> AdapterState;

    /// Whether playback has begun at least once (monotonic)
    fn has_played(&self) -> bool;
}
