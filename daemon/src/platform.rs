//! Seams between the playback controller and the desktop it runs on.
//!
//! The controller only ever talks to these traits. The Wayland + GStreamer
//! implementation lives in [`crate::wayland`] and [`crate::video`]; the
//! controller tests drive the same code through an in-memory platform.

use anyhow::Result;
use common::{DisplaySignature, Rect, SignatureSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Unique key of one built playback surface.
///
/// Keys are never reused, so events from a torn-down surface can be told
/// apart from events of its replacement on the same display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceKey(pub u64);

impl fmt::Display for SurfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// The validated video every surface plays.
///
/// Immutable after startup and shared read-only by all players.
#[derive(Debug, Clone)]
pub struct VideoSource {
    pub path: PathBuf,
    pub info: common::MediaInfo,
}

/// Transport state of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Playing,
    /// Asked to play but not yet running (prerolling, buffering)
    WaitingToPlay,
    Paused,
}

/// Notifications a player raises from its decoding machinery.
///
/// They are delivered through the control loop channel and acted upon on
/// the loop thread only.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerSignal {
    /// The pipeline finished prerolling and can accept segment seeks
    Prerolled,
    /// The current loop segment finished playing
    SegmentDone,
    EndOfStream,
    /// Decode or codec fault; fatal for the whole process
    Failed(String),
}

/// Source of the current display configuration.
pub trait DisplayEnumerator {
    /// Current active displays, sorted by id. Never fails; no displays is an
    /// empty set.
    fn enumerate(&self) -> SignatureSet;
}

/// A borderless, input-transparent surface pinned just above the desktop.
pub trait SurfaceHandle {
    /// Global frame the surface covers
    fn frame(&self) -> Rect;

    /// Map the surface
    fn show(&mut self) -> Result<()>;

    /// Raise to the front of its stacking level without changing the level
    fn order_front(&mut self);
}

/// A muted, looping video player bound to one surface.
pub trait Player {
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Move playback to `position` (from the start of the clip)
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Current playback position in seconds, if the player can report one
    fn position(&self) -> Option<f64>;

    fn transport_state(&self) -> TransportState;

    /// Whether the player has a loaded item it could play
    fn has_item(&self) -> bool;

    /// React to a non-fatal stream notification (looping)
    fn on_signal(&mut self, signal: &PlayerSignal) -> Result<()>;
}

/// Everything the controller needs from the desktop.
pub trait Platform: DisplayEnumerator {
    type Surface: SurfaceHandle;
    type Player: Player;

    /// Create the wallpaper surface for one display
    fn create_surface(&mut self, key: SurfaceKey, display: &DisplaySignature)
    -> Result<Self::Surface>;

    /// Create a muted looping player for `video`, sized to `display`
    fn create_player(
        &mut self,
        key: SurfaceKey,
        display: &DisplaySignature,
        video: &VideoSource,
    ) -> Result<Self::Player>;

    /// Put the newest decoded frame of `player` on `surface`.
    ///
    /// Returns whether anything was committed.
    fn present(&mut self, surface: &mut Self::Surface, player: &mut Self::Player) -> Result<bool>;
}
