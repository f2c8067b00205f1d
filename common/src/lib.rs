//! Common types and utilities for vidpaper.
//!
//! This crate defines the platform-neutral values shared by the playback
//! controller: display geometry, the comparable display signature used to
//! detect configuration changes, and the media validation diagnostics.
//!
//! Nothing in here talks to a compositor or a codec, so everything can be
//! exercised without a running desktop session.
//!
//! # Examples
//!
//! ```
//! use common::{DisplayId, DisplaySignature, Rect, SignatureSet};
//!
//! let laptop = DisplaySignature::new(DisplayId(2), Rect::new(1920, 0, 1280, 720), 1.0);
//! let monitor = DisplaySignature::new(DisplayId(1), Rect::new(0, 0, 1920, 1080), 2.0);
//!
//! // Enumeration order does not matter, sets are always ordered by id
//! let set = SignatureSet::from_unsorted(vec![laptop, monitor]);
//! assert_eq!(set.ids().collect::<Vec<_>>(), vec![DisplayId(1), DisplayId(2)]);
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Opaque identifier of an active display.
///
/// On Wayland this is the registry global name of the `wl_output`, which is
/// stable for as long as the output stays connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayId(pub u32);

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display-{}", self.0)
    }
}

/// Rectangle in global desktop coordinates (logical pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Size in physical pixels for the given density factor.
    ///
    /// Fractional results are rounded up so the render target never ends up
    /// smaller than the surface it backs.
    pub fn pixel_size(&self, scale: f64) -> (u32, u32) {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        (
            (self.width as f64 * scale).ceil() as u32,
            (self.height as f64 * scale).ceil() as u32,
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.x, self.y
        )
    }
}

/// Comparable snapshot of one display's identity, geometry and scale.
///
/// Value type with no identity beyond its fields. Recomputed on every
/// enumeration and never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySignature {
    pub id: DisplayId,
    pub frame: Rect,
    pub scale: f64,
}

impl DisplaySignature {
    pub const fn new(id: DisplayId, frame: Rect, scale: f64) -> Self {
        Self { id, frame, scale }
    }

    /// Physical pixel size of the display's frame
    pub fn pixel_size(&self) -> (u32, u32) {
        self.frame.pixel_size(self.scale)
    }
}

impl fmt::Display for DisplaySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @{}x", self.id, self.frame, self.scale)
    }
}

/// Ordered set of display signatures.
///
/// Always sorted ascending by display id, which makes two sets taken from
/// separate enumerations directly comparable with `==`: they are equal iff
/// they hold the same signatures in the same id order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureSet(Vec<DisplaySignature>);

impl SignatureSet {
    /// Build a set from signatures in arbitrary enumeration order.
    ///
    /// If the platform reports the same id twice the last report wins.
    pub fn from_unsorted(mut signatures: Vec<DisplaySignature>) -> Self {
        signatures.reverse();
        signatures.sort_by_key(|s| s.id);
        signatures.dedup_by_key(|s| s.id);
        Self(signatures)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DisplaySignature> {
        self.0.iter()
    }

    /// Display ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = DisplayId> + '_ {
        self.0.iter().map(|s| s.id)
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a DisplaySignature;
    type IntoIter = std::slice::Iter<'a, DisplaySignature>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Properties of a validated video asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Natural width of the first video track
    pub width: u32,
    /// Natural height of the first video track
    pub height: u32,
    /// Frames per second, when the container declares one
    pub framerate: Option<f64>,
    pub duration: Option<Duration>,
    pub seekable: bool,
}

impl MediaInfo {
    /// Interval between frames, falling back to 30 fps for variable-rate media
    pub fn frame_interval(&self) -> Duration {
        match self.framerate {
            Some(fps) if fps.is_finite() && fps > 0.0 => Duration::from_secs_f64(1.0 / fps),
            _ => Duration::from_millis(33),
        }
    }
}

/// Reasons a video file is rejected before any surface is created.
///
/// The display strings are the diagnostics printed on standard error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("failed to decode media: {0}")]
    Decode(String),

    #[error("not playable")]
    NotPlayable,

    #[error("protected content")]
    Protected,

    #[error("no video track")]
    NoVideoTrack,

    #[error("timed out after {}s waiting for media metadata", .0.as_secs())]
    Timeout(Duration),
}
