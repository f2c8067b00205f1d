//! Surface set manager.
//!
//! Owns the ordered collection of playback surfaces (one per active
//! display, ascending display id) and is the only place surfaces are
//! created or destroyed.

use anyhow::{Context, Result};
use common::SignatureSet;
use std::time::Duration;

use super::PlaybackSurface;
use crate::log_and_continue;
use crate::platform::{Platform, Player, SurfaceHandle, SurfaceKey, VideoSource};

pub struct SurfaceSet<P: Platform> {
    surfaces: Vec<PlaybackSurface<P::Surface, P::Player>>,
    next_key: u64,
}

impl<P: Platform> SurfaceSet<P> {
    pub fn new() -> Self {
        Self {
            surfaces: Vec::new(),
            next_key: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaybackSurface<P::Surface, P::Player>> {
        self.surfaces.iter()
    }

    pub fn as_mut_slice(&mut self) -> &mut [PlaybackSurface<P::Surface, P::Player>] {
        &mut self.surfaces
    }

    pub fn find_mut(&mut self, key: SurfaceKey) -> Option<&mut PlaybackSurface<P::Surface, P::Player>> {
        self.surfaces.iter_mut().find(|s| s.key() == key)
    }

    /// Build one visible, playing surface per display.
    ///
    /// Must only be called on an empty set; callers tear down first.
    pub fn build(
        &mut self,
        platform: &mut P,
        displays: &SignatureSet,
        video: &VideoSource,
    ) -> Result<()> {
        debug_assert!(self.surfaces.is_empty(), "build over live surfaces");

        for display in displays {
            let key = SurfaceKey(self.next_key);
            self.next_key += 1;

            let mut surface = platform
                .create_surface(key, display)
                .with_context(|| format!("Failed to create surface for {}", display.id))?;
            let mut player = platform
                .create_player(key, display, video)
                .with_context(|| format!("Failed to create player for {}", display.id))?;

            surface
                .show()
                .with_context(|| format!("Failed to show surface for {}", display.id))?;
            player
                .play()
                .with_context(|| format!("Failed to start playback on {}", display.id))?;

            log::info!("Built {} for {}", key, display);
            self.surfaces
                .push(PlaybackSurface::new(key, *display, surface, player));
        }

        Ok(())
    }

    /// Pause every player, then release every surface with its player.
    pub fn teardown(&mut self) {
        if self.surfaces.is_empty() {
            return;
        }

        for surface in &mut self.surfaces {
            log_and_continue!(surface.player_mut().pause(), "pause player");
        }

        let count = self.surfaces.len();
        // Dropping releases loop controllers, failure subscriptions and surfaces
        self.surfaces.clear();
        log::info!("Tore down {} surface(s)", count);
    }

    /// Replace the surface set with one matching `displays`, keeping the
    /// playback position.
    ///
    /// Returns the position playback resumed from, or `None` when it
    /// restarted from zero.
    pub fn rebuild(
        &mut self,
        platform: &mut P,
        displays: &SignatureSet,
        video: &VideoSource,
    ) -> Result<Option<Duration>> {
        // All surfaces loop the same clip from the same start, any one will do
        let captured = self.surfaces.first().and_then(|s| s.player().position());

        self.teardown();
        self.build(platform, displays, video)?;

        let Some(resume_at) = resume_point(captured) else {
            log::debug!(
                "No valid resume position ({:?}), playback starts from zero",
                captured
            );
            return Ok(None);
        };

        for surface in &mut self.surfaces {
            let key = surface.key();
            let player = surface.player_mut();
            player
                .seek(resume_at)
                .with_context(|| format!("Failed to seek {} to {:?}", key, resume_at))?;
            player
                .play()
                .with_context(|| format!("Failed to resume {}", key))?;
        }

        log::info!(
            "Rebuilt {} surface(s), resumed at {:.3}s",
            self.surfaces.len(),
            resume_at.as_secs_f64()
        );
        Ok(Some(resume_at))
    }
}

impl<P: Platform> Default for SurfaceSet<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// A captured timestamp usable as a resume point.
///
/// Absent, NaN, infinite and negative values are not usable.
pub fn resume_point(captured: Option<f64>) -> Option<Duration> {
    let secs = captured?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
