use common::DisplaySignature;

use crate::platform::{Player, SurfaceHandle, SurfaceKey};

/// Everything rendering the wallpaper on one display.
///
/// Owns the surface (with its render target) and the player (with its loop
/// controller and failure subscription). Dropping it releases all of them;
/// the video asset itself is shared and not owned here.
pub struct PlaybackSurface<S, P> {
    key: SurfaceKey,
    display: DisplaySignature,
    // Field order is drop order: stop decoding before the surface goes away
    player: P,
    surface: S,
}

impl<S: SurfaceHandle, P: Player> PlaybackSurface<S, P> {
    pub fn new(key: SurfaceKey, display: DisplaySignature, surface: S, player: P) -> Self {
        Self {
            key,
            display,
            surface,
            player,
        }
    }

    pub fn key(&self) -> SurfaceKey {
        self.key
    }

    pub fn display(&self) -> &DisplaySignature {
        &self.display
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Borrow surface and player at the same time (presentation needs both)
    pub fn parts_mut(&mut self) -> (&mut S, &mut P) {
        (&mut self.surface, &mut self.player)
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}
