//! Playback watchdog.
//!
//! Runs once per watchdog period on the control loop. Any player that has
//! something to play but is not playing gets a resume and its surface is
//! raised again. Surfaces are never recreated here.

use crate::controller::PlaybackSurface;
use crate::log_and_continue;
use crate::platform::{Player, SurfaceHandle, TransportState};

#[derive(Debug, Default)]
pub struct Watchdog {
    ticks: u64,
    nudges: u64,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every surface once; returns how many were nudged
    pub fn tick<S: SurfaceHandle, P: Player>(
        &mut self,
        surfaces: &mut [PlaybackSurface<S, P>],
    ) -> usize {
        self.ticks += 1;
        let mut nudged = 0;

        for surface in surfaces.iter_mut() {
            let state = surface.player().transport_state();
            if !surface.player().has_item() || state == TransportState::Playing {
                continue;
            }

            log::warn!(
                "Playback on {} stalled ({:?}), resuming",
                surface.display().id,
                state
            );
            log_and_continue!(surface.player_mut().play(), "resume stalled player");
            surface.surface_mut().order_front();
            nudged += 1;
        }

        self.nudges += nudged as u64;
        if nudged > 0 {
            log::debug!(
                "Watchdog tick {}: nudged {} surface(s), {} total",
                self.ticks,
                nudged,
                self.nudges
            );
        }
        nudged
    }

    #[cfg(test)]
    pub fn nudges(&self) -> u64 {
        self.nudges
    }
}
