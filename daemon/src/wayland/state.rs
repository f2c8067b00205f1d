use anyhow::{Context, Result};
use common::{DisplaySignature, SignatureSet};
use smithay_client_toolkit::{
    compositor::CompositorState,
    output::OutputState,
    registry::RegistryState,
    shell::{WaylandSurface, wlr_layer::LayerShell},
    shm::Shm,
};
use std::collections::HashMap;
use std::rc::Weak;
use tokio::sync::mpsc::UnboundedSender;
use wayland_client::{Proxy, QueueHandle, backend::ObjectId, globals::GlobalList};

use super::outputs;
use super::surface::{ConfigureCell, LayerWindow};
use crate::controller::ControlEvent;
use crate::platform::{DisplayEnumerator, Platform, SurfaceKey, VideoSource};
use crate::video::GstPlayer;

/// Wayland globals plus everything the protocol handlers need to reach
pub struct WaylandPlatform {
    pub(super) registry_state: RegistryState,
    pub(super) compositor_state: CompositorState,
    pub(super) layer_shell: LayerShell,
    pub(super) output_state: OutputState,
    pub(super) shm: Shm,
    pub(super) qh: QueueHandle<WaylandPlatform>,
    /// Output and surface notifications for the controller
    pub(super) events: UnboundedSender<ControlEvent>,
    /// Configure slots of live surfaces, keyed by their `wl_surface`
    pub(super) configures: HashMap<ObjectId, Weak<ConfigureCell>>,
    background: (u8, u8, u8, u8),
}

impl WaylandPlatform {
    pub fn bind(
        globals: &GlobalList,
        qh: QueueHandle<Self>,
        events: UnboundedSender<ControlEvent>,
        background: (u8, u8, u8, u8),
    ) -> Result<Self> {
        let compositor_state =
            CompositorState::bind(globals, &qh).context("wl_compositor not available")?;
        let layer_shell =
            LayerShell::bind(globals, &qh).context("layer shell not available")?;
        let output_state = OutputState::new(globals, &qh);
        let shm = Shm::bind(globals, &qh).context("wl_shm not available")?;

        Ok(Self {
            registry_state: RegistryState::new(globals),
            compositor_state,
            layer_shell,
            output_state,
            shm,
            qh,
            events,
            configures: HashMap::new(),
            background,
        })
    }

    /// Record a configure for `surface`; false when it belongs to no live window
    pub(super) fn record_configure(&mut self, surface: &ObjectId, size: (u32, u32)) -> bool {
        self.configures.retain(|_, cell| cell.strong_count() > 0);

        match self.configures.get(surface).and_then(Weak::upgrade) {
            Some(cell) => {
                cell.set(Some(size));
                true
            }
            None => false,
        }
    }

    pub(super) fn notify(&self, event: ControlEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Controller gone, dropping Wayland notification");
        }
    }
}

impl DisplayEnumerator for WaylandPlatform {
    fn enumerate(&self) -> SignatureSet {
        outputs::enumerate(&self.output_state)
    }
}

impl Platform for WaylandPlatform {
    type Surface = LayerWindow;
    type Player = GstPlayer;

    fn create_surface(&mut self, key: SurfaceKey, display: &DisplaySignature) -> Result<LayerWindow> {
        let output = outputs::find_output(&self.output_state, display.id)
            .with_context(|| format!("{} is no longer connected", display.id))?;

        let layer = outputs::create_layer_surface(
            &self.compositor_state,
            &self.layer_shell,
            &output,
            display.frame,
            &self.qh,
        )?;

        let window = LayerWindow::new(key, layer, display.frame, display.scale.round() as i32);
        self.configures
            .insert(window.layer().wl_surface().id(), window.configure_handle());

        log::debug!("{}: layer surface created on {}", key, display.id);
        Ok(window)
    }

    fn create_player(
        &mut self,
        key: SurfaceKey,
        display: &DisplaySignature,
        video: &VideoSource,
    ) -> Result<GstPlayer> {
        GstPlayer::new(key, video, display.pixel_size(), self.events.clone())
    }

    fn present(&mut self, surface: &mut LayerWindow, player: &mut GstPlayer) -> Result<bool> {
        if !surface.is_configured() {
            return Ok(false);
        }
        // Leave the frame in its slot until a buffer frees up, so a newer
        // one replacing it is counted as dropped
        let frame = if surface.can_present() {
            player.take_frame()
        } else {
            None
        };
        surface.present(&self.shm, &self.qh, frame.as_ref(), self.background)
    }
}
