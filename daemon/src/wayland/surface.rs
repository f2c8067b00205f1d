use anyhow::Result;
use common::Rect;
use smithay_client_toolkit::shell::{
    WaylandSurface,
    wlr_layer::{Layer, LayerSurface},
};
use smithay_client_toolkit::shm::Shm;
use std::cell::Cell;
use std::rc::{Rc, Weak};
use wayland_client::QueueHandle;

use super::WaylandPlatform;
use crate::buffer::ShmBuffer;
use crate::commit_buffer;
use crate::platform::{SurfaceHandle, SurfaceKey};
use crate::video::VideoFrame;

/// Most recent configure size, written by the layer-shell handler
pub(super) type ConfigureCell = Cell<Option<(u32, u32)>>;

/// Buffers in flight per surface
const MAX_BUFFERS: usize = 2;

/// A background layer surface with its shm render target
pub struct LayerWindow {
    key: SurfaceKey,
    // Field order is drop order: destroy the surface before its buffers
    layer: LayerSurface,
    buffers: Vec<ShmBuffer>,
    current: Option<usize>,
    frame: Rect,
    scale: i32,
    configured: Rc<ConfigureCell>,
    painted: bool,
}

impl LayerWindow {
    pub(super) fn new(key: SurfaceKey, layer: LayerSurface, frame: Rect, scale: i32) -> Self {
        Self {
            key,
            layer,
            buffers: Vec::with_capacity(MAX_BUFFERS),
            current: None,
            frame,
            scale: scale.max(1),
            configured: Rc::new(Cell::new(None)),
            painted: false,
        }
    }

    pub(super) fn configure_handle(&self) -> Weak<ConfigureCell> {
        Rc::downgrade(&self.configured)
    }

    pub(super) fn layer(&self) -> &LayerSurface {
        &self.layer
    }

    pub fn is_configured(&self) -> bool {
        self.configured.get().is_some()
    }

    /// Whether a frame could be committed right now without waiting for a release
    pub fn can_present(&self) -> bool {
        self.is_configured() && has_free_buffer(self.buffers.iter().map(ShmBuffer::is_busy))
    }

    /// Buffer size in pixels for the configured surface size
    fn pixel_size(&self) -> Option<(u32, u32)> {
        let (width, height) = self.configured.get()?;
        // Zero means the compositor left the size to us
        let width = if width == 0 { self.frame.width } else { width };
        let height = if height == 0 { self.frame.height } else { height };
        let scale = self.scale as u32;
        Some((width * scale, height * scale))
    }

    /// Index of a released buffer of `size`, allocating one if allowed
    fn acquire_buffer(
        &mut self,
        shm: &Shm,
        qh: &QueueHandle<WaylandPlatform>,
        (width, height): (u32, u32),
    ) -> Result<Option<usize>> {
        let before = self.buffers.len();
        // Resized: forget released buffers of the old size
        self.buffers
            .retain(|b| (b.width(), b.height()) == (width, height) || b.is_busy());
        if self.buffers.len() != before {
            self.current = None;
        }

        if let Some(index) = self.buffers.iter().position(|b| {
            (b.width(), b.height()) == (width, height) && !b.is_busy()
        }) {
            return Ok(Some(index));
        }

        if self.buffers.len() >= MAX_BUFFERS {
            return Ok(None);
        }

        log::debug!("{}: allocating {}x{} buffer", self.key, width, height);
        self.buffers
            .push(ShmBuffer::new(shm.wl_shm(), width, height, qh)?);
        Ok(Some(self.buffers.len() - 1))
    }

    /// Put `frame` on screen, or the background colour if nothing was shown yet.
    ///
    /// Returns whether a buffer was committed.
    pub(super) fn present(
        &mut self,
        shm: &Shm,
        qh: &QueueHandle<WaylandPlatform>,
        frame: Option<&VideoFrame>,
        background: (u8, u8, u8, u8),
    ) -> Result<bool> {
        let Some(size) = self.pixel_size() else {
            return Ok(false);
        };
        if frame.is_none() && self.painted {
            return Ok(false);
        }

        let Some(index) = self.acquire_buffer(shm, qh, size)? else {
            log::trace!("{}: all buffers busy, skipping frame", self.key);
            return Ok(false);
        };

        let buffer = &mut self.buffers[index];
        match frame {
            Some(frame) => buffer.write_frame(&frame.data, frame.width, frame.height, frame.stride),
            None => {
                let (r, g, b, a) = background;
                buffer.fill_color(r, g, b, a);
            }
        }

        self.layer.wl_surface().set_buffer_scale(self.scale);
        commit_buffer!(self.layer, buffer, size.0, size.1);
        buffer.mark_busy();

        self.current = Some(index);
        self.painted = true;
        Ok(true)
    }
}

impl SurfaceHandle for LayerWindow {
    fn frame(&self) -> Rect {
        self.frame
    }

    fn show(&mut self) -> Result<()> {
        // First commit without a buffer asks the compositor for a configure
        self.layer.commit();
        log::debug!("{}: mapped at {}", self.key, self.frame);
        Ok(())
    }

    fn order_front(&mut self) {
        self.layer.set_layer(Layer::Background);

        match self.current.and_then(|i| self.buffers.get(i)) {
            Some(buffer) => {
                commit_buffer!(self.layer, buffer, buffer.width(), buffer.height());
                buffer.mark_busy();
            }
            None => self.layer.commit(),
        }
    }
}

/// Busy buffers are never reused; a non-busy one of the wrong size is
/// replaced, so only the busy count limits how many can be in flight.
fn has_free_buffer(busy: impl IntoIterator<Item = bool>) -> bool {
    busy.into_iter().filter(|&busy| busy).count() < MAX_BUFFERS
}

impl Drop for LayerWindow {
    fn drop(&mut self) {
        log::debug!(
            "{}: releasing surface ({} buffer(s))",
            self.key,
            self.buffers.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_buffer_while_one_in_flight() {
        assert!(has_free_buffer([false; 0]));
        assert!(has_free_buffer([true]));
        assert!(has_free_buffer([true, false]));
    }

    #[test]
    fn test_no_free_buffer_when_all_in_flight() {
        assert!(!has_free_buffer([true, true]));
    }
}
