use smithay_client_toolkit::{
    compositor::CompositorHandler,
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputState},
    registry::ProvidesRegistryState,
    registry_handlers,
    shell::{
        WaylandSurface,
        wlr_layer::{LayerShellHandler, LayerSurface, LayerSurfaceConfigure},
    },
    shm::{Shm, ShmHandler},
};
use std::sync::Arc;
use wayland_client::{
    Connection, Dispatch, Proxy, QueueHandle,
    protocol::{wl_buffer, wl_output, wl_shm_pool, wl_surface},
};

use super::WaylandPlatform;
use crate::buffer::BufferState;
use crate::controller::ControlEvent;

impl CompositorHandler for WaylandPlatform {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        // Output scale changes arrive through update_output
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WaylandPlatform {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        if let Some(info) = self.output_state.info(&output) {
            log::info!(
                "Output added: {} ({:?}) {:?} @ {}x",
                info.id,
                info.name,
                info.logical_size,
                info.scale_factor
            );
        }
        self.notify(ControlEvent::ConfigurationChanged);
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        if let Some(info) = self.output_state.info(&output) {
            log::debug!(
                "Output updated: {} {:?} {:?} @ {}x",
                info.id,
                info.logical_position,
                info.logical_size,
                info.scale_factor
            );
        }
        self.notify(ControlEvent::ConfigurationChanged);
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        log::info!("Output removed");
        self.notify(ControlEvent::ConfigurationChanged);
    }
}

impl LayerShellHandler for WaylandPlatform {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, layer: &LayerSurface) {
        log::info!("Layer surface {} closed by compositor", layer.wl_surface().id());
        self.notify(ControlEvent::SurfaceClosed);
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let (width, height) = configure.new_size;
        let id = layer.wl_surface().id();

        if self.record_configure(&id, (width, height)) {
            log::debug!("Layer surface {} configured: {}x{}", id, width, height);
        } else {
            log::debug!("Configure for unknown surface {}", id);
        }
    }
}

impl ProvidesRegistryState for WaylandPlatform {
    fn registry(&mut self) -> &mut smithay_client_toolkit::registry::RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState];
}

impl ShmHandler for WaylandPlatform {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl Dispatch<wl_buffer::WlBuffer, Arc<BufferState>> for WaylandPlatform {
    fn event(
        _state: &mut Self,
        _proxy: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        data: &Arc<BufferState>,
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            data.release();
        }
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ()> for WaylandPlatform {
    fn event(
        _state: &mut Self,
        _proxy: &wl_shm_pool::WlShmPool,
        _event: wl_shm_pool::Event,
        _data: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
    }
}

delegate_compositor!(WaylandPlatform);
delegate_output!(WaylandPlatform);
delegate_layer!(WaylandPlatform);
delegate_shm!(WaylandPlatform);
delegate_registry!(WaylandPlatform);
