//! Wayland compositor integration
//!
//! - state: globals and the `Platform` implementation
//! - outputs: output enumeration and layer surface creation
//! - surface: `LayerWindow`, one background surface per display
//! - event_handlers: Wayland protocol event handlers
//! - event_loop: the blocking loop driving the controller

mod event_handlers;
mod event_loop;
mod outputs;
mod state;
mod surface;

pub use event_loop::run;
use state::WaylandPlatform;
