use anyhow::{Context, Result};
use common::{DisplayId, DisplaySignature, Rect, SignatureSet};
use smithay_client_toolkit::{
    compositor::{CompositorState, Region},
    output::OutputState,
    shell::{
        WaylandSurface,
        wlr_layer::{Anchor, KeyboardInteractivity, Layer, LayerShell, LayerSurface},
    },
};
use wayland_client::{QueueHandle, protocol::wl_output};

use super::WaylandPlatform;

/// Current outputs as a signature set; outputs without a known size are skipped
pub(super) fn enumerate(output_state: &OutputState) -> SignatureSet {
    let signatures = output_state
        .outputs()
        .filter_map(|output| output_state.info(&output))
        .filter_map(|info| {
            signature_from(
                info.id,
                info.logical_position.unwrap_or(info.location),
                info.logical_size,
                info.scale_factor,
            )
        })
        .collect();

    SignatureSet::from_unsorted(signatures)
}

/// Signature of one output, `None` while its logical size is unknown
pub(super) fn signature_from(
    id: u32,
    position: (i32, i32),
    logical_size: Option<(i32, i32)>,
    scale_factor: i32,
) -> Option<DisplaySignature> {
    let (width, height) = logical_size?;
    if width <= 0 || height <= 0 {
        return None;
    }

    Some(DisplaySignature::new(
        DisplayId(id),
        Rect::new(position.0, position.1, width as u32, height as u32),
        scale_factor.max(1) as f64,
    ))
}

pub(super) fn find_output(output_state: &OutputState, id: DisplayId) -> Option<wl_output::WlOutput> {
    output_state
        .outputs()
        .find(|output| output_state.info(output).is_some_and(|info| info.id == id.0))
}

/// Create a wallpaper layer surface for `output`.
///
/// The surface is not committed; mapping it is up to the caller.
pub(super) fn create_layer_surface(
    compositor_state: &CompositorState,
    layer_shell: &LayerShell,
    output: &wl_output::WlOutput,
    frame: Rect,
    qh: &QueueHandle<WaylandPlatform>,
) -> Result<LayerSurface> {
    let surface = compositor_state.create_surface(qh);

    let layer_surface = layer_shell.create_layer_surface(
        qh,
        surface,
        Layer::Background,
        Some("wallpaper"),
        Some(output),
    );

    layer_surface.set_anchor(Anchor::all());
    layer_surface.set_exclusive_zone(-1);
    layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);
    layer_surface.set_size(frame.width, frame.height);

    // Empty input region: clicks go through to whatever is below
    let region = Region::new(compositor_state).context("Failed to create input region")?;
    layer_surface
        .wl_surface()
        .set_input_region(Some(region.wl_region()));

    Ok(layer_surface)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_from_output_info() {
        let signature = signature_from(42, (1920, 0), Some((1280, 720)), 2).unwrap();
        assert_eq!(signature.id, DisplayId(42));
        assert_eq!(signature.frame, Rect::new(1920, 0, 1280, 720));
        assert_eq!(signature.scale, 2.0);
    }

    #[test]
    fn test_signature_requires_logical_size() {
        assert_eq!(signature_from(1, (0, 0), None, 1), None);
        assert_eq!(signature_from(1, (0, 0), Some((0, 1080)), 1), None);
        assert_eq!(signature_from(1, (0, 0), Some((-5, 1080)), 1), None);
    }

    #[test]
    fn test_signature_scale_never_below_one() {
        let signature = signature_from(1, (0, 0), Some((800, 600)), 0).unwrap();
        assert_eq!(signature.scale, 1.0);
    }
}
