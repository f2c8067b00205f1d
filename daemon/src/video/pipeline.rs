//! GStreamer pipeline setup and configuration
//!
//! One pipeline per surface: decode, crop the source to the surface's
//! aspect ratio, scale to the render target and hand BGRA frames to an
//! appsink. Audio pads of `decodebin` are left unlinked, so playback is
//! always silent.

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::frames::{FrameSlot, VideoFrame};

/// Pixels removed from each edge of the source frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crop {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// Crop that makes `source` fill `target` without letterboxing.
///
/// The source is scaled by `max(tw / sw, th / sh)` and the overflow on the
/// longer axis is cut evenly from both sides.
pub fn fill_crop(source: (u32, u32), target: (u32, u32)) -> Crop {
    let (sw, sh) = (source.0 as u64, source.1 as u64);
    let (tw, th) = (target.0 as u64, target.1 as u64);
    if sw == 0 || sh == 0 || tw == 0 || th == 0 {
        return Crop::default();
    }

    if tw * sh >= th * sw {
        // Target is relatively wider: full source width, trim top and bottom
        let visible = div_round(sw * th, tw).min(sh);
        let (top, bottom) = split(sh - visible);
        Crop {
            top,
            bottom,
            ..Crop::default()
        }
    } else {
        let visible = div_round(sh * tw, th).min(sw);
        let (left, right) = split(sw - visible);
        Crop {
            left,
            right,
            ..Crop::default()
        }
    }
}

fn div_round(n: u64, d: u64) -> u64 {
    (n + d / 2) / d
}

fn split(total: u64) -> (u32, u32) {
    let first = total / 2;
    (first as u32, (total - first) as u32)
}

/// Initialize GStreamer (idempotent)
pub fn initialize_gstreamer() -> Result<()> {
    gst::init().context("Failed to initialize GStreamer")
}

/// Pipeline description for a render target of `width`x`height` pixels
pub fn pipeline_description(width: u32, height: u32) -> String {
    format!(
        "filesrc name=src ! decodebin ! videoconvert ! videocrop name=crop ! \
         videoscale add-borders=false ! \
         video/x-raw,format=BGRA,width={},height={},pixel-aspect-ratio=1/1 ! \
         appsink name=sink",
        width, height
    )
}

/// Build a paused-ready pipeline playing `path` into a `target` sized appsink
pub fn build_pipeline(
    path: &Path,
    crop: Crop,
    target: (u32, u32),
) -> Result<(gst::Pipeline, gst_app::AppSink)> {
    let description = pipeline_description(target.0, target.1);
    log::debug!("GStreamer pipeline: {}", description);

    let pipeline = gst::parse::launch(&description)
        .context("Failed to create GStreamer pipeline")?
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| anyhow::anyhow!("Pipeline is not a gst::Pipeline"))?;

    let src = pipeline
        .by_name("src")
        .context("Failed to get filesrc from pipeline")?;
    src.set_property("location", path.to_string_lossy().as_ref());

    let cropper = pipeline
        .by_name("crop")
        .context("Failed to get videocrop from pipeline")?;
    cropper.set_property("left", crop.left as i32);
    cropper.set_property("right", crop.right as i32);
    cropper.set_property("top", crop.top as i32);
    cropper.set_property("bottom", crop.bottom as i32);

    let app_sink = pipeline
        .by_name("sink")
        .context("Failed to get appsink from pipeline")?
        .dynamic_cast::<gst_app::AppSink>()
        .map_err(|_| anyhow::anyhow!("sink is not an AppSink"))?;

    Ok((pipeline, app_sink))
}

/// Configure AppSink for low-latency video delivery
///
/// - `sync=true`: frames are released at their presentation time
/// - `max-buffers=1` and `drop=true`: never queue stale frames
pub fn configure_app_sink(app_sink: &gst_app::AppSink) {
    app_sink.set_property("sync", true);
    app_sink.set_property("max-buffers", 1u32);
    app_sink.set_property("drop", true);
}

/// Route decoded frames into `slot`
pub fn setup_frame_callback(
    app_sink: &gst_app::AppSink,
    slot: FrameSlot,
    frames_dropped: Arc<AtomicU64>,
) {
    app_sink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                let info =
                    gst_video::VideoInfo::from_caps(caps).map_err(|_| gst::FlowError::Error)?;
                let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                let frame = VideoFrame {
                    width: info.width(),
                    height: info.height(),
                    stride: info.stride()[0] as usize,
                    data: map.as_slice().to_vec(),
                };

                if slot.store(frame) {
                    frames_dropped.fetch_add(1, Ordering::Relaxed);
                    log::trace!("Video frame dropped (previous frame not consumed in time)");
                }

                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_crop_trims_sides_for_square_target() {
        assert_eq!(
            fill_crop((1920, 1080), (1080, 1080)),
            Crop {
                left: 420,
                right: 420,
                top: 0,
                bottom: 0
            }
        );
    }

    #[test]
    fn test_fill_crop_trims_sides_for_taller_target() {
        // 2560x1600 (16:10) from 1280x720 (16:9)
        assert_eq!(
            fill_crop((1280, 720), (2560, 1600)),
            Crop {
                left: 64,
                right: 64,
                top: 0,
                bottom: 0
            }
        );
    }

    #[test]
    fn test_fill_crop_trims_top_and_bottom_for_wider_target() {
        // 21:9 ultrawide from 16:9 source
        let crop = fill_crop((1920, 1080), (3440, 1440));
        assert_eq!(crop.left, 0);
        assert_eq!(crop.right, 0);
        assert_eq!(crop.top + crop.bottom, 1080 - 804);
        assert!(crop.top.abs_diff(crop.bottom) <= 1);
    }

    #[test]
    fn test_fill_crop_same_aspect_is_identity() {
        assert_eq!(fill_crop((1920, 1080), (3840, 2160)), Crop::default());
        assert_eq!(fill_crop((1280, 720), (1280, 720)), Crop::default());
    }

    #[test]
    fn test_fill_crop_odd_overflow_splits_unevenly() {
        let crop = fill_crop((101, 100), (100, 100));
        assert_eq!(crop.left + crop.right, 1);
        assert_eq!(crop.top + crop.bottom, 0);
    }

    #[test]
    fn test_fill_crop_zero_dimensions() {
        assert_eq!(fill_crop((0, 1080), (1920, 1080)), Crop::default());
        assert_eq!(fill_crop((1920, 1080), (0, 0)), Crop::default());
    }

    #[test]
    fn test_pipeline_description_targets_render_size() {
        let description = pipeline_description(2560, 1440);
        assert!(description.contains("width=2560,height=1440"));
        assert!(description.contains("format=BGRA"));
        assert!(description.contains("videocrop name=crop"));
        assert!(description.contains("appsink name=sink"));
        assert!(!description.contains("audio"));
    }
}
