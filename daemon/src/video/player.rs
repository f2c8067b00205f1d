//! GStreamer-backed looping player bound to one surface.

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use super::frames::{FrameSlot, VideoFrame};
use super::looper::{LoopAction, SegmentLooper};
use super::pipeline::{self, Crop};
use super::stats::{STATS_LOG_INTERVAL, VideoStats};
use crate::controller::ControlEvent;
use crate::platform::{Player, PlayerSignal, SurfaceKey, TransportState, VideoSource};

pub struct GstPlayer {
    key: SurfaceKey,
    pipeline: gst::Pipeline,
    app_sink: gst_app::AppSink,
    looper: SegmentLooper,
    frames: FrameSlot,
    stats: VideoStats,
    frame_interval: Duration,
}

impl GstPlayer {
    /// Build a muted player decoding `video` into a `target` sized render
    /// target. Stream notifications are posted to `events` tagged with `key`.
    pub fn new(
        key: SurfaceKey,
        video: &VideoSource,
        target: (u32, u32),
        events: UnboundedSender<ControlEvent>,
    ) -> Result<Self> {
        pipeline::initialize_gstreamer()?;

        let crop: Crop = pipeline::fill_crop((video.info.width, video.info.height), target);
        log::debug!(
            "{}: {}x{} -> {}x{} with {:?}",
            key,
            video.info.width,
            video.info.height,
            target.0,
            target.1,
            crop
        );

        let (pipeline, app_sink) = pipeline::build_pipeline(&video.path, crop, target)?;
        pipeline::configure_app_sink(&app_sink);

        let frames = FrameSlot::new();
        let stats = VideoStats::new(video.info.framerate);
        pipeline::setup_frame_callback(&app_sink, frames.clone(), stats.frames_dropped_handle());

        let bus = pipeline.bus().context("Pipeline has no bus")?;
        bus.set_sync_handler(move |_bus, msg| {
            if let Some(signal) = signal_for(msg) {
                // The loop may already be gone during shutdown
                let _ = events.send(ControlEvent::Player { key, signal });
            }
            gst::BusSyncReply::Drop
        });

        Ok(Self {
            key,
            pipeline,
            app_sink,
            looper: SegmentLooper::new(),
            frames,
            stats,
            frame_interval: video.info.frame_interval(),
        })
    }

    /// Newest decoded frame not yet presented
    pub fn take_frame(&mut self) -> Option<VideoFrame> {
        let frame = self.frames.take()?;
        self.stats.increment_rendered();
        self.stats
            .maybe_log_stats(&self.key.to_string(), STATS_LOG_INTERVAL);
        Some(frame)
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    fn apply(&mut self, action: LoopAction) -> Result<()> {
        let LoopAction::Seek { to, flush } = action;

        let mut flags = gst::SeekFlags::SEGMENT;
        if flush {
            flags |= gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE;
        }

        log::debug!("{}: segment seek to {:?} (flush: {})", self.key, to, flush);
        self.pipeline
            .seek_simple(flags, gst::ClockTime::from_nseconds(to.as_nanos() as u64))
            .with_context(|| format!("Failed to seek {} to {:?}", self.key, to))
    }
}

impl Player for GstPlayer {
    fn play(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Playing)
            .context("Failed to set pipeline to Playing state")?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Paused)
            .context("Failed to set pipeline to Paused state")?;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        match self.looper.request_seek(position) {
            Some(action) => self.apply(action),
            None => Ok(()),
        }
    }

    fn position(&self) -> Option<f64> {
        self.pipeline
            .query_position::<gst::ClockTime>()
            .map(|t| t.nseconds() as f64 / 1_000_000_000.0)
    }

    fn transport_state(&self) -> TransportState {
        transport_state(self.pipeline.current_state(), self.pipeline.pending_state())
    }

    fn has_item(&self) -> bool {
        self.pipeline.current_state() != gst::State::Null
            || self.pipeline.pending_state() != gst::State::VoidPending
    }

    fn on_signal(&mut self, signal: &PlayerSignal) -> Result<()> {
        let action = match signal {
            PlayerSignal::Prerolled => self.looper.on_prerolled(),
            PlayerSignal::SegmentDone => {
                self.stats.increment_loops();
                self.looper.on_segment_done()
            }
            PlayerSignal::EndOfStream => {
                self.stats.increment_loops();
                Some(self.looper.on_end_of_stream())
            }
            PlayerSignal::Failed(_) => None,
        };

        match action {
            Some(action) => self.apply(action),
            None => Ok(()),
        }
    }
}

impl Drop for GstPlayer {
    fn drop(&mut self) {
        // Unsubscribe first so nothing from this pipeline reaches the loop again
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }
        self.app_sink
            .set_callbacks(gst_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            log::warn!("Failed to set pipeline state to Null: {}", e);
        }
        self.frames.clear();

        log::debug!(
            "{}: pipeline stopped (rendered: {}, dropped: {})",
            self.key,
            self.stats.frames_rendered(),
            self.stats.frames_dropped()
        );
    }
}

fn signal_for(msg: &gst::Message) -> Option<PlayerSignal> {
    match msg.view() {
        gst::MessageView::AsyncDone(_) => Some(PlayerSignal::Prerolled),
        gst::MessageView::SegmentDone(_) => Some(PlayerSignal::SegmentDone),
        gst::MessageView::Eos(_) => Some(PlayerSignal::EndOfStream),
        gst::MessageView::Error(err) => {
            let source = msg
                .src()
                .map(|s| s.path_string().to_string())
                .unwrap_or_else(|| "pipeline".to_string());
            Some(PlayerSignal::Failed(format!("{} ({})", err.error(), source)))
        }
        _ => None,
    }
}

fn transport_state(current: gst::State, pending: gst::State) -> TransportState {
    if current == gst::State::Playing && pending != gst::State::Paused {
        TransportState::Playing
    } else if pending == gst::State::Playing {
        TransportState::WaitingToPlay
    } else {
        TransportState::Paused
    }
}
