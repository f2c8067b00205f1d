//! Startup media validation.
//!
//! The file is probed once with the GStreamer discoverer before any surface
//! exists. Checks run in a fixed order and the first failing one decides
//! the diagnostic: decodable, playable, unprotected, has a video track.

use common::{MediaError, MediaInfo};
use gstreamer as gst;
use gstreamer::glib;
use gstreamer_pbutils as gst_pbutils;
use gstreamer_pbutils::prelude::*;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;

/// How far the discoverer got with the file
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeStatus {
    Complete,
    MissingPlugins,
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoTrack {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<f64>,
}

/// Everything validation needs to know about a file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    pub status: ProbeStatus,
    pub protected: bool,
    pub video_tracks: Vec<VideoTrack>,
    pub duration: Option<Duration>,
    pub seekable: bool,
}

/// Decide whether a probed file can be played
pub fn classify(probe: MediaProbe, timeout: Duration) -> Result<MediaInfo, MediaError> {
    match probe.status {
        ProbeStatus::Failed(cause) => return Err(MediaError::Decode(cause)),
        ProbeStatus::TimedOut => return Err(MediaError::Timeout(timeout)),
        ProbeStatus::MissingPlugins => return Err(MediaError::NotPlayable),
        ProbeStatus::Complete => {}
    }

    if probe.protected {
        return Err(MediaError::Protected);
    }

    let track = probe
        .video_tracks
        .into_iter()
        .find(|t| t.width > 0 && t.height > 0)
        .ok_or(MediaError::NoVideoTrack)?;

    Ok(MediaInfo {
        width: track.width,
        height: track.height,
        framerate: track.framerate,
        duration: probe.duration,
        seekable: probe.seekable,
    })
}

/// Validate `path`, giving up after `timeout`
pub async fn validate(path: PathBuf, timeout: Duration) -> Result<MediaInfo, MediaError> {
    log::info!("Validating {}", path.display());

    let probe = run_detached(move || discover(&path, timeout))?;
    let info = validate_with(timeout, probe).await?;

    log::info!(
        "Media OK: {}x{} @ {} fps, duration {:?}",
        info.width,
        info.height,
        info.framerate
            .map(|f| format!("{:.2}", f))
            .unwrap_or_else(|| "?".to_string()),
        info.duration
    );
    if !info.seekable {
        log::warn!("Media is not seekable, loops may restart with a visible gap");
    }
    Ok(info)
}

/// Run `probe` on a thread of its own.
///
/// The returned future resolves with the probe's result. Dropping it
/// abandons the thread, so a hung discoverer never holds up process exit.
fn run_detached<F>(
    probe: F,
) -> Result<impl Future<Output = Result<MediaProbe, MediaError>>, MediaError>
where
    F: FnOnce() -> Result<MediaProbe, MediaError> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("media-probe".to_string())
        .spawn(move || {
            // The receiver is gone once validation timed out
            let _ = tx.send(probe());
        })
        .map_err(|e| MediaError::Decode(format!("failed to start media probe: {}", e)))?;

    Ok(async move {
        rx.await
            .map_err(|_| MediaError::Decode("media probe exited without a result".to_string()))?
    })
}

/// Bound `probe` by `timeout`, then classify the result
pub async fn validate_with<F>(timeout: Duration, probe: F) -> Result<MediaInfo, MediaError>
where
    F: Future<Output = Result<MediaProbe, MediaError>>,
{
    match tokio::time::timeout(timeout, probe).await {
        Ok(probe) => classify(probe?, timeout),
        Err(_) => Err(MediaError::Timeout(timeout)),
    }
}

fn discover(path: &Path, timeout: Duration) -> Result<MediaProbe, MediaError> {
    gst::init().map_err(|e| MediaError::Decode(e.to_string()))?;

    let uri = glib::filename_to_uri(path, None)
        .map_err(|e| MediaError::Decode(e.message().to_string()))?;

    let discoverer =
        gst_pbutils::Discoverer::new(gst::ClockTime::from_nseconds(timeout.as_nanos() as u64))
            .map_err(|e| MediaError::Decode(e.message().to_string()))?;

    let info = match discoverer.discover_uri(&uri) {
        Ok(info) => info,
        Err(err) => return Ok(probe_from_error(&err)),
    };

    let status = match info.result() {
        gst_pbutils::DiscovererResult::Ok => ProbeStatus::Complete,
        gst_pbutils::DiscovererResult::MissingPlugins => ProbeStatus::MissingPlugins,
        gst_pbutils::DiscovererResult::Timeout => ProbeStatus::TimedOut,
        other => ProbeStatus::Failed(format!("{:?}", other)),
    };

    let protected = info.stream_list().iter().any(|stream| {
        stream
            .caps()
            .is_some_and(|caps| caps.iter().any(is_protected_structure))
    });

    let video_tracks = info
        .video_streams()
        .iter()
        .filter(|v| !v.is_image())
        .map(|v| {
            let fps = v.framerate();
            VideoTrack {
                width: v.width(),
                height: v.height(),
                framerate: (fps.numer() > 0 && fps.denom() > 0)
                    .then(|| fps.numer() as f64 / fps.denom() as f64),
            }
        })
        .collect();

    Ok(MediaProbe {
        status,
        protected,
        video_tracks,
        duration: info.duration().map(|d| Duration::from_nanos(d.nseconds())),
        seekable: info.is_seekable(),
    })
}

/// Sort a discoverer error into the bucket a completed probe would have
/// landed in. Undecodable and encrypted streams surface as errors.
fn probe_from_error(err: &glib::Error) -> MediaProbe {
    let probe = |status| MediaProbe {
        status,
        protected: false,
        video_tracks: Vec::new(),
        duration: None,
        seekable: false,
    };

    if err.matches(gst::StreamError::Decrypt) || err.matches(gst::StreamError::DecryptNokey) {
        MediaProbe {
            protected: true,
            ..probe(ProbeStatus::Complete)
        }
    } else if err.matches(gst::CoreError::MissingPlugin)
        || err.matches(gst::StreamError::CodecNotFound)
    {
        probe(ProbeStatus::MissingPlugins)
    } else {
        probe(ProbeStatus::Failed(err.message().to_string()))
    }
}

fn is_protected_structure(s: &gst::StructureRef) -> bool {
    let name = s.name();
    name.starts_with("application/x-cenc")
        || name.starts_with("application/x-webm-enc")
        || s.has_field("protection-system")
}
