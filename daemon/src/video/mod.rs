//! Video playback for the wallpaper surfaces
//!
//! - `validator`: one-shot probe of the file before anything is shown
//! - `pipeline`: GStreamer pipeline setup and the fill crop
//! - `looper`: seamless looping with segment seeks
//! - `frames`: hand-off of decoded frames to the render loop
//! - `stats`: per-player counters
//! - `player`: `GstPlayer`, one muted looping player per surface

mod frames;
mod looper;
mod pipeline;
mod player;
mod stats;
pub mod validator;

pub use frames::VideoFrame;
pub use player::GstPlayer;
