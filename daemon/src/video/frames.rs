//! Latest-frame slot shared between the appsink streaming thread and the
//! control loop.
//!
//! Only the newest decoded frame is kept; a frame replaced before the loop
//! consumed it counts as dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One decoded BGRA frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, may include padding
    pub stride: usize,
    pub data: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct FrameSlot {
    latest: Arc<Mutex<Option<VideoFrame>>>,
    new_frame_available: Arc<AtomicBool>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` as the newest one.
    ///
    /// Returns true if an unconsumed frame was overwritten.
    pub fn store(&self, frame: VideoFrame) -> bool {
        let Ok(mut latest) = self.latest.lock() else {
            return false;
        };
        let dropped = self.new_frame_available.swap(true, Ordering::AcqRel);
        *latest = Some(frame);
        dropped
    }

    #[cfg(test)]
    pub fn has_new_frame(&self) -> bool {
        self.new_frame_available.load(Ordering::Acquire)
    }

    /// Take the newest frame if it has not been consumed yet
    pub fn take(&self) -> Option<VideoFrame> {
        let mut latest = self.latest.lock().ok()?;
        if !self.new_frame_available.swap(false, Ordering::AcqRel) {
            return None;
        }
        latest.take()
    }

    pub fn clear(&self) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
        self.new_frame_available.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fill: u8) -> VideoFrame {
        VideoFrame {
            width: 1,
            height: 1,
            stride: 4,
            data: vec![fill; 4],
        }
    }

    #[test]
    fn test_take_returns_each_frame_once() {
        let slot = FrameSlot::new();
        assert_eq!(slot.take(), None);

        assert!(!slot.store(frame(1)));
        assert!(slot.has_new_frame());
        assert_eq!(slot.take(), Some(frame(1)));
        assert!(!slot.has_new_frame());
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_overwrite_counts_as_drop() {
        let slot = FrameSlot::new();
        assert!(!slot.store(frame(1)));
        assert!(slot.store(frame(2)));
        assert_eq!(slot.take(), Some(frame(2)));
    }

    #[test]
    fn test_clones_share_the_slot() {
        let producer = FrameSlot::new();
        let consumer = producer.clone();

        let handle = std::thread::spawn(move || producer.store(frame(9)));
        assert!(!handle.join().unwrap());
        assert_eq!(consumer.take(), Some(frame(9)));
    }

    #[test]
    fn test_clear() {
        let slot = FrameSlot::new();
        slot.store(frame(3));
        slot.clear();
        assert!(!slot.has_new_frame());
        assert_eq!(slot.take(), None);
    }
}
