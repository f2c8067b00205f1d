//! Seamless looping through segment seeks.
//!
//! The first seek after preroll is a flushing segment seek; from then on
//! every segment-done is answered with a non-flushing segment seek back to
//! zero, so the next loop is queued without draining the pipeline. Seeks
//! requested before preroll are remembered and applied by the first one.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Seek { to: Duration, flush: bool },
}

#[derive(Debug, Default)]
pub struct SegmentLooper {
    armed: bool,
    pending_start: Option<Duration>,
}

impl SegmentLooper {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// The pipeline finished an asynchronous state change
    pub fn on_prerolled(&mut self) -> Option<LoopAction> {
        if self.armed {
            return None;
        }
        self.armed = true;
        Some(LoopAction::Seek {
            to: self.pending_start.take().unwrap_or(Duration::ZERO),
            flush: true,
        })
    }

    pub fn on_segment_done(&mut self) -> Option<LoopAction> {
        self.armed.then_some(LoopAction::Seek {
            to: Duration::ZERO,
            flush: false,
        })
    }

    /// Stream ended without a segment (seek not honoured by the demuxer)
    pub fn on_end_of_stream(&mut self) -> LoopAction {
        self.armed = true;
        LoopAction::Seek {
            to: Duration::ZERO,
            flush: true,
        }
    }

    /// Seek somewhere explicitly; deferred until preroll
    pub fn request_seek(&mut self, to: Duration) -> Option<LoopAction> {
        if self.armed {
            Some(LoopAction::Seek { to, flush: true })
        } else {
            self.pending_start = Some(to);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_preroll_arms_with_flushing_seek() {
        let mut looper = SegmentLooper::new();
        assert_eq!(
            looper.on_prerolled(),
            Some(LoopAction::Seek {
                to: Duration::ZERO,
                flush: true
            })
        );
        assert!(looper.is_armed());

        // async-done after our own flushing seeks must not re-seek
        assert_eq!(looper.on_prerolled(), None);
    }

    #[test]
    fn test_segment_done_queues_next_loop_without_flush() {
        let mut looper = SegmentLooper::new();
        assert_eq!(looper.on_segment_done(), None);

        looper.on_prerolled();
        for _ in 0..3 {
            assert_eq!(
                looper.on_segment_done(),
                Some(LoopAction::Seek {
                    to: Duration::ZERO,
                    flush: false
                })
            );
        }
    }

    #[test]
    fn test_seek_before_preroll_is_deferred() {
        let mut looper = SegmentLooper::new();
        assert_eq!(looper.request_seek(Duration::from_secs(12)), None);
        assert_eq!(
            looper.on_prerolled(),
            Some(LoopAction::Seek {
                to: Duration::from_secs(12),
                flush: true
            })
        );
    }

    #[test]
    fn test_seek_after_preroll_is_immediate() {
        let mut looper = SegmentLooper::new();
        looper.on_prerolled();
        assert_eq!(
            looper.request_seek(Duration::from_millis(1500)),
            Some(LoopAction::Seek {
                to: Duration::from_millis(1500),
                flush: true
            })
        );
    }

    #[test]
    fn test_end_of_stream_restarts_from_zero() {
        let mut looper = SegmentLooper::new();
        assert_eq!(
            looper.on_end_of_stream(),
            LoopAction::Seek {
                to: Duration::ZERO,
                flush: true
            }
        );
        assert!(looper.is_armed());
    }
}
