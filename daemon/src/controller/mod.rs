//! Display-synchronized playback controller.
//!
//! [`Controller`] is the owned context of the running process: the video,
//! the surface set, the last known display configuration, the watchdog and
//! the stay-awake token. It is driven exclusively from the control loop
//! through [`ControlEvent`]s, so nothing in here needs locking.

mod surface;
pub mod surface_set;
pub mod watchdog;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use surface::PlaybackSurface;

use anyhow::{Context, Result};
use common::DisplayId;
use std::fmt;

use crate::lifecycle::StayAwake;
use crate::log_and_continue;
use crate::platform::{Platform, Player, PlayerSignal, SurfaceKey, VideoSource};
use surface_set::SurfaceSet;
use watchdog::Watchdog;
use watcher::ConfigWatcher;

/// Everything that can happen to the controller, serialized onto the loop
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// The compositor announced an output change
    ConfigurationChanged,
    /// The compositor closed one of our surfaces; rebuild regardless of signatures
    SurfaceClosed,
    WatchdogTick,
    Player { key: SurfaceKey, signal: PlayerSignal },
    Shutdown(ShutdownSignal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Why the control loop stopped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExitReason {
    #[error("received {0}")]
    Signal(ShutdownSignal),

    #[error("playback failed on {display}: {message}")]
    PlaybackFailed { display: DisplayId, message: String },
}

impl ExitReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitReason::Signal(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue,
    Exit(ExitReason),
}

pub struct Controller<P: Platform> {
    video: VideoSource,
    surfaces: SurfaceSet<P>,
    watcher: ConfigWatcher,
    watchdog: Watchdog,
    stay_awake: Option<StayAwake>,
}

impl<P: Platform> Controller<P> {
    pub fn new(video: VideoSource) -> Self {
        Self {
            video,
            surfaces: SurfaceSet::new(),
            watcher: ConfigWatcher::new(),
            watchdog: Watchdog::new(),
            stay_awake: None,
        }
    }

    /// Build the initial surface set for whatever is connected right now
    pub fn start(&mut self, platform: &mut P) -> Result<()> {
        let displays = self.watcher.force(platform.enumerate());
        if displays.is_empty() {
            log::warn!("No displays connected, waiting for one to appear");
        }

        self.surfaces
            .build(platform, &displays, &self.video)
            .context("Failed to build initial surfaces")?;
        log::info!(
            "Playing {} on {} display(s)",
            self.video.path.display(),
            self.surfaces.len()
        );
        Ok(())
    }

    /// Keep `token` until [`Controller::shutdown`]
    pub fn hold(&mut self, token: StayAwake) {
        self.stay_awake = Some(token);
    }

    #[cfg(test)]
    pub fn stay_awake_held(&self) -> bool {
        self.stay_awake.as_ref().is_some_and(StayAwake::is_held)
    }

    pub fn surfaces(&self) -> &SurfaceSet<P> {
        &self.surfaces
    }

    pub fn handle(&mut self, platform: &mut P, event: ControlEvent) -> Result<Flow> {
        match event {
            ControlEvent::ConfigurationChanged => {
                if let Some(displays) = self.watcher.observe(platform.enumerate()) {
                    self.surfaces
                        .rebuild(platform, &displays, &self.video)
                        .context("Failed to rebuild surfaces after configuration change")?;
                }
            }
            ControlEvent::SurfaceClosed => {
                log::info!("Compositor closed a surface, rebuilding");
                let displays = self.watcher.force(platform.enumerate());
                self.surfaces
                    .rebuild(platform, &displays, &self.video)
                    .context("Failed to rebuild surfaces after close")?;
            }
            ControlEvent::WatchdogTick => {
                self.watchdog.tick(self.surfaces.as_mut_slice());
            }
            ControlEvent::Player { key, signal } => return Ok(self.on_player(key, signal)),
            ControlEvent::Shutdown(signal) => {
                log::info!("Received {}, shutting down", signal);
                return Ok(Flow::Exit(ExitReason::Signal(signal)));
            }
        }
        Ok(Flow::Continue)
    }

    fn on_player(&mut self, key: SurfaceKey, signal: PlayerSignal) -> Flow {
        let Some(surface) = self.surfaces.find_mut(key) else {
            log::debug!("Dropping {:?} from torn-down {}", signal, key);
            return Flow::Continue;
        };

        if let PlayerSignal::Failed(message) = signal {
            let display = surface.display().id;
            log::error!("Playback failed on {}: {}", display, message);
            return Flow::Exit(ExitReason::PlaybackFailed { display, message });
        }

        log_and_continue!(surface.player_mut().on_signal(&signal), "handle player signal");
        Flow::Continue
    }

    /// Push the newest decoded frames to the screen
    pub fn present(&mut self, platform: &mut P) {
        for surface in self.surfaces.as_mut_slice() {
            let (window, player) = surface.parts_mut();
            log_and_continue!(platform.present(window, player), "present frame");
        }
    }

    /// Tear every surface down, then release the stay-awake token
    pub fn shutdown(&mut self) {
        self.surfaces.teardown();
        if let Some(token) = self.stay_awake.as_mut() {
            token.release();
        }
        log::info!("Controller shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{MockPlatform, Op, signatures, video};
    use crate::platform::TransportState;

    fn two_displays() -> MockPlatform {
        MockPlatform::new(signatures(&[(1, 0, 1920, 1080, 2.0), (2, 1920, 1280, 720, 1.0)]))
    }

    fn started(platform: &mut MockPlatform) -> Controller<MockPlatform> {
        let mut controller = Controller::new(video());
        controller.start(platform).unwrap();
        controller
    }

    #[test]
    fn test_start_builds_one_surface_per_display() {
        let mut platform = two_displays();
        let controller = started(&mut platform);

        let surfaces: Vec<_> = controller.surfaces().iter().collect();
        assert_eq!(surfaces.len(), 2);
        assert_eq!(surfaces[0].surface().frame, common::Rect::new(0, 0, 1920, 1080));
        assert_eq!(surfaces[1].surface().frame, common::Rect::new(1920, 0, 1280, 720));
        for surface in surfaces {
            assert!(surface.surface().visible);
            assert_eq!(surface.player().transport_state(), TransportState::Playing);
            assert_eq!(surface.player().position(), Some(0.0));
        }
    }

    #[test]
    fn test_start_without_displays_is_not_an_error() {
        let mut platform = MockPlatform::new(common::SignatureSet::empty());
        let controller = started(&mut platform);
        assert!(controller.surfaces().is_empty());
    }

    #[test]
    fn test_disconnect_rebuilds_and_resumes_at_captured_position() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);
        controller.surfaces.as_mut_slice()[0].player_mut().position = Some(17.5);

        platform.displays = signatures(&[(1, 0, 1920, 1080, 2.0)]);
        let flow = controller
            .handle(&mut platform, ControlEvent::ConfigurationChanged)
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        let surfaces: Vec<_> = controller.surfaces().iter().collect();
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].display().id, DisplayId(1));
        assert_eq!(surfaces[0].player().position(), Some(17.5));
        assert_eq!(surfaces[0].player().transport_state(), TransportState::Playing);
        assert_eq!(platform.live_surfaces(), 1);
        assert_eq!(platform.live_players(), 1);
    }

    #[test]
    fn test_unchanged_configuration_never_tears_down() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);
        platform.clear_ops();

        for _ in 0..3 {
            let flow = controller
                .handle(&mut platform, ControlEvent::ConfigurationChanged)
                .unwrap();
            assert_eq!(flow, Flow::Continue);
        }

        assert!(platform.ops().is_empty());
        assert_eq!(controller.surfaces().len(), 2);
    }

    #[test]
    fn test_surface_closed_forces_rebuild() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);
        platform.clear_ops();

        controller
            .handle(&mut platform, ControlEvent::SurfaceClosed)
            .unwrap();

        assert_eq!(platform.count(|op| matches!(op, Op::DropSurface(_))), 2);
        assert_eq!(platform.count(|op| matches!(op, Op::CreateSurface(..))), 2);
        assert_eq!(platform.live_surfaces(), 2);
    }

    #[test]
    fn test_watchdog_tick_resumes_stalled_player() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);
        controller.surfaces.as_mut_slice()[0].player_mut().state = TransportState::Paused;

        controller
            .handle(&mut platform, ControlEvent::WatchdogTick)
            .unwrap();

        assert!(
            controller
                .surfaces()
                .iter()
                .all(|s| s.player().transport_state() == TransportState::Playing)
        );
    }

    #[test]
    fn test_playback_failure_exits() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);
        let key = controller.surfaces().iter().nth(1).unwrap().key();

        let flow = controller
            .handle(
                &mut platform,
                ControlEvent::Player {
                    key,
                    signal: PlayerSignal::Failed("corrupt frame".into()),
                },
            )
            .unwrap();

        assert_eq!(
            flow,
            Flow::Exit(ExitReason::PlaybackFailed {
                display: DisplayId(2),
                message: "corrupt frame".into()
            })
        );
    }

    #[test]
    fn test_events_from_torn_down_surfaces_are_ignored() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);
        let stale = controller.surfaces().iter().next().unwrap().key();

        platform.displays = signatures(&[(1, 0, 2560, 1440, 1.0)]);
        controller
            .handle(&mut platform, ControlEvent::ConfigurationChanged)
            .unwrap();

        let flow = controller
            .handle(
                &mut platform,
                ControlEvent::Player {
                    key: stale,
                    signal: PlayerSignal::Failed("from the old pipeline".into()),
                },
            )
            .unwrap();
        assert_eq!(flow, Flow::Continue);
    }

    #[test]
    fn test_segment_done_is_forwarded_to_player() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);
        let key = controller.surfaces().iter().next().unwrap().key();

        controller
            .handle(
                &mut platform,
                ControlEvent::Player {
                    key,
                    signal: PlayerSignal::SegmentDone,
                },
            )
            .unwrap();

        assert_eq!(platform.count(|op| *op == Op::Loop(key)), 1);
    }

    #[test]
    fn test_shutdown_signal_exits_cleanly() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);

        let flow = controller
            .handle(&mut platform, ControlEvent::Shutdown(ShutdownSignal::Terminate))
            .unwrap();

        let Flow::Exit(reason) = flow else {
            panic!("expected exit, got {:?}", flow);
        };
        assert!(reason.is_clean());
        assert_eq!(reason.to_string(), "received SIGTERM");
    }

    #[test]
    fn test_shutdown_tears_down_then_releases_token() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);
        controller.hold(StayAwake::held_by(()));
        assert!(controller.stay_awake_held());

        controller.shutdown();

        assert!(controller.surfaces().is_empty());
        assert!(!controller.stay_awake_held());
        assert_eq!(platform.live_surfaces(), 0);
        assert_eq!(platform.live_players(), 0);

        // A second shutdown must not release anything twice
        controller.shutdown();
        assert!(!controller.stay_awake_held());
    }

    #[test]
    fn test_failed_rebuild_propagates() {
        let mut platform = two_displays();
        let mut controller = started(&mut platform);

        platform.displays = signatures(&[(7, 0, 800, 600, 1.0)]);
        platform.fail_player_for = Some(DisplayId(7));

        assert!(
            controller
                .handle(&mut platform, ControlEvent::ConfigurationChanged)
                .is_err()
        );
    }

    #[test]
    fn test_exit_reason_messages() {
        let failed = ExitReason::PlaybackFailed {
            display: DisplayId(3),
            message: "decoder error".into(),
        };
        assert!(!failed.is_clean());
        assert_eq!(failed.to_string(), "playback failed on display-3: decoder error");
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "SIGINT");
    }
}
