//! In-memory platform used by the controller tests.
//!
//! Records every create, show, play, pause, seek and release so tests can
//! assert on ordering and leftovers.

use anyhow::Result;
use common::{DisplayId, DisplaySignature, MediaInfo, Rect, SignatureSet};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::platform::{
    DisplayEnumerator, Platform, Player, PlayerSignal, SurfaceHandle, SurfaceKey, TransportState,
    VideoSource,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateSurface(SurfaceKey, DisplayId),
    CreatePlayer(SurfaceKey, DisplayId),
    Show(SurfaceKey),
    Play(SurfaceKey),
    Pause(SurfaceKey),
    Seek(SurfaceKey, Duration),
    OrderFront(SurfaceKey),
    Loop(SurfaceKey),
    DropPlayer(SurfaceKey),
    DropSurface(SurfaceKey),
}

type OpLog = Rc<RefCell<Vec<Op>>>;

pub fn signatures(displays: &[(u32, i32, u32, u32, f64)]) -> SignatureSet {
    SignatureSet::from_unsorted(
        displays
            .iter()
            .map(|&(id, x, w, h, scale)| {
                DisplaySignature::new(DisplayId(id), Rect::new(x, 0, w, h), scale)
            })
            .collect(),
    )
}

pub fn video() -> VideoSource {
    VideoSource {
        path: "/videos/loop.mp4".into(),
        info: MediaInfo {
            width: 1920,
            height: 1080,
            framerate: Some(30.0),
            duration: Some(Duration::from_secs(60)),
            seekable: true,
        },
    }
}

pub struct MockPlatform {
    pub displays: SignatureSet,
    pub fail_player_for: Option<DisplayId>,
    log: OpLog,
}

impl MockPlatform {
    pub fn new(displays: SignatureSet) -> Self {
        Self {
            displays,
            fail_player_for: None,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.log.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.log.borrow().iter().filter(|op| pred(op)).count()
    }

    pub fn live_surfaces(&self) -> usize {
        self.count(|op| matches!(op, Op::CreateSurface(..)))
            - self.count(|op| matches!(op, Op::DropSurface(_)))
    }

    pub fn live_players(&self) -> usize {
        self.count(|op| matches!(op, Op::CreatePlayer(..)))
            - self.count(|op| matches!(op, Op::DropPlayer(_)))
    }
}

impl DisplayEnumerator for MockPlatform {
    fn enumerate(&self) -> SignatureSet {
        self.displays.clone()
    }
}

impl Platform for MockPlatform {
    type Surface = MockSurface;
    type Player = MockPlayer;

    fn create_surface(&mut self, key: SurfaceKey, display: &DisplaySignature) -> Result<MockSurface> {
        self.log.borrow_mut().push(Op::CreateSurface(key, display.id));
        Ok(MockSurface {
            key,
            frame: display.frame,
            visible: false,
            raised: 0,
            log: Rc::clone(&self.log),
        })
    }

    fn create_player(
        &mut self,
        key: SurfaceKey,
        display: &DisplaySignature,
        _video: &VideoSource,
    ) -> Result<MockPlayer> {
        if self.fail_player_for == Some(display.id) {
            anyhow::bail!("no decoder for {}", display.id);
        }
        self.log.borrow_mut().push(Op::CreatePlayer(key, display.id));
        Ok(MockPlayer {
            key,
            state: TransportState::Paused,
            position: Some(0.0),
            has_item: true,
            loops: 0,
            log: Rc::clone(&self.log),
        })
    }

    fn present(&mut self, _surface: &mut MockSurface, _player: &mut MockPlayer) -> Result<bool> {
        Ok(false)
    }
}

pub struct MockSurface {
    pub key: SurfaceKey,
    pub frame: Rect,
    pub visible: bool,
    pub raised: usize,
    log: OpLog,
}

impl SurfaceHandle for MockSurface {
    fn frame(&self) -> Rect {
        self.frame
    }

    fn show(&mut self) -> Result<()> {
        self.visible = true;
        self.log.borrow_mut().push(Op::Show(self.key));
        Ok(())
    }

    fn order_front(&mut self) {
        self.raised += 1;
        self.log.borrow_mut().push(Op::OrderFront(self.key));
    }
}

impl Drop for MockSurface {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Op::DropSurface(self.key));
    }
}

pub struct MockPlayer {
    pub key: SurfaceKey,
    pub state: TransportState,
    pub position: Option<f64>,
    pub has_item: bool,
    pub loops: usize,
    log: OpLog,
}

impl Player for MockPlayer {
    fn play(&mut self) -> Result<()> {
        self.state = TransportState::Playing;
        self.log.borrow_mut().push(Op::Play(self.key));
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.state = TransportState::Paused;
        self.log.borrow_mut().push(Op::Pause(self.key));
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.position = Some(position.as_secs_f64());
        self.log.borrow_mut().push(Op::Seek(self.key, position));
        Ok(())
    }

    fn position(&self) -> Option<f64> {
        self.position
    }

    fn transport_state(&self) -> TransportState {
        self.state
    }

    fn has_item(&self) -> bool {
        self.has_item
    }

    fn on_signal(&mut self, signal: &PlayerSignal) -> Result<()> {
        if matches!(signal, PlayerSignal::SegmentDone | PlayerSignal::EndOfStream) {
            self.loops += 1;
            self.position = Some(0.0);
            self.log.borrow_mut().push(Op::Loop(self.key));
        }
        Ok(())
    }
}

impl Drop for MockPlayer {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Op::DropPlayer(self.key));
    }
}
