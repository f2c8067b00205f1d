//! The Wayland side of the daemon: one thread owning the connection, the
//! controller and every surface and player.
//!
//! Each iteration reads whatever the compositor sent, dispatches it, drains
//! the control channel into the controller, presents new frames and sleeps
//! until the next frame is due.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError};
use wayland_client::{Connection, EventQueue, backend::WaylandError, globals::registry_queue_init};

use super::WaylandPlatform;
use crate::config::PlaybackSettings;
use crate::controller::{ControlEvent, Controller, ExitReason, Flow};
use crate::lifecycle::StayAwake;
use crate::platform::VideoSource;

const MIN_FRAME_DELAY: Duration = Duration::from_millis(1);
const MAX_FRAME_DELAY: Duration = Duration::from_millis(16);

/// Run playback until a shutdown signal or a fatal playback error
pub async fn run(
    video: VideoSource,
    settings: PlaybackSettings,
    tx: UnboundedSender<ControlEvent>,
    rx: UnboundedReceiver<ControlEvent>,
) -> Result<ExitReason> {
    tokio::task::spawn_blocking(move || run_blocking(video, settings, tx, rx)).await?
}

fn run_blocking(
    video: VideoSource,
    settings: PlaybackSettings,
    tx: UnboundedSender<ControlEvent>,
    mut rx: UnboundedReceiver<ControlEvent>,
) -> Result<ExitReason> {
    let conn = Connection::connect_to_env().context("Failed to connect to Wayland compositor")?;
    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize Wayland registry")?;
    let qh = event_queue.handle();

    let mut platform = WaylandPlatform::bind(&globals, qh, tx, settings.background_rgba())?;

    // Outputs first, then their geometry
    event_queue.roundtrip(&mut platform)?;
    event_queue.roundtrip(&mut platform)?;

    let mut controller = Controller::new(video);
    if settings.prevent_idle_sleep {
        match StayAwake::acquire() {
            Ok(token) => controller.hold(token),
            Err(e) => log::warn!("Could not inhibit idle sleep: {:#}", e),
        }
    }

    let outcome = controller
        .start(&mut platform)
        .and_then(|()| drive(&conn, &mut event_queue, &mut platform, &mut controller, &mut rx));

    controller.shutdown();
    // Push the surface destruction out before the connection goes away
    if let Err(e) = conn.flush() {
        log::debug!("Final flush failed: {}", e);
    }

    outcome
}

fn drive(
    conn: &Connection,
    event_queue: &mut EventQueue<WaylandPlatform>,
    platform: &mut WaylandPlatform,
    controller: &mut Controller<WaylandPlatform>,
    rx: &mut UnboundedReceiver<ControlEvent>,
) -> Result<ExitReason> {
    loop {
        conn.flush().context("Wayland compositor disconnected")?;

        if let Some(guard) = event_queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e).context("Wayland compositor disconnected"),
            }
        }
        event_queue
            .dispatch_pending(platform)
            .context("Failed to dispatch Wayland events")?;

        loop {
            let event = match rx.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => anyhow::bail!("Control channel closed"),
            };

            if let Flow::Exit(reason) = controller.handle(platform, event)? {
                log::info!("Exiting: {}", reason);
                return Ok(reason);
            }
        }

        controller.present(platform);
        conn.flush().context("Wayland compositor disconnected")?;

        let intervals = controller
            .surfaces()
            .iter()
            .map(|surface| surface.player().frame_interval());
        std::thread::sleep(next_frame_delay(intervals));
    }
}

/// Sleep until the fastest player's next frame, clamped to 1..=16ms
fn next_frame_delay(intervals: impl IntoIterator<Item = Duration>) -> Duration {
    intervals
        .into_iter()
        .min()
        .unwrap_or(MAX_FRAME_DELAY)
        .clamp(MIN_FRAME_DELAY, MAX_FRAME_DELAY)
}
