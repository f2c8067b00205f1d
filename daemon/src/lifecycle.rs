//! Process lifecycle: the asynchronous producers feeding the control loop
//! and the stay-awake token.

use anyhow::{Context, Result};
use std::any::Any;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::controller::{ControlEvent, ShutdownSignal};

/// Background tasks producing [`ControlEvent`]s.
///
/// Dropping it aborts every task, newest first.
pub struct Producers {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Producers {
    pub fn spawn(tx: UnboundedSender<ControlEvent>, watchdog_interval: Duration) -> Self {
        let signal_tx = tx.clone();
        let signals = tokio::spawn(async move {
            if let Err(e) = forward_signals(signal_tx).await {
                log::error!("Signal listener error: {:#}", e);
            }
        });

        let watchdog = spawn_watchdog_timer(tx, watchdog_interval);

        Self {
            tasks: vec![("signal listener", signals), ("watchdog timer", watchdog)],
        }
    }
}

impl Drop for Producers {
    fn drop(&mut self) {
        while let Some((name, task)) = self.tasks.pop() {
            task.abort();
            log::debug!("Stopped {}", name);
        }
    }
}

/// Turn SIGINT/SIGTERM into a shutdown request for the control loop
async fn forward_signals(tx: UnboundedSender<ControlEvent>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    loop {
        let received = tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
        };
        log::debug!("Caught {}", received);

        if tx.send(ControlEvent::Shutdown(received)).is_err() {
            // Control loop already gone
            return Ok(());
        }
    }
}

/// Emit a [`ControlEvent::WatchdogTick`] every `period`, starting one period from now
pub fn spawn_watchdog_timer(tx: UnboundedSender<ControlEvent>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if tx.send(ControlEvent::WatchdogTick).is_err() {
                break;
            }
        }
    })
}

/// Scoped inhibitor for idle sleep.
///
/// Holds a `keepawake` guard that blocks idle and system sleep for as long
/// as it lives. Released exactly once, explicitly or on drop.
pub struct StayAwake {
    guard: Option<Box<dyn Any>>,
}

impl StayAwake {
    pub fn acquire() -> Result<Self> {
        let guard = keepawake::Builder::default()
            .idle(true)
            .sleep(true)
            .reason("Video wallpaper playing")
            .app_name("vidpaper")
            .app_reverse_domain("io.github.vidpaper")
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to inhibit idle sleep: {}", e))?;

        log::info!("Idle sleep inhibited");
        Ok(Self::held_by(guard))
    }

    /// Wrap an inhibitor that is lifted when `guard` is dropped
    pub fn held_by(guard: impl Any) -> Self {
        Self {
            guard: Some(Box::new(guard)),
        }
    }

    #[cfg(test)]
    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }

    pub fn release(&mut self) {
        if self.guard.take().is_some() {
            log::info!("Idle sleep no longer inhibited");
        }
    }
}

impl Drop for StayAwake {
    fn drop(&mut self) {
        self.release();
    }
}
