use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use auto_impl::auto_impl;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::SimulationError;

/// Something the control loop can pause and resume.
#[auto_impl(Arc)]
pub trait Worker: Send + Sync + 'static {
    fn start(&self);
    fn stop(&self);
    /// Stops for good, later `start` calls are ignored.
    fn close(&self);
    fn is_running(&self) -> bool;
}

/// Progress of the execution node's chain sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    Start,
    Done,
    Failed,
}

#[derive(Debug)]
pub enum ControlMessage {
    Start,
    /// Acknowledged once the worker is stopped.
    Stop(oneshot::Sender<()>),
    Exit,
}

/// Starts and stops the worker around chain sync and operator commands.
///
/// Building is held back while the node syncs. The first `Done` or `Failed` sync event
/// releases it, and `Done` ends sync tracking for the rest of the process lifetime.
pub struct ControlLoop<W> {
    worker: W,
    sync_events: Option<mpsc::Receiver<SyncEvent>>,
    commands: mpsc::Receiver<ControlMessage>,
    can_start: bool,
    should_start: bool,
}

impl<W: Worker> ControlLoop<W> {
    pub fn new(
        worker: W,
        sync_events: Option<mpsc::Receiver<SyncEvent>>,
        commands: mpsc::Receiver<ControlMessage>,
    ) -> Self {
        Self { worker, sync_events, commands, can_start: true, should_start: false }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = recv_sync(&mut self.sync_events) => match event {
                    Some(event) => self.on_sync_event(event),
                    None => {
                        debug!("sync event channel closed");
                        self.sync_events = None;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(ControlMessage::Start) => self.on_start(),
                    Some(ControlMessage::Stop(ack)) => {
                        self.should_start = false;
                        self.worker.stop();
                        let _ = ack.send(());
                    }
                    Some(ControlMessage::Exit) | None => {
                        self.worker.close();
                        info!("control loop exiting");
                        return;
                    }
                },
            }
        }
    }

    fn on_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Start => {
                let was_running = self.worker.is_running();
                self.worker.stop();
                self.can_start = false;
                if was_running {
                    // resume once sync ends
                    self.should_start = true;
                    info!("building paused while the node syncs");
                }
            }
            SyncEvent::Failed => self.release(),
            SyncEvent::Done => {
                self.release();
                self.sync_events = None;
                info!("node synced, no longer tracking sync events");
            }
        }
    }

    fn release(&mut self) {
        self.can_start = true;
        if self.should_start {
            self.worker.start();
        }
    }

    fn on_start(&mut self) {
        if self.can_start {
            self.worker.start();
        } else {
            info!("start requested during sync, building resumes once sync ends");
        }
        self.should_start = true;
    }
}

async fn recv_sync(rx: &mut Option<mpsc::Receiver<SyncEvent>>) -> Option<SyncEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[async_trait]
#[auto_impl(Arc)]
pub trait SyncProbe: Send + Sync + 'static {
    async fn is_syncing(&self) -> Result<bool, SimulationError>;
}

/// Polls `probe` and reports sync transitions until the node is synced.
pub async fn run_sync_monitor<P: SyncProbe>(
    probe: Arc<P>,
    events: mpsc::Sender<SyncEvent>,
    interval: Duration,
) {
    let mut syncing = false;
    loop {
        match probe.is_syncing().await {
            Ok(true) if !syncing => {
                syncing = true;
                if events.send(SyncEvent::Start).await.is_err() {
                    return;
                }
            }
            Ok(true) => {}
            Ok(false) => {
                let _ = events.send(SyncEvent::Done).await;
                return;
            }
            Err(err) => warn!(%err, "failed to query sync status"),
        }
        tokio::time::sleep(interval).await;
    }
}
