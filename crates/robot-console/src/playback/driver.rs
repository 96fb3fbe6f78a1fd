//! Single-task event loop around the playback controller
//!
//! Operator commands, player events, the latency tick and the retry timer are
//! dispatched one at a time on one tokio task, so the controller never sees
//! concurrent calls. Dropping the loop drops its timers with it.

use std::pin::Pin;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::PlayerEvent;
use super::controller::PlaybackController;
use super::state::{ConnectionState, PlaybackSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCommand {
    Connect(String),
    Disconnect,
    Retry,
    Shutdown,
}

struct PendingRetry {
    sleep: Pin<Box<Sleep>>,
    url: String,
}

/// Handle for a controller running on its own task
#[derive(Debug)]
pub struct PlaybackHandle {
    commands: mpsc::UnboundedSender<PlaybackCommand>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    task: JoinHandle<()>,
}

impl PlaybackHandle {
    pub fn connect(&self, url: impl Into<String>) -> bool {
        self.send(PlaybackCommand::Connect(url.into()))
    }

    pub fn disconnect(&self) -> bool {
        self.send(PlaybackCommand::Disconnect)
    }

    pub fn retry(&self) -> bool {
        self.send(PlaybackCommand::Retry)
    }

    fn send(&self, command: PlaybackCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn snapshots(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }

    pub fn current(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the loop, disconnecting first, and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.commands.send(PlaybackCommand::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Playback task ended abnormally");
        }
    }
}

pub fn spawn_playback(
    controller: PlaybackController,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    cancellation_token: CancellationToken,
) -> PlaybackHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let snapshots = controller.subscribe();
    let task = tokio::spawn(run_playback(
        controller,
        commands_rx,
        events,
        cancellation_token,
    ));

    PlaybackHandle {
        commands: commands_tx,
        snapshots,
        task,
    }
}

async fn run_playback(
    mut controller: PlaybackController,
    mut commands: mpsc::UnboundedReceiver<PlaybackCommand>,
    mut events: mpsc::UnboundedReceiver<PlayerEvent>,
    cancellation_token: CancellationToken,
) {
    let mut latency_tick = tokio::time::interval(controller.settings().latency_sample_interval);
    latency_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let retry_delay = controller.settings().retry_delay;
    let mut pending_retry: Option<PendingRetry> = None;

    loop {
        let live = controller.state() == ConnectionState::Live;
        let retry_armed = pending_retry.is_some();

        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("Playback loop cancelled");
                break;
            }
            command = commands.recv() => {
                match command {
                    None | Some(PlaybackCommand::Shutdown) => break,
                    Some(PlaybackCommand::Connect(url)) => {
                        pending_retry = None;
                        if let Err(e) = controller.connect(&url).await {
                            warn!(error = %e, "Connect rejected");
                        }
                    }
                    Some(PlaybackCommand::Disconnect) => {
                        pending_retry = None;
                        controller.disconnect();
                    }
                    Some(PlaybackCommand::Retry) => match controller.prepare_retry() {
                        Ok(url) => {
                            pending_retry = Some(PendingRetry {
                                sleep: Box::pin(tokio::time::sleep(retry_delay)),
                                url,
                            });
                        }
                        Err(e) => warn!(error = %e, "Retry rejected"),
                    },
                }
            }
            Some(event) = events.recv() => {
                controller.handle_event(event);
            }
            _ = latency_tick.tick(), if live => {
                controller.sample_latency();
            }
            url = retry_due(&mut pending_retry), if retry_armed => {
                pending_retry = None;
                if let Err(e) = controller.connect(&url).await {
                    warn!(error = %e, "Reconnect after retry rejected");
                }
            }
        }
    }

    controller.disconnect();
    info!("Playback loop stopped");
}

async fn retry_due(pending: &mut Option<PendingRetry>) -> String {
    match pending {
        Some(retry) => {
            retry.sleep.as_mut().await;
            retry.url.clone()
        }
        None => std::future::pending().await,
    }
}
