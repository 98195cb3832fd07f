//! Periodic keep-alive messages.

use crate::messages::ServerMessage;
use crate::proxy::Outbound;
use crate::state::SharedConnectionState;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Sends a keep-alive message on a fixed interval while the connection is open.
///
/// Starting a running timer and stopping a stopped one do nothing. Dropping the timer stops it.
#[derive(Debug, Default)]
pub struct KeepAliveTimer {
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl KeepAliveTimer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    pub(crate) fn start(
        &mut self,
        interval: Duration,
        message: ServerMessage,
        state: SharedConnectionState,
        outbound: mpsc::Sender<Outbound>,
    ) {
        if self.is_running() {
            return;
        }
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticks.tick() => {
                        if !state.is_open() {
                            trace!(state = %state.get(), "keep-alive stopped by connection state");
                            break;
                        }
                        if outbound.send(Outbound::Message(message.clone())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.running = Some((token, handle));
    }

    pub fn stop(&mut self) {
        if let Some((token, _handle)) = self.running.take() {
            token.cancel();
        }
    }
}

impl Drop for KeepAliveTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
