//! Live steering channel: relays mailbox messages into a running session.
//!
//! The channel runs as its own task next to the session's event consumer. It
//! drains the mailbox, turns each message into an input turn for the lead,
//! and then waits one poll interval. The wait races the cancellation token, so
//! teardown happens as soon as the session ends rather than when the interval
//! would have expired.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::io::mailbox::{self, Sentinel, SentinelRemoval};
use crate::io::paths::ForgePaths;
use crate::io::prompt::relay_turn;

/// Capacity of the turn queue between the channel and the provider input.
pub const TURN_QUEUE_CAPACITY: usize = 16;

/// What one channel lifetime did.
///
/// Every drained message ends up in exactly one of `relayed`, `unread` or
/// `abandoned`; malformed files are counted in `dropped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelReport {
    /// Turns the session input took off the queue before the channel closed.
    pub relayed: usize,
    /// Turns still queued when the channel closed.
    pub unread: usize,
    /// Messages drained from the mailbox but never queued because the
    /// channel shut down first.
    pub abandoned: usize,
    pub dropped: usize,
    pub sentinel: SentinelRemoval,
}

/// Receiving end of the channel's turns, owned by the session input.
pub struct TurnQueue {
    rx: mpsc::Receiver<String>,
    taken: Arc<AtomicUsize>,
}

impl TurnQueue {
    pub async fn recv(&mut self) -> Option<String> {
        let turn = self.rx.recv().await?;
        self.taken.fetch_add(1, Ordering::SeqCst);
        Some(turn)
    }
}

pub struct SteeringChannel {
    paths: ForgePaths,
    poll_interval: Duration,
    sentinel: Sentinel,
    turns: mpsc::Sender<String>,
    taken: Arc<AtomicUsize>,
}

impl SteeringChannel {
    /// Create the inbox and the sentinel. From here on the channel is active.
    pub fn open(
        paths: &ForgePaths,
        poll_interval: Duration,
    ) -> Result<(SteeringChannel, TurnQueue)> {
        let sentinel = Sentinel::create(paths)?;
        let (turns, rx) = mpsc::channel(TURN_QUEUE_CAPACITY);
        let taken = Arc::new(AtomicUsize::new(0));
        info!(inbox = %paths.inbox_dir.display(), "steering channel open");
        let channel = SteeringChannel {
            paths: paths.clone(),
            poll_interval,
            sentinel,
            turns,
            taken: Arc::clone(&taken),
        };
        Ok((channel, TurnQueue { rx, taken }))
    }

    /// Poll until cancelled or until the session stops accepting input, then
    /// delete the sentinel.
    #[instrument(skip_all, fields(poll_ms = self.poll_interval.as_millis() as u64))]
    pub async fn run(self, cancel: CancellationToken) -> Result<ChannelReport> {
        let mut queued = 0usize;
        let mut abandoned = 0usize;
        let mut dropped = 0usize;

        'poll: loop {
            if cancel.is_cancelled() {
                break;
            }

            let drain = match mailbox::consume(&self.paths) {
                Ok(drain) => drain,
                Err(err) => {
                    warn!(err = %err, "mailbox drain failed, retrying next poll");
                    mailbox::Drain::default()
                }
            };
            for lost in &drain.dropped {
                warn!(
                    file = %lost.file.display(),
                    reason = %lost.reason,
                    "dropped malformed mailbox message"
                );
            }
            dropped += drain.dropped.len();

            let mut pending = drain.messages.into_iter();
            while let Some(message) = pending.next() {
                let turn = match relay_turn(&message) {
                    Ok(turn) => turn,
                    Err(err) => {
                        warn!(err = %err, "could not render relay turn");
                        abandoned += 1;
                        continue;
                    }
                };
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    sent = self.turns.send(turn) => sent.is_ok(),
                };
                if !sent {
                    for lost in std::iter::once(message).chain(pending) {
                        warn!(target_agent = %lost.target_agent, "steering message abandoned");
                        abandoned += 1;
                    }
                    break 'poll;
                }
                info!(target_agent = %message.target_agent, "relaying steering message");
                queued += 1;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.turns.closed() => {
                    debug!("session input closed");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        let relayed = self.taken.load(Ordering::SeqCst).min(queued);
        let unread = queued - relayed;
        if unread > 0 || abandoned > 0 {
            warn!(unread, abandoned, "steering messages not delivered to the session");
        }
        let sentinel = self.sentinel.release()?;
        info!(
            relayed,
            unread,
            abandoned,
            dropped,
            sentinel = ?sentinel,
            "steering channel closed"
        );
        Ok(ChannelReport {
            relayed,
            unread,
            abandoned,
            dropped,
            sentinel,
        })
    }
}
