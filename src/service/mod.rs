//! Host loop: feeds the matcher serially and runs the expiry sweep.
//!
//! The matcher itself is single-threaded cooperative; this module provides
//! the one thread. A tokio task owns the `EventMatcher`, drains an mpsc
//! inbox, and ticks the sweeper on the configured cadence. Handles are cheap
//! to clone and can be shared with any transport.

use crate::domain::{PostAuctionEvent, SubmittedAuctionEvent, TimeMs};
use crate::engine::EventMatcher;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("matcher loop is gone")]
    LoopClosed,
}

/// One unit of work for the matcher loop.
#[derive(Debug)]
pub enum MatcherInput {
    Auction(SubmittedAuctionEvent),
    Event(PostAuctionEvent),
    /// Sweep with a far-future clock and hand the matcher back.
    Drain(oneshot::Sender<EventMatcher>),
}

/// Cloneable submission handle for the matcher loop.
#[derive(Debug, Clone)]
pub struct MatcherHandle {
    inbox: mpsc::Sender<MatcherInput>,
}

impl MatcherHandle {
    /// Enqueue an auction submission.
    pub async fn submit_auction(&self, event: SubmittedAuctionEvent) -> Result<(), ServiceError> {
        self.inbox
            .send(MatcherInput::Auction(event))
            .await
            .map_err(|_| ServiceError::LoopClosed)
    }

    /// Enqueue a post-auction event.
    pub async fn submit_event(&self, event: PostAuctionEvent) -> Result<(), ServiceError> {
        self.inbox
            .send(MatcherInput::Event(event))
            .await
            .map_err(|_| ServiceError::LoopClosed)
    }

    /// Stop the loop after settling everything still pending: every queued
    /// input is processed, then a far-future sweep converts outstanding
    /// submissions into inferred losses. Returns the matcher for
    /// inspection.
    pub async fn drain(self) -> Result<EventMatcher, ServiceError> {
        let (ack, done) = oneshot::channel();
        self.inbox
            .send(MatcherInput::Drain(ack))
            .await
            .map_err(|_| ServiceError::LoopClosed)?;
        done.await.map_err(|_| ServiceError::LoopClosed)
    }
}

/// The running matcher loop.
pub struct MatcherService {
    handle: MatcherHandle,
    join: JoinHandle<()>,
}

impl MatcherService {
    /// Spawn the loop onto the current tokio runtime.
    ///
    /// `sweep_interval_ms` normally comes from
    /// [`Config::sweep_interval_ms`](crate::config::Config).
    pub fn spawn(matcher: EventMatcher, sweep_interval_ms: i64) -> Self {
        let (tx, rx) = mpsc::channel(1024);
        let join = tokio::spawn(run_loop(matcher, rx, sweep_interval_ms));
        MatcherService {
            handle: MatcherHandle { inbox: tx },
            join,
        }
    }

    pub fn handle(&self) -> MatcherHandle {
        self.handle.clone()
    }

    /// Drain the loop and wait for it to finish.
    pub async fn shutdown(self) -> Result<EventMatcher, ServiceError> {
        let MatcherService { handle, join } = self;
        let matcher = handle.drain().await?;
        join.await.map_err(|_| ServiceError::LoopClosed)?;
        Ok(matcher)
    }
}

async fn run_loop(
    mut matcher: EventMatcher,
    mut inbox: mpsc::Receiver<MatcherInput>,
    sweep_interval_ms: i64,
) {
    let period = std::time::Duration::from_millis(sweep_interval_ms.max(1) as u64);
    let mut sweep = tokio::time::interval(period);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(sweep_interval_ms, "matcher loop started");

    loop {
        tokio::select! {
            input = inbox.recv() => {
                match input {
                    Some(MatcherInput::Auction(event)) => matcher.do_auction(event),
                    Some(MatcherInput::Event(event)) => matcher.do_event(event),
                    Some(MatcherInput::Drain(ack)) => {
                        matcher.check_expired_auctions_at(TimeMs::far_future());
                        tracing::info!("matcher loop drained");
                        let _ = ack.send(matcher);
                        return;
                    }
                    None => {
                        tracing::info!("matcher inbox closed, stopping loop");
                        return;
                    }
                }
            }
            _ = sweep.tick() => {
                matcher.check_expired_auctions();
            }
        }
    }
}
