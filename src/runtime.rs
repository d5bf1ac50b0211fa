//! The single-threaded control loop.
//!
//! Each iteration waits for whichever comes first of a token, a cache timer
//! tick or a shutdown request, and handles that one event to completion.
//! The loop is the only code that touches the open window.

use crate::collector::Token;
use crate::core::Aggregator;
use crate::error::FatalError;
use crate::persistence::CachePersister;
use crate::stats::SharedStats;
use crossbeam_channel::{never, select, Receiver};
use std::time::Instant;

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A shutdown request arrived (SIGINT/SIGTERM)
    Requested,
}

/// One wake-up of the control loop.
enum Event {
    Token(Option<Token>),
    Tick(Option<Instant>),
    Shutdown,
}

/// Drives the aggregator from the token queue and the cache timer.
pub struct Runtime {
    aggregator: Aggregator,
    cache: CachePersister,
    tokens: Receiver<Token>,
    ticks: Receiver<Instant>,
    shutdown: Receiver<()>,
    stats: SharedStats,
}

impl Runtime {
    /// Assemble the loop from its parts.
    pub fn new(
        aggregator: Aggregator,
        cache: CachePersister,
        tokens: Receiver<Token>,
        ticks: Receiver<Instant>,
        shutdown: Receiver<()>,
        stats: SharedStats,
    ) -> Self {
        Self {
            aggregator,
            cache,
            tokens,
            ticks,
            shutdown,
            stats,
        }
    }

    /// Run until shutdown is requested or an unrecoverable error occurs.
    ///
    /// Both a shutdown request and the end of the token stream write a
    /// final cache snapshot first. Tokens still queued at shutdown are left
    /// unprocessed. Dropping the shutdown sender counts as a request.
    pub fn run(&mut self) -> Result<ShutdownReason, FatalError> {
        let tokens = self.tokens.clone();
        let shutdown = self.shutdown.clone();
        let mut ticks = self.ticks.clone();

        loop {
            let event = select! {
                recv(shutdown) -> _ => Event::Shutdown,
                recv(ticks) -> tick => Event::Tick(tick.ok()),
                recv(tokens) -> token => Event::Token(token.ok()),
            };

            match event {
                Event::Token(Some(token)) => self.on_token(&token)?,
                Event::Token(None) => {
                    self.final_snapshot()?;
                    return Err(FatalError::SourceClosed);
                }
                Event::Tick(Some(at)) => self.on_tick(at)?,
                Event::Tick(None) => {
                    tracing::warn!("Cache timer stopped; periodic snapshots disabled");
                    ticks = never();
                }
                Event::Shutdown => {
                    tracing::info!("Shutdown requested");
                    self.final_snapshot()?;
                    return Ok(ShutdownReason::Requested);
                }
            }
        }
    }

    fn on_token(&mut self, token: &str) -> Result<(), FatalError> {
        self.stats.record_token();
        if self.aggregator.apply(token)?.is_some() {
            self.stats.record_window_flushed();
            // The cache still holds a snapshot of the window just written
            // out. Replace it now so a restart cannot resume that window.
            if self.aggregator.persist_if_dirty(&mut self.cache)? {
                self.stats.record_snapshot_written();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self, at: Instant) -> Result<(), FatalError> {
        if self.aggregator.persist_if_dirty(&mut self.cache)? {
            self.stats.record_snapshot_written();
            tracing::debug!(
                total = self.aggregator.state().total(),
                tick = ?at,
                "Updated cache!"
            );
        } else {
            self.stats.record_idle_tick();
        }
        Ok(())
    }

    fn final_snapshot(&mut self) -> Result<(), FatalError> {
        if self.aggregator.persist_if_dirty(&mut self.cache)? {
            self.stats.record_snapshot_written();
            tracing::info!(
                total = self.aggregator.state().total(),
                "Saved partial window to cache"
            );
        }
        Ok(())
    }

    /// Get the aggregator driven by this loop.
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }
}
