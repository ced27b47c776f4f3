//! Counting task - rising-edge detection with batched commits
//!
//! The sensor is polled on a dedicated blocking thread (the async timer cannot
//! sleep below one millisecond). Rising edges accumulate in a local buffer that
//! is flushed into the shared count every `flush_batch_size` edges or after
//! `flush_interval`, whichever comes first.

use crate::application::engine::{CountingEngine, ShutdownToken, TaskKind};
use crate::domain::{Progress, RunState};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Debounced edge detector with a flush buffer
#[derive(Debug)]
pub struct EdgeCounter {
    previous: bool,
    pending: u64,
    last_flush: Instant,
    armed: bool,
    batch_size: u64,
    flush_interval: Duration,
}

impl EdgeCounter {
    pub fn new(batch_size: u64, flush_interval: Duration, now: Instant) -> Self {
        Self {
            previous: false,
            pending: 0,
            last_flush: now,
            armed: false,
            batch_size: batch_size.max(1),
            flush_interval,
        }
    }

    /// Edges buffered but not yet committed
    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// Feed one sensor sample; returns the number of edges to commit, if a flush is due
    ///
    /// - Stopped: tracks the level only, discards anything buffered
    /// - Paused: tracks the level only, keeps the buffer for after resume
    /// - Counting: buffers rising edges; the flush timer restarts on entry
    pub fn observe(&mut self, signal: bool, run_state: RunState, now: Instant) -> Option<u64> {
        let rising = signal && !self.previous;
        self.previous = signal;

        match run_state {
            RunState::Stopped => {
                if self.pending > 0 {
                    debug!(dropped = self.pending, "Discarding buffered edges after stop");
                    self.pending = 0;
                }
                self.armed = false;
                None
            }
            RunState::Paused => {
                self.armed = false;
                None
            }
            RunState::Counting => {
                if !self.armed {
                    self.armed = true;
                    self.last_flush = now;
                }
                if rising {
                    self.pending += 1;
                }
                let due = self.pending >= self.batch_size
                    || now.duration_since(self.last_flush) >= self.flush_interval;
                if self.pending > 0 && due {
                    self.last_flush = now;
                    Some(std::mem::take(&mut self.pending))
                } else {
                    None
                }
            }
        }
    }
}

/// Outcome of one counting poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountStep {
    /// Edges committed by this poll
    pub committed: u64,
    /// Progress after the commit (None when nothing was committed)
    pub progress: Option<Progress>,
    pub target_reached: bool,
}

impl CountingEngine {
    /// Read the sensor once and commit a flush if one is due (never blocks)
    pub fn poll_counter(&self, counter: &mut EdgeCounter, now: Instant) -> CountStep {
        let inner = self.inner();
        let signal = inner.io.read_counter_signal();
        let run_state = inner.state.run.lock().run_state;

        let Some(edges) = counter.observe(signal, run_state, now) else {
            return CountStep::default();
        };

        // Commit under the run lock so a concurrent stop cannot interleave
        let run = inner.state.run.lock();
        if run.run_state != RunState::Counting {
            debug!(dropped = edges, state = %run.run_state, "Run state changed before flush");
            return CountStep::default();
        }
        let mut progress = inner.state.progress.lock();
        progress.current_count = progress.current_count.saturating_add(edges);
        let snapshot = *progress;
        drop(progress);
        drop(run);

        debug!(
            committed = edges,
            current = snapshot.current_count,
            threshold = snapshot.stop_threshold(),
            "Count flushed"
        );
        CountStep {
            committed: edges,
            progress: Some(snapshot),
            target_reached: snapshot.target_reached(),
        }
    }

    /// Poll once and stop the session when the target is reached
    pub async fn counting_cycle(&self, counter: &mut EdgeCounter, now: Instant) -> CountStep {
        let step = self.poll_counter(counter, now);
        if step.target_reached {
            self.stop_on_target(&step).await;
        }
        step
    }

    async fn stop_on_target(&self, step: &CountStep) {
        if let Some(progress) = step.progress {
            info!(
                current = progress.current_count,
                target = progress.target_count,
                breakage = progress.breakage_count,
                "Target reached, stopping"
            );
        }
        if let Err(e) = self.stop_counting().await {
            error!(error = %e, "Auto-stop could not close the gate");
            self.record_failure(TaskKind::Counting, e.to_string());
        }
    }
}

/// Counting task body (runs on a blocking thread until shutdown)
pub(crate) fn run_counting_loop(
    engine: CountingEngine,
    shutdown: ShutdownToken,
    runtime: tokio::runtime::Handle,
) {
    let config = engine.config().clone();
    let mut counter = EdgeCounter::new(config.flush_batch_size, config.flush_interval, Instant::now());
    info!(
        poll_interval_us = config.counter_poll_interval.as_micros() as u64,
        batch = config.flush_batch_size,
        "Counting task started"
    );

    while !shutdown.is_shutdown() {
        let step = engine.poll_counter(&mut counter, Instant::now());
        if step.target_reached {
            runtime.block_on(engine.stop_on_target(&step));
        }
        std::thread::sleep(config.counter_poll_interval);
    }

    info!("Counting task stopped");
}
