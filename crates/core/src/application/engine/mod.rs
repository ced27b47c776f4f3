// Counting Engine - owns the production state and the command surface

pub mod constants;
mod failures;
mod shared;
mod shutdown;

pub use constants::EngineConfig;
pub use failures::{TaskFailure, TaskFailures, TaskKind};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::counting::run_counting_loop;
use crate::application::schedule::run_scheduled_pause_loop;
use crate::application::statistics::run_statistics_loop;
use crate::domain::{
    DomainError, GateState, OrderSetup, ProductionState, Progress, RunState, StatusSnapshot,
};
use crate::error::{AppError, Result};
use crate::port::{LineIo, SessionStore, SessionSummary, TimeProvider};
use shared::SharedState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counting engine handle (cheap to clone, all clones share one state)
#[derive(Clone)]
pub struct CountingEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) state: SharedState,
    pub(crate) io: Arc<dyn LineIo>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) clock: Arc<dyn TimeProvider>,
    pub(crate) config: EngineConfig,
    pub(crate) failures: TaskFailures,
    /// Held across a run-state change and its gate actuation
    commands: tokio::sync::Mutex<()>,
}

impl CountingEngine {
    /// Create an engine with a default production state
    ///
    /// The gate group is seeded from the actuator readback so the mirror starts consistent.
    pub fn new(
        io: Arc<dyn LineIo>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn TimeProvider>,
        config: EngineConfig,
    ) -> Self {
        let mut initial = ProductionState::default();
        initial.run.gate_state = io.gate_state();
        Self {
            inner: Arc::new(EngineInner {
                state: SharedState::new(initial),
                io,
                store,
                clock,
                config,
                failures: TaskFailures::default(),
                commands: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &EngineInner {
        &self.inner
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Errors absorbed by background paths
    pub fn task_failures(&self) -> &TaskFailures {
        &self.inner.failures
    }

    pub(crate) fn record_failure(&self, task: TaskKind, message: impl Into<String>) {
        self.inner
            .failures
            .record(task, message, self.inner.clock.now());
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Configure a new order (only while stopped)
    pub fn configure(&self, setup: OrderSetup) -> Result<()> {
        setup.validate()?;
        let state = &self.inner.state;

        let run = state.run.lock();
        if run.run_state != RunState::Stopped {
            return Err(not_allowed("configure", run.run_state));
        }
        state.order.write().apply(&setup);
        *state.progress.lock() = Progress {
            current_count: 0,
            target_count: setup.target_count,
            breakage_count: 0,
        };
        state.series.lock().clear();
        drop(run);

        info!(
            order = %setup.order_label,
            order_id = setup.order_id,
            article = %setup.article,
            target = setup.target_count,
            nominal_rate = setup.nominal_rate,
            "Order configured"
        );
        Ok(())
    }

    /// Start counting (requires a configured order), then open the gate
    pub async fn start_counting(&self) -> Result<()> {
        let _command = self.inner.commands.lock().await;
        {
            let state = &self.inner.state;
            let mut run = state.run.lock();
            if !state.order.read().configured {
                return Err(DomainError::NotConfigured.into());
            }
            if run.run_state != RunState::Stopped {
                debug!(state = %run.run_state, "start ignored: session already running");
                return Ok(());
            }
            run.run_state = RunState::Counting;
            run.started_at = Some(self.inner.clock.now());
            run.pending_stoppage = false;
            run.automatic_pause = false;
            state.series.lock().clear();
        }

        info!("Counting started");
        self.drive_gate(true).await
    }

    /// Stop counting, close the gate and finalize the session (idempotent)
    ///
    /// Finalize failures are logged and recorded, never returned.
    pub async fn stop_counting(&self) -> Result<()> {
        let _command = self.inner.commands.lock().await;
        let Some(stopped) = self.inner.state.stop(self.inner.clock.now()) else {
            debug!("stop ignored: already stopped");
            return Ok(());
        };
        let summary = SessionSummary::from_state(&stopped);

        let gate = self.drive_gate(false).await;

        match self.inner.store.finalize_session(&summary).await {
            Ok(()) => info!(
                order = %summary.order_label,
                final_count = summary.final_count,
                breakage = summary.breakage_count,
                average_rate = summary.average_rate,
                "Counting stopped, session finalized"
            ),
            Err(e) => {
                error!(order = %summary.order_label, error = %e, "Failed to finalize session");
                self.record_failure(TaskKind::Finalize, e.to_string());
            }
        }

        gate
    }

    /// Pause counting (only effective while counting)
    pub async fn pause_counting(&self) -> Result<()> {
        let _command = self.inner.commands.lock().await;
        {
            let mut run = self.inner.state.run.lock();
            if run.run_state != RunState::Counting {
                debug!(state = %run.run_state, "pause ignored");
                return Ok(());
            }
            run.run_state = RunState::Paused;
            run.pending_stoppage = true;
        }

        info!("Counting paused");
        self.drive_gate(false).await
    }

    /// Resume counting (only effective while paused)
    pub async fn resume_counting(&self) -> Result<()> {
        let _command = self.inner.commands.lock().await;
        {
            let mut run = self.inner.state.run.lock();
            if run.run_state != RunState::Paused {
                debug!(state = %run.run_state, "resume ignored");
                return Ok(());
            }
            run.run_state = RunState::Counting;
            run.automatic_pause = false;
        }

        info!("Counting resumed");
        self.drive_gate(true).await
    }

    /// Log rejected units; raises the stop threshold by `quantity`
    pub fn add_breakage(&self, quantity: u64) -> Result<()> {
        let state = &self.inner.state;
        let run = state.run.lock();
        if run.run_state != RunState::Counting {
            return Err(not_allowed("add_breakage", run.run_state));
        }
        let mut progress = state.progress.lock();
        progress.breakage_count = progress.breakage_count.saturating_add(quantity);
        info!(
            quantity,
            breakage = progress.breakage_count,
            threshold = progress.stop_threshold(),
            "Breakage recorded"
        );
        Ok(())
    }

    /// Direct gate control, independent of run state
    pub async fn set_gate(&self, open: bool) -> Result<()> {
        let _command = self.inner.commands.lock().await;
        self.drive_gate(open).await
    }

    /// Deactivate open sessions and return to a fresh default state (only while stopped)
    ///
    /// Persistence failure is propagated: the state is left untouched.
    pub async fn reset(&self) -> Result<()> {
        let _command = self.inner.commands.lock().await;
        {
            let run = self.inner.state.run.lock();
            if run.run_state != RunState::Stopped {
                return Err(not_allowed("reset", run.run_state));
            }
        }

        let deactivated = self.inner.store.deactivate_open_sessions().await.map_err(|e| {
            error!(error = %e, "Reset failed: could not deactivate open sessions");
            e
        })?;

        self.inner
            .state
            .replace_if(ProductionState::default(), |run| {
                if run.run_state == RunState::Stopped {
                    Ok(())
                } else {
                    Err(not_allowed("reset", run.run_state))
                }
            })?;

        info!(deactivated_sessions = deactivated, "Counter reset");
        self.drive_gate(false).await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Owned copy of the full production state
    pub fn snapshot(&self) -> ProductionState {
        self.inner.state.snapshot()
    }

    /// Status projection with derived figures
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::project(self.snapshot(), self.inner.clock.now())
    }

    pub fn run_state(&self) -> RunState {
        self.inner.state.run.lock().run_state
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    /// Spawn the counting, statistics and scheduled-pause tasks
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_tasks(&self) -> BackgroundTasks {
        let (shutdown_tx, token) = shutdown_channel();
        let runtime = tokio::runtime::Handle::current();

        let counting = {
            let engine = self.clone();
            let token = token.clone();
            tokio::task::spawn_blocking(move || run_counting_loop(engine, token, runtime))
        };
        let statistics = tokio::spawn(run_statistics_loop(self.clone(), token.clone()));
        let scheduled_pause = tokio::spawn(run_scheduled_pause_loop(self.clone(), token));

        info!("Engine background tasks spawned");
        BackgroundTasks {
            shutdown: shutdown_tx,
            handles: vec![
                ("counting", counting),
                ("statistics", statistics),
                ("scheduled_pause", scheduled_pause),
            ],
        }
    }

    /// Actuate the gate and mirror the result; failures are logged and returned
    async fn drive_gate(&self, open: bool) -> Result<()> {
        match self.inner.io.set_gate(open).await {
            Ok(()) => {
                self.inner.state.run.lock().gate_state = GateState::from_open(open);
                debug!(open, "Gate actuated");
                Ok(())
            }
            Err(e) => {
                error!(open, error = %e, "Gate actuation failed");
                Err(AppError::Actuator(e))
            }
        }
    }
}

/// Running background tasks of one engine
pub struct BackgroundTasks {
    shutdown: ShutdownSender,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    /// Signal every task and wait for them to exit, bounded by `timeout` overall
    pub async fn shutdown(self, timeout: Duration) {
        self.shutdown.shutdown();
        let deadline = tokio::time::Instant::now() + timeout;

        for (name, handle) in self.handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => debug!(task = name, "Task exited"),
                Ok(Err(join_err)) => {
                    if join_err.is_panic() {
                        error!(task = name, "Task panicked: {:?}", join_err);
                    } else {
                        warn!(task = name, "Task cancelled: {:?}", join_err);
                    }
                }
                Err(_) => warn!(task = name, "Task did not stop before shutdown timeout"),
            }
        }
        info!("Engine background tasks stopped");
    }
}

fn not_allowed(command: &'static str, state: RunState) -> AppError {
    DomainError::InvalidStateTransition {
        command,
        state: state.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests;
