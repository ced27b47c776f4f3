use super::*;
use crate::application::counting::EdgeCounter;
use crate::domain::GateState;
use crate::port::line_io::mocks::ScriptedLine;
use crate::port::session_store::mocks::RecordingStore;
use crate::port::time_provider::mocks::FixedTimeProvider;
use chrono::{Local, TimeZone};
use std::time::Instant;

struct Fixture {
    engine: CountingEngine,
    line: Arc<ScriptedLine>,
    store: Arc<RecordingStore>,
    clock: Arc<FixedTimeProvider>,
}

fn fixture_with(config: EngineConfig) -> Fixture {
    let line = Arc::new(ScriptedLine::new());
    let store = Arc::new(RecordingStore::new());
    let clock = Arc::new(FixedTimeProvider::new(
        Local.with_ymd_and_hms(2024, 2, 12, 8, 0, 0).unwrap(),
    ));
    let engine = CountingEngine::new(line.clone(), store.clone(), clock.clone(), config);
    Fixture {
        engine,
        line,
        store,
        clock,
    }
}

fn fixture() -> Fixture {
    fixture_with(EngineConfig::default())
}

fn order(label: &str, target: u64) -> OrderSetup {
    OrderSetup {
        order_id: 11,
        order_label: label.to_string(),
        article: "ART-1".to_string(),
        description: "Bottle 1L".to_string(),
        nominal_rate: 6000,
        target_count: target,
    }
}

/// Poll until the scripted levels are drained, then once more a second later
async fn drain_and_flush(engine: &CountingEngine, line: &ScriptedLine, counter: &mut EdgeCounter, t0: Instant) {
    while line.pending_levels() > 0 {
        engine.counting_cycle(counter, t0).await;
    }
    engine.counting_cycle(counter, t0 + Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_start_requires_configuration() {
    let f = fixture();
    let err = f.engine.start_counting().await.unwrap_err();
    assert!(err.is_not_configured());
    assert_eq!(f.engine.run_state(), RunState::Stopped);
    assert!(f.line.gate_writes().is_empty());
}

#[tokio::test]
async fn test_configure_then_start_opens_gate() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    f.engine.start_counting().await.unwrap();

    let snap = f.engine.snapshot();
    assert_eq!(snap.run.run_state, RunState::Counting);
    assert_eq!(snap.run.gate_state, GateState::Open);
    assert_eq!(snap.run.started_at, Some(f.clock.now()));
    assert_eq!(snap.order.order_label, "OP-1");
    assert_eq!(f.line.gate_writes(), vec![true]);

    // Second start is a no-op
    f.engine.start_counting().await.unwrap();
    assert_eq!(f.line.gate_writes(), vec![true]);
}

#[test]
fn test_configure_rejected_while_counting() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    tokio_test::block_on(f.engine.start_counting()).unwrap();

    let err = f.engine.configure(order("OP-2", 50)).unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::InvalidStateTransition { command: "configure", .. })
    ));
    assert_eq!(f.engine.snapshot().order.order_label, "OP-1");
}

#[test]
fn test_configure_rejects_blank_label() {
    let f = fixture();
    let err = f.engine.configure(order("  ", 10)).unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::ValidationError(_))));
}

#[tokio::test]
async fn test_twelve_edges_commit_ten_then_two() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    f.engine.start_counting().await.unwrap();

    let t0 = Instant::now();
    let mut counter = EdgeCounter::new(10, Duration::from_secs(1), t0);
    f.line.queue_pulses(12);
    while f.line.pending_levels() > 0 {
        f.engine.poll_counter(&mut counter, t0 + Duration::from_millis(400));
    }
    assert_eq!(f.engine.snapshot().progress.current_count, 10);
    assert_eq!(counter.pending(), 2);

    let step = f.engine.poll_counter(&mut counter, t0 + Duration::from_millis(1500));
    assert_eq!(step.committed, 2);
    assert_eq!(f.engine.snapshot().progress.current_count, 12);
}

#[tokio::test]
async fn test_target_reached_auto_stops_and_finalizes_once() {
    let f = fixture();
    f.engine.configure(order("OP-5", 5)).unwrap();
    f.engine.start_counting().await.unwrap();

    let t0 = Instant::now();
    let mut counter = EdgeCounter::new(10, Duration::from_secs(1), t0);
    f.line.queue_pulses(5);
    drain_and_flush(&f.engine, &f.line, &mut counter, t0).await;

    let snap = f.engine.snapshot();
    assert_eq!(snap.run.run_state, RunState::Stopped);
    assert_eq!(snap.run.gate_state, GateState::Closed);
    assert!(!snap.order.configured);
    assert_eq!(snap.progress.current_count, 5);

    let finalized = f.store.finalized();
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0].final_count, 5);
    assert_eq!(finalized[0].order_label, "OP-5");

    // Further pulses are ignored once stopped
    f.line.queue_pulses(3);
    drain_and_flush(&f.engine, &f.line, &mut counter, t0 + Duration::from_secs(5)).await;
    assert_eq!(f.engine.snapshot().progress.current_count, 5);
    assert_eq!(f.store.finalized().len(), 1);
}

#[tokio::test]
async fn test_breakage_raises_stop_threshold() {
    let f = fixture();
    f.engine.configure(order("OP-1", 10)).unwrap();
    f.engine.start_counting().await.unwrap();
    f.engine.add_breakage(3).unwrap();
    assert_eq!(f.engine.snapshot().progress.stop_threshold(), 13);

    let t0 = Instant::now();
    let mut counter = EdgeCounter::new(10, Duration::from_secs(1), t0);
    f.line.queue_pulses(12);
    drain_and_flush(&f.engine, &f.line, &mut counter, t0).await;
    assert_eq!(f.engine.run_state(), RunState::Counting);

    f.line.queue_pulses(1);
    drain_and_flush(&f.engine, &f.line, &mut counter, t0 + Duration::from_secs(2)).await;
    assert_eq!(f.engine.run_state(), RunState::Stopped);
    assert_eq!(f.store.finalized()[0].breakage_count, 3);
}

#[tokio::test]
async fn test_breakage_rejected_unless_counting() {
    let f = fixture();
    f.engine.configure(order("OP-1", 10)).unwrap();
    let err = f.engine.add_breakage(2).unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::InvalidStateTransition { command: "add_breakage", .. })
    ));
}

#[tokio::test]
async fn test_pause_resume_keeps_counts_and_clears_automatic_flag() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    f.engine.start_counting().await.unwrap();
    f.engine.inner().state.progress.lock().current_count = 42;

    f.engine.pause_counting().await.unwrap();
    f.engine.inner().state.run.lock().automatic_pause = true;
    let paused = f.engine.snapshot();
    assert_eq!(paused.run.run_state, RunState::Paused);
    assert_eq!(paused.run.gate_state, GateState::Closed);
    assert!(paused.run.pending_stoppage);

    f.engine.resume_counting().await.unwrap();
    let resumed = f.engine.snapshot();
    assert_eq!(resumed.run.run_state, RunState::Counting);
    assert_eq!(resumed.progress, paused.progress);
    assert!(!resumed.run.automatic_pause);
    assert_eq!(f.line.gate_writes(), vec![true, false, true]);
}

#[tokio::test]
async fn test_inapplicable_commands_are_silent_noops() {
    let f = fixture();
    f.engine.pause_counting().await.unwrap();
    f.engine.resume_counting().await.unwrap();
    f.engine.stop_counting().await.unwrap();
    assert_eq!(f.engine.run_state(), RunState::Stopped);
    assert!(f.line.gate_writes().is_empty());
    assert!(f.store.finalized().is_empty());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    f.engine.start_counting().await.unwrap();
    f.clock.advance(chrono::Duration::minutes(30));

    f.engine.stop_counting().await.unwrap();
    f.engine.stop_counting().await.unwrap();

    let snap = f.engine.snapshot();
    assert_eq!(snap.run.ended_at, Some(f.clock.now()));
    assert_eq!(f.store.finalized().len(), 1);
}

#[tokio::test]
async fn test_stop_summary_carries_session_figures() {
    let f = fixture();
    f.engine.configure(order("OP-8", 100)).unwrap();
    f.engine.start_counting().await.unwrap();
    let started = f.clock.now();
    f.engine.add_breakage(2).unwrap();
    f.engine.inner().state.progress.lock().current_count = 37;

    let ended = Local.with_ymd_and_hms(2024, 2, 12, 9, 15, 0).unwrap();
    f.clock.set(ended);
    f.engine.stop_counting().await.unwrap();

    let finalized = f.store.finalized();
    assert_eq!(finalized.len(), 1);
    let summary = &finalized[0];
    assert_eq!(summary.order_id, 11);
    assert_eq!(summary.order_label, "OP-8");
    assert_eq!(summary.final_count, 37);
    assert_eq!(summary.breakage_count, 2);
    assert_eq!(summary.average_rate, 0);
    assert_eq!(summary.started_at, Some(started));
    assert_eq!(summary.ended_at, Some(ended));
    assert_eq!(*summary, SessionSummary::from_state(&f.engine.snapshot()));
}

#[tokio::test]
async fn test_bouncing_contact_counts_rising_edges_only() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    f.engine.start_counting().await.unwrap();

    let t0 = Instant::now();
    let mut counter = EdgeCounter::new(10, Duration::from_secs(1), t0);
    f.line
        .queue_levels(&[false, true, true, true, false, false, true, false, true, true, false]);
    drain_and_flush(&f.engine, &f.line, &mut counter, t0).await;

    assert_eq!(f.engine.snapshot().progress.current_count, 3);
}

#[tokio::test]
async fn test_finalize_failure_is_absorbed_and_recorded() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    f.engine.start_counting().await.unwrap();
    f.store.fail_writes(true);

    f.engine.stop_counting().await.unwrap();

    assert_eq!(f.engine.run_state(), RunState::Stopped);
    assert_eq!(f.engine.task_failures().count(TaskKind::Finalize), 1);
    assert_eq!(f.engine.task_failures().recent()[0].task, TaskKind::Finalize);
}

#[tokio::test]
async fn test_actuator_failure_is_propagated() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    f.line.fail_gate(true);

    let err = f.engine.start_counting().await.unwrap_err();
    assert!(matches!(err, AppError::Actuator(_)));
    let snap = f.engine.snapshot();
    assert_eq!(snap.run.run_state, RunState::Counting);
    assert_eq!(snap.run.gate_state, GateState::Closed);

    // Stop still finalizes before reporting the gate error
    let err = f.engine.stop_counting().await.unwrap_err();
    assert!(matches!(err, AppError::Actuator(_)));
    assert_eq!(f.engine.run_state(), RunState::Stopped);
    assert_eq!(f.store.finalized().len(), 1);
}

#[tokio::test]
async fn test_set_gate_independent_of_run_state() {
    let f = fixture();
    f.engine.set_gate(true).await.unwrap();
    assert_eq!(f.engine.snapshot().run.gate_state, GateState::Open);
    assert_eq!(f.engine.run_state(), RunState::Stopped);
    f.engine.set_gate(false).await.unwrap();
    assert_eq!(f.engine.snapshot().run.gate_state, GateState::Closed);
}

#[tokio::test]
async fn test_reset_rejected_unless_stopped() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    f.engine.start_counting().await.unwrap();

    let err = f.engine.reset().await.unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::InvalidStateTransition { .. })));
    assert_eq!(*f.store.deactivations.lock(), 0);
}

#[tokio::test]
async fn test_reset_persistence_failure_is_propagated() {
    let f = fixture();
    f.engine.configure(order("OP-1", 100)).unwrap();
    let before = f.engine.snapshot();
    f.store.fail_writes(true);

    let err = f.engine.reset().await.unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));
    assert_eq!(f.engine.snapshot(), before);
}

#[tokio::test]
async fn test_reset_then_configure_equals_fresh_engine() {
    let used = fixture();
    used.engine.configure(order("OP-1", 100)).unwrap();
    used.engine.start_counting().await.unwrap();
    used.engine.inner().state.progress.lock().current_count = 37;
    used.engine.add_breakage(2).unwrap();
    used.engine.stop_counting().await.unwrap();
    used.engine.reset().await.unwrap();
    used.engine.configure(order("OP-2", 40)).unwrap();

    let fresh = fixture();
    fresh.engine.configure(order("OP-2", 40)).unwrap();

    assert_eq!(used.engine.snapshot(), fresh.engine.snapshot());
    assert_eq!(*used.store.deactivations.lock(), 1);
}

#[tokio::test]
async fn test_status_estimates_completion_while_counting() {
    let f = fixture();
    f.engine.configure(order("OP-1", 200)).unwrap();
    f.engine.start_counting().await.unwrap();
    f.engine.inner().state.progress.lock().current_count = 100;
    f.engine
        .inner()
        .state
        .series
        .lock()
        .push_sample(6000.0, "08:00:10", 6000, false);

    let status = f.engine.status();
    // 100 remaining at 6000/h is one minute
    assert_eq!(
        status.estimated_completion,
        Some(f.clock.now() + chrono::Duration::minutes(1))
    );

    f.engine.pause_counting().await.unwrap();
    assert_eq!(f.engine.status().estimated_completion, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_tasks_count_to_target_and_shut_down() {
    let f = fixture_with(EngineConfig {
        flush_interval: Duration::from_millis(20),
        stats_tick: Duration::from_millis(10),
        ..EngineConfig::default()
    });
    f.engine.configure(order("OP-BG", 5)).unwrap();
    f.engine.start_counting().await.unwrap();

    let tasks = f.engine.spawn_tasks();
    f.line.queue_pulses(5);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while f.engine.run_state() != RunState::Stopped {
        assert!(tokio::time::Instant::now() < deadline, "engine never reached target");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    tasks.shutdown(Duration::from_secs(2)).await;
    assert_eq!(f.engine.snapshot().progress.current_count, 5);
    assert_eq!(f.store.finalized().len(), 1);
}

/// Gate whose closing travel takes a while
struct SlowClosingGate {
    inner: ScriptedLine,
}

#[async_trait::async_trait]
impl LineIo for SlowClosingGate {
    fn read_counter_signal(&self) -> bool {
        self.inner.read_counter_signal()
    }

    async fn set_gate(&self, open: bool) -> std::result::Result<(), crate::port::ActuatorError> {
        if !open {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.set_gate(open).await
    }

    fn gate_state(&self) -> GateState {
        self.inner.gate_state()
    }
}

#[tokio::test]
async fn test_resume_during_pause_actuation_leaves_gate_open() {
    let line = Arc::new(SlowClosingGate {
        inner: ScriptedLine::new(),
    });
    let clock = Arc::new(FixedTimeProvider::new(
        Local.with_ymd_and_hms(2024, 2, 12, 8, 0, 0).unwrap(),
    ));
    let engine = CountingEngine::new(
        line.clone(),
        Arc::new(RecordingStore::new()),
        clock,
        EngineConfig::default(),
    );
    engine.configure(order("OP-1", 100)).unwrap();
    engine.start_counting().await.unwrap();

    let pausing = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.pause_counting().await })
    };
    // Let the pause reach its gate actuation
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.resume_counting().await.unwrap();
    pausing.await.unwrap().unwrap();

    let snap = engine.snapshot();
    assert_eq!(snap.run.run_state, RunState::Counting);
    assert_eq!(snap.run.gate_state, GateState::Open);
    assert_eq!(line.gate_state(), GateState::Open);
    assert_eq!(line.inner.gate_writes(), vec![true, false, true]);
}
