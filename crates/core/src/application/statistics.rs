// Statistics task - periodic persistence and throughput sampling
//
// Both cadences run only while Counting. The sampling baseline follows the
// session: when the observed start time changes, baseline and persist timer
// are re-anchored to the current count.

use crate::application::engine::{CountingEngine, ShutdownToken, TaskKind};
use crate::domain::{series::hourly_rate, RateSample, RunState};
use crate::port::PartialRecord;
use chrono::{DateTime, Local};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Time label format of the series
const TIME_LABEL_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy)]
struct Baseline {
    count: u64,
    at: Instant,
}

/// Per-task sampling state (owned by the statistics loop)
#[derive(Debug, Default)]
pub struct StatisticsSampler {
    session: Option<DateTime<Local>>,
    baseline: Option<Baseline>,
    last_persist: Option<Instant>,
}

impl StatisticsSampler {
    pub fn new() -> Self {
        Self::default()
    }

    fn anchor(&mut self, session: Option<DateTime<Local>>, count: u64, now: Instant) {
        self.session = session;
        self.baseline = Some(Baseline { count, at: now });
        self.last_persist = Some(now);
    }
}

/// What one statistics tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsTick {
    /// A partial record write was attempted
    pub persist_attempted: bool,
    pub persisted: bool,
    pub sample: Option<RateSample>,
}

impl CountingEngine {
    /// Run one statistics tick at `now`
    pub async fn statistics_tick(&self, sampler: &mut StatisticsSampler, now: Instant) -> StatisticsTick {
        let mut tick = StatisticsTick::default();
        let state = &self.inner().state;

        let (run_state, session, count) = {
            let run = state.run.lock();
            let count = state.progress.lock().current_count;
            (run.run_state, run.started_at, count)
        };
        if run_state != RunState::Counting {
            return tick;
        }
        if sampler.baseline.is_none() || sampler.session != session {
            debug!(count, "Statistics baseline anchored to new session");
            sampler.anchor(session, count, now);
        }

        let persist_due = sampler
            .last_persist
            .map_or(true, |last| now.duration_since(last) >= self.config().persist_interval);
        if persist_due {
            tick.persist_attempted = true;
            tick.persisted = self.persist_partial().await;
            // A failed write is retried at the next interval, never backlogged
            sampler.last_persist = Some(now);
        }

        if let Some(baseline) = sampler.baseline {
            let elapsed = now.duration_since(baseline.at);
            if elapsed >= self.config().sample_interval {
                tick.sample = self.take_sample(sampler, baseline, elapsed.as_secs_f64(), now);
            }
        }
        tick
    }

    async fn persist_partial(&self) -> bool {
        let record = PartialRecord::from_state(&self.snapshot(), self.inner().clock.now());
        match self.inner().store.append_partial_record(&record).await {
            Ok(()) => {
                debug!(
                    order_id = record.order_id,
                    current = record.current_count,
                    target = record.target_count,
                    "Partial count recorded"
                );
                true
            }
            Err(e) => {
                warn!(order_id = record.order_id, error = %e, "Failed to record partial count");
                self.record_failure(TaskKind::Statistics, e.to_string());
                false
            }
        }
    }

    fn take_sample(
        &self,
        sampler: &mut StatisticsSampler,
        baseline: Baseline,
        elapsed_secs: f64,
        now: Instant,
    ) -> Option<RateSample> {
        let state = &self.inner().state;
        let time_label = self.inner().clock.now().format(TIME_LABEL_FORMAT).to_string();

        let mut run = state.run.lock();
        // The session may have stopped or restarted while the partial write was in flight
        if run.run_state != RunState::Counting || run.started_at != sampler.session {
            return None;
        }
        let stopped = std::mem::take(&mut run.pending_stoppage);
        let cadence = state.order.read().nominal_rate;
        let count = state.progress.lock().current_count;

        let rate = hourly_rate(count.saturating_sub(baseline.count), elapsed_secs);
        let sample = state.series.lock().push_sample(rate, time_label, cadence, stopped);
        drop(run);

        sampler.baseline = Some(Baseline { count, at: now });
        info!(
            rate = sample.rate,
            average = sample.average,
            cadence = sample.cadence,
            stoppage = sample.stoppage.is_some(),
            "Throughput sampled"
        );
        Some(sample)
    }
}

/// Statistics task body
pub(crate) async fn run_statistics_loop(engine: CountingEngine, mut shutdown: ShutdownToken) {
    let tick_period = engine.config().stats_tick;
    let mut sampler = StatisticsSampler::new();
    info!(tick_ms = tick_period.as_millis() as u64, "Statistics task started");

    loop {
        if shutdown.is_shutdown() {
            break;
        }
        engine.statistics_tick(&mut sampler, Instant::now()).await;
        if shutdown.sleep_or_shutdown(tick_period).await {
            break;
        }
    }

    info!("Statistics task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::EngineConfig;
    use crate::domain::{OrderSetup, StoppageMarker};
    use crate::port::line_io::mocks::ScriptedLine;
    use crate::port::session_store::mocks::RecordingStore;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        engine: CountingEngine,
        store: Arc<RecordingStore>,
    }

    async fn counting_fixture() -> Fixture {
        let store = Arc::new(RecordingStore::new());
        let clock = Local.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let engine = CountingEngine::new(
            Arc::new(ScriptedLine::new()),
            store.clone(),
            Arc::new(FixedTimeProvider::new(clock)),
            EngineConfig::default(),
        );
        engine
            .configure(OrderSetup {
                order_id: 7,
                order_label: "OP-7".to_string(),
                article: "A".to_string(),
                description: "D".to_string(),
                nominal_rate: 6000,
                target_count: 10_000,
            })
            .unwrap();
        engine.start_counting().await.unwrap();
        Fixture { engine, store }
    }

    fn add_count(engine: &CountingEngine, n: u64) {
        engine.inner().state.progress.lock().current_count += n;
    }

    #[tokio::test]
    async fn test_first_tick_anchors_without_writing() {
        let f = counting_fixture().await;
        let mut sampler = StatisticsSampler::new();
        let t0 = Instant::now();

        let tick = f.engine.statistics_tick(&mut sampler, t0).await;
        assert_eq!(tick, StatisticsTick::default());
        assert_eq!(f.store.partial_count(), 0);
    }

    #[tokio::test]
    async fn test_sample_and_persist_every_ten_seconds() {
        let f = counting_fixture().await;
        let mut sampler = StatisticsSampler::new();
        let t0 = Instant::now();
        f.engine.statistics_tick(&mut sampler, t0).await;

        add_count(&f.engine, 50);
        let early = f.engine.statistics_tick(&mut sampler, t0 + Duration::from_secs(9)).await;
        assert!(early.sample.is_none());
        assert!(!early.persist_attempted);

        let tick = f.engine.statistics_tick(&mut sampler, t0 + Duration::from_secs(10)).await;
        assert!(tick.persisted);
        let sample = tick.sample.unwrap();
        // 50 units in 10 seconds
        assert_eq!(sample.rate, 18000.0);
        assert_eq!(sample.average, 18000);
        assert_eq!(sample.cadence, 6000);
        assert_eq!(sample.time_label, "09:30:00");
        assert_eq!(sample.stoppage, None);

        let record = f.store.partials.lock()[0].clone();
        assert_eq!(record.order_id, 7);
        assert_eq!(record.current_count, 50);
        assert_eq!(record.target_count, 10_000);

        let snap = f.engine.snapshot();
        assert_eq!(snap.series.len(), 1);
        assert_eq!(snap.series.instant_rate, 18000.0);
    }

    #[tokio::test]
    async fn test_pause_marker_consumed_by_next_sample() {
        let f = counting_fixture().await;
        let mut sampler = StatisticsSampler::new();
        let t0 = Instant::now();
        f.engine.statistics_tick(&mut sampler, t0).await;

        f.engine.pause_counting().await.unwrap();
        // No sampling while paused
        let paused = f.engine.statistics_tick(&mut sampler, t0 + Duration::from_secs(20)).await;
        assert_eq!(paused, StatisticsTick::default());
        f.engine.resume_counting().await.unwrap();

        let first = f.engine.statistics_tick(&mut sampler, t0 + Duration::from_secs(30)).await;
        assert_eq!(first.sample.unwrap().stoppage, Some(StoppageMarker::Stopped));
        let second = f.engine.statistics_tick(&mut sampler, t0 + Duration::from_secs(40)).await;
        assert_eq!(second.sample.unwrap().stoppage, None);
        assert!(!f.engine.snapshot().run.pending_stoppage);
    }

    #[tokio::test]
    async fn test_persist_failure_absorbed_and_sampling_continues() {
        let f = counting_fixture().await;
        let mut sampler = StatisticsSampler::new();
        let t0 = Instant::now();
        f.engine.statistics_tick(&mut sampler, t0).await;

        f.store.fail_writes(true);
        add_count(&f.engine, 10);
        let tick = f.engine.statistics_tick(&mut sampler, t0 + Duration::from_secs(10)).await;
        assert!(tick.persist_attempted);
        assert!(!tick.persisted);
        assert!(tick.sample.is_some());
        assert_eq!(f.engine.task_failures().count(TaskKind::Statistics), 1);

        // Retried at the next interval, not on the next tick
        f.store.fail_writes(false);
        let next = f.engine.statistics_tick(&mut sampler, t0 + Duration::from_secs(11)).await;
        assert!(!next.persist_attempted);
        let retry = f.engine.statistics_tick(&mut sampler, t0 + Duration::from_secs(20)).await;
        assert!(retry.persisted);
        assert_eq!(f.store.partial_count(), 1);
    }

    #[tokio::test]
    async fn test_new_session_reanchors_baseline() {
        let f = counting_fixture().await;
        let mut sampler = StatisticsSampler::new();
        let t0 = Instant::now();
        add_count(&f.engine, 500);
        f.engine.statistics_tick(&mut sampler, t0).await;

        f.engine.stop_counting().await.unwrap();
        f.engine
            .configure(OrderSetup {
                order_id: 8,
                order_label: "OP-8".to_string(),
                article: "B".to_string(),
                description: "E".to_string(),
                nominal_rate: 3000,
                target_count: 100,
            })
            .unwrap();
        f.engine.start_counting().await.unwrap();
        // The fixed clock would repeat the old start time
        f.engine.inner().state.run.lock().started_at =
            Some(Local.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap());

        let t1 = t0 + Duration::from_secs(60);
        f.engine.statistics_tick(&mut sampler, t1).await;
        add_count(&f.engine, 20);
        let tick = f.engine.statistics_tick(&mut sampler, t1 + Duration::from_secs(10)).await;
        let sample = tick.sample.unwrap();
        // 20 units in 10 seconds, not a negative delta from the old session
        assert_eq!(sample.rate, 7200.0);
        assert_eq!(sample.cadence, 3000);
    }
}
