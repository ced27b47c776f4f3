// Throughput time series (one entry per statistics sample)

use serde::{Deserialize, Serialize};

/// Number of most recent rate samples averaged into the average-rate series
pub const ROLLING_WINDOW: usize = 10;

/// Marker appended to the stoppage series when a pause happened since the last sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoppageMarker {
    Stopped,
}

impl StoppageMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            StoppageMarker::Stopped => "stopped",
        }
    }
}

/// One statistics sample, as appended to the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub rate: f64,
    pub average: u64,
    pub time_label: String,
    pub cadence: u32,
    pub stoppage: Option<StoppageMarker>,
}

/// Session-scoped series written by the statistics task
///
/// All vectors grow in lockstep: entry `k` of each describes sample `k`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThroughputSeries {
    pub rates: Vec<f64>,
    pub averages: Vec<u64>,
    pub time_labels: Vec<String>,
    pub cadences: Vec<u32>,
    pub stoppages: Vec<Option<StoppageMarker>>,
    /// Latest instantaneous rate (units/hour)
    pub instant_rate: f64,
}

impl ThroughputSeries {
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Append one sample and return it with its rolling average filled in
    pub fn push_sample(
        &mut self,
        rate: f64,
        time_label: impl Into<String>,
        cadence: u32,
        stopped: bool,
    ) -> RateSample {
        let rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
        self.rates.push(rate);

        let window_start = self.rates.len().saturating_sub(ROLLING_WINDOW);
        let average = rounded_mean(&self.rates[window_start..]);

        let sample = RateSample {
            rate,
            average,
            time_label: time_label.into(),
            cadence,
            stoppage: stopped.then_some(StoppageMarker::Stopped),
        };

        self.averages.push(sample.average);
        self.time_labels.push(sample.time_label.clone());
        self.cadences.push(sample.cadence);
        self.stoppages.push(sample.stoppage);
        self.instant_rate = rate;
        sample
    }

    /// Rounded mean over the whole session (0 before the first sample)
    pub fn session_average(&self) -> u64 {
        rounded_mean(&self.rates)
    }

    pub fn last_average(&self) -> Option<u64> {
        self.averages.last().copied()
    }
}

fn rounded_mean(values: &[f64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    mean.round() as u64
}

/// Instantaneous rate in units/hour over a count delta
pub fn hourly_rate(delta_count: u64, delta_secs: f64) -> f64 {
    if delta_secs <= 0.0 {
        return 0.0;
    }
    (delta_count as f64 / delta_secs) * 3600.0
}
