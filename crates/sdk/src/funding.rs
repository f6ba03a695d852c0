//! Funding rate sampling.
//!
//! [`FundingSampler`] turns a stream of instantaneous funding readings,
//! taken at a fixed cadence, into one and five minute averages and hands them
//! to a [`FundingSink`].

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};

/// Days per year funding is annualized over.
const DAYS_PER_YEAR: f64 = 360.0;

/// Default cadence of funding readings.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Readings averaged into one minute at the default cadence.
pub const SAMPLES_PER_MINUTE: usize = 12;

/// One minute averages averaged into five minutes.
pub const MINUTES_PER_FIVE_MINUTES: usize = 5;

/// Annualized funding in percent from an instantaneous per day rate.
pub fn funding_apr(rate: f64) -> f64 { rate * DAYS_PER_YEAR * 100.0 }

/// Period a [`FundingRecord`] averages over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Periodicity {
    OneMinute,
    FiveMinutes,
}

impl std::fmt::Display for Periodicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            match self {
                Periodicity::OneMinute => write!(f, "1"),
                Periodicity::FiveMinutes => write!(f, "5"),
            }
        } else {
            match self {
                Periodicity::OneMinute => write!(f, "1m"),
                Periodicity::FiveMinutes => write!(f, "5m"),
            }
        }
    }
}

/// Averaged funding APR of one venue.
#[derive(Clone, Debug, PartialEq)]
pub struct FundingRecord {
    pub ts: DateTime<Utc>,
    pub periodicity: Periodicity,
    /// Annualized funding, percent.
    pub value_pct: f64,
    pub venue: String,
}

/// Destination of averaged funding records.
///
/// Storage failures are the sink's own concern; the sampler keeps sampling.
pub trait FundingSink: Send + Sync {
    fn save(&self, record: FundingRecord) -> impl Future<Output = ()> + Send;
}

/// Sink keeping every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<FundingRecord>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    pub fn records(&self) -> Vec<FundingRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize { self.records.lock().unwrap_or_else(PoisonError::into_inner).len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl FundingSink for MemorySink {
    async fn save(&self, record: FundingRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

/// Last `capacity` values, emitting their mean once every `capacity` pushes.
#[derive(Clone, Debug)]
struct Window {
    values: VecDeque<f64>,
    capacity: usize,
    unsaved: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { values: VecDeque::with_capacity(capacity), capacity, unsaved: 0 }
    }

    fn push(&mut self, value: f64) -> Option<f64> {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.unsaved += 1;
        if self.unsaved < self.capacity {
            return None;
        }
        self.unsaved = 0;
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

/// Averages funding readings of one venue.
///
/// Every [`SAMPLES_PER_MINUTE`] readings produce a one minute average, every
/// [`MINUTES_PER_FIVE_MINUTES`] one minute averages produce a five minute
/// average.
#[derive(Clone, Debug)]
pub struct FundingSampler {
    venue: String,
    one_minute: Window,
    five_minutes: Window,
}

impl FundingSampler {
    pub fn new(venue: impl Into<String>) -> Self {
        Self::with_windows(venue, SAMPLES_PER_MINUTE, MINUTES_PER_FIVE_MINUTES)
    }

    /// Sampler with custom window lengths, for cadences other than
    /// [`SAMPLE_INTERVAL`].
    pub fn with_windows(venue: impl Into<String>, samples_per_minute: usize, minutes_per_window: usize) -> Self {
        Self {
            venue: venue.into(),
            one_minute: Window::new(samples_per_minute),
            five_minutes: Window::new(minutes_per_window),
        }
    }

    pub fn venue(&self) -> &str { &self.venue }

    /// Adds one funding APR reading, returning the averages it completes.
    pub fn push(&mut self, ts: DateTime<Utc>, apr_pct: f64) -> Vec<FundingRecord> {
        let mut records = Vec::new();
        if let Some(minute) = self.one_minute.push(apr_pct) {
            records.push(self.record(ts, Periodicity::OneMinute, minute));
            if let Some(five) = self.five_minutes.push(minute) {
                records.push(self.record(ts, Periodicity::FiveMinutes, five));
            }
        }
        records
    }

    /// Same as [`FundingSampler::push`], saving completed averages to `sink`.
    pub async fn sample<S: FundingSink>(&mut self, sink: &S, ts: DateTime<Utc>, apr_pct: f64) -> usize {
        let records = self.push(ts, apr_pct);
        let saved = records.len();
        for record in records {
            sink.save(record).await;
        }
        saved
    }

    fn record(&self, ts: DateTime<Utc>, periodicity: Periodicity, value_pct: f64) -> FundingRecord {
        FundingRecord { ts, periodicity, value_pct, venue: self.venue.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funding_apr() {
        assert_eq!(funding_apr(0.0), 0.0);
        assert!((funding_apr(0.0001) - 3.6).abs() < 1e-12);
        assert!((funding_apr(-0.05) + 1800.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_minute_average() {
        let mut sampler = FundingSampler::new("mango");
        let ts = Utc::now();
        for i in 0..11 {
            assert!(sampler.push(ts, i as f64).is_empty());
        }
        let records = sampler.push(ts, 11.0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].periodicity, Periodicity::OneMinute);
        assert_eq!(records[0].value_pct, 5.5);
        assert_eq!(records[0].venue, "mango");
    }

    #[test]
    fn test_windows_roll() {
        let mut sampler = FundingSampler::with_windows("mango", 2, 2);
        let ts = Utc::now();
        assert!(sampler.push(ts, 1.0).is_empty());
        assert_eq!(sampler.push(ts, 3.0)[0].value_pct, 2.0);
        assert!(sampler.push(ts, 5.0).is_empty());
        // Minute window holds [5, 7], five minute window holds [2, 6]
        let records = sampler.push(ts, 7.0);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value_pct, 6.0);
        assert_eq!(records[1].periodicity, Periodicity::FiveMinutes);
        assert_eq!(records[1].value_pct, 4.0);
    }

    #[tokio::test]
    async fn test_sample_saves_to_sink() {
        let sink = MemorySink::new();
        let mut sampler = FundingSampler::new("mango");
        let ts = Utc::now();
        let mut saved = 0;
        for _ in 0..SAMPLES_PER_MINUTE * MINUTES_PER_FIVE_MINUTES {
            saved += sampler.sample(&sink, ts, 1.5).await;
        }
        assert_eq!(saved, MINUTES_PER_FIVE_MINUTES + 1);
        let records = sink.records();
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.value_pct == 1.5));
        assert_eq!(records.last().map(|r| r.periodicity), Some(Periodicity::FiveMinutes));
    }

    #[test]
    fn test_periodicity_display() {
        assert_eq!(Periodicity::OneMinute.to_string(), "1m");
        assert_eq!(format!("{:#}", Periodicity::FiveMinutes), "5");
    }
}
