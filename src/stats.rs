//! Cache statistics collector
//!
//! A concurrency-safe accumulator tracking hit/miss/error/eviction behavior
//! per logical method name. All mutation goes through one
//! `parking_lot::Mutex` so that a single recording (counter increment,
//! timestamp update, sample push) is visible as one unit; recording is O(1)
//! amortized, so the lock is a cheap serialization point.
//!
//! Derived metrics (hit rate, averages, uptime) are computed on read, never
//! stored. The full snapshot serializes to plain nested structures with
//! ISO-8601 timestamps for external reporting.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Response-time samples retained per method for min/max/percentile style
/// summaries
const SAMPLE_WINDOW: usize = 100;

/// Kind of cache event recorded in the recent-operations log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Hit,
    Miss,
    Error,
    Eviction,
}

/// One entry in the bounded recent-operations log
#[derive(Debug, Clone, Serialize)]
pub struct RecentOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Keys removed, for eviction entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evicted: Option<u64>,
}

#[derive(Debug, Default)]
struct MethodEntry {
    hits: u64,
    misses: u64,
    errors: u64,
    total_response_time_ms: f64,
    last_hit: Option<DateTime<Utc>>,
    last_miss: Option<DateTime<Utc>>,
    last_error: Option<DateTime<Utc>>,
    keys: HashSet<String>,
    samples: VecDeque<f64>,
}

impl MethodEntry {
    fn push_sample(&mut self, elapsed_ms: f64) {
        self.samples.push_back(elapsed_ms);
        while self.samples.len() > SAMPLE_WINDOW {
            self.samples.pop_front();
        }
    }
}

/// Per-method statistics snapshot with derived metrics
#[derive(Debug, Clone, Serialize)]
pub struct MethodStats {
    pub method: String,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    /// `hits + misses`
    pub total_requests: u64,
    /// Percentage in `[0, 100]`; 0 when no requests were recorded
    pub hit_rate: f64,
    pub average_response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_hit: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_miss: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<DateTime<Utc>>,
    /// Distinct cache keys observed for this method
    pub keys: Vec<String>,
}

/// Process-wide aggregate counters
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_errors: u64,
    pub total_evictions: u64,
    pub hit_rate: f64,
    pub start_time: DateTime<Utc>,
    pub uptime_seconds: i64,
}

/// Full exportable snapshot: global stats, per-method stats, recent events
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub global_stats: GlobalStats,
    pub method_stats: BTreeMap<String, MethodStats>,
    pub recent_operations: Vec<RecentOperation>,
}

/// Per-method response-time summary computed from the retained sample window
#[derive(Debug, Clone, Serialize)]
pub struct MethodPerformance {
    pub total_requests: u64,
    pub hit_rate: f64,
    pub average_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
}

struct StatsInner {
    methods: HashMap<String, MethodEntry>,
    total_hits: u64,
    total_misses: u64,
    total_errors: u64,
    total_evictions: u64,
    start_time: DateTime<Utc>,
    recent: VecDeque<RecentOperation>,
    recent_capacity: usize,
}

impl StatsInner {
    fn new(recent_capacity: usize) -> Self {
        Self {
            methods: HashMap::new(),
            total_hits: 0,
            total_misses: 0,
            total_errors: 0,
            total_evictions: 0,
            start_time: Utc::now(),
            recent: VecDeque::with_capacity(recent_capacity.min(1024)),
            recent_capacity,
        }
    }

    fn push_recent(&mut self, op: RecentOperation) {
        self.recent.push_back(op);
        while self.recent.len() > self.recent_capacity {
            self.recent.pop_front();
        }
    }

    fn method_snapshot(&self, name: &str, entry: &MethodEntry) -> MethodStats {
        let total_requests = entry.hits + entry.misses;
        let mut keys: Vec<String> = entry.keys.iter().cloned().collect();
        keys.sort_unstable();

        MethodStats {
            method: name.to_string(),
            hits: entry.hits,
            misses: entry.misses,
            errors: entry.errors,
            total_requests,
            hit_rate: ratio_percent(entry.hits, total_requests),
            average_response_time_ms: if total_requests > 0 {
                entry.total_response_time_ms / total_requests as f64
            } else {
                0.0
            },
            last_hit: entry.last_hit,
            last_miss: entry.last_miss,
            last_error: entry.last_error,
            keys,
        }
    }

    fn global_snapshot(&self) -> GlobalStats {
        let now = Utc::now();
        GlobalStats {
            total_hits: self.total_hits,
            total_misses: self.total_misses,
            total_errors: self.total_errors,
            total_evictions: self.total_evictions,
            hit_rate: ratio_percent(self.total_hits, self.total_hits + self.total_misses),
            start_time: self.start_time,
            uptime_seconds: (now - self.start_time).num_seconds(),
        }
    }
}

fn ratio_percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

fn to_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Concurrency-safe cache statistics accumulator
///
/// One instance is constructed at process start (inside
/// [`CacheLayer`](crate::CacheLayer)) and shared by reference through the
/// call graph. When disabled, every recording call is a no-op while read
/// operations keep serving whatever was recorded before.
pub struct CacheStatsCollector {
    enabled: AtomicBool,
    inner: Mutex<StatsInner>,
}

impl CacheStatsCollector {
    pub fn new(enabled: bool, recent_capacity: usize) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            inner: Mutex::new(StatsInner::new(recent_capacity)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Toggle recording. Reads stay functional either way.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Record a cache hit with its lookup time and the key that was served
    pub fn record_hit(&self, method: &str, key: &str, elapsed: Duration) {
        if !self.is_enabled() {
            return;
        }
        let now = Utc::now();
        let elapsed_ms = to_ms(elapsed);
        let mut inner = self.inner.lock();

        let entry = inner.methods.entry(method.to_string()).or_default();
        entry.hits += 1;
        entry.total_response_time_ms += elapsed_ms;
        entry.last_hit = Some(now);
        entry.keys.insert(key.to_string());
        entry.push_sample(elapsed_ms);

        inner.total_hits += 1;
        inner.push_recent(RecentOperation {
            kind: OperationKind::Hit,
            method: Some(method.to_string()),
            key: Some(key.to_string()),
            timestamp: now,
            response_time_ms: Some(elapsed_ms),
            error: None,
            evicted: None,
        });
    }

    /// Record a cache miss with the target's execution time.
    ///
    /// `key` is the resolved cache key when one was written, `None` when the
    /// write was skipped (condition/unless or a store failure).
    pub fn record_miss(&self, method: &str, key: Option<&str>, elapsed: Duration) {
        if !self.is_enabled() {
            return;
        }
        let now = Utc::now();
        let elapsed_ms = to_ms(elapsed);
        let mut inner = self.inner.lock();

        let entry = inner.methods.entry(method.to_string()).or_default();
        entry.misses += 1;
        entry.total_response_time_ms += elapsed_ms;
        entry.last_miss = Some(now);
        if let Some(key) = key {
            entry.keys.insert(key.to_string());
        }
        entry.push_sample(elapsed_ms);

        inner.total_misses += 1;
        inner.push_recent(RecentOperation {
            kind: OperationKind::Miss,
            method: Some(method.to_string()),
            key: key.map(ToString::to_string),
            timestamp: now,
            response_time_ms: Some(elapsed_ms),
            error: None,
            evicted: None,
        });
    }

    /// Record an infrastructure error attributed to a method
    pub fn record_error(&self, method: &str, error: &str) {
        if !self.is_enabled() {
            return;
        }
        let now = Utc::now();
        let mut inner = self.inner.lock();

        let entry = inner.methods.entry(method.to_string()).or_default();
        entry.errors += 1;
        entry.last_error = Some(now);

        inner.total_errors += 1;
        inner.push_recent(RecentOperation {
            kind: OperationKind::Error,
            method: Some(method.to_string()),
            key: None,
            timestamp: now,
            response_time_ms: None,
            error: Some(error.to_string()),
            evicted: None,
        });
    }

    /// Record an eviction of `count` keys.
    ///
    /// Pattern deletes pass the number of keys actually matched, not 1.
    /// The method name is optional because evictions can come from paths
    /// with no logical method attached.
    pub fn record_eviction(&self, method: Option<&str>, key: &str, count: u64) {
        if !self.is_enabled() {
            return;
        }
        let now = Utc::now();
        let mut inner = self.inner.lock();

        inner.total_evictions += count;
        inner.push_recent(RecentOperation {
            kind: OperationKind::Eviction,
            method: method.map(ToString::to_string),
            key: Some(key.to_string()),
            timestamp: now,
            response_time_ms: None,
            error: None,
            evicted: Some(count),
        });
    }

    /// Reset all counters, method entries and the recent-operations log.
    /// The start time is reset as well.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let capacity = inner.recent_capacity;
        *inner = StatsInner::new(capacity);
    }

    /// Stats for one logical method, if it was ever observed
    pub fn method_stats(&self, method: &str) -> Option<MethodStats> {
        let inner = self.inner.lock();
        inner
            .methods
            .get(method)
            .map(|entry| inner.method_snapshot(method, entry))
    }

    /// Stats for every observed method, keyed by method name
    pub fn all_method_stats(&self) -> BTreeMap<String, MethodStats> {
        let inner = self.inner.lock();
        inner
            .methods
            .iter()
            .map(|(name, entry)| (name.clone(), inner.method_snapshot(name, entry)))
            .collect()
    }

    /// Process-wide aggregates with derived uptime
    pub fn global_stats(&self) -> GlobalStats {
        self.inner.lock().global_snapshot()
    }

    /// Most recent operations, newest first, capped at `limit`
    pub fn recent_operations(&self, limit: usize) -> Vec<RecentOperation> {
        let inner = self.inner.lock();
        inner.recent.iter().rev().take(limit).cloned().collect()
    }

    /// Full serializable snapshot for external reporting
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock();
        StatsSnapshot {
            global_stats: inner.global_snapshot(),
            method_stats: inner
                .methods
                .iter()
                .map(|(name, entry)| (name.clone(), inner.method_snapshot(name, entry)))
                .collect(),
            recent_operations: inner.recent.iter().rev().cloned().collect(),
        }
    }

    /// Lighter summary with min/max response times from the sample window
    pub fn performance_summary(&self) -> BTreeMap<String, MethodPerformance> {
        let inner = self.inner.lock();
        inner
            .methods
            .iter()
            .map(|(name, entry)| {
                let total_requests = entry.hits + entry.misses;
                let min = entry.samples.iter().copied().fold(f64::INFINITY, f64::min);
                let max = entry.samples.iter().copied().fold(0.0_f64, f64::max);
                (
                    name.clone(),
                    MethodPerformance {
                        total_requests,
                        hit_rate: ratio_percent(entry.hits, total_requests),
                        average_response_time_ms: if total_requests > 0 {
                            entry.total_response_time_ms / total_requests as f64
                        } else {
                            0.0
                        },
                        min_response_time_ms: if entry.samples.is_empty() { 0.0 } else { min },
                        max_response_time_ms: max,
                    },
                )
            })
            .collect()
    }
}
