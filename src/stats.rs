//! Compilation Telemetry
//!
//! Lock-light counters and timers for the service: per-tier hit/miss
//! rates, compile counts, evictions, errors, and a running min/max/total
//! of full-compile latency. All fields are relaxed atomics; a
//! [`StatsSnapshot`] is an atomic-read view, consistent enough for
//! logging and dashboards.
//!
//! Counters increase monotonically and are reset only by an explicit
//! [`CompilationStats::reset`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct CompilationStats {
    // Work counters
    compiles: AtomicU64,
    compile_errors: AtomicU64,
    translations: AtomicU64,
    async_submissions: AtomicU64,
    evictions: AtomicU64,

    // Per-tier hits / misses
    pipeline_hits: AtomicU64,
    pipeline_misses: AtomicU64,
    bytecode_hits: AtomicU64,
    bytecode_misses: AtomicU64,
    disk_hits: AtomicU64,
    disk_misses: AtomicU64,
    translation_hits: AtomicU64,
    translation_misses: AtomicU64,
    root_signature_hits: AtomicU64,
    root_signature_misses: AtomicU64,

    // Full-compile latency, nanoseconds
    compile_time_total_ns: AtomicU64,
    compile_time_min_ns: AtomicU64,
    compile_time_max_ns: AtomicU64,
}

/// Point-in-time view of [`CompilationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub compiles: u64,
    pub compile_errors: u64,
    pub translations: u64,
    pub async_submissions: u64,
    pub evictions: u64,

    pub pipeline_hits: u64,
    pub pipeline_misses: u64,
    pub bytecode_hits: u64,
    pub bytecode_misses: u64,
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub translation_hits: u64,
    pub translation_misses: u64,
    pub root_signature_hits: u64,
    pub root_signature_misses: u64,

    pub compile_time_total: Duration,
    pub compile_time_min: Option<Duration>,
    pub compile_time_max: Option<Duration>,
}

impl StatsSnapshot {
    /// Mean full-compile latency, or zero before the first compile.
    #[must_use]
    pub fn compile_time_avg(&self) -> Duration {
        if self.compiles == 0 {
            Duration::ZERO
        } else {
            self.compile_time_total / u32::try_from(self.compiles).unwrap_or(u32::MAX)
        }
    }
}

macro_rules! bump {
    ($($name:ident => $field:ident),+ $(,)?) => {
        $(
            #[inline]
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )+
    };
}

impl CompilationStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    bump! {
        record_compile_error => compile_errors,
        record_translation => translations,
        record_async_submission => async_submissions,
        record_eviction => evictions,
        record_pipeline_hit => pipeline_hits,
        record_pipeline_miss => pipeline_misses,
        record_bytecode_hit => bytecode_hits,
        record_bytecode_miss => bytecode_misses,
        record_disk_hit => disk_hits,
        record_disk_miss => disk_misses,
        record_translation_hit => translation_hits,
        record_translation_miss => translation_misses,
        record_root_signature_hit => root_signature_hits,
        record_root_signature_miss => root_signature_misses,
    }

    /// Records one completed full compile and its latency.
    pub(crate) fn record_compile(&self, elapsed: Duration) {
        let ns = elapsed.as_nanos() as u64;
        self.compiles.fetch_add(1, Ordering::Relaxed);
        self.compile_time_total_ns.fetch_add(ns, Ordering::Relaxed);
        self.compile_time_max_ns.fetch_max(ns, Ordering::Relaxed);
        // min slot uses 0 as "unset"
        self.compile_time_min_ns
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                if current == 0 || ns < current {
                    Some(ns)
                } else {
                    None
                }
            })
            .ok();
    }

    /// Atomically reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        let min_ns = load(&self.compile_time_min_ns);
        let max_ns = load(&self.compile_time_max_ns);
        StatsSnapshot {
            compiles: load(&self.compiles),
            compile_errors: load(&self.compile_errors),
            translations: load(&self.translations),
            async_submissions: load(&self.async_submissions),
            evictions: load(&self.evictions),
            pipeline_hits: load(&self.pipeline_hits),
            pipeline_misses: load(&self.pipeline_misses),
            bytecode_hits: load(&self.bytecode_hits),
            bytecode_misses: load(&self.bytecode_misses),
            disk_hits: load(&self.disk_hits),
            disk_misses: load(&self.disk_misses),
            translation_hits: load(&self.translation_hits),
            translation_misses: load(&self.translation_misses),
            root_signature_hits: load(&self.root_signature_hits),
            root_signature_misses: load(&self.root_signature_misses),
            compile_time_total: Duration::from_nanos(load(&self.compile_time_total_ns)),
            compile_time_min: (min_ns > 0).then(|| Duration::from_nanos(min_ns)),
            compile_time_max: (max_ns > 0).then(|| Duration::from_nanos(max_ns)),
        }
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        let zero = |a: &AtomicU64| a.store(0, Ordering::Relaxed);
        zero(&self.compiles);
        zero(&self.compile_errors);
        zero(&self.translations);
        zero(&self.async_submissions);
        zero(&self.evictions);
        zero(&self.pipeline_hits);
        zero(&self.pipeline_misses);
        zero(&self.bytecode_hits);
        zero(&self.bytecode_misses);
        zero(&self.disk_hits);
        zero(&self.disk_misses);
        zero(&self.translation_hits);
        zero(&self.translation_misses);
        zero(&self.root_signature_hits);
        zero(&self.root_signature_misses);
        zero(&self.compile_time_total_ns);
        zero(&self.compile_time_min_ns);
        zero(&self.compile_time_max_ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_latency_tracks_min_and_max() {
        let stats = CompilationStats::new();
        stats.record_compile(Duration::from_millis(5));
        stats.record_compile(Duration::from_millis(2));
        stats.record_compile(Duration::from_millis(9));

        let snap = stats.snapshot();
        assert_eq!(snap.compiles, 3);
        assert_eq!(snap.compile_time_min, Some(Duration::from_millis(2)));
        assert_eq!(snap.compile_time_max, Some(Duration::from_millis(9)));
        assert_eq!(snap.compile_time_total, Duration::from_millis(16));
    }

    #[test]
    fn avg_is_zero_before_first_compile() {
        let stats = CompilationStats::new();
        assert_eq!(stats.snapshot().compile_time_avg(), Duration::ZERO);
    }

    #[test]
    fn reset_clears_counters() {
        let stats = CompilationStats::new();
        stats.record_pipeline_hit();
        stats.record_compile(Duration::from_millis(1));
        stats.reset();

        let snap = stats.snapshot();
        assert_eq!(snap.pipeline_hits, 0);
        assert_eq!(snap.compiles, 0);
        assert_eq!(snap.compile_time_min, None);
    }
}
