// Run metrics
//
// Lightweight counters describing what one run did, logged when the run ends

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for a single packing/publishing run
///
/// Uses atomic operations so every component can record through a shared reference.
#[derive(Debug)]
pub struct RunMetrics {
    /// Maps that went through the full archiver workflow
    pub maps_packed: AtomicUsize,

    /// Maps copied straight to the output directory
    pub maps_passed_through: AtomicUsize,

    /// Archiver processes launched
    pub tool_invocations: AtomicUsize,

    /// Archiver processes that exited with a non-zero status
    pub tool_failures: AtomicUsize,

    /// Asset pairs written to manifests
    pub manifest_entries: AtomicU64,

    /// Workshop items updated
    pub items_uploaded: AtomicUsize,

    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            maps_packed: AtomicUsize::new(0),
            maps_passed_through: AtomicUsize::new(0),
            tool_invocations: AtomicUsize::new(0),
            tool_failures: AtomicUsize::new(0),
            manifest_entries: AtomicU64::new(0),
            items_uploaded: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_map_packed(&self) {
        self.maps_packed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_map_passed_through(&self) {
        self.maps_passed_through.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one archiver run and whether it exited cleanly
    pub fn record_tool_invocation(&self, success: bool) {
        self.tool_invocations.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.tool_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_manifest_entries(&self, count: usize) {
        self.manifest_entries
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_item_uploaded(&self) {
        self.items_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Total maps written to the output directory
    pub fn maps_completed(&self) -> usize {
        self.maps_packed.load(Ordering::Relaxed) + self.maps_passed_through.load(Ordering::Relaxed)
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Run Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Maps: {} written ({} packed, {} copied without changes)",
            self.maps_completed(),
            self.maps_packed.load(Ordering::Relaxed),
            self.maps_passed_through.load(Ordering::Relaxed)
        );
        tracing::info!(
            "bspzip: {} runs, {} non-zero exits, {} assets listed",
            self.tool_invocations.load(Ordering::Relaxed),
            self.tool_failures.load(Ordering::Relaxed),
            self.manifest_entries.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Workshop: {} items uploaded",
            self.items_uploaded.load(Ordering::Relaxed)
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
