//! # Available-memory probe and historical low watermark.
//!
//! The supervisor's resource audit compares the **lowest** available memory
//! ever observed against a fixed floor. [`MemoryProbe`] abstracts where the
//! number comes from; [`SystemMemory`] reads `MemAvailable` from `/proc/meminfo`.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of the currently available memory in bytes.
pub trait MemoryProbe: Send + Sync + 'static {
    /// Bytes currently available, or `None` if the platform cannot tell.
    fn available(&self) -> Option<usize>;
}

/// Host memory probe backed by `/proc/meminfo` (Linux only).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    #[cfg(target_os = "linux")]
    fn available(&self) -> Option<usize> {
        let raw = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo_available(&raw)
    }

    #[cfg(not(target_os = "linux"))]
    fn available(&self) -> Option<usize> {
        None
    }
}

/// Extracts `MemAvailable` (reported in kB) as bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_available(raw: &str) -> Option<usize> {
    raw.lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<usize>().ok())
        .map(|kb| kb.saturating_mul(1024))
}

/// Tracks the lowest value ever reported by a [`MemoryProbe`].
#[derive(Debug)]
pub struct MemoryWatermark {
    min: AtomicUsize,
}

/// One audit sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    /// Bytes available right now.
    pub available: usize,
    /// Lowest value observed since boot.
    pub min_ever: usize,
}

impl MemoryWatermark {
    pub fn new() -> Self {
        Self {
            min: AtomicUsize::new(usize::MAX),
        }
    }

    /// Samples `probe` and folds the reading into the watermark.
    pub fn sample(&self, probe: &dyn MemoryProbe) -> Option<MemorySample> {
        let available = probe.available()?;
        let prev = self.min.fetch_min(available, Ordering::AcqRel);
        Some(MemorySample {
            available,
            min_ever: prev.min(available),
        })
    }
}

impl Default for MemoryWatermark {
    fn default() -> Self {
        Self::new()
    }
}
