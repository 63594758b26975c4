// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::{TickInputs, Wires};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct PerfOut {
    pub min: u16,
    pub max: u16,
    pub average: u16,
    pub count: u16,
}

impl PerfOut {
    pub fn pack(&self) -> u64 {
        ((self.min as u64) << 48)
            | ((self.max as u64) << 32)
            | ((self.average as u64) << 16)
            | self.count as u64
    }
}

/// Command-to-response latency statistics. The average is refreshed once per
/// finished sample, so reading it never divides.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PerformanceTracker {
    start: Option<u16>,
    min: u16,
    max: u16,
    sum: u32,
    count: u32,
    average: u16,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            start: None,
            min: u16::MAX,
            max: 0,
            sum: 0,
            count: 0,
            average: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn start(&mut self, timestamp: u64) {
        self.start = Some(timestamp as u16);
    }

    /// Closes the open sample, if any, and returns its latency.
    pub fn stop(&mut self, timestamp: u64) -> Option<u16> {
        let start = self.start.take()?;
        let latency = (timestamp as u16).wrapping_sub(start);
        self.min = self.min.min(latency);
        self.max = self.max.max(latency);
        self.sum = self.sum.saturating_add(latency as u32);
        self.count = self.count.saturating_add(1);
        self.average = (self.sum / self.count).min(u16::MAX as u32) as u16;
        Some(latency)
    }

    pub fn out(&self) -> PerfOut {
        PerfOut {
            min: if self.count == 0 { 0 } else { self.min },
            max: self.max,
            average: self.average,
            count: self.count.min(u16::MAX as u32) as u16,
        }
    }

    pub fn step(&mut self, prev: &Wires, now: &TickInputs) -> PerfOut {
        let d = &prev.dispatcher;
        if d.perf_clear {
            self.reset();
        }
        if d.perf_stop {
            if let Some(latency) = self.stop(now.timestamp) {
                tracing::trace!("Response latency {} ticks", latency);
            }
        }
        if d.perf_start {
            self.start(now.timestamp);
        }
        self.out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_average() {
        let mut p = PerformanceTracker::new();
        for (start, stop) in [(10u64, 14u64), (100, 110), (200, 201)] {
            p.start(start);
            p.stop(stop);
        }
        let out = p.out();
        assert_eq!((out.min, out.max, out.count), (1, 10, 3));
        assert_eq!(out.average, 5);
    }

    #[test]
    fn test_wraparound_latency() {
        let mut p = PerformanceTracker::new();
        p.start(0xFFFE);
        assert_eq!(p.stop(0x1_0003), Some(5));
    }

    #[test]
    fn test_stop_without_start_is_ignored() {
        let mut p = PerformanceTracker::new();
        assert_eq!(p.stop(50), None);
        assert_eq!(p.out(), PerfOut::default());
    }

    #[test]
    fn test_clear_request() {
        let mut p = PerformanceTracker::new();
        p.start(0);
        p.stop(3);
        let mut w = Wires::default();
        w.dispatcher.perf_clear = true;
        let out = p.step(&w, &TickInputs::default());
        assert_eq!(out, PerfOut::default());
    }

    #[test]
    fn test_pack() {
        let out = PerfOut {
            min: 1,
            max: 2,
            average: 3,
            count: 4,
        };
        assert_eq!(out.pack(), 0x0001_0002_0003_0004);
    }
}
