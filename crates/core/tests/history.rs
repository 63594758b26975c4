// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod common;

use common::Bench;
use proptest::prelude::*;
use rfctl_core::history::{flags, HistoryEntry, HISTORY_DEPTH};

fn pop(bench: &mut Bench) -> Option<HistoryEntry> {
    HistoryEntry::unpack(bench.read(0x20))
}

/// Issues `n` zero writes cycling over registers 0x00-0x0B.
fn fill(bench: &mut Bench, n: usize) {
    for i in 0..n {
        bench.write((i % 12) as u8, 0);
    }
}

#[test]
fn test_overflow_keeps_most_recent_in_order() {
    let mut bench = Bench::new();
    fill(&mut bench, 20);
    // Reading 0x0F here would itself be captured and evict the oldest entry.
    assert_eq!(bench.engine.history().len(), HISTORY_DEPTH);

    let mut last_ts = 0;
    for i in 4..20 {
        let entry = pop(&mut bench).expect("entry");
        assert_eq!(entry.command, 0x01);
        assert_eq!(entry.register, (i % 12) as u8);
        assert_eq!(entry.flags, 0);
        assert!(entry.timestamp > last_ts);
        last_ts = entry.timestamp;
    }
}

#[test]
fn test_clear_resets_count() {
    let mut bench = Bench::new();
    fill(&mut bench, 5);
    bench.write(0x0F, 0x1);
    assert_eq!(bench.read(0x0F), 0);
    assert_eq!(bench.diagnostics().history_count, 1);
}

#[test]
fn test_entry_flags_record_errors() {
    let mut bench = Bench::new();
    bench.write(0x0F, 0x1);
    bench.write(0x40, 0); // invalid target
    bench.write(0x01, 0); // sticky command error is not a captured flag
    let first = pop(&mut bench).expect("entry");
    assert_eq!(first.register, 0x40);
    assert_eq!(first.flags, flags::CMD_ERROR);
    let second = pop(&mut bench).expect("entry");
    assert_eq!(second.register, 0x01);
    assert_eq!(second.flags, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_fifo_returns_latest_captures(n in 1usize..40) {
        let mut bench = Bench::new();
        fill(&mut bench, n);
        let kept = n.min(HISTORY_DEPTH);
        let mut seen = Vec::new();
        for _ in 0..kept {
            seen.push(pop(&mut bench).expect("entry").register);
        }
        let expected: Vec<u8> = (n - kept..n).map(|i| (i % 12) as u8).collect();
        prop_assert_eq!(seen, expected);
    }
}
