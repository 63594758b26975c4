// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod common;

use common::Bench;

const RISING: u64 = 1;
const BOTH: u64 = 3;

fn drive(bench: &mut Bench, bank: usize, value: u64) {
    bench.engine.set_gpio(bank, value).unwrap();
    // Two synchronizer stages plus the detector.
    bench.engine.run(4);
}

#[test]
fn test_rising_config_ignores_falling_edges() -> anyhow::Result<()> {
    let mut bench = Bench::new();
    bench.write(0x0D, RISING); // bank 0, pin 0

    drive(&mut bench, 0, 1);
    assert_eq!(bench.read(0x1F), 0x1);
    assert_eq!(bench.irq_status() & 0x80, 0x80);

    bench.write(0x1F, 0x1);
    assert_eq!(bench.read(0x1F), 0);

    drive(&mut bench, 0, 0);
    assert_eq!(bench.read(0x1F), 0, "falling edge latched under rising config");

    drive(&mut bench, 0, 1);
    assert_eq!(bench.read(0x1F), 0x1);
    Ok(())
}

#[test]
fn test_latches_once_per_edge() -> anyhow::Result<()> {
    let mut bench = Bench::new();
    bench.write(0x0D, RISING << 2); // pin 1
    drive(&mut bench, 0, 0b10);
    bench.write(0x1F, u64::MAX);
    // Input stays high: no new edge, nothing re-latches.
    bench.engine.run(50);
    assert_eq!(bench.read(0x1F), 0);
    Ok(())
}

#[test]
fn test_bank1_both_edges() -> anyhow::Result<()> {
    let mut bench = Bench::new();
    bench.write(0x0E, BOTH << 6); // bank 1, pin 3
    drive(&mut bench, 1, 1 << 3);
    assert_eq!(bench.read(0x1F), 1 << 35);
    bench.write(0x1F, 1 << 35);
    drive(&mut bench, 1, 0);
    assert_eq!(bench.read(0x1F), 1 << 35);
    Ok(())
}

#[test]
fn test_irq_clear_reaches_detector() -> anyhow::Result<()> {
    let mut bench = Bench::new();
    bench.write(0x0D, BOTH);
    drive(&mut bench, 0, 1);
    assert_eq!(bench.irq_status() & 0x80, 0x80);

    bench.write(0x1B, 0x80);
    assert_eq!(bench.read(0x1F), 0);
    assert_eq!(bench.irq_status() & 0x80, 0);
    Ok(())
}

#[test]
fn test_synchronized_snapshots() -> anyhow::Result<()> {
    let mut bench = Bench::new();
    for bank in 0..4 {
        bench.engine.set_gpio(bank, 0x1111 * (bank as u64 + 1))?;
    }
    bench.engine.run(4);
    for bank in 0..4u8 {
        assert_eq!(bench.read(0x16 + bank), 0x1111 * (bank as u64 + 1));
    }
    // Unmonitored banks never latch.
    assert_eq!(bench.read(0x1F), 0);
    Ok(())
}
