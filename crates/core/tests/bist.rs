// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod common;

use common::Bench;

#[derive(Debug)]
struct BistStatus {
    running: bool,
    done: bool,
    pass: bool,
    register_pass: bool,
    crc_pass: bool,
    counter_pass: bool,
    errors: u8,
    runs: u32,
}

fn bist_status(bench: &mut Bench) -> BistStatus {
    let w = bench.read(0x1D);
    BistStatus {
        running: w & 1 != 0,
        done: w & 2 != 0,
        pass: w & 4 != 0,
        register_pass: w & 8 != 0,
        crc_pass: w & 16 != 0,
        counter_pass: w & 32 != 0,
        errors: (w >> 8) as u8,
        runs: (w >> 32) as u32,
    }
}

fn seed(bench: &mut Bench) -> Vec<u64> {
    let values: Vec<u64> = (0..10u64).map(|i| 0x0101_0101 * (i + 1)).collect();
    for (i, v) in values.iter().enumerate() {
        bench.write(i as u8, *v);
    }
    values
}

fn wait_done(bench: &mut Bench) -> BistStatus {
    for _ in 0..50 {
        let status = bist_status(bench);
        if status.done && !status.running {
            return status;
        }
    }
    panic!("BIST did not finish");
}

#[test]
fn test_full_bist_restores_and_passes() {
    let mut bench = Bench::new();
    let before = seed(&mut bench);

    bench.write(0x0C, 0b111);
    let status = wait_done(&mut bench);
    assert!(status.pass, "{:?}", status);
    assert!(status.register_pass && status.crc_pass && status.counter_pass);
    assert_eq!(status.errors, 0);
    assert_eq!(status.runs, 1);

    for (i, v) in before.iter().enumerate() {
        assert_eq!(bench.read(i as u8), *v, "register {:#04x}", i);
    }
}

#[test]
fn test_host_writes_suppressed_while_running() {
    let mut bench = Bench::new();
    seed(&mut bench);
    bench.write(0x0C, 0b101);
    // Lands while the sequence is still in its register phase.
    bench.write(0x05, 0xDEAD);
    bench.write(0x0D, 0x3);
    wait_done(&mut bench);

    assert_eq!(bench.read(0x05), 0x0101_0101 * 6);
    assert_eq!(bench.read(0x0D), 0x3);
    assert!(bench.diagnostics().suppressed >= 1);
}

#[test]
fn test_rerun_needs_fresh_rising_edge() {
    let mut bench = Bench::new();
    bench.write(0x0C, 0b001);
    let first = wait_done(&mut bench);
    assert!(first.pass);
    assert!(!first.crc_pass && !first.counter_pass);

    bench.engine.run(100);
    assert_eq!(bist_status(&mut bench).runs, 1);

    bench.write(0x0C, 0);
    bench.write(0x0C, 0b011);
    let second = wait_done(&mut bench);
    assert_eq!(second.runs, 2);
    assert!(second.pass && second.crc_pass);
}

#[test]
fn test_bist_running_visible_in_bus_status() {
    let mut bench = Bench::new();
    bench.write(0x0C, 0b101);
    let status = bench.read(0x10);
    assert_eq!((status >> 31) & 1, 1, "bus status bit 7 while BIST runs");
    wait_done(&mut bench);
    assert_eq!((bench.read(0x10) >> 31) & 1, 0);
}
