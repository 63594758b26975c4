// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Drives a scripted host session through the simulated UART link.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rfctl_config::{
    GpioStep, InputStep, ReadStep, SessionScript, SessionStep, WaitBootStep, WaitStep, WriteStep,
};
use rfctl_core::packet::{CommandPacket, ResponsePacket, RESPONSE_LEN};
use rfctl_core::peripherals::uart::HostPort;
use rfctl_core::{Engine, EngineObserver};
use serde::Serialize;
use tracing::{debug, info};

/// Ticks allowed for a single command to be delivered and answered.
const STEP_TICK_LIMIT: u64 = 1_000_000;

/// Counts link traffic and logs each byte at trace level.
#[derive(Debug, Default)]
pub struct LinkMonitor {
    rx: AtomicU64,
    tx: AtomicU64,
}

impl EngineObserver for LinkMonitor {
    fn on_byte_received(&self, byte: u8) {
        self.rx.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("rx {:#04x}", byte);
    }

    fn on_byte_sent(&self, byte: u8) {
        self.tx.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("tx {:#04x}", byte);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    pub detail: String,
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:>3}] {} {:<10} {}",
            self.index,
            if self.passed { "PASS" } else { "FAIL" },
            self.action,
            self.detail
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub result_schema_version: String,
    pub status: String,
    pub ticks: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub steps: Vec<StepOutcome>,
}

impl SessionReport {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.passed)
    }
}

pub struct Session<'a> {
    engine: &'a mut Engine,
    port: &'a HostPort,
    address: u8,
    max_ticks: u64,
    monitor: Arc<LinkMonitor>,
}

impl<'a> Session<'a> {
    pub fn new(engine: &'a mut Engine, port: &'a HostPort, script: &SessionScript) -> Self {
        let address = script
            .target_address
            .unwrap_or(engine.settings().device_address);
        let monitor = Arc::new(LinkMonitor::default());
        engine.observers.push(monitor.clone());
        Self {
            engine,
            port,
            address,
            max_ticks: script.max_ticks,
            monitor,
        }
    }

    fn tick(&mut self) -> Result<()> {
        if self.engine.timestamp() >= self.max_ticks {
            bail!("tick budget of {} exhausted", self.max_ticks);
        }
        self.engine.tick();
        Ok(())
    }

    fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    /// Pushes a frame onto the link and ticks until it has been consumed.
    fn deliver(&mut self, frame: &[u8]) -> Result<()> {
        self.port.send(frame);
        let mut spent = 0;
        while self.port.pending() > 0 {
            self.tick()?;
            spent += 1;
            if spent > STEP_TICK_LIMIT {
                bail!("link stalled with {} bytes pending", self.port.pending());
            }
        }
        Ok(())
    }

    fn write(&mut self, addr: u8, value: u64) -> Result<()> {
        self.deliver(&CommandPacket::write(self.address, addr, value).encode())?;
        // Let the write land before the next step observes it.
        self.run(3)
    }

    fn read(&mut self, addr: u8) -> Result<u64> {
        self.port.take_received();
        self.deliver(&CommandPacket::read(self.address, addr).encode())?;
        let mut spent = 0;
        while self.port.received_len() < RESPONSE_LEN {
            self.tick()?;
            spent += 1;
            if spent > STEP_TICK_LIMIT {
                bail!("no response to read of {:#04x} from {:#04x}", addr, self.address);
            }
        }
        self.run(2)?;
        let bytes = self.port.take_received();
        let mut frame = [0u8; RESPONSE_LEN];
        frame.copy_from_slice(&bytes[..RESPONSE_LEN]);
        let response = ResponsePacket::decode(&frame)
            .with_context(|| format!("bad response to read of {:#04x}", addr))?;
        Ok(response.payload)
    }

    fn execute(&mut self, index: usize, step: &SessionStep) -> Result<StepOutcome> {
        let outcome = |action: &str, passed: bool, value: Option<u64>, detail: String| StepOutcome {
            index,
            action: action.to_string(),
            passed,
            value,
            detail,
        };
        Ok(match step {
            SessionStep::Write(WriteStep { write }) => {
                self.write(write.addr, write.value)?;
                outcome(
                    "write",
                    true,
                    None,
                    format!("{:#04x} <- {:#018x}", write.addr, write.value),
                )
            }
            SessionStep::Read(ReadStep { read }) => {
                let value = self.read(read.addr)?;
                let mask = read.mask.unwrap_or(u64::MAX);
                match read.expect {
                    Some(expect) => {
                        let passed = value & mask == expect & mask;
                        let detail = if passed {
                            format!("{:#04x} == {:#018x}", read.addr, value)
                        } else {
                            format!(
                                "{:#04x} = {:#018x}, expected {:#018x} (mask {:#018x})",
                                read.addr, value, expect, mask
                            )
                        };
                        outcome("read", passed, Some(value), detail)
                    }
                    None => outcome(
                        "read",
                        true,
                        Some(value),
                        format!("{:#04x} = {:#018x}", read.addr, value),
                    ),
                }
            }
            SessionStep::Wait(WaitStep { wait_ticks }) => {
                self.run(*wait_ticks)?;
                outcome("wait", true, None, format!("{} ticks", wait_ticks))
            }
            SessionStep::SetGpio(GpioStep { set_gpio }) => {
                self.engine
                    .set_gpio(set_gpio.bank as usize, set_gpio.value)?;
                outcome(
                    "set_gpio",
                    true,
                    None,
                    format!("bank {} = {:#018x}", set_gpio.bank, set_gpio.value),
                )
            }
            SessionStep::SetInputs(InputStep { set_inputs }) => {
                let inputs = &mut self.engine.inputs;
                if let Some(t) = set_inputs.temperature {
                    inputs.temperature = t;
                }
                if let Some(c) = set_inputs.currents {
                    inputs.currents = c;
                }
                if let Some(v) = set_inputs.voltages {
                    inputs.voltages = v;
                }
                if let Some(s) = set_inputs.switch_readback {
                    inputs.switch_readback = s;
                }
                outcome("set_inputs", true, None, String::new())
            }
            SessionStep::WaitBoot(WaitBootStep { wait_boot }) => {
                // One tick so a pending trigger reaches the loader.
                self.tick()?;
                let started = self.engine.timestamp();
                while self.engine.wires().boot.busy {
                    if self.engine.timestamp() - started >= *wait_boot {
                        bail!("boot loader still busy after {} ticks", wait_boot);
                    }
                    self.tick()?;
                }
                let wires = self.engine.wires();
                let word = wires.boot.status_word(wires.lut.valid_mask());
                let detail = format!(
                    "done={} error_code={:#04x} valid={:#03b} after {} ticks",
                    wires.boot.done,
                    wires.boot.error_code as u8,
                    wires.lut.valid_mask(),
                    self.engine.timestamp() - started
                );
                outcome("wait_boot", true, Some(word), detail)
            }
        })
    }

    /// Runs every step. Assertion failures are recorded and the session continues;
    /// runtime failures abort it.
    pub fn run_script(&mut self, script: &SessionScript) -> Result<SessionReport> {
        info!(
            "Running {} step(s) against {:#04x}, budget {} ticks",
            script.steps.len(),
            self.address,
            self.max_ticks
        );
        let mut steps = Vec::with_capacity(script.steps.len());
        for (index, step) in script.steps.iter().enumerate() {
            let outcome = self
                .execute(index, step)
                .with_context(|| format!("step {} failed", index))?;
            debug!("{}", outcome);
            steps.push(outcome);
        }
        let mut report = SessionReport {
            result_schema_version: "1.0".to_string(),
            status: String::new(),
            ticks: self.engine.timestamp(),
            bytes_received: self.monitor.rx.load(Ordering::Relaxed),
            bytes_sent: self.monitor.tx.load(Ordering::Relaxed),
            steps,
        };
        report.status = if report.passed() { "pass" } else { "fail" }.to_string();
        Ok(report)
    }
}
