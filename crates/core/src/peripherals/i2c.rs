// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{I2cController, I2cRequest, I2cStatus};

/// A target on the simulated bus. Returning `None`/`false` is a NACK.
pub trait I2cDevice: std::fmt::Debug + Send {
    fn read(&mut self, register: Option<u16>) -> Option<u8>;
    fn write(&mut self, register: Option<u16>, value: u8) -> bool;
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Word-level I2C master with a fixed per-transaction latency.
#[derive(Debug, serde::Serialize)]
pub struct SimI2cMaster {
    latency: u32,
    remaining: u32,
    active: Option<I2cRequest>,
    status: I2cStatus,
    #[serde(skip)]
    devices: Vec<(u8, Box<dyn I2cDevice>)>,
}

impl SimI2cMaster {
    pub fn new(latency: u32) -> Self {
        Self {
            latency: latency.max(1),
            remaining: 0,
            active: None,
            status: I2cStatus::default(),
            devices: Vec::new(),
        }
    }

    pub fn attach(&mut self, address: u8, device: Box<dyn I2cDevice>) {
        self.devices.retain(|(a, _)| *a != address);
        self.devices.push((address, device));
    }

    pub fn device_mut(&mut self, address: u8) -> Option<&mut Box<dyn I2cDevice>> {
        self.devices
            .iter_mut()
            .find(|(a, _)| *a == address)
            .map(|(_, d)| d)
    }

    fn complete(&mut self, req: I2cRequest) {
        let device = self
            .devices
            .iter_mut()
            .find(|(a, _)| *a == req.device)
            .map(|(_, d)| d);
        let (ack, data) = match device {
            None => (false, 0),
            Some(dev) if req.read => match dev.read(req.register) {
                Some(b) => (true, b),
                None => (false, 0),
            },
            Some(dev) => (dev.write(req.register, req.data), 0),
        };
        if !ack {
            tracing::debug!("I2C NACK from {:#04x}", req.device);
        }
        self.status.busy = false;
        self.status.done = true;
        self.status.ack_error = !ack;
        if req.read && ack {
            self.status.rx_data = data;
        }
        self.status.completions = self.status.completions.wrapping_add(1);
    }
}

impl I2cController for SimI2cMaster {
    fn start(&mut self, request: I2cRequest) {
        if self.status.busy {
            tracing::warn!("I2C start while busy ignored (device {:#04x})", request.device);
            return;
        }
        self.active = Some(request);
        self.remaining = self.latency;
        self.status.busy = true;
        self.status.done = false;
        self.status.ack_error = false;
    }

    fn status(&self) -> I2cStatus {
        self.status
    }

    fn tick(&mut self) {
        if !self.status.busy {
            return;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            if let Some(req) = self.active.take() {
                self.complete(req);
            }
        }
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            let devices: serde_json::Map<String, serde_json::Value> = self
                .devices
                .iter()
                .map(|(a, d)| (format!("{:#04x}", a), d.snapshot()))
                .collect();
            obj.insert("devices".to_string(), serde_json::Value::Object(devices));
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Scratch {
        reg: u8,
    }

    impl I2cDevice for Scratch {
        fn read(&mut self, _register: Option<u16>) -> Option<u8> {
            Some(self.reg)
        }
        fn write(&mut self, _register: Option<u16>, value: u8) -> bool {
            self.reg = value;
            true
        }
    }

    #[test]
    fn test_i2c_write_then_read() {
        let mut i2c = SimI2cMaster::new(2);
        i2c.attach(0x20, Box::new(Scratch::default()));
        i2c.start(I2cRequest {
            device: 0x20,
            register: None,
            read: false,
            data: 0x3C,
        });
        assert!(i2c.status().busy);
        i2c.tick();
        assert!(i2c.status().busy);
        i2c.tick();
        let s = i2c.status();
        assert!(!s.busy && s.done && !s.ack_error);
        assert_eq!(s.completions, 1);

        i2c.start(I2cRequest {
            device: 0x20,
            register: None,
            read: true,
            data: 0,
        });
        assert!(!i2c.status().done);
        i2c.tick();
        i2c.tick();
        assert_eq!(i2c.status().rx_data, 0x3C);
    }

    #[test]
    fn test_i2c_nack_for_missing_device() {
        let mut i2c = SimI2cMaster::new(1);
        i2c.start(I2cRequest {
            device: 0x11,
            ..Default::default()
        });
        i2c.tick();
        let s = i2c.status();
        assert!(s.done && s.ack_error);
    }
}
