//! Recording bus back-end: accumulates [`BusOp`]s without touching hardware.
//!
//! Used for tests and to produce the hardware-simulation dump (spec §6.3):
//! a deploy run against a `SinkBus` yields exactly the operation sequence
//! that would have hit silicon, in order.

use super::BusOp;
use crate::error::DriverResult;

/// An accessor that never performs MMIO; it only remembers what it was
/// asked to do.
#[derive(Debug, Default)]
pub struct SinkBus {
    ops: Vec<BusOp>,
    enabled: bool,
}

/// Placeholder word returned by a recording `read_register`: arbitrary but
/// fixed, so tests asserting on it stay deterministic.
const SINK_READ_PLACEHOLDER: u32 = 0xa5a5_a5a5;

impl SinkBus {
    pub fn new() -> Self {
        SinkBus {
            ops: Vec::new(),
            enabled: true,
        }
    }

    pub fn ops(&self) -> &[BusOp] {
        &self.ops
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Disables recording passthrough and clears any already-recorded
    /// operations, mirroring `FpgaBridge::disable_bus_access` in sink mode.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.ops.clear();
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }
}

impl super::BusAccessor for SinkBus {
    fn write_register(&mut self, addresses: &[u64], data: u32) -> DriverResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.ops.push(BusOp::ControlWrite {
            addresses: addresses.to_vec(),
            data,
        });
        Ok(())
    }

    fn read_register(&mut self, addresses: &[u64]) -> DriverResult<u32> {
        if self.enabled {
            self.ops.push(BusOp::ControlRead {
                addresses: addresses.to_vec(),
            });
        }
        Ok(SINK_READ_PLACEHOLDER)
    }

    fn load_program(&mut self, address: u64, words: &[u32]) -> DriverResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.ops.push(BusOp::RomWrite {
            address,
            words: words.to_vec(),
        });
        Ok(())
    }

    fn disable_recording(&mut self) {
        self.disable();
    }

    fn enable_recording(&mut self) {
        self.enable();
    }

    fn as_sink(&self) -> Option<&SinkBus> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusAccessor;

    #[test]
    fn rom_write_records_words_in_order() {
        let mut bus = SinkBus::new();
        bus.load_program(0x1000, &[1, 2, 3]).unwrap();
        assert_eq!(
            bus.ops(),
            &[BusOp::RomWrite {
                address: 0x1000,
                words: vec![1, 2, 3]
            }]
        );
    }

    #[test]
    fn disable_clears_and_suppresses_recording() {
        let mut bus = SinkBus::new();
        bus.write_register(&[0x10], 1).unwrap();
        bus.disable();
        assert!(bus.ops().is_empty());
        bus.write_register(&[0x10], 2).unwrap();
        assert!(bus.ops().is_empty());
        bus.enable();
        bus.write_register(&[0x10], 3).unwrap();
        assert_eq!(bus.ops().len(), 1);
    }

    #[test]
    fn read_register_returns_placeholder_without_hardware() {
        let mut bus = SinkBus::new();
        let v = bus.read_register(&[0x10]).unwrap();
        assert_eq!(v, SINK_READ_PLACEHOLDER);
    }
}
