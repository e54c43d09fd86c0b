//! PS↔PL clock management (spec.md §4.8).

use std::collections::HashMap;

use log::warn;

use crate::bridge::FpgaBridge;
use crate::error::{DriverError, DriverResult};

const N_BASE_CLOCKS: usize = 4;

/// A generated (derived) clock's definition, as given at
/// `add_generated_clock` time.
#[derive(Debug, Clone, Copy)]
pub struct GeneratedClockDefinition {
    pub multiplier: u32,
    pub divider: u32,
    pub base_clock: usize,
    pub generator_base_address: u64,
    pub multiplier_present: bool,
    pub phase: u32,
}

/// Holds the four PS↔PL base clocks (cached at construction) and every
/// generated clock derived from them.
pub struct TimingManager {
    base_clocks: [u64; N_BASE_CLOCKS],
    generated: HashMap<String, GeneratedClockDefinition>,
}

impl TimingManager {
    pub fn new(base_clocks: [u64; N_BASE_CLOCKS]) -> Self {
        TimingManager {
            base_clocks,
            generated: HashMap::new(),
        }
    }

    pub fn get_base_clock(&self, n: usize) -> DriverResult<u64> {
        self.base_clocks
            .get(n)
            .copied()
            .ok_or_else(|| DriverError::InvalidArg(format!("no base clock {n}")))
    }

    pub fn set_base_clock(&mut self, n: usize, hz: u64) -> DriverResult<()> {
        let slot = self
            .base_clocks
            .get_mut(n)
            .ok_or_else(|| DriverError::InvalidArg(format!("no base clock {n}")))?;
        *slot = hz;
        Ok(())
    }

    pub fn add_generated_clock(&mut self, name: &str, definition: GeneratedClockDefinition) -> DriverResult<()> {
        if definition.base_clock >= N_BASE_CLOCKS {
            return Err(DriverError::InvalidArg(format!(
                "generated clock {name} references unknown base clock {}",
                definition.base_clock
            )));
        }
        self.generated.insert(name.to_string(), definition);
        Ok(())
    }

    /// For PLL-backed clocks (`multiplier_present`), programming the PLL
    /// is not implemented at the hardware level (spec.md §4.8 allows
    /// returning ok); for divider-backed clocks, writes `d` at `base+4`
    /// and `p` at `base+8`.
    pub fn set_generated_clock(
        &mut self,
        bridge: &mut FpgaBridge,
        name: &str,
        multiplier: u32,
        divider: u32,
        phase: u32,
    ) -> DriverResult<()> {
        let def = self
            .generated
            .get_mut(name)
            .ok_or_else(|| DriverError::InvalidArg(format!("no generated clock named {name}")))?;
        def.multiplier = multiplier;
        def.divider = divider;
        def.phase = phase;

        if def.multiplier_present {
            warn!("set_generated_clock({name}): PLL programming not implemented at the hardware level");
            return Ok(());
        }

        bridge
            .bus_mut()
            .write_register(&[def.generator_base_address + 4], divider)?;
        bridge
            .bus_mut()
            .write_register(&[def.generator_base_address + 8], phase)
    }

    pub fn get_generated_clock(&self, name: &str) -> DriverResult<u64> {
        let def = self
            .generated
            .get(name)
            .ok_or_else(|| DriverError::InvalidArg(format!("no generated clock named {name}")))?;
        let base = self.base_clocks[def.base_clock];
        Ok(base * def.multiplier as u64 / def.divider.max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::FpgaBridge;
    use crate::bus::{BusOp, SinkBus};
    use crate::config::Config;

    fn bridge() -> FpgaBridge {
        FpgaBridge::new(Box::new(SinkBus::new()), Config::default())
    }

    #[test]
    fn get_base_clock_returns_constructed_values() {
        let tm = TimingManager::new([1, 2, 3, 4]);
        assert_eq!(tm.get_base_clock(2).unwrap(), 3);
        assert!(tm.get_base_clock(4).is_err());
    }

    #[test]
    fn generated_clock_frequency_is_base_times_multiplier_over_divider() {
        let mut tm = TimingManager::new([100_000_000, 0, 0, 0]);
        tm.add_generated_clock(
            "pl0",
            GeneratedClockDefinition {
                multiplier: 1,
                divider: 4,
                base_clock: 0,
                generator_base_address: 0x1000,
                multiplier_present: false,
                phase: 0,
            },
        )
        .unwrap();
        assert_eq!(tm.get_generated_clock("pl0").unwrap(), 25_000_000);
    }

    #[test]
    fn divider_backed_clock_writes_divider_and_phase() {
        let mut tm = TimingManager::new([100_000_000, 0, 0, 0]);
        tm.add_generated_clock(
            "pl0",
            GeneratedClockDefinition {
                multiplier: 1,
                divider: 1,
                base_clock: 0,
                generator_base_address: 0x1000,
                multiplier_present: false,
                phase: 0,
            },
        )
        .unwrap();
        let mut b = bridge();
        tm.set_generated_clock(&mut b, "pl0", 1, 8, 3).unwrap();

        let ops = b.bus_mut().as_sink().unwrap().ops().to_vec();
        assert!(ops.iter().any(|op| matches!(op, BusOp::ControlWrite { addresses, data } if addresses == &[0x1004] && *data == 8)));
        assert!(ops.iter().any(|op| matches!(op, BusOp::ControlWrite { addresses, data } if addresses == &[0x1008] && *data == 3)));
    }

    #[test]
    fn pll_backed_clock_is_a_logged_no_op() {
        let mut tm = TimingManager::new([100_000_000, 0, 0, 0]);
        tm.add_generated_clock(
            "pll0",
            GeneratedClockDefinition {
                multiplier: 2,
                divider: 1,
                base_clock: 0,
                generator_base_address: 0x2000,
                multiplier_present: true,
                phase: 0,
            },
        )
        .unwrap();
        let mut b = bridge();
        tm.set_generated_clock(&mut b, "pll0", 3, 1, 0).unwrap();
        assert!(b.bus_mut().as_sink().unwrap().ops().is_empty());
    }
}
