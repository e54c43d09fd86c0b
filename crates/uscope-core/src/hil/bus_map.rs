//! The HIL bus map: the deployed set of interconnect slots, with conflict
//! detection and output translation (spec.md §4.4).

use std::collections::HashSet;

use crate::error::{DriverError, DriverResult};
use crate::hil::spec::InterconnectSlot;

#[derive(Debug, Default)]
pub struct HilBusMap {
    slots: Vec<InterconnectSlot>,
}

impl HilBusMap {
    pub fn new() -> Self {
        HilBusMap::default()
    }

    pub fn push_back(&mut self, slot: InterconnectSlot) {
        self.slots.push(slot);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InterconnectSlot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_bus_address_free(&self, addr: u16) -> bool {
        !self.slots.iter().any(|s| s.destination_bus_address == addr)
    }

    pub fn is_io_address_free(&self, addr: u16, src_id: &str) -> bool {
        !self
            .slots
            .iter()
            .any(|s| s.source_id == src_id && s.source_io_address == addr)
    }

    /// Returns `original` if free, else the smallest natural number
    /// `>= slots.len()` whose destination slot is free.
    pub fn get_free_address(&self, original: u16) -> DriverResult<u16> {
        if self.is_bus_address_free(original) {
            return Ok(original);
        }
        let mut candidate = self.slots.len() as u32;
        while candidate <= 0xFFF {
            if self.is_bus_address_free(candidate as u16) {
                return Ok(candidate as u16);
            }
            candidate += 1;
        }
        Err(DriverError::DeploymentError(
            "no free HIL bus address available".into(),
        ))
    }

    /// Fails naming the first duplicate (destination_bus_address,
    /// destination_channel) pair found, before any bus writes occur (P2).
    pub fn check_conflicts(&self) -> DriverResult<()> {
        let mut seen = HashSet::new();
        for slot in &self.slots {
            let key = (slot.destination_bus_address, slot.destination_channel);
            if !seen.insert(key) {
                return Err(DriverError::HilBusConflict {
                    address: key.0,
                    channel: key.1,
                });
            }
        }
        Ok(())
    }

    /// Resolves a producer's output to its (bus_address, channel)
    /// destination.
    pub fn translate_output(
        &self,
        core: &str,
        source_output: &str,
        channel: u16,
    ) -> DriverResult<(u16, u16)> {
        self.slots
            .iter()
            .find(|s| s.source_id == core && s.source_name == source_output && s.source_channel == channel)
            .map(|s| (s.destination_bus_address, s.destination_channel))
            .ok_or_else(|| {
                DriverError::InvalidArg(format!(
                    "no interconnect slot for {core}.{source_output}[{channel}]"
                ))
            })
    }
}
