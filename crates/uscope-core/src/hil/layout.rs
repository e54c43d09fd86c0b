//! The layout map (spec.md §6.2): bases and offsets supplied by the
//! control application ahead of a deploy.

use serde::{Deserialize, Serialize};

use crate::error::DriverResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicBases {
    pub cores_rom: u64,
    pub cores_control: u64,
    pub cores_inputs: u64,
    pub controller: u64,
    pub scope_mux: u64,
    pub hil_control: u64,
    pub noise_generator: u64,
    pub waveform_generator: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicOffsets {
    pub cores_rom: u64,
    pub cores_control: u64,
    pub cores_inputs: u64,
    pub controller: u64,
    pub dma: u64,
    pub hil_tb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicLayout {
    pub bases: LogicBases,
    pub offsets: LogicOffsets,
}

impl LogicLayout {
    pub fn parse(value: &serde_json::Value) -> DriverResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn dump(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("LogicLayout is always serializable")
    }
}
