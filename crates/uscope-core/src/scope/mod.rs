//! Scope manager: DMA demux into per-channel sample vectors, plus
//! acquisition/trigger programming.

pub mod acquisition;
pub mod decode;

use std::fs::File;
use std::io::Read;

pub use acquisition::{
    AcquisitionConfig, AcquisitionMode, AcquisitionStatus, ScopeRegisterLayout, TriggerLevelType,
    TriggerMode,
};

use crate::bus::BusAccessor;
use crate::config::Config;
use crate::error::{DriverError, DriverResult};

pub const N_CHANNELS: usize = 6;
pub const SAMPLES_PER_BLOCK: usize = 1024;
const BLOCK_WORDS: usize = N_CHANNELS * SAMPLES_PER_BLOCK;

/// Owns the scope's DMA ring (6 channels × 1024 samples/block) and the
/// per-channel scaling/status configuration applied to each decoded
/// sample.
pub struct ScopeManager {
    device: Option<File>,
    scaling_factors: [f32; N_CHANNELS],
    channel_status: [bool; N_CHANNELS],
    layout: ScopeRegisterLayout,
    dma_enabled: bool,
}

impl ScopeManager {
    pub fn open(config: &Config, register_base: u64) -> DriverResult<Self> {
        let device = File::open(&config.scope_device).map_err(|e| {
            DriverError::DriverFileNotFound(format!("{}: {e}", config.scope_device.display()))
        })?;
        Ok(ScopeManager {
            device: Some(device),
            scaling_factors: [1.0; N_CHANNELS],
            channel_status: [true; N_CHANNELS],
            layout: ScopeRegisterLayout::new(register_base),
            dma_enabled: true,
        })
    }

    /// Constructs a manager with no backing device, for use against a
    /// recording bus accessor in tests.
    pub fn without_device(register_base: u64) -> Self {
        ScopeManager {
            device: None,
            scaling_factors: [1.0; N_CHANNELS],
            channel_status: [true; N_CHANNELS],
            layout: ScopeRegisterLayout::new(register_base),
            dma_enabled: true,
        }
    }

    pub fn layout(&self) -> &ScopeRegisterLayout {
        &self.layout
    }

    pub fn set_scaling_factors(&mut self, factors: [f32; N_CHANNELS]) {
        self.scaling_factors = factors;
    }

    pub fn set_channel_status(&mut self, map: [bool; N_CHANNELS]) {
        self.channel_status = map;
    }

    /// Blocking read of one DMA block, demultiplexed into one vector per
    /// channel. Samples whose channel index falls outside `0..6` are
    /// dropped, matching the original driver's out-of-range guard.
    pub fn read_data(&mut self) -> DriverResult<[Vec<f32>; N_CHANNELS]> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| DriverError::InternalError("scope device not open".into()))?;

        let mut buf = vec![0u8; BLOCK_WORDS * 8];
        device
            .read_exact(&mut buf)
            .map_err(|e| DriverError::DriverWriteFailed(format!("scope read failed: {e}")))?;

        let mut channels: [Vec<f32>; N_CHANNELS] = Default::default();
        for chunk in buf.chunks_exact(8) {
            let word = u64::from_le_bytes(chunk.try_into().unwrap());
            let channel = decode::get_channel(word) as usize;
            if channel >= N_CHANNELS || !self.channel_status[channel] {
                continue;
            }
            let sample = decode::decode_sample(word, self.scaling_factors[channel]);
            channels[channel].push(sample.value);
        }
        Ok(channels)
    }

    pub fn set_scope_address(
        &mut self,
        bus: &mut dyn BusAccessor,
        enable_addr: u64,
        buffer_addr: u64,
        physical_dma_addr: u32,
    ) -> DriverResult<()> {
        bus.write_register(&[buffer_addr], physical_dma_addr)?;
        bus.write_register(&[enable_addr], 1)?;
        self.dma_enabled = true;
        Ok(())
    }

    pub fn disable_dma(&mut self, bus: &mut dyn BusAccessor, enable_addr: u64) -> DriverResult<()> {
        bus.write_register(&[enable_addr], 0)?;
        self.dma_enabled = false;
        Ok(())
    }

    pub fn dma_enabled(&self) -> bool {
        self.dma_enabled
    }

    pub fn set_acquisition(
        &self,
        bus: &mut dyn BusAccessor,
        config: &AcquisitionConfig,
    ) -> DriverResult<()> {
        acquisition::set_acquisition(bus, &self.layout, config)
    }

    pub fn get_acquisition_status(
        &self,
        bus: &mut dyn BusAccessor,
    ) -> DriverResult<Option<AcquisitionStatus>> {
        acquisition::get_acquisition_status(bus, &self.layout)
    }
}
