//! Trigger and acquisition-mode register programming.

use crate::bus::BusAccessor;
use crate::error::DriverResult;

/// Register offsets relative to the scope's base address. Only the
/// offsets actually exercised by `set_acquisition`/`get_acquisition_status`
/// are kept — the original address-map struct carried a second, unused
/// copy of `trg_rearm_status` that this layout deliberately drops.
#[derive(Debug, Clone, Copy)]
pub struct ScopeRegisterLayout {
    pub base: u64,
}

impl ScopeRegisterLayout {
    pub fn new(base: u64) -> Self {
        ScopeRegisterLayout { base }
    }

    pub fn trigger_mode(&self) -> u64 {
        self.base
    }
    pub fn trigger_source(&self) -> u64 {
        self.base + 0x04
    }
    pub fn trigger_level(&self) -> u64 {
        self.base + 0x08
    }
    pub fn acquisition_mode(&self) -> u64 {
        self.base + 0x0C
    }
    pub fn trigger_point(&self) -> u64 {
        self.base + 0x10
    }
    pub fn trg_rearm_status(&self) -> u64 {
        self.base + 0x14
    }
    pub fn timebase_enable(&self) -> u64 {
        self.base + 0x18
    }
    pub fn timebase_period(&self) -> u64 {
        self.base + 0x1C
    }
    pub fn threshold(&self) -> u64 {
        self.base + 0x20
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    Continuous,
    Single,
    FreeRunning,
}

impl AcquisitionMode {
    fn as_u32(self) -> u32 {
        match self {
            AcquisitionMode::Continuous => 0,
            AcquisitionMode::Single => 1,
            AcquisitionMode::FreeRunning => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    RisingEdge,
    FallingEdge,
    Both,
}

impl TriggerMode {
    fn as_u32(self) -> u32 {
        match self {
            TriggerMode::RisingEdge => 0,
            TriggerMode::FallingEdge => 1,
            TriggerMode::Both => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerLevelType {
    Raw,
    Float,
}

#[derive(Debug, Clone, Copy)]
pub struct AcquisitionConfig {
    pub mode: AcquisitionMode,
    pub trigger_mode: TriggerMode,
    /// 1-based channel, per spec.md §3; written 0-based to hardware.
    pub trigger_source: u32,
    pub trigger_level: f32,
    pub trigger_level_type: TriggerLevelType,
    pub trigger_point: u32,
    /// Scope timebase divider; the timebase is only enabled when this
    /// exceeds 2.
    pub prescaler: u32,
}

/// 0..3 status values, reproduced verbatim: their precise meaning belongs
/// to the hardware spec, not re-derived here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AcquisitionStatus {
    Wait,
    Run,
    Stop,
    FreeRun,
}

impl AcquisitionStatus {
    pub fn from_register_value(v: u32) -> Option<Self> {
        match v {
            0 => Some(AcquisitionStatus::Wait),
            1 => Some(AcquisitionStatus::Run),
            2 => Some(AcquisitionStatus::Stop),
            3 => Some(AcquisitionStatus::FreeRun),
            _ => None,
        }
    }
}

pub fn set_acquisition(
    bus: &mut dyn BusAccessor,
    layout: &ScopeRegisterLayout,
    config: &AcquisitionConfig,
) -> DriverResult<()> {
    bus.write_register(&[layout.trigger_mode()], config.trigger_mode.as_u32())?;
    bus.write_register(&[layout.trigger_source()], config.trigger_source.saturating_sub(1))?;

    let level_bits = match config.trigger_level_type {
        TriggerLevelType::Float => config.trigger_level.to_bits(),
        TriggerLevelType::Raw => config.trigger_level as i32 as u32,
    };
    bus.write_register(&[layout.trigger_level()], level_bits)?;

    bus.write_register(&[layout.acquisition_mode()], config.mode.as_u32())?;
    bus.write_register(&[layout.trigger_point()], config.trigger_point)?;

    if config.prescaler > 2 {
        bus.write_register(&[layout.timebase_enable()], 1)?;
        bus.write_register(&[layout.timebase_period()], config.prescaler)?;
        bus.write_register(&[layout.threshold()], 1)?;
    }

    Ok(())
}

pub fn get_acquisition_status(
    bus: &mut dyn BusAccessor,
    layout: &ScopeRegisterLayout,
) -> DriverResult<Option<AcquisitionStatus>> {
    let raw = bus.read_register(&[layout.trg_rearm_status()])?;
    Ok(AcquisitionStatus::from_register_value(raw))
}
