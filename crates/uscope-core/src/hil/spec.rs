//! The data model of spec.md §3: an `EmulatorSpec` and everything it is
//! built from, deserialized from the wire JSON command envelope.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorSpec {
    pub version: String,
    pub cores: Vec<CoreSpec>,
    #[serde(default)]
    pub interconnect: Vec<InterconnectSlot>,
    pub emulation_time: f64,
    /// true: bind to hardware via the deployer; false: run on the
    /// software emulator.
    pub deploy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreOptions {
    pub comparator_policy: String,
    pub efi_impl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program(pub Vec<u32>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoKind {
    Integer,
    Float,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IoMetadata {
    pub kind: IoKind,
    pub width_bits: u8,
    pub signed: bool,
    /// When true, the same IO register is shared across all channels.
    pub common_io: bool,
}

impl IoMetadata {
    pub fn is_float(&self) -> bool {
        matches!(self.kind, IoKind::Float)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformShape {
    Square,
    Sine,
    Triangle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaveformParameters {
    #[serde(default)]
    pub v_on: Vec<f64>,
    #[serde(default)]
    pub v_off: Vec<f64>,
    #[serde(default)]
    pub period: Vec<f64>,
    #[serde(default)]
    pub t_delay: Vec<f64>,
    #[serde(default)]
    pub t_on: Vec<f64>,
    #[serde(default)]
    pub phase: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    Constant { values: Vec<f64> },
    External { values: Vec<f64> },
    Random,
    Waveform {
        shape: WaveformShape,
        parameters: WaveformParameters,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub metadata: IoMetadata,
    pub source: InputSource,
    /// Per-core register offsets assigned by the external compiler.
    pub reg: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub metadata: IoMetadata,
    pub vector_size: Option<u32>,
    pub reg: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryInitSpec {
    pub name: String,
    pub metadata: IoMetadata,
    pub is_output: bool,
    pub is_input: bool,
    pub initial_values: Vec<f64>,
    pub reg: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreSpec {
    pub name: String,
    pub order: u32,
    /// Hz; 0 means "as fast as the pipeline allows".
    pub sampling_frequency: u64,
    /// N: SIMD-style channel replication count.
    pub n_channels: u32,
    pub options: CoreOptions,
    pub program: Program,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub memories: Vec<MemoryInitSpec>,
}

/// An interconnect slot, already resolved to concrete bus addresses (the
/// external compiler is responsible for address assignment upstream of
/// the driver; the deployer's job is conflict detection and programming,
/// per spec.md §4.4/§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterconnectSlot {
    pub source_id: String,
    pub source_name: String,
    pub source_io_address: u16,
    pub source_channel: u16,
    pub destination_bus_address: u16,
    pub destination_channel: u16,
    pub metadata: IoMetadata,
}

/// A program bound to a deployment-time slot, built by the deployer from
/// a `CoreSpec` in spec order.
#[derive(Debug, Clone)]
pub struct DeployedProgram {
    pub name: String,
    pub order: u32,
    pub index: u32,
    pub program: Program,
    pub sampling_frequency: u64,
    /// SIMD-style channel replication count, from `CoreSpec::n_channels`.
    pub n_channels: u32,
    /// 8 or 11, from the pipeline reciprocal scan; this is what actually
    /// gets written to the per-core channel-count register (spec.md S1).
    pub schedule_channels: u32,
}

/// The `tb_input_addresses_t` shape from `original_source`, kept as the
/// value recorded in `inputs_labels` for the hardware-simulation dump.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InputLabel {
    pub peripheral: u64,
    pub destination: u32,
    pub selector: u32,
    pub core_idx: u32,
}
