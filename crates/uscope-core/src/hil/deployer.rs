//! The deployer: binds an `EmulatorSpec` to the HIL fabric (spec.md §4.5).
//!
//! `deploy` performs the full programming sequence against a
//! [`FpgaBridge`] — ROM load, DMA mapping/metadata tables, memory and
//! input initialization, sequencer scheduling, and per-core channel
//! counts — then keeps enough bookkeeping around to service runtime
//! `set_input`/`select_output`/`start`/`stop` calls and the
//! hardware-simulation dump.

use std::collections::HashMap;

use crate::bridge::FpgaBridge;
use crate::bus::BusOp;
use crate::config::Config;
use crate::error::{DriverError, DriverResult};
use crate::hil::bus_map::HilBusMap;
use crate::hil::layout::LogicLayout;
use crate::hil::program::{scan_pipeline, schedule_channel_count};
use crate::hil::regs;
use crate::hil::schedule::{compute_schedule, timebase_frequency};
use crate::hil::spec::{
    CoreSpec, DeployedProgram, EmulatorSpec, InputLabel, InputSource, IoMetadata, WaveformShape,
};

/// Upper bound on cores in a single deploy; the sequencer's enable-mask
/// register is 32 bits wide, one bit per core.
pub const MAX_CORES: usize = 32;

fn encode_value_bits(metadata: &IoMetadata, value: f64) -> u32 {
    if metadata.is_float() {
        (value as f32).to_bits()
    } else {
        (value as i64) as u32
    }
}

fn shape_code(shape: WaveformShape) -> u32 {
    match shape {
        WaveformShape::Square => 0,
        WaveformShape::Sine => 1,
        WaveformShape::Triangle => 2,
    }
}

/// `core.name[ch]` labeling for scope outputs, `core.name` when the core
/// has a single channel (spec.md §6.3).
fn output_label(core: &str, name: &str, n_channels: u32, channel: u32) -> String {
    if n_channels <= 1 {
        format!("{core}.{name}")
    } else {
        format!("{core}.{name}[{channel}]")
    }
}

/// `core[ch].name` addressing for constant inputs, `core.name` for a
/// single-channel core (spec.md §6.3) — note the bracket sits on the
/// *core*, not the name, unlike [`output_label`].
fn input_path(core: &str, name: &str, n_channels: u32, channel: u32) -> String {
    if n_channels <= 1 {
        format!("{core}.{name}")
    } else {
        format!("{core}[{channel}].{name}")
    }
}

fn first_reg(reg: &[u32]) -> DriverResult<u32> {
    reg.first()
        .copied()
        .ok_or_else(|| DriverError::InvalidArg("input/memory spec has no reg entries".into()))
}

/// Runtime key for a single constant-input channel.
type InputKey = (String, String, u32);

/// Renders as the hardware-simulation dump (spec.md §6.3): four text
/// blobs built from a deploy's recorded bus operations plus the
/// deployer's own bookkeeping.
#[derive(Debug, Default, Clone)]
pub struct HardwareSimDump {
    pub code: String,
    pub control: String,
    pub outputs: String,
    pub inputs: String,
}

/// Stateful deploy engine: owns the bus map and the label tables needed
/// to service runtime operations after `deploy` returns.
#[derive(Default)]
pub struct Deployer {
    bus_map: HilBusMap,
    output_labels: Vec<((u16, u16), String)>,
    input_labels: Vec<(String, InputLabel)>,
    input_labels_by_key: HashMap<InputKey, InputLabel>,
    active_random_inputs: u32,
    active_constant_slots: u32,
    active_waveforms: u32,
    deployed_programs: Vec<DeployedProgram>,
}

impl Deployer {
    pub fn new() -> Self {
        Deployer::default()
    }

    pub fn deployed_programs(&self) -> &[DeployedProgram] {
        &self.deployed_programs
    }

    pub fn bus_map(&self) -> &HilBusMap {
        &self.bus_map
    }

    fn reset(&mut self) {
        self.bus_map.clear();
        self.output_labels.clear();
        self.input_labels.clear();
        self.input_labels_by_key.clear();
        self.active_random_inputs = 0;
        self.active_constant_slots = 0;
        self.active_waveforms = 0;
        self.deployed_programs.clear();
    }

    /// Binds `spec` to the fabric described by `layout`, in the 11-step
    /// order of spec.md §4.5: validate, load ROMs, compute the schedule,
    /// program DMA tables, initialize memories and inputs, program the
    /// sequencer, then enable each core's channel count.
    pub fn deploy(
        &mut self,
        bridge: &mut FpgaBridge,
        layout: &LogicLayout,
        config: &Config,
        spec: &EmulatorSpec,
    ) -> DriverResult<()> {
        self.reset();

        if spec.cores.len() > MAX_CORES {
            return Err(DriverError::DeploymentError(format!(
                "{} cores exceeds the {MAX_CORES}-core limit",
                spec.cores.len()
            )));
        }

        for slot in &spec.interconnect {
            if slot.source_io_address > 0xFFF
                || slot.destination_bus_address > 0xFFF
                || slot.source_channel > 0xF
                || slot.destination_channel > 0xF
            {
                return Err(DriverError::InvalidArg(
                    "interconnect slot address/channel out of range".into(),
                ));
            }
            self.bus_map.push_back(slot.clone());
        }
        self.bus_map.check_conflicts()?;

        let mut deployed = Vec::with_capacity(spec.cores.len());
        let mut schedule_inputs = Vec::with_capacity(spec.cores.len());
        for (index, core) in spec.cores.iter().enumerate() {
            let scan = scan_pipeline(&core.program.0);
            let sched_channels = schedule_channel_count(scan.has_reciprocal, config.full_cores_override);
            schedule_inputs.push((core.order, sched_channels, core.sampling_frequency));
            deployed.push(DeployedProgram {
                name: core.name.clone(),
                order: core.order,
                index: index as u32,
                program: core.program.clone(),
                sampling_frequency: core.sampling_frequency,
                n_channels: core.n_channels,
                schedule_channels: sched_channels,
            });
        }

        for p in &deployed {
            let rom_addr = layout.bases.cores_rom + p.index as u64 * layout.offsets.cores_rom;
            bridge.apply_program(rom_addr, &p.program.0)?;
        }

        let frequencies: Vec<u64> = spec.cores.iter().map(|c| c.sampling_frequency).collect();
        let timebase_freq = timebase_frequency(&frequencies);
        let (schedule_entries, min_timebase) = compute_schedule(&schedule_inputs, timebase_freq);

        for (p, core) in deployed.iter().zip(spec.cores.iter()) {
            let control_base = layout.bases.cores_control + p.index as u64 * layout.offsets.cores_control;
            let dma_base = control_base + layout.offsets.dma;
            let mut j = 0u32;
            for slot in self
                .bus_map
                .iter()
                .filter(|s| s.source_id == core.name)
            {
                let mapping = regs::encode_mapping_word(
                    slot.destination_channel,
                    slot.destination_bus_address,
                    slot.source_channel,
                    slot.source_io_address,
                );
                bridge
                    .bus_mut()
                    .write_register(&[dma_base + regs::dma::mapping_offset(j)], mapping)?;
                let metadata = regs::encode_output_metadata(
                    slot.metadata.width_bits,
                    slot.metadata.signed,
                    slot.metadata.is_float(),
                );
                bridge
                    .bus_mut()
                    .write_register(&[dma_base + regs::dma::metadata_offset(j)], metadata)?;
                self.output_labels.push((
                    (slot.destination_bus_address, slot.destination_channel),
                    output_label(&core.name, &slot.source_name, core.n_channels, slot.source_channel as u32),
                ));
                j += 1;
            }
            bridge
                .bus_mut()
                .write_register(&[dma_base + regs::dma::CHANNEL_COUNT], j)?;
        }

        for (p, core) in deployed.iter().zip(spec.cores.iter()) {
            let control_base = layout.bases.cores_control + p.index as u64 * layout.offsets.cores_control;
            for mem in &core.memories {
                let reg0 = first_reg(&mem.reg)?;
                if mem.initial_values.len() as u32 == core.n_channels {
                    for (ch, value) in mem.initial_values.iter().enumerate() {
                        let address = control_base + 4 * (reg0 as u64 | ((ch as u64) << 8));
                        let bits = encode_value_bits(&mem.metadata, *value);
                        bridge.bus_mut().write_register(&[address], bits)?;
                    }
                } else {
                    let address = control_base + 4 * reg0 as u64;
                    let value = mem.initial_values.first().copied().unwrap_or(0.0);
                    let bits = encode_value_bits(&mem.metadata, value);
                    bridge.bus_mut().write_register(&[address], bits)?;
                }
            }
        }

        for core in &spec.cores {
            for input in &core.inputs {
                self.deploy_input(bridge, layout, core, input)?;
            }
        }

        if self.active_random_inputs > 0 {
            bridge
                .bus_mut()
                .write_register(&[layout.bases.noise_generator], self.active_random_inputs)?;
        }

        for (i, entry) in schedule_entries.iter().enumerate() {
            let divider_addr = layout.bases.controller + layout.offsets.controller + 4 + 4 * i as u64;
            bridge
                .bus_mut()
                .write_register(&[divider_addr], (entry.divider.saturating_sub(1)) as u32)?;
            let shift_addr = layout.bases.controller + layout.offsets.hil_tb + 8 + 4 * i as u64;
            bridge.bus_mut().write_register(&[shift_addr], entry.shift as u32)?;
        }
        let period = if timebase_freq == 0 {
            min_timebase
        } else {
            config.hil_clock_frequency / timebase_freq
        };
        bridge
            .bus_mut()
            .write_register(&[layout.bases.controller + layout.offsets.hil_tb + 4], period as u32)?;

        let n = deployed.len() as u32;
        let enable_mask: u32 = if n == 0 {
            0
        } else if n >= 32 {
            u32::MAX
        } else {
            (1u32 << n) - 1
        };
        bridge
            .bus_mut()
            .write_register(&[layout.bases.controller + layout.offsets.controller], enable_mask)?;

        for p in &deployed {
            let control_base = layout.bases.cores_control + p.index as u64 * layout.offsets.cores_control;
            bridge
                .bus_mut()
                .write_register(&[control_base], p.schedule_channels)?;
        }

        self.deployed_programs = deployed;
        Ok(())
    }

    fn deploy_input(
        &mut self,
        bridge: &mut FpgaBridge,
        layout: &LogicLayout,
        core: &CoreSpec,
        input: &crate::hil::spec::InputSpec,
    ) -> DriverResult<()> {
        match &input.source {
            InputSource::Constant { values } | InputSource::External { values } => {
                let const_idx = self.active_constant_slots;
                self.active_constant_slots += 1;
                let reg0 = first_reg(&input.reg)?;
                for ch in 0..core.n_channels.max(1) {
                    let target_channel = if input.metadata.common_io { 0 } else { ch };
                    let destination = reg0 | (target_channel << 16);
                    let value = if values.len() == 1 {
                        values[0]
                    } else {
                        values.get(ch as usize).copied().unwrap_or(0.0)
                    };
                    let bits = encode_value_bits(&input.metadata, value);
                    let selector = const_idx | (ch << 16);

                    let base = layout.bases.cores_inputs;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::constant_engine::SELECTOR], selector)?;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::constant_engine::DEST], destination)?;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::constant_engine::LSB], bits)?;

                    let label = InputLabel {
                        peripheral: base,
                        destination,
                        selector,
                        core_idx: 0,
                    };
                    let path = input_path(&core.name, &input.name, core.n_channels, ch);
                    self.input_labels.push((path, label));
                    self.input_labels_by_key
                        .insert((core.name.clone(), input.name.clone(), ch), label);
                }
            }
            InputSource::Random => {
                let reg0 = first_reg(&input.reg)?;
                for ch in 0..core.n_channels.max(1) {
                    let slot = self.active_random_inputs + 1;
                    let value = reg0 | (ch << 16);
                    bridge
                        .bus_mut()
                        .write_register(&[layout.bases.noise_generator + slot as u64 * 4], value)?;
                    self.active_random_inputs += 1;
                }
            }
            InputSource::Waveform { shape, parameters } => {
                let reg0 = input.reg.first().copied().unwrap_or(0);
                for ch in 0..core.n_channels.max(1) {
                    let slot = self.active_waveforms;
                    self.active_waveforms += 1;
                    let pick = |values: &[f64]| -> f64 {
                        values
                            .get(ch as usize)
                            .or_else(|| values.first())
                            .copied()
                            .unwrap_or(0.0)
                    };
                    let v_on = (pick(&parameters.v_on) as f32).to_bits();
                    let v_off = (pick(&parameters.v_off) as f32).to_bits();
                    let t_delay = pick(&parameters.t_delay) as u32;
                    let t_on = pick(&parameters.t_on) as u32;
                    let period = pick(&parameters.period) as u32;
                    let destination = reg0 | (ch << 16);
                    let metadata = regs::encode_output_metadata(
                        input.metadata.width_bits,
                        input.metadata.signed,
                        input.metadata.is_float(),
                    );

                    let base = layout.bases.waveform_generator;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::waveform_gen::CHANNEL_SELECTOR], slot)?;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::waveform_gen::SHAPE_SELECTOR], shape_code(*shape))?;
                    bridge.bus_mut().write_register(&[base + regs::waveform_gen::V_ON], v_on)?;
                    bridge.bus_mut().write_register(&[base + regs::waveform_gen::V_OFF], v_off)?;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::waveform_gen::T_DELAY], t_delay)?;
                    bridge.bus_mut().write_register(&[base + regs::waveform_gen::T_ON], t_on)?;
                    bridge.bus_mut().write_register(&[base + regs::waveform_gen::PERIOD], period)?;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::waveform_gen::DEST_OUT], destination)?;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::waveform_gen::METADATA], metadata)?;
                    bridge
                        .bus_mut()
                        .write_register(&[base + regs::waveform_gen::ACTIVE_CHANNELS], self.active_waveforms)?;
                }
            }
        }
        Ok(())
    }

    /// Repeats the selector/dest/lsb write sequence for a single constant
    /// input channel that was already deployed, using the peripheral and
    /// selector recorded at deploy time.
    pub fn set_input(
        &self,
        bridge: &mut FpgaBridge,
        core: &str,
        name: &str,
        channel: u32,
        value: f64,
        metadata: &IoMetadata,
    ) -> DriverResult<()> {
        let key = (core.to_string(), name.to_string(), channel);
        let label = *self.input_labels_by_key.get(&key).ok_or_else(|| {
            DriverError::InvalidArg(format!("no deployed input {core}.{name}[{channel}]"))
        })?;
        let bits = encode_value_bits(metadata, value);
        bridge
            .bus_mut()
            .write_register(&[label.peripheral + regs::constant_engine::SELECTOR], label.selector)?;
        bridge
            .bus_mut()
            .write_register(&[label.peripheral + regs::constant_engine::DEST], label.destination)?;
        bridge
            .bus_mut()
            .write_register(&[label.peripheral + regs::constant_engine::LSB], bits)?;
        Ok(())
    }

    /// Routes a producer's output channel to a scope multiplexer slot.
    pub fn select_output(
        &self,
        bridge: &mut FpgaBridge,
        layout: &LogicLayout,
        scope_channel: u32,
        core: &str,
        output_name: &str,
        channel: u16,
    ) -> DriverResult<()> {
        let (bus_addr, _dest_channel) = self.bus_map.translate_output(core, output_name, channel)?;
        let value = bus_addr as u32 | ((channel as u32) << 16);
        let addr = layout.bases.scope_mux + 4 * (scope_channel as u64 + 1);
        bridge.bus_mut().write_register(&[addr], value)
    }

    pub fn start(&self, bridge: &mut FpgaBridge, layout: &LogicLayout) -> DriverResult<()> {
        bridge.bus_mut().write_register(&[layout.bases.hil_control], 1)
    }

    pub fn stop(&self, bridge: &mut FpgaBridge, layout: &LogicLayout) -> DriverResult<()> {
        bridge.bus_mut().write_register(&[layout.bases.hil_control], 0)
    }

    /// Deploys and starts `spec` against a throwaway recording bus, then
    /// renders the recorded operations into the hardware-simulation dump
    /// format of spec.md §6.3.
    pub fn get_hardware_sim_data(
        config: &Config,
        layout: &LogicLayout,
        spec: &EmulatorSpec,
    ) -> DriverResult<HardwareSimDump> {
        let mut deployer = Deployer::new();
        let mut bridge = FpgaBridge::new(Box::new(crate::bus::SinkBus::new()), config.clone());
        deployer.deploy(&mut bridge, layout, config, spec)?;
        deployer.start(&mut bridge, layout)?;

        let ops: Vec<BusOp> = bridge
            .bus_mut()
            .as_sink()
            .map(|sink| sink.ops().to_vec())
            .unwrap_or_default();

        let mut code_lines = Vec::new();
        let mut control_lines = Vec::new();
        for op in &ops {
            match op {
                BusOp::RomWrite { address, words } => {
                    for (i, word) in words.iter().enumerate() {
                        code_lines.push(format!("{}:{}", address + 4 * i as u64, word));
                    }
                }
                BusOp::ControlWrite { addresses, data } => match addresses.as_slice() {
                    [addr] => control_lines.push(format!("{addr}:{data}")),
                    [target, proxy_base] => {
                        control_lines.push(format!("{}:{}", proxy_base + 4, target));
                        control_lines.push(format!("{proxy_base}:{data}"));
                    }
                    _ => {}
                },
                BusOp::ControlRead { .. } => {}
            }
        }

        let outputs_lines: Vec<String> = deployer
            .output_labels
            .iter()
            .map(|((addr, ch), label)| format!("{}:{label}", *addr as u32 | ((*ch as u32) << 16)))
            .collect();

        let inputs_lines: Vec<String> = deployer
            .input_labels
            .iter()
            .map(|(path, label)| {
                format!(
                    "{path},{},{},{},{}",
                    label.peripheral, label.destination, label.selector, label.core_idx
                )
            })
            .collect();

        Ok(HardwareSimDump {
            code: code_lines.join("\n"),
            control: control_lines.join("\n"),
            outputs: outputs_lines.join("\n"),
            inputs: inputs_lines.join("\n"),
        })
    }
}
