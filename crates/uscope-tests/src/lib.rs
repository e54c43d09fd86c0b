//! End-to-end property and scenario tests for the HIL driver.
//!
//! These exercise the public `Dispatcher`/`Deployer` surface the way a
//! control application would, as opposed to the per-module unit tests
//! scattered through `uscope-core`. Fixture builders live here so the
//! test module below can stay focused on assertions.

use uscope_core::bus::{BusOp, SinkBus};
use uscope_core::config::Config;
use uscope_core::hil::spec::{CoreOptions, CoreSpec, IoKind, IoMetadata, Program};
use uscope_core::hil::{LogicBases, LogicLayout, LogicOffsets};
use uscope_core::scope::ScopeManager;
use uscope_core::timing::TimingManager;
use uscope_core::{Dispatcher, FpgaBridge};

/// A layout map with distinct, easily-recognizable base addresses —
/// mirrors the fixture `uscope-core`'s own deployer tests use.
pub fn test_layout() -> LogicLayout {
    LogicLayout {
        bases: LogicBases {
            cores_rom: 0x1000,
            cores_control: 0x2000,
            cores_inputs: 0x3000,
            controller: 0x4000,
            scope_mux: 0x5000,
            hil_control: 0x6000,
            noise_generator: 0x7000,
            waveform_generator: 0x8000,
        },
        offsets: LogicOffsets {
            cores_rom: 0x100,
            cores_control: 0x200,
            cores_inputs: 0x300,
            controller: 0x40,
            dma: 0x80,
            hil_tb: 0x40,
        },
    }
}

/// A `Dispatcher` wired to a recording bus and a layout already configured,
/// so tests can go straight to `deploy_hil`/`hil_set_in`/etc.
pub fn test_dispatcher() -> Dispatcher {
    let bridge = FpgaBridge::new(Box::new(SinkBus::new()), Config::default());
    let scope = ScopeManager::without_device(0x9000);
    let timing = TimingManager::new([Config::default().hil_clock_frequency, 0, 0, 0]);
    let mut d = Dispatcher::new(bridge, scope, timing);
    d.layout = Some(test_layout());
    d
}

pub fn float_metadata() -> IoMetadata {
    IoMetadata {
        kind: IoKind::Float,
        width_bits: 32,
        signed: true,
        common_io: false,
    }
}

pub fn integer_metadata(width_bits: u8, signed: bool) -> IoMetadata {
    IoMetadata {
        kind: IoKind::Integer,
        width_bits,
        signed,
        common_io: false,
    }
}

fn default_options() -> CoreOptions {
    CoreOptions {
        comparator_policy: "default".into(),
        efi_impl: "default".into(),
    }
}

/// A single-channel core whose program is just the stop sentinel twice
/// over (no reciprocal opcode, so it schedules with the 8-channel base).
pub fn minimal_core(name: &str, order: u32) -> CoreSpec {
    CoreSpec {
        name: name.into(),
        order,
        sampling_frequency: 0,
        n_channels: 1,
        options: default_options(),
        program: Program(vec![0xC, 0xC, 0, 0]),
        inputs: vec![],
        outputs: vec![],
        memories: vec![],
    }
}

/// Extracts the recorded bus ops from a `Dispatcher`'s bridge, for tests
/// that want to inspect what a `deploy_hil` call actually wrote.
pub fn recorded_ops(d: &mut Dispatcher) -> Vec<BusOp> {
    d.bridge.bus_mut().as_sink().map(|s| s.ops().to_vec()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uscope_core::error::ResponseCode;
    use uscope_core::hil::deployer::MAX_CORES;
    use uscope_core::hil::regs;
    use uscope_core::hil::schedule::{program_length, INTER_CORE_BUFFER_TICKS};
    use uscope_core::hil::spec::{InputSource, InputSpec, InterconnectSlot, MemoryInitSpec, OutputSpec};

    fn dispatch(d: &mut Dispatcher, cmd: &str, args: serde_json::Value) -> serde_json::Value {
        let envelope = uscope_core::CommandEnvelope { cmd: cmd.into(), args };
        let resp = d.dispatch(&envelope);
        assert_eq!(
            resp.body.response_code,
            ResponseCode::Ok.as_i32(),
            "{cmd} failed: {:?}",
            resp.body.data
        );
        resp.body.data.unwrap_or(serde_json::Value::Null)
    }

    // ---- P1: ROM write is the first recorded op, at bases.cores_rom + i*offsets.cores_rom ----

    #[test]
    fn p1_rom_write_lands_at_core_index_offset_and_matches_program() {
        let mut d = test_dispatcher();
        let mut core0 = minimal_core("core0", 0);
        core0.program = Program(vec![0x1, 0x2, 0x3, 0xC, 0xC]);
        let mut core1 = minimal_core("core1", 1);
        core1.program = Program(vec![0x4, 0x5, 0xC, 0xC]);
        let spec = json!({
            "version": "1",
            "cores": [core0, core1],
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });
        dispatch(&mut d, "deploy_hil", spec);

        let ops = recorded_ops(&mut d);
        let layout = test_layout();
        let rom0 = ops.iter().find_map(|op| match op {
            BusOp::RomWrite { address, words } if *address == layout.bases.cores_rom => Some(words.clone()),
            _ => None,
        });
        let rom1 = ops.iter().find_map(|op| match op {
            BusOp::RomWrite { address, words } if *address == layout.bases.cores_rom + layout.offsets.cores_rom => {
                Some(words.clone())
            }
            _ => None,
        });
        assert_eq!(rom0, Some(vec![0x1, 0x2, 0x3, 0xC, 0xC]));
        assert_eq!(rom1, Some(vec![0x4, 0x5, 0xC, 0xC]));

        // The very first recorded operation is a ROM write, ahead of any
        // DMA/memory/input/scheduler register traffic.
        assert!(matches!(ops.first(), Some(BusOp::RomWrite { .. })));
    }

    // ---- P2: interconnect slot conflicts are reported before any bus writes ----

    #[test]
    fn p2_conflicting_interconnect_is_reported_and_writes_nothing() {
        let mut d = test_dispatcher();
        let slot = InterconnectSlot {
            source_id: "core0".into(),
            source_name: "out".into(),
            source_io_address: 0,
            source_channel: 0,
            destination_bus_address: 7,
            destination_channel: 0,
            metadata: float_metadata(),
        };
        let mut core0 = minimal_core("core0", 0);
        core0.outputs.push(OutputSpec {
            name: "out".into(),
            metadata: float_metadata(),
            vector_size: None,
            reg: vec![0],
        });
        let spec = json!({
            "version": "1",
            "cores": [core0],
            "interconnect": [slot.clone(), slot],
            "emulation_time": 1.0,
            "deploy": true,
        });

        let envelope = uscope_core::CommandEnvelope {
            cmd: "deploy_hil".into(),
            args: spec,
        };
        let resp = d.dispatch(&envelope);
        assert_eq!(resp.body.response_code, ResponseCode::HilBusConflictWarning.as_i32());
        assert!(recorded_ops(&mut d).is_empty(), "conflict must be caught before any bus write");
    }

    // ---- P3: a constant input writes selector, dest, lsb contiguously ----

    #[test]
    fn p3_constant_input_writes_selector_dest_lsb_in_order() {
        let mut d = test_dispatcher();
        let mut core0 = minimal_core("core0", 0);
        core0.inputs.push(InputSpec {
            name: "in0".into(),
            metadata: float_metadata(),
            source: InputSource::Constant { values: vec![31.2] },
            reg: vec![2],
        });
        let spec = json!({
            "version": "1",
            "cores": [core0],
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });
        dispatch(&mut d, "deploy_hil", spec);

        let ops = recorded_ops(&mut d);
        let base = test_layout().bases.cores_inputs;
        let window = ops
            .windows(3)
            .find(|w| {
                matches!(&w[0], BusOp::ControlWrite { addresses, .. } if addresses == &[base + regs::constant_engine::SELECTOR])
                    && matches!(&w[1], BusOp::ControlWrite { addresses, .. } if addresses == &[base + regs::constant_engine::DEST])
                    && matches!(&w[2], BusOp::ControlWrite { addresses, .. } if addresses == &[base + regs::constant_engine::LSB])
            });
        assert!(window.is_some(), "expected a contiguous selector,dest,lsb write triple");
        if let Some([_, _, BusOp::ControlWrite { data, .. }]) = window {
            assert_eq!(*data, 31.2f32.to_bits());
        }
    }

    // ---- P5: output DMA metadata word formula, float forces canonical 32-bit signed ----

    #[test]
    fn p5_output_metadata_word_matches_formula() {
        assert_eq!(regs::encode_output_metadata(16, false, false), 0x08);
        assert_eq!(regs::encode_output_metadata(16, true, false), 0x18);
        // float forces size=32, signed=true regardless of the inputs given.
        assert_eq!(regs::encode_output_metadata(8, false, true), regs::encode_output_metadata(32, true, true));
        assert_eq!(regs::encode_output_metadata(8, false, true), 0x18 | 0x20);
    }

    // ---- P6: sequencer enable bitmask is (1 << n) - 1 ----

    #[test]
    fn p6_enable_mask_is_low_n_bits() {
        let mut d = test_dispatcher();
        let cores: Vec<CoreSpec> = (0..3).map(|i| minimal_core(&format!("core{i}"), i)).collect();
        let spec = json!({
            "version": "1",
            "cores": cores,
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });
        dispatch(&mut d, "deploy_hil", spec);

        let ops = recorded_ops(&mut d);
        let layout = test_layout();
        let enable_addr = layout.bases.controller + layout.offsets.controller;
        let found = ops.iter().any(|op| match op {
            BusOp::ControlWrite { addresses, data } => addresses == &[enable_addr] && *data == 0b111,
            _ => false,
        });
        assert!(found, "expected enable mask 0b111 written to {enable_addr:#x}");
    }

    // ---- P7: hil_hardware_sim after deploy_hil round-trips control/rom blobs ----

    #[test]
    fn p7_hardware_sim_matches_a_fresh_deploy() {
        let mut core0 = minimal_core("core0", 0);
        core0.program = Program(vec![0x1, 0x2, 0xC, 0xC]);
        let spec = json!({
            "version": "1",
            "cores": [core0],
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });

        let mut d = test_dispatcher();
        dispatch(&mut d, "deploy_hil", spec.clone());
        let deploy_ops = recorded_ops(&mut d);

        let dump = dispatch(&mut d, "hil_hardware_sim", spec);
        let code = dump["code"].as_str().unwrap();
        let rom_word_count = deploy_ops
            .iter()
            .filter_map(|op| match op {
                BusOp::RomWrite { words, .. } => Some(words.len()),
                _ => None,
            })
            .sum::<usize>();
        assert_eq!(code.trim().lines().count(), rom_word_count);
    }

    // ---- S1: single-core N=1 float add deploy writes the expected constant bits ----

    #[test]
    fn s1_single_core_float_constant_deploys_expected_bits() {
        let mut d = test_dispatcher();
        let mut core0 = minimal_core("adder", 0);
        core0.inputs.push(InputSpec {
            name: "a".into(),
            metadata: float_metadata(),
            source: InputSource::Constant { values: vec![1.5] },
            reg: vec![4],
        });
        let spec = json!({
            "version": "1",
            "cores": [core0],
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });
        dispatch(&mut d, "deploy_hil", spec);

        let ops = recorded_ops(&mut d);
        let base = test_layout().bases.cores_inputs;
        let has_bits = ops.iter().any(|op| match op {
            BusOp::ControlWrite { addresses, data } => {
                addresses == &[base + regs::constant_engine::LSB] && *data == 1.5f32.to_bits()
            }
            _ => false,
        });
        assert!(has_bits);
    }

    // ---- S2: N=4-channel DMA mapping table formula ----

    #[test]
    fn s2_four_channel_output_fills_dma_table_by_channel() {
        let mut d = test_dispatcher();
        let mut producer = minimal_core("producer", 0);
        producer.n_channels = 4;
        producer.outputs.push(OutputSpec {
            name: "y".into(),
            metadata: float_metadata(),
            vector_size: None,
            reg: vec![0],
        });
        let mut consumer = minimal_core("scope", 1);
        let mut interconnect = vec![];
        for ch in 0..4u16 {
            interconnect.push(InterconnectSlot {
                source_id: "producer".into(),
                source_name: "y".into(),
                source_io_address: 0,
                source_channel: ch,
                destination_bus_address: ch,
                destination_channel: ch,
                metadata: float_metadata(),
            });
        }
        consumer.n_channels = 1;
        let spec = json!({
            "version": "1",
            "cores": [producer, consumer],
            "interconnect": interconnect,
            "emulation_time": 1.0,
            "deploy": true,
        });
        dispatch(&mut d, "deploy_hil", spec);

        let ops = recorded_ops(&mut d);
        let layout = test_layout();
        let dma_base = layout.bases.cores_control + layout.offsets.dma;
        let channel_count = ops.iter().find_map(|op| match op {
            BusOp::ControlWrite { addresses, data } if addresses == &[dma_base + regs::dma::CHANNEL_COUNT] => {
                Some(*data)
            }
            _ => None,
        });
        assert_eq!(channel_count, Some(4));
        for ch in 0..4u32 {
            let mapping_addr = dma_base + regs::dma::mapping_offset(ch);
            let expected = regs::encode_mapping_word(ch as u16, ch as u16, ch as u16, 0);
            let found = ops.iter().any(|op| match op {
                BusOp::ControlWrite { addresses, data } => addresses == &[mapping_addr] && *data == expected,
                _ => false,
            });
            assert!(found, "missing or wrong mapping word for channel {ch}");
        }
    }

    // ---- S3: two-core chain sequencer phase shift ----

    #[test]
    fn s3_second_core_shift_follows_first_cores_program_length() {
        let core_a = minimal_core("a", 0);
        let core_b = minimal_core("b", 1);
        let mut d = test_dispatcher();
        let spec = json!({
            "version": "1",
            "cores": [core_a, core_b],
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });
        dispatch(&mut d, "deploy_hil", spec);

        let ops = recorded_ops(&mut d);
        let layout = test_layout();
        let shift_addr_b = layout.bases.controller + layout.offsets.hil_tb + 8 + 4;
        // `a`'s schedule channel count (8, since its program has no
        // reciprocal opcode) drives `b`'s shift, not `a`'s n_channels.
        let expected_shift = 2 + program_length(8) + INTER_CORE_BUFFER_TICKS;
        let found = ops.iter().any(|op| match op {
            BusOp::ControlWrite { addresses, data } => addresses == &[shift_addr_b] && *data as u64 == expected_shift,
            _ => false,
        });
        assert!(found, "expected shift[1]={expected_shift} at {shift_addr_b:#x}");
    }

    // ---- S4: mixed-channel memory init with per-channel hex float bit patterns ----

    #[test]
    fn s4_memory_init_writes_one_word_per_channel_with_exact_bits() {
        let mut d = test_dispatcher();
        let mut core0 = minimal_core("core0", 0);
        core0.n_channels = 2;
        core0.memories.push(MemoryInitSpec {
            name: "state".into(),
            metadata: float_metadata(),
            is_output: true,
            is_input: false,
            initial_values: vec![2.5, -4.0],
            reg: vec![3],
        });
        let spec = json!({
            "version": "1",
            "cores": [core0],
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });
        dispatch(&mut d, "deploy_hil", spec);

        let ops = recorded_ops(&mut d);
        let control_base = test_layout().bases.cores_control;
        let addr0 = control_base + 4 * 3u64;
        let addr1 = control_base + 4 * (3u64 | (1u64 << 8));
        let has = |addr: u64, bits: u32| {
            ops.iter().any(|op| match op {
                BusOp::ControlWrite { addresses, data } => addresses == &[addr] && *data == bits,
                _ => false,
            })
        };
        assert!(has(addr0, 2.5f32.to_bits()));
        assert!(has(addr1, (-4.0f32).to_bits()));
    }

    // ---- S5: conflict detection yields response_code=9 via emulate_hil as well ----

    #[test]
    fn s5_emulate_hil_surfaces_bus_conflict_as_code_nine() {
        let mut d = test_dispatcher();
        let slot = InterconnectSlot {
            source_id: "a".into(),
            source_name: "out".into(),
            source_io_address: 0,
            source_channel: 0,
            destination_bus_address: 9,
            destination_channel: 0,
            metadata: float_metadata(),
        };
        let core_a = minimal_core("a", 0);
        let spec = json!({
            "version": "1",
            "cores": [core_a],
            "interconnect": [slot.clone(), slot],
            "emulation_time": 1.0,
            "deploy": false,
        });
        let envelope = uscope_core::CommandEnvelope {
            cmd: "emulate_hil".into(),
            args: spec,
        };
        let resp = d.dispatch(&envelope);
        assert_eq!(resp.body.response_code, ResponseCode::HilBusConflictWarning.as_i32());
    }

    // ---- S6: select_output places channel in the upper 16 bits of the mux word ----

    #[test]
    fn s6_select_output_places_requested_channel_in_upper_bits() {
        let mut d = test_dispatcher();
        let mut producer = minimal_core("test", 0);
        producer.outputs.push(OutputSpec {
            name: "out".into(),
            metadata: float_metadata(),
            vector_size: None,
            reg: vec![0],
        });
        let spec = json!({
            "version": "1",
            "cores": [producer],
            "interconnect": [{
                "source_id": "test",
                "source_name": "out",
                "source_io_address": 0,
                "source_channel": 1,
                "destination_bus_address": 3,
                "destination_channel": 0,
                "metadata": float_metadata(),
            }],
            "emulation_time": 1.0,
            "deploy": true,
        });
        dispatch(&mut d, "deploy_hil", spec);

        dispatch(
            &mut d,
            "hil_select_out",
            json!({"scope_channel": 1, "core": "test", "name": "out", "channel": 1}),
        );

        let ops = recorded_ops(&mut d);
        let addr = test_layout().bases.scope_mux + 0x8;
        let found = ops.iter().any(|op| match op {
            BusOp::ControlWrite { addresses, data } => addresses == &[addr] && *data == 0x10003,
            _ => false,
        });
        assert!(found, "expected 0x10003 written to scope_mux+0x8");
    }

    // ---- additional coverage: too many cores is a deployment error at the dispatcher level ----

    #[test]
    fn deploy_hil_rejects_more_than_max_cores() {
        let mut d = test_dispatcher();
        let cores: Vec<CoreSpec> = (0..MAX_CORES + 1).map(|i| minimal_core(&format!("c{i}"), i as u32)).collect();
        let spec = json!({
            "version": "1",
            "cores": cores,
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });
        let envelope = uscope_core::CommandEnvelope {
            cmd: "deploy_hil".into(),
            args: spec,
        };
        let resp = d.dispatch(&envelope);
        assert_eq!(resp.body.response_code, ResponseCode::DeploymentError.as_i32());
    }

    // ---- additional coverage: hil_debug breakpoint add/remove round-trips through the dispatcher ----

    #[test]
    fn hil_debug_add_then_remove_breakpoint_round_trips() {
        let mut d = test_dispatcher();
        let add = dispatch(
            &mut d,
            "hil_debug",
            json!({"type": "add_breakpoint", "id": 1, "target_instruction": 10, "spec": null}),
        );
        assert_eq!(add["breakpoints"], json!([10]));

        let remove = dispatch(
            &mut d,
            "hil_debug",
            json!({"type": "remove_breakpoint", "id": 2, "target_instruction": 10, "spec": null}),
        );
        assert_eq!(remove["breakpoints"], json!([]));
    }

    // ---- additional coverage: deploy_hil without a layout configured is a clear InvalidArg ----

    #[test]
    fn deploy_hil_without_layout_is_invalid_arg() {
        let bridge = FpgaBridge::new(Box::new(SinkBus::new()), Config::default());
        let scope = ScopeManager::without_device(0x9000);
        let timing = TimingManager::new([Config::default().hil_clock_frequency, 0, 0, 0]);
        let mut d = Dispatcher::new(bridge, scope, timing);
        let spec = json!({
            "version": "1",
            "cores": [minimal_core("a", 0)],
            "interconnect": [],
            "emulation_time": 1.0,
            "deploy": true,
        });
        let envelope = uscope_core::CommandEnvelope {
            cmd: "deploy_hil".into(),
            args: spec,
        };
        let resp = d.dispatch(&envelope);
        assert_eq!(resp.body.response_code, ResponseCode::InvalidArg.as_i32());
    }
}
