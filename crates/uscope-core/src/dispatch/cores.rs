//! `cores` endpoint family: program loading, HIL deployment, the
//! emulator adapter, and the hardware-simulation dump (spec.md §4.6).

use serde_json::Value;

use super::{require_array, require_str, require_u64, Dispatcher};
use crate::emulator::InteractiveCommand;
use crate::error::{DriverError, DriverResult, ResponseCode};
use crate::hil::layout::LogicLayout;
use crate::hil::program::{scan_pipeline, schedule_channel_count};
use crate::hil::spec::{EmulatorSpec, IoMetadata};
use crate::hil::deployer::Deployer;

fn layout_or_err(d: &Dispatcher) -> DriverResult<LogicLayout> {
    d.layout
        .clone()
        .ok_or_else(|| DriverError::InvalidArg("no layout map configured; call set_layout_map first".into()))
}

pub fn handle(d: &mut Dispatcher, cmd: &str, args: &Value) -> DriverResult<Option<Value>> {
    match cmd {
        "apply_program" => {
            let address = require_u64(args, "address")?;
            let words: Vec<u32> = require_array(args, "program")?
                .iter()
                .map(Value::as_u64)
                .collect::<Option<Vec<u64>>>()
                .ok_or_else(|| DriverError::InvalidArg("'program' must be an array of integers".into()))?
                .into_iter()
                .map(|w| w as u32)
                .collect();
            d.bridge.apply_program(address, &words)?;
            Ok(None)
        }

        "compile_program" => Err(DriverError::InternalError(
            "program compilation is performed by an external toolchain; submit a pre-compiled program".into(),
        )),

        "emulate_hil" => {
            let spec: EmulatorSpec = serde_json::from_value(args.clone())?;
            let result = d.emulator.run(&spec)?;
            if result.code == ResponseCode::HilBusConflictWarning.as_i32() {
                let mut parts = result.duplicates.splitn(2, ',');
                let address: u16 = parts.next().unwrap_or_default().parse().unwrap_or_default();
                let channel: u16 = parts.next().unwrap_or_default().parse().unwrap_or_default();
                return Err(DriverError::HilBusConflict { address, channel });
            }
            if result.code == ResponseCode::EmulationError.as_i32() {
                return Err(DriverError::EmulationError(result.results));
            }
            Ok(Some(serde_json::json!({
                "results": result.results,
                "results_valid": result.results_valid,
            })))
        }

        "deploy_hil" => {
            let spec: EmulatorSpec = serde_json::from_value(args.clone())?;
            let layout = layout_or_err(d)?;
            let config = d.bridge.config().clone();
            d.deployer.deploy(&mut d.bridge, &layout, &config, &spec)?;
            Ok(None)
        }

        "hil_set_in" => {
            let core = require_str(args, "core")?;
            let name = require_str(args, "name")?;
            let channel = require_u64(args, "channel")? as u32;
            let value = args
                .get("value")
                .and_then(Value::as_f64)
                .ok_or_else(|| DriverError::InvalidArg("missing or non-numeric 'value'".into()))?;
            let metadata = IoMetadata {
                kind: if args.get("is_float").and_then(Value::as_bool).unwrap_or(true) {
                    crate::hil::spec::IoKind::Float
                } else {
                    crate::hil::spec::IoKind::Integer
                },
                width_bits: args.get("width_bits").and_then(Value::as_u64).unwrap_or(32) as u8,
                signed: args.get("signed").and_then(Value::as_bool).unwrap_or(true),
                common_io: false,
            };
            d.deployer.set_input(&mut d.bridge, core, name, channel, value, &metadata)?;
            Ok(None)
        }

        "hil_select_out" => {
            let scope_channel = require_u64(args, "scope_channel")? as u32;
            let core = require_str(args, "core")?;
            let name = require_str(args, "name")?;
            let channel = require_u64(args, "channel")? as u16;
            let layout = layout_or_err(d)?;
            d.deployer.select_output(&mut d.bridge, &layout, scope_channel, core, name, channel)?;
            Ok(None)
        }

        "hil_start" => {
            let layout = layout_or_err(d)?;
            d.deployer.start(&mut d.bridge, &layout)?;
            Ok(None)
        }

        "hil_stop" => {
            let layout = layout_or_err(d)?;
            d.deployer.stop(&mut d.bridge, &layout)?;
            Ok(None)
        }

        "set_layout_map" => {
            d.layout = Some(LogicLayout::parse(args)?);
            Ok(None)
        }

        "set_hil_address_map" => {
            let slots: Vec<crate::hil::spec::InterconnectSlot> = serde_json::from_value(args.clone())?;
            let mut map = crate::hil::bus_map::HilBusMap::new();
            for slot in slots {
                map.push_back(slot);
            }
            map.check_conflicts()?;
            // The deployer's bus map is rebuilt on the next `deploy_hil`
            // call; this endpoint only validates ahead of time (S5).
            Ok(None)
        }

        "get_hil_address_map" => {
            let slots: Vec<&crate::hil::spec::InterconnectSlot> = d.deployer.bus_map().iter().collect();
            Ok(Some(serde_json::to_value(slots)?))
        }

        "hil_hardware_sim" => {
            let spec: EmulatorSpec = serde_json::from_value(args.clone())?;
            let layout = layout_or_err(d)?;
            let config = d.bridge.config().clone();
            let dump = Deployer::get_hardware_sim_data(&config, &layout, &spec)?;
            Ok(Some(serde_json::json!({
                "code": dump.code,
                "control": dump.control,
                "outputs": dump.outputs,
                "inputs": dump.inputs,
            })))
        }

        "hil_disassemble" => {
            let words: Vec<u32> = require_array(args, "program")?
                .iter()
                .map(Value::as_u64)
                .collect::<Option<Vec<u64>>>()
                .ok_or_else(|| DriverError::InvalidArg("'program' must be an array of integers".into()))?
                .into_iter()
                .map(|w| w as u32)
                .collect();
            let scan = scan_pipeline(&words);
            let channels = schedule_channel_count(scan.has_reciprocal, d.bridge.config().full_cores_override);
            Ok(Some(serde_json::json!({
                "has_reciprocal": scan.has_reciprocal,
                "schedule_channels": channels,
            })))
        }

        "hil_debug" => {
            let command: InteractiveCommand = serde_json::from_value(args.clone())?;
            let result = d.emulator.handle_interactive(&command)?;
            Ok(Some(serde_json::to_value(result)?))
        }

        _ => unreachable!("cores::handle routed an unhandled command: {cmd}"),
    }
}
