//! `scope` endpoint family: sample readback, scaling/channel config, and
//! acquisition control (spec.md §4.6).

use serde_json::Value;

use super::{require_array, require_u64, Dispatcher};
use crate::error::{DriverError, DriverResult};
use crate::scope::{AcquisitionConfig, AcquisitionMode, TriggerLevelType, TriggerMode, N_CHANNELS};

pub fn handle(d: &mut Dispatcher, cmd: &str, args: &Value) -> DriverResult<Option<Value>> {
    match cmd {
        "read_data" => {
            let channels = d.scope.read_data()?;
            Ok(Some(serde_json::to_value(channels.to_vec())?))
        }

        "set_scaling_factors" => {
            let factors: Vec<f32> = require_array(args, "factors")?
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| DriverError::InvalidArg("scaling factors must be numeric".into()))?;
            let mut arr = [1.0f32; N_CHANNELS];
            for (slot, v) in arr.iter_mut().zip(factors) {
                *slot = v;
            }
            d.scope.set_scaling_factors(arr);
            Ok(None)
        }

        "set_channel_status" => {
            let obj = args
                .as_object()
                .ok_or_else(|| DriverError::InvalidArg("set_channel_status expects an object".into()))?;
            let mut status = [true; N_CHANNELS];
            for (key, value) in obj {
                let idx: usize = key
                    .parse()
                    .map_err(|_| DriverError::InvalidArg(format!("non-numeric channel key '{key}'")))?;
                let enabled = value
                    .as_bool()
                    .ok_or_else(|| DriverError::InvalidArg("channel status must be boolean".into()))?;
                if let Some(slot) = status.get_mut(idx) {
                    *slot = enabled;
                }
            }
            d.scope.set_channel_status(status);
            Ok(None)
        }

        "disable_scope_dma" => {
            let enable_addr = require_u64(args, "enable_addr")?;
            d.scope.disable_dma(d.bridge.bus_mut(), enable_addr)?;
            Ok(None)
        }

        "get_acquisition_status" => {
            let status = d.scope.get_acquisition_status(d.bridge.bus_mut())?;
            Ok(Some(match status {
                Some(s) => serde_json::to_value(s)?,
                None => Value::Null,
            }))
        }

        "set_acquisition" => {
            let mode = match require_u64(args, "mode")? {
                0 => AcquisitionMode::Continuous,
                1 => AcquisitionMode::Single,
                _ => AcquisitionMode::FreeRunning,
            };
            let trigger_mode = match require_u64(args, "trigger")? {
                0 => TriggerMode::RisingEdge,
                1 => TriggerMode::FallingEdge,
                _ => TriggerMode::Both,
            };
            let trigger_level_type = if require_u64(args, "level_type")? == 0 {
                TriggerLevelType::Raw
            } else {
                TriggerLevelType::Float
            };
            let config = AcquisitionConfig {
                mode,
                trigger_mode,
                trigger_source: require_u64(args, "source")? as u32,
                trigger_level: args
                    .get("level")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| DriverError::InvalidArg("missing or non-numeric 'level'".into()))?
                    as f32,
                trigger_level_type,
                trigger_point: require_u64(args, "trigger_point")? as u32,
                prescaler: require_u64(args, "prescaler")? as u32,
            };
            d.scope.set_acquisition(d.bridge.bus_mut(), &config)?;
            Ok(None)
        }

        "set_scope_address" => {
            let enable_addr = require_u64(args, "enable_addr")?;
            let buffer_addr = require_u64(args, "buffer_addr")?;
            let physical_dma_addr = require_u64(args, "address")? as u32;
            d.scope
                .set_scope_address(d.bridge.bus_mut(), enable_addr, buffer_addr, physical_dma_addr)?;
            Ok(None)
        }

        _ => unreachable!("scope::handle routed an unhandled command: {cmd}"),
    }
}
