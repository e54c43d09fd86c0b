//! `platform` endpoint family: PS↔PL clocks, version reporting, and
//! debug-level control (spec.md §4.6, §4.8).

use log::LevelFilter;
use serde_json::Value;

use super::{require_bool, require_str, Dispatcher};
use crate::error::{DriverError, DriverResult};

const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn handle(d: &mut Dispatcher, cmd: &str, args: &Value) -> DriverResult<Option<Value>> {
    match cmd {
        "set_pl_clock" => {
            let is_primary = require_bool(args, "is_primary")?;
            let id = args
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| DriverError::InvalidArg("missing or non-string 'id'".into()))?;
            let value = args
                .get("value")
                .ok_or_else(|| DriverError::InvalidArg("missing 'value'".into()))?;
            if is_primary {
                let n: usize = id
                    .parse()
                    .map_err(|_| DriverError::InvalidArg("base clock 'id' must be numeric".into()))?;
                let hz = value
                    .as_u64()
                    .ok_or_else(|| DriverError::InvalidArg("'value' must be an integer frequency".into()))?;
                d.timing.set_base_clock(n, hz)?;
            } else {
                let multiplier = value.get("m").and_then(Value::as_u64).unwrap_or(1) as u32;
                let divider = value.get("d").and_then(Value::as_u64).unwrap_or(1) as u32;
                let phase = value.get("p").and_then(Value::as_u64).unwrap_or(0) as u32;
                d.timing.set_generated_clock(&mut d.bridge, id, multiplier, divider, phase)?;
            }
            Ok(None)
        }

        "get_clock" => {
            let is_primary = require_bool(args, "is_primary")?;
            let id = args
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| DriverError::InvalidArg("missing or non-string 'id'".into()))?;
            let hz = if is_primary {
                let n: usize = id
                    .parse()
                    .map_err(|_| DriverError::InvalidArg("base clock 'id' must be numeric".into()))?;
                d.timing.get_base_clock(n)?
            } else {
                d.timing.get_generated_clock(id)?
            };
            Ok(Some(Value::from(hz)))
        }

        "get_version" => {
            let component = require_str(args, "component").or_else(|_| {
                args.as_str()
                    .ok_or_else(|| DriverError::InvalidArg("get_version expects a string".into()))
            })?;
            let data = match component {
                "driver" => DRIVER_VERSION.to_string(),
                "module" => "unknown (no kernel module probed)".to_string(),
                "hardware" => "unknown (no bitstream loaded)".to_string(),
                other => return Err(DriverError::InvalidArg(format!("unknown version component '{other}'"))),
            };
            Ok(Some(Value::String(data)))
        }

        "set_debug_level" => {
            let level = args
                .as_str()
                .ok_or_else(|| DriverError::InvalidArg("set_debug_level expects a string".into()))?;
            let filter = match level {
                "minimal" => LevelFilter::Warn,
                "debug" => LevelFilter::Info,
                "trace" => LevelFilter::Trace,
                other => return Err(DriverError::InvalidArg(format!("unknown debug level '{other}'"))),
            };
            log::set_max_level(filter);
            Ok(None)
        }

        "get_debug_level" => {
            let level = match log::max_level() {
                LevelFilter::Warn => "minimal",
                LevelFilter::Info => "debug",
                LevelFilter::Trace => "trace",
                _ => "",
            };
            Ok(Some(Value::String(level.to_string())))
        }

        _ => unreachable!("platform::handle routed an unhandled command: {cmd}"),
    }
}
