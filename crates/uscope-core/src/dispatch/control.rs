//! `control` endpoint family: bitstream load, register access, filter
//! taps, clock frequency, scope DMA buffer (spec.md §4.6).

use serde_json::Value;

use super::{require_array, require_u64, Dispatcher};
use crate::bridge::{ProxySubtype, RegisterWriteKind, RegisterWriteRequest};
use crate::error::{DriverError, DriverResult};

pub fn handle(d: &mut Dispatcher, cmd: &str, args: &Value) -> DriverResult<Option<Value>> {
    match cmd {
        "load_bitstream" => {
            let name = args
                .as_str()
                .ok_or_else(|| DriverError::InvalidArg("load_bitstream expects a string".into()))?;
            d.bridge.load_bitstream(name)?;
            Ok(None)
        }
        "register_write" => {
            let address = require_u64(args, "address")?;
            let data = require_u64(args, "data")? as u32;
            let proxy_base = args.get("proxy_base").and_then(Value::as_u64);
            let req = match proxy_base {
                Some(proxy_base) => RegisterWriteRequest {
                    kind: RegisterWriteKind::Proxied(ProxySubtype::AxisConstant),
                    address,
                    proxy_base: Some(proxy_base),
                    data,
                },
                None => RegisterWriteRequest {
                    kind: RegisterWriteKind::Direct,
                    address,
                    proxy_base: None,
                    data,
                },
            };
            d.bridge.single_write_register(req)?;
            Ok(None)
        }
        "register_read" => {
            let address = args
                .as_u64()
                .ok_or_else(|| DriverError::InvalidArg("register_read expects a numeric address".into()))?;
            let value = d.bridge.single_read_register(address)?;
            Ok(Some(Value::from(value)))
        }
        "apply_filter" => {
            let address = require_u64(args, "address")?;
            let taps: Vec<f32> = require_array(args, "taps")?
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| DriverError::InvalidArg("'taps' must be an array of numbers".into()))?;
            d.bridge.apply_filter(address, &taps)?;
            Ok(None)
        }
        "set_scope_data" => {
            let enable = require_u64(args, "enable")?;
            let buffer_address = require_u64(args, "buffer_address")?;
            d.bridge.set_scope_data(enable, buffer_address)?;
            Ok(None)
        }
        "set_frequency" => {
            let clock_id = require_u64(args, "clock_id")? as u32;
            let hz = require_u64(args, "hz")?;
            d.bridge.set_clock_frequency(clock_id, hz)?;
            Ok(None)
        }
        _ => unreachable!("control::handle routed an unhandled command: {cmd}"),
    }
}
