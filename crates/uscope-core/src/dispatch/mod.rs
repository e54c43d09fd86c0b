//! The command dispatcher (spec.md §4.6): routes a `{cmd, args}`
//! envelope to one of four endpoint families and returns
//! `{response_code, data?}`.

pub mod control;
pub mod cores;
pub mod platform;
pub mod scope;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::FpgaBridge;
use crate::emulator::{EmulationEngine, ReferenceEngine};
use crate::error::{DriverError, DriverResult, ResponseCode};
use crate::hil::deployer::Deployer;
use crate::hil::layout::LogicLayout;
use crate::scope::ScopeManager;
use crate::timing::TimingManager;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub cmd: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseBody {
    pub response_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub cmd: String,
    pub body: ResponseBody,
}

/// Everything an endpoint handler needs: the bridge (bus + config), the
/// scope manager, the HIL deployer's persistent state, the timing
/// manager, the emulation engine, and the last-configured layout map.
pub struct Dispatcher {
    pub bridge: FpgaBridge,
    pub scope: ScopeManager,
    pub deployer: Deployer,
    pub timing: TimingManager,
    pub emulator: Box<dyn EmulationEngine>,
    pub layout: Option<LogicLayout>,
}

impl Dispatcher {
    pub fn new(bridge: FpgaBridge, scope: ScopeManager, timing: TimingManager) -> Self {
        Dispatcher {
            bridge,
            scope,
            deployer: Deployer::new(),
            timing,
            emulator: Box::new(ReferenceEngine::new()),
            layout: None,
        }
    }

    pub fn dispatch(&mut self, envelope: &CommandEnvelope) -> ResponseEnvelope {
        debug!("dispatch: cmd={}", envelope.cmd);
        let body = match route(self, &envelope.cmd, &envelope.args) {
            Ok(data) => ResponseBody {
                response_code: ResponseCode::Ok.as_i32(),
                data,
            },
            Err(e) => {
                warn!("dispatch: cmd={} failed: {e}", envelope.cmd);
                ResponseBody {
                    response_code: e.response_code().as_i32(),
                    data: Some(Value::String(e.to_string())),
                }
            }
        };
        ResponseEnvelope {
            cmd: envelope.cmd.clone(),
            body,
        }
    }
}

fn route(d: &mut Dispatcher, cmd: &str, args: &Value) -> DriverResult<Option<Value>> {
    match cmd {
        "load_bitstream" | "register_read" | "register_write" | "apply_filter" | "set_scope_data"
        | "set_frequency" => control::handle(d, cmd, args),

        "apply_program" | "compile_program" | "emulate_hil" | "deploy_hil" | "hil_set_in"
        | "hil_select_out" | "hil_start" | "hil_stop" | "set_layout_map" | "set_hil_address_map"
        | "get_hil_address_map" | "hil_hardware_sim" | "hil_disassemble" | "hil_debug" => {
            cores::handle(d, cmd, args)
        }

        "read_data" | "set_scaling_factors" | "set_channel_status" | "disable_scope_dma"
        | "get_acquisition_status" | "set_acquisition" | "set_scope_address" => {
            scope::handle(d, cmd, args)
        }

        "set_pl_clock" | "get_clock" | "get_version" | "set_debug_level" | "get_debug_level" => {
            platform::handle(d, cmd, args)
        }

        "null" => Ok(None),

        other => Err(DriverError::InvalidCmdSchema(format!("unknown command '{other}'"))),
    }
}

pub(crate) fn require_u64(args: &Value, key: &str) -> DriverResult<u64> {
    args.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| DriverError::InvalidArg(format!("missing or non-numeric '{key}'")))
}

pub(crate) fn require_str<'a>(args: &'a Value, key: &str) -> DriverResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DriverError::InvalidArg(format!("missing or non-string '{key}'")))
}

pub(crate) fn require_f64(args: &Value, key: &str) -> DriverResult<f64> {
    args.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| DriverError::InvalidArg(format!("missing or non-numeric '{key}'")))
}

pub(crate) fn require_bool(args: &Value, key: &str) -> DriverResult<bool> {
    args.get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| DriverError::InvalidArg(format!("missing or non-boolean '{key}'")))
}

pub(crate) fn require_array<'a>(args: &'a Value, key: &str) -> DriverResult<&'a Vec<Value>> {
    args.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| DriverError::InvalidArg(format!("missing or non-array '{key}'")))
}
