//! Software-emulator adapter (spec.md §4.7): runs a spec without touching
//! hardware and answers interactive debug commands.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult, ResponseCode};
use crate::hil::bus_map::HilBusMap;
use crate::hil::spec::EmulatorSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractiveCommandType {
    AddBreakpoint,
    RemoveBreakpoint,
    StepOver,
    Resume,
    Initialize,
    Start,
    GetBreakpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveCommand {
    #[serde(rename = "type")]
    pub kind: InteractiveCommandType,
    pub id: u64,
    pub target_instruction: Option<u64>,
    pub spec: Option<EmulatorSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveResult {
    pub id: u64,
    pub breakpoints: Vec<u64>,
    pub code: i32,
}

/// Result of `emulate`: spec.md §4.7's `{results, results_valid,
/// duplicates, code}` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulationResult {
    pub results: String,
    pub results_valid: bool,
    pub duplicates: String,
    pub code: i32,
}

/// The adapter seam between the dispatcher and whatever executes a spec
/// off hardware. `ReferenceEngine` is a minimal deterministic stand-in;
/// the opcode semantics it would need to actually run a program are
/// owned by the external compiler/simulator toolchain, same as the fCore
/// ISA itself (spec.md §1).
pub trait EmulationEngine: Send {
    fn run(&mut self, spec: &EmulatorSpec) -> DriverResult<EmulationResult>;
    fn handle_interactive(&mut self, command: &InteractiveCommand) -> DriverResult<InteractiveResult>;
}

/// Detects HIL bus-map conflicts up front (spec.md S5), then reports a
/// deterministic per-core sample count as its "result" in lieu of actual
/// instruction execution.
#[derive(Default)]
pub struct ReferenceEngine {
    breakpoints: Vec<u64>,
}

impl ReferenceEngine {
    pub fn new() -> Self {
        ReferenceEngine::default()
    }
}

impl EmulationEngine for ReferenceEngine {
    fn run(&mut self, spec: &EmulatorSpec) -> DriverResult<EmulationResult> {
        let mut map = HilBusMap::new();
        for slot in &spec.interconnect {
            map.push_back(slot.clone());
        }
        if let Err(DriverError::HilBusConflict { address, channel }) = map.check_conflicts() {
            info!("emulate: bus conflict at address={address} channel={channel}");
            return Ok(EmulationResult {
                results: String::new(),
                results_valid: false,
                duplicates: format!("{address},{channel}"),
                code: ResponseCode::HilBusConflictWarning.as_i32(),
            });
        }

        if spec.cores.is_empty() {
            return Err(DriverError::EmulationError("spec has no cores".into()));
        }

        debug!("emulate: {} core(s), emulation_time={}", spec.cores.len(), spec.emulation_time);
        let per_core: Vec<serde_json::Value> = spec
            .cores
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "n_channels": c.n_channels,
                    "samples": (spec.emulation_time * c.sampling_frequency as f64).round() as u64,
                })
            })
            .collect();
        let results = serde_json::to_string(&per_core)?;

        Ok(EmulationResult {
            results,
            results_valid: true,
            duplicates: String::new(),
            code: ResponseCode::Ok.as_i32(),
        })
    }

    fn handle_interactive(&mut self, command: &InteractiveCommand) -> DriverResult<InteractiveResult> {
        match command.kind {
            InteractiveCommandType::AddBreakpoint => {
                if let Some(addr) = command.target_instruction {
                    self.breakpoints.push(addr);
                }
            }
            InteractiveCommandType::RemoveBreakpoint => {
                if let Some(addr) = command.target_instruction {
                    self.breakpoints.retain(|&b| b != addr);
                }
            }
            InteractiveCommandType::StepOver
            | InteractiveCommandType::Resume
            | InteractiveCommandType::Initialize
            | InteractiveCommandType::Start
            | InteractiveCommandType::GetBreakpoints => {}
        }
        Ok(InteractiveResult {
            id: command.id,
            breakpoints: self.breakpoints.clone(),
            code: ResponseCode::Ok.as_i32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hil::spec::{CoreOptions, CoreSpec, IoKind, IoMetadata, InterconnectSlot, Program};

    fn core(name: &str) -> CoreSpec {
        CoreSpec {
            name: name.into(),
            order: 0,
            sampling_frequency: 10,
            n_channels: 1,
            options: CoreOptions {
                comparator_policy: "default".into(),
                efi_impl: "default".into(),
            },
            program: Program(vec![]),
            inputs: vec![],
            outputs: vec![],
            memories: vec![],
        }
    }

    fn metadata() -> IoMetadata {
        IoMetadata {
            kind: IoKind::Float,
            width_bits: 32,
            signed: true,
            common_io: false,
        }
    }

    #[test]
    fn conflicting_interconnect_yields_warning_code_and_no_results() {
        let mut engine = ReferenceEngine::new();
        let slot = InterconnectSlot {
            source_id: "a".into(),
            source_name: "out".into(),
            source_io_address: 0,
            source_channel: 0,
            destination_bus_address: 5,
            destination_channel: 0,
            metadata: metadata(),
        };
        let spec = EmulatorSpec {
            version: "1".into(),
            cores: vec![core("a"), core("b")],
            interconnect: vec![slot.clone(), slot],
            emulation_time: 1.0,
            deploy: false,
        };
        let result = engine.run(&spec).unwrap();
        assert_eq!(result.code, ResponseCode::HilBusConflictWarning.as_i32());
        assert!(!result.results_valid);
        assert_eq!(result.duplicates, "5,0");
    }

    #[test]
    fn clean_spec_yields_ok_code_and_valid_results() {
        let mut engine = ReferenceEngine::new();
        let spec = EmulatorSpec {
            version: "1".into(),
            cores: vec![core("a")],
            interconnect: vec![],
            emulation_time: 2.0,
            deploy: false,
        };
        let result = engine.run(&spec).unwrap();
        assert_eq!(result.code, ResponseCode::Ok.as_i32());
        assert!(result.results_valid);
        assert!(result.results.contains("\"samples\":20"));
    }

    #[test]
    fn breakpoint_add_then_remove_round_trips() {
        let mut engine = ReferenceEngine::new();
        let add = InteractiveCommand {
            kind: InteractiveCommandType::AddBreakpoint,
            id: 1,
            target_instruction: Some(42),
            spec: None,
        };
        let result = engine.handle_interactive(&add).unwrap();
        assert_eq!(result.breakpoints, vec![42]);

        let remove = InteractiveCommand {
            kind: InteractiveCommandType::RemoveBreakpoint,
            id: 2,
            target_instruction: Some(42),
            spec: None,
        };
        let result = engine.handle_interactive(&remove).unwrap();
        assert!(result.breakpoints.is_empty());
    }
}
