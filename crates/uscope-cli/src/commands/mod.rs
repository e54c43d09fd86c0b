pub mod deploy_check;
pub mod disassemble;
pub mod dump;
pub mod emulate;
pub mod serve;

use std::path::Path;

use uscope_core::config::Architecture;

pub fn parse_architecture(s: &str) -> Architecture {
    Architecture::from_env_str(s).unwrap_or_else(|| {
        eprintln!("unknown architecture '{s}', defaulting to zynq");
        Architecture::Zynq
    })
}

pub fn load_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
}
