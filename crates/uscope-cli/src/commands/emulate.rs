use std::path::PathBuf;

use uscope_core::emulator::{EmulationEngine, ReferenceEngine};
use uscope_core::hil::EmulatorSpec;

pub fn run(spec_path: PathBuf) {
    let value = super::load_json(&spec_path);
    let spec: EmulatorSpec = serde_json::from_value(value)
        .unwrap_or_else(|e| panic!("{} is not a valid emulator spec: {e}", spec_path.display()));

    let mut engine = ReferenceEngine::new();
    match engine.run(&spec) {
        Ok(result) => {
            println!("code: {}", result.code);
            println!("results_valid: {}", result.results_valid);
            if !result.duplicates.is_empty() {
                println!("duplicates: {}", result.duplicates);
            }
            println!("results: {}", result.results);
        }
        Err(e) => {
            eprintln!("emulation failed: {e}");
            std::process::exit(1);
        }
    }
}
