use std::path::PathBuf;

use uscope_core::config::Config;
use uscope_core::hil::deployer::Deployer;
use uscope_core::hil::{EmulatorSpec, LogicLayout};

pub fn run(spec_path: PathBuf, layout_path: PathBuf, architecture: &str) {
    let spec: EmulatorSpec = serde_json::from_value(super::load_json(&spec_path))
        .unwrap_or_else(|e| panic!("{} is not a valid emulator spec: {e}", spec_path.display()));
    let layout = LogicLayout::parse(&super::load_json(&layout_path))
        .unwrap_or_else(|e| panic!("{} is not a valid layout map: {e}", layout_path.display()));
    let config = Config::new(super::parse_architecture(architecture));

    match Deployer::get_hardware_sim_data(&config, &layout, &spec) {
        Ok(dump) => {
            println!("=== code ===\n{}", dump.code);
            println!("=== control ===\n{}", dump.control);
            println!("=== outputs ===\n{}", dump.outputs);
            println!("=== inputs ===\n{}", dump.inputs);
        }
        Err(e) => {
            eprintln!("hardware-sim dump failed: {e}");
            std::process::exit(1);
        }
    }
}
