use std::path::PathBuf;

use uscope_core::hil::bus_map::HilBusMap;
use uscope_core::hil::spec::InterconnectSlot;

/// Validates an interconnect slot list for bus conflicts ahead of a
/// deploy, without touching hardware.
pub fn run(interconnect_path: PathBuf) {
    let value = super::load_json(&interconnect_path);
    let slots: Vec<InterconnectSlot> = serde_json::from_value(value).unwrap_or_else(|e| {
        panic!("{} is not a valid interconnect slot list: {e}", interconnect_path.display())
    });

    let mut map = HilBusMap::new();
    for slot in slots {
        map.push_back(slot);
    }

    match map.check_conflicts() {
        Ok(()) => println!("no conflicts across {} interconnect slot(s)", map.len()),
        Err(e) => {
            eprintln!("conflict: {e}");
            std::process::exit(1);
        }
    }
}
