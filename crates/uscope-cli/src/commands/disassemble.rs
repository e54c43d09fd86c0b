use std::path::PathBuf;

use uscope_core::hil::program::{scan_pipeline, schedule_channel_count};

pub fn run(program_path: PathBuf, full_cores_override: bool) {
    let value = super::load_json(&program_path);
    let words: Vec<u32> = value
        .as_array()
        .unwrap_or_else(|| panic!("{} must contain a JSON array of integers", program_path.display()))
        .iter()
        .map(|v| v.as_u64().map(|w| w as u32))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_else(|| panic!("{} must contain only integers", program_path.display()));

    let scan = scan_pipeline(&words);
    let channels = schedule_channel_count(scan.has_reciprocal, full_cores_override);

    println!("program length: {}", words.len());
    println!("has_reciprocal: {}", scan.has_reciprocal);
    println!("schedule_channels: {channels}");
}
