use std::path::PathBuf;

use uscope_core::bus::{LiveBus, SinkBus};
use uscope_core::config::Config;
use uscope_core::timing::TimingManager;
use uscope_core::{Dispatcher, FpgaBridge, ScopeManager};

const DEFAULT_SCOPE_REGISTER_BASE: u64 = 0x9000;

#[allow(clippy::too_many_arguments)]
pub fn run(
    host: &str,
    port: u16,
    architecture: &str,
    bitstream_dir: PathBuf,
    control_device: PathBuf,
    fcore_device: PathBuf,
    scope_device: PathBuf,
    full_cores_override: bool,
    sim: bool,
) {
    let mut config = Config::new(super::parse_architecture(architecture)).with_full_cores_override(full_cores_override);
    config.bitstream_dir = bitstream_dir;
    config.control_device = control_device;
    config.fcore_device = fcore_device;
    config.scope_device = scope_device;

    let bridge = if sim {
        println!("uscope-driver: running against a simulated bus (--sim); no hardware will be touched");
        FpgaBridge::new(Box::new(SinkBus::new()), config.clone())
    } else {
        let bus = LiveBus::open(&config).unwrap_or_else(|e| {
            eprintln!("failed to open live bus: {e}");
            std::process::exit(1);
        });
        FpgaBridge::new(Box::new(bus), config.clone())
    };

    let scope = if sim {
        ScopeManager::without_device(DEFAULT_SCOPE_REGISTER_BASE)
    } else {
        ScopeManager::open(&config, DEFAULT_SCOPE_REGISTER_BASE).unwrap_or_else(|e| {
            eprintln!("failed to open scope device: {e}");
            std::process::exit(1);
        })
    };

    let timing = TimingManager::new([config.hil_clock_frequency, 0, 0, 0]);
    let dispatcher = Dispatcher::new(bridge, scope, timing);

    println!("uscope-driver v{}", uscope_core::VERSION);
    println!("  listening on {host}:{port}");
    println!("  architecture: {architecture}");

    ctrlc::set_handler(|| {
        println!("uscope-driver: shutting down");
        std::process::exit(0);
    })
    .expect("failed to install Ctrl-C handler");

    let rt = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    if let Err(e) = rt.block_on(uscope_server::run_server(dispatcher, host, port)) {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}
