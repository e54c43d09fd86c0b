//! CLI for `uscope_driver` — start the command server, or exercise the
//! deployer/emulator/disassembler offline against spec files.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "uscope-driver")]
#[command(about = "User-space HIL driver for the fCore FPGA fabric")]
#[command(version = uscope_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TCP command server
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "6723")]
        port: u16,

        /// Target architecture: zynq or zynqmp
        #[arg(long, default_value = "zynq")]
        architecture: String,

        /// Directory holding bitstreams and fpga_manager sysfs shims
        #[arg(long, default_value = "/lib/firmware")]
        bitstream_dir: PathBuf,

        /// Control-plane UIO device
        #[arg(long, default_value = "/dev/uio0")]
        control_device: PathBuf,

        /// fCore/ROM-plane UIO device
        #[arg(long, default_value = "/dev/uio1")]
        fcore_device: PathBuf,

        /// Scope DMA device
        #[arg(long, default_value = "/dev/scope0")]
        scope_device: PathBuf,

        /// Force 11-channel scheduling regardless of reciprocal-opcode detection
        #[arg(long)]
        full_cores_override: bool,

        /// Run against a simulated bus instead of live hardware
        #[arg(long)]
        sim: bool,
    },

    /// Run a spec through the reference emulator (no hardware touched)
    Emulate {
        /// Path to a JSON emulator spec
        spec: PathBuf,
    },

    /// Deploy a spec against a simulated bus and print the hardware-sim dump
    Dump {
        /// Path to a JSON emulator spec
        spec: PathBuf,

        /// Path to a JSON layout map
        layout: PathBuf,

        /// Target architecture: zynq or zynqmp
        #[arg(long, default_value = "zynq")]
        architecture: String,
    },

    /// Scan a compiled program and report its scheduling channel count
    Disassemble {
        /// Path to a JSON array of program words
        program: PathBuf,

        /// Force 11-channel scheduling regardless of reciprocal-opcode detection
        #[arg(long)]
        full_cores_override: bool,
    },

    /// Validate an interconnect slot list for HIL bus conflicts
    Check {
        /// Path to a JSON array of interconnect slots
        interconnect: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            architecture,
            bitstream_dir,
            control_device,
            fcore_device,
            scope_device,
            full_cores_override,
            sim,
        } => commands::serve::run(
            &host,
            port,
            &architecture,
            bitstream_dir,
            control_device,
            fcore_device,
            scope_device,
            full_cores_override,
            sim,
        ),
        Commands::Emulate { spec } => commands::emulate::run(spec),
        Commands::Dump {
            spec,
            layout,
            architecture,
        } => commands::dump::run(spec, layout, &architecture),
        Commands::Disassemble {
            program,
            full_cores_override,
        } => commands::disassemble::run(program, full_cores_override),
        Commands::Check { interconnect } => commands::deploy_check::run(interconnect),
    }
}
