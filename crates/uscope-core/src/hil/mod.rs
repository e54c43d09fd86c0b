//! The HIL subsystem: data model, bus map, register layout, pipeline
//! scheduling, and the deployer that ties them together (spec.md §4.4, §4.5).

pub mod bus_map;
pub mod deployer;
pub mod layout;
pub mod program;
pub mod regs;
pub mod schedule;
pub mod spec;

pub use bus_map::HilBusMap;
pub use deployer::{Deployer, HardwareSimDump};
pub use layout::{LogicBases, LogicLayout, LogicOffsets};
pub use spec::EmulatorSpec;
