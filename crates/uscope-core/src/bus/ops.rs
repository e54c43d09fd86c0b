//! Recorded bus operations — the artifact a [`SinkBus`](super::SinkBus) accumulates.

/// One operation as it would have hit the wire, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    /// A word write (or a target+proxy pair write) to the control plane.
    ControlWrite { addresses: Vec<u64>, data: u32 },
    /// A word read from the control plane.
    ControlRead { addresses: Vec<u64> },
    /// A bulk sequential ROM-plane store starting at `address`.
    RomWrite { address: u64, words: Vec<u32> },
}

impl BusOp {
    /// Single-letter tag used by the hardware-simulation dump renderer,
    /// matching the original driver's write/read/program tagging.
    pub fn tag(&self) -> &'static str {
        match self {
            BusOp::ControlWrite { .. } => "w",
            BusOp::ControlRead { .. } => "r",
            BusOp::RomWrite { .. } => "p",
        }
    }
}
