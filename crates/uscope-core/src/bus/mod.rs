//! Word-level MMIO access and its recording stand-in.
//!
//! [`BusAccessor`] is the single seam the rest of the driver talks through;
//! [`LiveBus`] and [`SinkBus`] are its two implementors, mirroring the
//! trait-object pattern the teacher crate uses for pluggable hardware
//! sources.

mod live;
mod ops;
mod sink;

pub use live::LiveBus;
pub use ops::BusOp;
pub use sink::SinkBus;

use crate::error::DriverResult;

/// Word-level read/write and bulk ROM-plane load, independent of whether
/// the words land on real silicon or in a recording buffer.
pub trait BusAccessor: Send {
    /// Write `data` to `addresses[0]`, or — when `addresses` holds a
    /// (target, proxy_base) pair — perform the axis-constant proxy write:
    /// `target` to `proxy_base+4`, then `data` to `proxy_base`, in that
    /// order.
    fn write_register(&mut self, addresses: &[u64], data: u32) -> DriverResult<()>;

    /// Read the word at `addresses[0]`. Recording back-ends return an
    /// arbitrary small placeholder rather than touching hardware.
    fn read_register(&mut self, addresses: &[u64]) -> DriverResult<u32>;

    /// Bulk sequential store of `words` to the ROM plane, one word every
    /// 4 bytes starting at `address`.
    fn load_program(&mut self, address: u64, words: &[u32]) -> DriverResult<()>;

    /// Disables live passthrough and clears any recorded operations.
    /// A no-op on [`LiveBus`]; meaningful only for recording back-ends.
    fn disable_recording(&mut self) {}

    /// Re-enables recording/passthrough after [`disable_recording`](Self::disable_recording).
    fn enable_recording(&mut self) {}

    /// Downcast hook used by `get_hardware_sim_data` to read back recorded
    /// operations; `None` for every back-end except [`SinkBus`].
    fn as_sink(&self) -> Option<&SinkBus> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_records_proxy_write_target_before_data() {
        let mut bus = SinkBus::new();
        bus.write_register(&[0x100, 0x200], 0xdead_beef).unwrap();
        let ops = bus.ops();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            BusOp::ControlWrite { addresses, data } => {
                assert_eq!(addresses, &[0x100, 0x200]);
                assert_eq!(*data, 0xdead_beef);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }
}
