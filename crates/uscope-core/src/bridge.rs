//! Typed register/program/filter/clock operations layered over a
//! [`BusAccessor`].

use std::thread::sleep;
use std::time::Duration;

use crate::bus::BusAccessor;
use crate::config::Config;
use crate::error::{DriverError, DriverResult};

const BITSTREAM_POLL_INTERVAL: Duration = Duration::from_millis(5);
const BITSTREAM_POLL_ITERATIONS: u32 = 500;
const FPGA_MANAGER_DONE_STATE: &str = "operating";

/// How a single register write should be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWriteKind {
    Direct,
    Proxied(ProxySubtype),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxySubtype {
    AxisConstant,
}

#[derive(Debug, Clone, Copy)]
pub struct RegisterWriteRequest {
    pub kind: RegisterWriteKind,
    pub address: u64,
    /// Required when `kind` is `Proxied`.
    pub proxy_base: Option<u64>,
    pub data: u32,
}

/// A thin typed layer over [`BusAccessor`], matching the original driver's
/// `fpga_bridge` responsibilities: bitstream loading, register access,
/// filter taps, clock frequency, and scope DMA enable.
pub struct FpgaBridge {
    bus: Box<dyn BusAccessor>,
    config: Config,
}

impl FpgaBridge {
    pub fn new(bus: Box<dyn BusAccessor>, config: Config) -> Self {
        FpgaBridge { bus, config }
    }

    pub fn bus_mut(&mut self) -> &mut dyn BusAccessor {
        self.bus.as_mut()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Requests an FPGA-manager program cycle for `name` and polls the
    /// state sysfs node for up to ~2.5s (500 iterations of 5ms).
    pub fn load_bitstream(&mut self, name: &str) -> DriverResult<()> {
        let bitstream_path = self.config.bitstream_dir.join(name);
        if !bitstream_path.exists() {
            return Err(DriverError::BitstreamNotFound(name.to_string()));
        }

        std::fs::write(&self.config.fpga_manager_flags, b"0").map_err(|e| {
            DriverError::DriverWriteFailed(format!(
                "{}: {e}",
                self.config.fpga_manager_flags.display()
            ))
        })?;

        for _ in 0..BITSTREAM_POLL_ITERATIONS {
            if let Ok(state) = std::fs::read_to_string(&self.config.fpga_manager_state) {
                if state.trim() == FPGA_MANAGER_DONE_STATE {
                    return Ok(());
                }
            }
            sleep(BITSTREAM_POLL_INTERVAL);
        }
        Err(DriverError::BitstreamLoadFailed(BITSTREAM_POLL_ITERATIONS))
    }

    pub fn single_write_register(&mut self, req: RegisterWriteRequest) -> DriverResult<()> {
        match req.kind {
            RegisterWriteKind::Direct => self.bus.write_register(&[req.address], req.data),
            RegisterWriteKind::Proxied(ProxySubtype::AxisConstant) => {
                let proxy_base = req.proxy_base.ok_or_else(|| {
                    DriverError::InvalidArg("proxied write requires a proxy_base".into())
                })?;
                self.bus.write_register(&[req.address, proxy_base], req.data)
            }
        }
    }

    pub fn single_read_register(&mut self, address: u64) -> DriverResult<u32> {
        self.bus.read_register(&[address])
    }

    pub fn apply_program(&mut self, rom_addr: u64, words: &[u32]) -> DriverResult<()> {
        self.bus.load_program(rom_addr, words)
    }

    /// Writes each tap and its index to a tap-and-index register pair:
    /// index to `addr+4`, tap value to `addr`, following the same
    /// target-before-data ordering as the axis-constant proxy protocol.
    pub fn apply_filter(&mut self, addr: u64, taps: &[f32]) -> DriverResult<()> {
        for (i, tap) in taps.iter().enumerate() {
            self.bus.write_register(&[addr + 4], i as u32)?;
            self.bus.write_register(&[addr], tap.to_bits())?;
        }
        Ok(())
    }

    /// Writes `hz` to the per-clock sysfs node. On ZynqMP this is a no-op:
    /// dynamic PL clocks are not supported on that architecture.
    pub fn set_clock_frequency(&mut self, clock_id: u32, hz: u64) -> DriverResult<()> {
        if self.config.architecture == crate::config::Architecture::ZynqMp {
            return Ok(());
        }
        let node = self
            .config
            .bitstream_dir
            .join(format!("pl_clock{clock_id}_set_rate"));
        std::fs::write(&node, hz.to_string()).map_err(|e| {
            DriverError::DriverWriteFailed(format!("{}: {e}", node.display()))
        })
    }

    /// Reads the physical DMA buffer address from a sysfs node, writes it
    /// to `buffer_addr`, then writes 1 to `enable_addr` to enable scope DMA.
    pub fn set_scope_data(&mut self, enable_addr: u64, buffer_addr: u64) -> DriverResult<()> {
        let node = self.config.bitstream_dir.join("scope_dma_addr");
        let contents = std::fs::read_to_string(&node)
            .map_err(|e| DriverError::DriverFileNotFound(format!("{}: {e}", node.display())))?;
        let physical = parse_hex_or_dec(contents.trim()).ok_or_else(|| {
            DriverError::InternalError(format!("malformed DMA address in {}", node.display()))
        })?;
        self.bus.write_register(&[buffer_addr], physical)?;
        self.bus.write_register(&[enable_addr], 1)
    }

    pub fn disable_bus_access(&mut self) {
        self.bus.disable_recording();
    }

    pub fn enable_bus_access(&mut self) {
        self.bus.enable_recording();
    }
}

fn parse_hex_or_dec(s: &str) -> Option<u32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SinkBus;

    fn bridge() -> FpgaBridge {
        FpgaBridge::new(Box::new(SinkBus::new()), Config::default())
    }

    #[test]
    fn direct_write_uses_single_address() {
        let mut b = bridge();
        b.single_write_register(RegisterWriteRequest {
            kind: RegisterWriteKind::Direct,
            address: 0x10,
            proxy_base: None,
            data: 42,
        })
        .unwrap();
    }

    #[test]
    fn proxied_write_without_proxy_base_is_invalid_arg() {
        let mut b = bridge();
        let err = b
            .single_write_register(RegisterWriteRequest {
                kind: RegisterWriteKind::Proxied(ProxySubtype::AxisConstant),
                address: 0x10,
                proxy_base: None,
                data: 42,
            })
            .unwrap_err();
        assert_eq!(err.response_code(), crate::error::ResponseCode::InvalidArg);
    }

    #[test]
    fn load_bitstream_fails_not_found_for_missing_file() {
        let mut b = bridge();
        let err = b.load_bitstream("does-not-exist.bit").unwrap_err();
        assert_eq!(
            err.response_code(),
            crate::error::ResponseCode::BitstreamNotFound
        );
    }

    #[test]
    fn parses_hex_and_decimal_dma_addresses() {
        assert_eq!(parse_hex_or_dec("0x1000"), Some(0x1000));
        assert_eq!(parse_hex_or_dec("4096"), Some(4096));
        assert_eq!(parse_hex_or_dec("not-a-number"), None);
    }
}
