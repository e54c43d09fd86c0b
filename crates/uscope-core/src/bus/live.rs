//! Live MMIO back-end: two memory-mapped device files, a process-wide
//! mutex, and fatal signal handlers for out-of-range access.

use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::sync::{Mutex, Once, OnceLock};

use crate::config::Config;
use crate::error::{DriverError, DriverResult};

/// Serializes every live MMIO access across the process, regardless of how
/// many [`LiveBus`] handles exist — matching the single process-wide mutex
/// of the original driver.
static LIVE_BUS_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static INSTALL_HANDLERS: Once = Once::new();

fn live_lock() -> &'static Mutex<()> {
    LIVE_BUS_LOCK.get_or_init(|| Mutex::new(()))
}

extern "C" fn fatal_signal_handler(sig: libc::c_int) {
    let name = if sig == libc::SIGSEGV {
        "SIGSEGV"
    } else if sig == libc::SIGBUS {
        "SIGBUS"
    } else {
        "unknown"
    };
    // async-signal-unsafe logging is accepted here deliberately: the
    // process is already terminating and this mirrors the original
    // driver's handler, which logs before aborting.
    eprintln!("fatal {name} during MMIO access, aborting");
    unsafe { libc::abort() };
}

fn install_fatal_handlers() {
    INSTALL_HANDLERS.call_once(|| unsafe {
        libc::signal(libc::SIGSEGV, fatal_signal_handler as usize);
        libc::signal(libc::SIGBUS, fatal_signal_handler as usize);
    });
}

struct Mapping {
    ptr: *mut u8,
    len: usize,
    base: u64,
}

impl Mapping {
    fn open(path: &std::path::Path, base: u64, pages: usize) -> DriverResult<Self> {
        let len = pages * 4096;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| DriverError::DriverFileNotFound(format!("{}: {e}", path.display())))?;
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(DriverError::DriverWriteFailed(format!(
                "mmap failed for {}",
                path.display()
            )));
        }
        Ok(Mapping {
            ptr: ptr as *mut u8,
            len,
            base,
        })
    }

    fn index_of(&self, address: u64) -> DriverResult<usize> {
        if address < self.base {
            // Address-below-base is a fatal condition upstream, not a
            // recoverable error; the caller aborts before this returns.
            return Err(DriverError::InternalError(format!(
                "address {address:#x} below mapping base {:#x}",
                self.base
            )));
        }
        let idx = ((address - self.base) / 4) as usize;
        if idx * 4 + 4 > self.len {
            return Err(DriverError::InternalError(format!(
                "address {address:#x} outside mapped window"
            )));
        }
        Ok(idx)
    }

    fn write_word(&self, address: u64, data: u32) -> DriverResult<()> {
        let idx = self.index_of(address)?;
        unsafe {
            let word_ptr = self.ptr.add(idx * 4) as *mut u32;
            std::ptr::write_volatile(word_ptr, data.to_le());
        }
        Ok(())
    }

    fn read_word(&self, address: u64) -> DriverResult<u32> {
        let idx = self.index_of(address)?;
        let raw = unsafe {
            let word_ptr = self.ptr.add(idx * 4) as *const u32;
            std::ptr::read_volatile(word_ptr)
        };
        Ok(u32::from_le(raw))
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}

// Raw pointers are only ever dereferenced under `LIVE_BUS_LOCK`.
unsafe impl Send for Mapping {}

/// Maps the control-plane and fCore/ROM-plane device files at
/// architecture-specific base addresses and serializes access through a
/// process-wide mutex.
pub struct LiveBus {
    control: Mapping,
    fcore: Mapping,
}

impl LiveBus {
    pub fn open(config: &Config) -> DriverResult<Self> {
        install_fatal_handlers();
        let (control_base, fcore_base) = config.architecture.base_addresses();
        let control = Mapping::open(&config.control_device, control_base, config.control_map_pages)?;
        let fcore = Mapping::open(&config.fcore_device, fcore_base, config.fcore_map_pages)?;
        Ok(LiveBus { control, fcore })
    }
}

impl super::BusAccessor for LiveBus {
    fn write_register(&mut self, addresses: &[u64], data: u32) -> DriverResult<()> {
        let _guard = live_lock().lock().unwrap();
        match addresses {
            [addr] => self.control.write_word(*addr, data),
            [target, proxy_base] => {
                self.control.write_word(proxy_base + 4, *target)?;
                self.control.write_word(*proxy_base, data)
            }
            _ => Err(DriverError::InvalidArg(format!(
                "write_register expects 1 or 2 addresses, got {}",
                addresses.len()
            ))),
        }
    }

    fn read_register(&mut self, addresses: &[u64]) -> DriverResult<u32> {
        let _guard = live_lock().lock().unwrap();
        let addr = addresses
            .first()
            .ok_or_else(|| DriverError::InvalidArg("read_register requires an address".into()))?;
        self.control.read_word(*addr)
    }

    fn load_program(&mut self, address: u64, words: &[u32]) -> DriverResult<()> {
        let _guard = live_lock().lock().unwrap();
        for (i, word) in words.iter().enumerate() {
            self.fcore.write_word(address + 4 * i as u64, *word)?;
        }
        Ok(())
    }
}
