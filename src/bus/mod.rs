#![doc = r#"
Bus module: address routing façade and memory devices.

Overview
- `Bus`: ordered routing table dispatching reads/writes to devices by
  address range. First match in insertion order wins; unmapped addresses
  read 0xFF and drop writes (open-bus convention).
- `device`: the `Device` variants (`Ram`, `MonitoredRam`) the table routes to.
- `monitored`: the 64 KiB monitored RAM with write-side output/status hooks.
- `interfaces`: `BusAccess` trait and the `SerialBus` MMIO-intercepting view
  the CPU core uses for every memory access.

Memory map (default configuration)
- $0000-$FFFF  monitored RAM (single full-range device)
- $6000/$6001/$6002  monitored character/status hooks (inside the RAM device)
- $D011/$D012  serial input/output, intercepted before the bus by `SerialBus`
- $FFFA/B NMI vector, $FFFC/D RESET vector, $FFFE/F IRQ/BRK vector

Overlap between routing entries is not detected; callers are expected to
partition ranges. The table holds at most `MAX_DEVICES` entries.
"#]

pub mod device;
pub mod interfaces;
pub mod monitored;

pub use device::{Device, Ram};
pub use interfaces::{BusAccess, SerialBus};
pub use monitored::{CHAR_OUT_ADDR, EXTRA_STATUS_ADDR, MonitoredRam, TEST_STATUS_ADDR};

use crate::error::{EmuError, Result};

/// Memory-mapped serial input port (read-intercepted).
pub const SERIAL_IN_ADDR: u16 = 0xD011;
/// Memory-mapped serial output port (write-intercepted).
pub const SERIAL_OUT_ADDR: u16 = 0xD012;

/// NMI vector location (little-endian).
pub const NMI_VECTOR: u16 = 0xFFFA;
/// RESET vector location (little-endian).
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK vector location (little-endian).
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Maximum number of routing entries a bus accepts.
pub const MAX_DEVICES: usize = 16;

struct Entry {
    start: u16,
    end: u16,
    device: Device,
}

/// Ordered address-range router over memory devices.
///
/// The bus owns its devices; routing is configured once at startup and
/// treated as immutable afterwards, with device bytes mutated only
/// through `write`.
#[derive(Default)]
pub struct Bus {
    entries: Vec<Entry>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a routing entry covering `start..=end`.
    ///
    /// Fails with `BusFull` once `MAX_DEVICES` entries exist and with
    /// `InvalidArgument` when the range is inverted. Overlaps are
    /// accepted; the earliest matching entry wins on access.
    pub fn connect(&mut self, device: Device, start: u16, end: u16) -> Result<()> {
        if start > end {
            return Err(EmuError::InvalidArgument("device range start > end"));
        }
        if self.entries.len() >= MAX_DEVICES {
            return Err(EmuError::BusFull);
        }
        self.entries.push(Entry { start, end, device });
        Ok(())
    }

    /// Read the byte at `addr` from the first matching device, or 0xFF
    /// when no device covers the address.
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        for entry in &self.entries {
            if addr >= entry.start && addr <= entry.end {
                return entry.device.read(addr);
            }
        }
        0xFF
    }

    /// Write the byte at `addr` to the first matching device; silently
    /// dropped when no device covers the address.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        for entry in &mut self.entries {
            if addr >= entry.start && addr <= entry.end {
                entry.device.write(addr, value);
                return;
            }
        }
    }

    /// Read a little-endian word at `addr`/`addr+1` (wrapping at 0xFFFF).
    #[inline]
    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Number of connected routing entries.
    pub fn device_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ByteQueue;
    use std::sync::Arc;

    fn monitored() -> Device {
        Device::Monitored(MonitoredRam::new(Arc::new(ByteQueue::new())))
    }

    #[test]
    fn unmapped_reads_ff_and_drops_writes() {
        let mut bus = Bus::new();
        assert_eq!(bus.read(0x1234), 0xFF);
        bus.write(0x1234, 0x42); // dropped, no panic
        assert_eq!(bus.read(0x1234), 0xFF);
    }

    #[test]
    fn routes_to_connected_device() {
        let mut bus = Bus::new();
        bus.connect(monitored(), 0x0000, 0xFFFF).unwrap();
        bus.write(0x0200, 0x42);
        assert_eq!(bus.read(0x0200), 0x42);
    }

    #[test]
    fn first_match_wins() {
        let mut bus = Bus::new();
        bus.connect(Device::Ram(Ram::new(0x100).unwrap()), 0x0000, 0x00FF)
            .unwrap();
        bus.connect(monitored(), 0x0000, 0xFFFF).unwrap();
        bus.write(0x0010, 0x11);
        // The write landed in the small RAM, not the monitored store.
        assert_eq!(bus.read(0x0010), 0x11);
        bus.write(0x0100, 0x22);
        assert_eq!(bus.read(0x0100), 0x22);
    }

    #[test]
    fn inverted_range_rejected() {
        let mut bus = Bus::new();
        assert!(bus.connect(monitored(), 0x2000, 0x1000).is_err());
    }

    #[test]
    fn table_capacity_enforced() {
        let mut bus = Bus::new();
        for i in 0..MAX_DEVICES {
            let start = (i * 0x100) as u16;
            bus.connect(
                Device::Ram(Ram::new(0x100).unwrap()),
                start,
                start + 0x00FF,
            )
            .unwrap();
        }
        let overflow = bus.connect(Device::Ram(Ram::new(0x100).unwrap()), 0xF000, 0xF0FF);
        assert!(matches!(overflow, Err(EmuError::BusFull)));
    }

    #[test]
    fn read_word_is_little_endian_and_wraps() {
        let mut bus = Bus::new();
        bus.connect(monitored(), 0x0000, 0xFFFF).unwrap();
        bus.write(0xFFFC, 0x34);
        bus.write(0xFFFD, 0x12);
        assert_eq!(bus.read_word(0xFFFC), 0x1234);
        bus.write(0xFFFF, 0x78);
        bus.write(0x0000, 0x56);
        assert_eq!(bus.read_word(0xFFFF), 0x5678);
    }
}
