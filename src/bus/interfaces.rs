/*!
interfaces: the CPU-facing memory access trait and the serial MMIO view.

`BusAccess` is the seam between the CPU core and whatever backs its
address space: the real `Bus`, the serial-intercepting view below, or a
bare fixture in tests. The CPU's addressing and execution helpers are
generic over it.

`SerialBus` wraps a `Bus` together with the two host I/O queues and
intercepts the memory-mapped serial ports before the bus sees them:

- $D011 read: dequeue one byte from the input queue, 0x00 when empty.
  The guest cannot distinguish "no key" from a null byte; this matches
  the Apple-1-style convention the memory map is modeled on.
- $D012 write: enqueue on the output queue. The backing RAM byte at
  $D012 is never touched, so a later guest read cannot observe a stale
  character.

All other accesses pass straight through to the bus, including writes to
the monitored hook addresses ($6000..$6002), which keep their regular
bus write path.
*/

use std::sync::Arc;

use crate::bus::Bus;
use crate::bus::{SERIAL_IN_ADDR, SERIAL_OUT_ADDR};
use crate::queue::ByteQueue;

/// Byte-granular access to the CPU address space.
pub trait BusAccess {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);

    /// Read a little-endian 16-bit word at `addr`/`addr+1` (wrapping).
    #[inline]
    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }
}

impl BusAccess for Bus {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        Bus::read(self, addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        Bus::write(self, addr, value)
    }
}

/// Bus view with serial-port interception, used for every CPU access.
pub struct SerialBus<'a> {
    bus: &'a mut Bus,
    input: &'a Arc<ByteQueue>,
    output: &'a Arc<ByteQueue>,
}

impl<'a> SerialBus<'a> {
    pub fn new(bus: &'a mut Bus, input: &'a Arc<ByteQueue>, output: &'a Arc<ByteQueue>) -> Self {
        Self { bus, input, output }
    }
}

impl BusAccess for SerialBus<'_> {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        if addr == SERIAL_IN_ADDR {
            self.input.dequeue().unwrap_or(0x00)
        } else {
            self.bus.read(addr)
        }
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        if addr == SERIAL_OUT_ADDR {
            self.output.enqueue_lossy(value);
        } else {
            self.bus.write(addr, value);
        }
    }
}
