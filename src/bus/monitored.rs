/*!
Monitored RAM: the default full-address-space memory device.

A 64 KiB byte store whose writes to three designated addresses carry
side effects on the serial output queue, in addition to always updating
the backing store:

- $6000: raw character sink; the written byte is forwarded as-is.
- $6001: primary test status; 0x00 reports PASSED, anything else FAILED.
- $6002: additional test status; non-zero failures carry the code in hex.

These hooks are how guest test ROMs (Klaus Dormann's functional test and
friends) report progress to the host without any I/O hardware. Reads
have no side effects. Enqueue failures are dropped silently; the guest
cannot observe host backpressure.
*/

use std::sync::Arc;

use crate::queue::ByteQueue;

/// Character output sink hook address.
pub const CHAR_OUT_ADDR: u16 = 0x6000;
/// Primary test status hook address.
pub const TEST_STATUS_ADDR: u16 = 0x6001;
/// Additional test status hook address.
pub const EXTRA_STATUS_ADDR: u16 = 0x6002;

const TEST_PASSED_MSG: &[u8] = b"6502 FUNCTIONAL TEST PASSED\r\n";
const TEST_FAILED_MSG: &[u8] = b"6502 FUNCTIONAL TEST FAILED\r\n";
const EXTRA_PASSED_MSG: &[u8] = b"ADDITIONAL TEST PASSED\n";

/// 64 KiB store with write-side status/character hooks.
pub struct MonitoredRam {
    data: Box<[u8; 0x1_0000]>,
    output: Arc<ByteQueue>,
}

impl MonitoredRam {
    /// Create a zero-filled monitored RAM reporting into `output`.
    pub fn new(output: Arc<ByteQueue>) -> Self {
        Self {
            data: vec![0u8; 0x1_0000]
                .into_boxed_slice()
                .try_into()
                .unwrap_or_else(|_| unreachable!("allocation is exactly 64 KiB")),
            output,
        }
    }

    /// Read the stored byte. No side effects.
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    /// Store the byte, then dispatch the monitored-address hooks.
    pub fn write(&mut self, addr: u16, value: u8) {
        self.data[addr as usize] = value;
        match addr {
            CHAR_OUT_ADDR => self.output.enqueue_lossy(value),
            TEST_STATUS_ADDR => {
                let msg = if value == 0x00 {
                    TEST_PASSED_MSG
                } else {
                    TEST_FAILED_MSG
                };
                self.output.enqueue_all_lossy(msg);
            }
            EXTRA_STATUS_ADDR => {
                if value == 0x00 {
                    self.output.enqueue_all_lossy(EXTRA_PASSED_MSG);
                } else {
                    let msg = format!("ADDITIONAL TEST FAILED: CODE 0x{value:02X}\n");
                    self.output.enqueue_all_lossy(msg.as_bytes());
                }
            }
            _ => {}
        }
    }
}
