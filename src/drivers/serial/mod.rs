/*
 * Serial Communication Drivers
 *
 * UART drivers for the kernel's debug and panic output. Normal logging goes
 * through the mutex-protected port; the `raw` entry points below bypass every
 * lock and never allocate, so the fatal-exception path can use them from any
 * context, including with a wedged logger.
 */

use spin::Mutex;

#[cfg(target_arch = "x86_64")]
pub mod uart_16550;
#[cfg(target_arch = "aarch64")]
pub mod pl011;

#[cfg(target_arch = "x86_64")]
pub use uart_16550::SerialPort;
#[cfg(target_arch = "aarch64")]
pub use pl011::SerialPort;

/// I/O port of the primary debug UART (COM1).
#[cfg(target_arch = "x86_64")]
const DEBUG_PORT_BASE: u16 = 0x3F8;

/// MMIO base of the primary debug UART (QEMU virt PL011).
#[cfg(target_arch = "aarch64")]
const DEBUG_PORT_BASE: usize = 0x0900_0000;

/// Mutex-protected static instance of the debug serial port.
pub static DEBUG_PORT: Mutex<SerialPort> = Mutex::new(SerialPort::new(DEBUG_PORT_BASE));

/// Initializes the debug port for logging.
///
/// Must be called early in the boot process, before any logging occurs.
pub fn init_debug_port() {
    DEBUG_PORT.lock().init();
}

// ============================================================================
// RAW OUTPUT - lock-free, allocation-free, usable from the panic path
// ============================================================================

/// Writes one byte directly to the debug UART.
pub fn write_byte(b: u8) {
    let mut port = SerialPort::new(DEBUG_PORT_BASE);
    port.write(b);
}

/// Writes a string byte-by-byte directly to the debug UART.
pub fn write_string(s: &str) {
    let mut port = SerialPort::new(DEBUG_PORT_BASE);
    for b in s.bytes() {
        port.write(b);
    }
}

/// Writes a value in hexadecimal with a `0x` prefix, no leading zeros.
pub fn write_hex(value: u64) {
    let mut port = SerialPort::new(DEBUG_PORT_BASE);
    port.write(b'0');
    port.write(b'x');

    let mut started = false;
    for shift in (0..16).rev() {
        let nibble = ((value >> (shift * 4)) & 0xF) as u8;
        if nibble != 0 {
            started = true;
        }
        if started || shift == 0 {
            let digit = match nibble {
                0..=9 => b'0' + nibble,
                _ => b'A' + nibble - 10,
            };
            port.write(digit);
        }
    }
}

/// `fmt::Write` adapter over the raw path, for the panic handler.
pub struct RawWriter;

impl core::fmt::Write for RawWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        write_string(s);
        Ok(())
    }
}

/// Writes a value in decimal.
pub fn write_number(value: u64) {
    let mut port = SerialPort::new(DEBUG_PORT_BASE);

    // 20 digits cover u64::MAX
    let mut digits = [0u8; 20];
    let mut n = value;
    let mut len = 0;
    loop {
        digits[len] = b'0' + (n % 10) as u8;
        n /= 10;
        len += 1;
        if n == 0 {
            break;
        }
    }
    while len > 0 {
        len -= 1;
        port.write(digits[len]);
    }
}
