use bitflags::bitflags;

use crate::io::{Io, Pio, ReadOnly};

bitflags! {
    /// Line status flags
    struct LineStsFlags: u8 {
        const INPUT_FULL = 1;
        // 1 to 4 unknown
        const OUTPUT_EMPTY = 1 << 5;
        // 6 and 7 unknown
    }
}

/// 16550-compatible serial port register file.
pub struct SerialPort {
    data: Pio<u8>,       // Data register, read to receive, write to send
    int_en: Pio<u8>,     // Interrupt enable
    fifo_ctrl: Pio<u8>,  // FIFO control
    line_ctrl: Pio<u8>,  // Line control
    modem_ctrl: Pio<u8>, // Modem control
    line_sts: ReadOnly<Pio<u8>>, // Line status
}

impl SerialPort {
    /// Creates a serial port instance for the given base I/O port.
    pub const fn new(base: u16) -> SerialPort {
        SerialPort {
            data: Pio::new(base),
            int_en: Pio::new(base + 1),
            fifo_ctrl: Pio::new(base + 2),
            line_ctrl: Pio::new(base + 3),
            modem_ctrl: Pio::new(base + 4),
            line_sts: ReadOnly::new(Pio::new(base + 5)),
        }
    }

    /// Initializes the port: 38400 baud, 8N1, FIFOs enabled, interrupts off.
    pub fn init(&mut self) {
        self.int_en.write(0x00);
        self.line_ctrl.write(0x80); // DLAB on
        self.data.write(0x03); // divisor low: 38400 baud
        self.int_en.write(0x00); // divisor high
        self.line_ctrl.write(0x03); // 8 bits, no parity, one stop
        self.fifo_ctrl.write(0xC7);
        self.modem_ctrl.write(0x0B);
    }

    fn line_sts(&self) -> LineStsFlags {
        LineStsFlags::from_bits_truncate(self.line_sts.read())
    }

    /// Transmits one raw byte, spinning until the transmit FIFO drains.
    pub fn send(&mut self, data: u8) {
        while !self.line_sts().contains(LineStsFlags::OUTPUT_EMPTY) {}
        self.data.write(data)
    }

    /// Writes a byte with newline translation for terminal output.
    pub fn write(&mut self, b: u8) {
        match b {
            b'\n' => {
                self.send(b'\r');
                self.send(b'\n');
            }
            _ => {
                self.send(b);
            }
        }
    }
}

impl core::fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for b in s.bytes() {
            self.write(b);
        }
        Ok(())
    }
}
