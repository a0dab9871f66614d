use core::fmt::Write;

use log::{Level, LevelFilter, Metadata, Record};

/// Logger implementation printing to the debug serial port.
struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            serial_println!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Initializes the logger and optionally clears the terminal.
///
/// # Panics
///
/// Panics if a logger has already been installed.
pub fn init(clearscr: bool) {
    if clearscr {
        let _ = crate::drivers::serial::DEBUG_PORT
            .lock()
            .write_str("\u{001B}[2J\u{001B}[H");
    }

    let logger_init_result =
        log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Info));

    match logger_init_result {
        Ok(_) => serial_println!("Logger initialized"),
        Err(err) => panic!("Error initializing logger: {}", err),
    }
}
