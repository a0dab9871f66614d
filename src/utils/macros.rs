/// Formatted print to the debug serial port.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => ({
        use core::fmt::Write;
        let _ = $crate::drivers::serial::DEBUG_PORT
            .lock()
            .write_fmt(format_args!($($arg)*));
    });
}

/// Formatted print with trailing newline to the debug serial port.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::serial_print!(concat!($fmt, "\n"), $($arg)*));
}
