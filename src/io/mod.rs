/*
 * Low-level I/O support
 */

#[cfg(target_arch = "x86_64")]
pub mod pio;

#[cfg(target_arch = "x86_64")]
pub use pio::{Io, Pio, ReadOnly};
