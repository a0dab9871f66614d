/*
 * Port I/O Primitives
 *
 * Typed wrappers around the x86 IN/OUT instructions. Device drivers build
 * register files out of `Pio` cells instead of issuing raw port accesses.
 */

use core::{arch::asm, marker::PhantomData};

/// I/O cell interface shared by the port-mapped register files below.
pub trait Io {
    type Value: Copy
        + PartialEq
        + core::ops::BitAnd<Output = Self::Value>
        + core::ops::BitOr<Output = Self::Value>
        + core::ops::Not<Output = Self::Value>;

    fn read(&self) -> Self::Value;
    fn write(&mut self, value: Self::Value);

    /// Reads the cell and checks whether all of `flags` are set.
    fn readf(&self, flags: Self::Value) -> bool {
        (self.read() & flags) == flags
    }
}

/// Read-only view of an I/O cell.
pub struct ReadOnly<I> {
    inner: I,
}

impl<I> ReadOnly<I> {
    pub const fn new(inner: I) -> ReadOnly<I> {
        ReadOnly { inner }
    }
}

impl<I: Io> ReadOnly<I> {
    #[inline(always)]
    pub fn read(&self) -> I::Value {
        self.inner.read()
    }

    pub fn readf(&self, flags: I::Value) -> bool {
        self.inner.readf(flags)
    }
}

/// A single port-mapped I/O cell.
#[derive(Copy, Clone)]
pub struct Pio<T> {
    port: u16,
    value: PhantomData<T>,
}

impl<T> Pio<T> {
    pub const fn new(port: u16) -> Self {
        Pio::<T> {
            port,
            value: PhantomData,
        }
    }
}

impl Io for Pio<u8> {
    type Value = u8;

    #[inline(always)]
    fn read(&self) -> u8 {
        let value: u8;
        unsafe {
            asm!("in al, dx", in("dx") self.port, out("al") value, options(nostack, nomem, preserves_flags));
        }
        value
    }

    #[inline(always)]
    fn write(&mut self, value: u8) {
        unsafe {
            asm!("out dx, al", in("dx") self.port, in("al") value, options(nostack, nomem, preserves_flags));
        }
    }
}
