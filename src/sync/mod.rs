/*
 * Kernel synchronization primitives
 */

pub mod spinlock;

pub use spinlock::{IrqGuard, IrqSpinLock, IrqSpinLockGuard, RawSpinLockGuard, SpinLock};
