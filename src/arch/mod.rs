/*
 * Architecture Selection
 *
 * Exactly one architecture module is compiled in; its surface is re-exported
 * here so the rest of the kernel stays architecture-agnostic. Both provide
 * the same items: `ThreadContext` with its `initialize` constructor, CPU
 * identification, interrupt-flag control, the tick device, and the
 * interrupt-controller delegation used by the interrupt manager.
 */

#[cfg(target_arch = "x86_64")]
pub mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use self::x86_64::*;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use self::aarch64::*;

/// What the dispatcher learned from classifying a trap: the routing-table
/// vector, and the controller acknowledge token to complete later (the
/// controller's sentinel when no acknowledge is pending).
pub struct IrqInfo {
    pub vector: u16,
    pub ack: u32,
}
