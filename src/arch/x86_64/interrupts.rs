/*
 * Interrupt flag control
 *
 * Thin wrappers over the x86_64 interrupt instructions. The stackable
 * masking discipline lives in `sync::spinlock`; these are its primitives.
 */

use x86_64::instructions::interrupts;

/// Enable interrupts globally on the current CPU.
pub fn enable() {
    interrupts::enable();
}

/// Disable interrupts globally on the current CPU.
pub fn disable() {
    interrupts::disable();
}

/// Whether interrupts are currently enabled on this CPU.
pub fn are_enabled() -> bool {
    interrupts::are_enabled()
}

/// Executes a closure with interrupts disabled.
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    interrupts::without_interrupts(f)
}
