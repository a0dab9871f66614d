/*
 * Spinlock and Interrupt-Mask Scope
 *
 * The kernel's locking discipline has two layers:
 *
 * - `SpinLock`: a bare test-and-set word with a pause hint. Not reentrant.
 * - `IrqGuard`: a stackable per-CPU interrupt-disable scope. Nested guards
 *   count; only the outermost drop restores the saved interrupt flag.
 * - `IrqSpinLock<T>`: the combination used for data that IRQ handlers also
 *   touch. `lock()` masks interrupts on the current CPU before taking the
 *   lock word, which is the invariant the whole kernel relies on: a lock
 *   holder on a CPU can never be interrupted by a handler that would spin
 *   on the same lock.
 */

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::arch;
use crate::config::MAX_CPUS;

/// Bare test-and-set spinlock.
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    pub const fn new() -> SpinLock {
        SpinLock {
            locked: AtomicBool::new(false),
        }
    }

    /// Spins until the lock is acquired.
    pub fn acquire(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// Attempts to acquire the lock without spinning.
    pub fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

// ============================================================================
// INTERRUPT-MASK SCOPE
// ============================================================================

const ZERO: AtomicUsize = AtomicUsize::new(0);
const CLEAR: AtomicBool = AtomicBool::new(false);

/// Per-CPU nesting depth of active `IrqGuard`s.
static IRQ_DEPTH: [AtomicUsize; MAX_CPUS] = [ZERO; MAX_CPUS];

/// Per-CPU interrupt flag saved by the outermost guard.
static SAVED_IF: [AtomicBool; MAX_CPUS] = [CLEAR; MAX_CPUS];

/// RAII scope that masks interrupts on the current CPU.
///
/// Guards stack: the interrupt flag observed by the outermost guard is
/// restored when the last guard on this CPU drops. These counters are only
/// ever touched from their own CPU, with interrupts masked for the whole
/// nested region.
pub struct IrqGuard {
    cpu: usize,
}

impl IrqGuard {
    pub fn new() -> IrqGuard {
        let were_enabled = arch::interrupts_enabled();
        arch::disable_interrupts();

        let cpu = arch::cpu_id();
        if IRQ_DEPTH[cpu].load(Ordering::Relaxed) == 0 {
            SAVED_IF[cpu].store(were_enabled, Ordering::Relaxed);
        }
        IRQ_DEPTH[cpu].fetch_add(1, Ordering::Relaxed);

        IrqGuard { cpu }
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        let depth = IRQ_DEPTH[self.cpu].fetch_sub(1, Ordering::Relaxed);
        debug_assert!(depth > 0, "unbalanced IrqGuard drop");

        if depth == 1 && SAVED_IF[self.cpu].load(Ordering::Relaxed) {
            arch::enable_interrupts();
        }
    }
}

// ============================================================================
// IRQ-SAFE LOCKED CELL
// ============================================================================

/// A value guarded by a spinlock that is also touched from IRQ context.
pub struct IrqSpinLock<T> {
    lock: SpinLock,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for IrqSpinLock<T> {}
unsafe impl<T: Send> Send for IrqSpinLock<T> {}

impl<T> IrqSpinLock<T> {
    pub const fn new(data: T) -> IrqSpinLock<T> {
        IrqSpinLock {
            lock: SpinLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires the lock for a non-IRQ path.
    ///
    /// Interrupts on this CPU are masked for the lifetime of the guard, so
    /// an IRQ handler can never observe the critical section half-done.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T> {
        let irq = IrqGuard::new();
        self.lock.acquire();
        IrqSpinLockGuard { cell: self, _irq: irq }
    }

    /// Acquires only the lock word, without touching the interrupt flag.
    ///
    /// For IRQ handlers, where interrupts are already masked by the
    /// interrupt gate: taking an `IrqGuard` would be redundant, but the lock
    /// word must still be held against other CPUs.
    pub fn lock_from_irq(&self) -> RawSpinLockGuard<'_, T> {
        self.lock.acquire();
        RawSpinLockGuard { cell: self }
    }

    /// Non-spinning variant of `lock_from_irq`.
    ///
    /// An IRQ path that already holds its own CPU's lock must not spin on a
    /// sibling's (two CPUs doing so against each other would never return);
    /// a contended sibling is simply skipped.
    pub fn try_lock_from_irq(&self) -> Option<RawSpinLockGuard<'_, T>> {
        if self.lock.try_acquire() {
            Some(RawSpinLockGuard { cell: self })
        } else {
            None
        }
    }

    /// Returns the protected value without taking the lock.
    ///
    /// # Safety
    ///
    /// The caller must rule out concurrent mutation by other means: the
    /// scheduler uses this only for data that becomes effectively read-only
    /// once the system is live.
    pub unsafe fn raw(&self) -> &T {
        unsafe { &*self.data.get() }
    }
}

/// Guard for the scoped (non-IRQ) acquire.
pub struct IrqSpinLockGuard<'a, T> {
    cell: &'a IrqSpinLock<T>,
    _irq: IrqGuard,
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.cell.data.get() }
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.cell.data.get() }
    }
}

impl<T> Drop for IrqSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Lock released before the IrqGuard re-enables interrupts.
        self.cell.lock.release();
    }
}

/// Guard for the IRQ-context acquire.
pub struct RawSpinLockGuard<'a, T> {
    cell: &'a IrqSpinLock<T>,
}

impl<T> Deref for RawSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.cell.data.get() }
    }
}

impl<T> DerefMut for RawSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.cell.data.get() }
    }
}

impl<T> Drop for RawSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.cell.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_cycle() {
        let lock = SpinLock::new();
        assert!(!lock.is_locked());

        lock.acquire();
        assert!(lock.is_locked());
        assert!(!lock.try_acquire());

        lock.release();
        assert!(!lock.is_locked());
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    fn contended_try_acquire_fails() {
        let lock = SpinLock::new();
        assert!(lock.try_acquire());
        assert!(!lock.try_acquire());
        lock.release();
        assert!(lock.try_acquire());
        lock.release();
    }
}
