/*
 * Preemptive Scheduler
 *
 * The multitasking runtime: thread control blocks, per-CPU scheduler state,
 * the pluggable policy interface, and the manager facade the rest of the
 * kernel calls. Context switches ride the interrupt return path: the
 * scheduler never switches stacks itself, it publishes a per-CPU pending
 * switch record that the interrupt dispatcher consumes exactly once per
 * dispatch.
 *
 * Locking: every non-IRQ mutation of a CPU's state (and of any thread owned
 * by that CPU) happens under that CPU's spinlock with interrupts masked.
 * The IRQ path takes only the bare lock word - interrupts are already
 * masked by the interrupt gate - so it can never deadlock against a local
 * lock holder, and remote holders only ever keep the lock for short
 * critical sections.
 */

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::MAX_CPUS;

pub mod manager;
pub mod percpu;
pub mod policies;
pub mod policy;
pub mod thread;

pub use manager::SchedulerManager;
pub use percpu::PerCpuState;
pub use policy::SchedPolicy;
pub use thread::{Thread, ThreadEntry, ThreadFlags, ThreadId, ThreadState};

/// Errors surfaced by the scheduler facade.
///
/// Invariant violations (using the scheduler before `initialize`, waking a
/// dead thread) are programmer errors and panic instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// The scheduler (or the requested operation) is not enabled.
    Disabled,
    /// Stack or bookkeeping allocation failed; nothing was published.
    OutOfMemory,
    /// No thread with that id on the addressed CPU.
    NoSuchThread,
    /// The thread's state does not admit the requested transition.
    BadState,
    /// CPU id outside the initialized range.
    BadCpu,
    /// No scheduling policy installed.
    NoPolicy,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SchedError::Disabled => "scheduler disabled",
            SchedError::OutOfMemory => "out of memory",
            SchedError::NoSuchThread => "no such thread",
            SchedError::BadState => "invalid thread state for operation",
            SchedError::BadCpu => "CPU id out of range",
            SchedError::NoPolicy => "no scheduling policy installed",
        };
        f.write_str(msg)
    }
}

// ============================================================================
// PENDING SWITCH PUBLICATION
// ============================================================================

/// A context switch the scheduler has decided on but the dispatcher has not
/// yet applied.
#[derive(Debug, Clone, Copy)]
pub struct PendingSwitch {
    /// Stack pointer of the target thread's saved context.
    pub stack_pointer: u64,
    /// Whether the target has never been dispatched before.
    pub new_thread: bool,
}

struct PendingSlot {
    stack_pointer: AtomicU64,
    new_thread: AtomicBool,
}

const EMPTY_SLOT: PendingSlot = PendingSlot {
    stack_pointer: AtomicU64::new(0),
    new_thread: AtomicBool::new(false),
};

/// Per-CPU two-word publication record. Written only with interrupts masked
/// on the owning CPU, consumed exactly once per dispatch.
static PENDING: [PendingSlot; MAX_CPUS] = [EMPTY_SLOT; MAX_CPUS];

/// Publishes a switch for the dispatcher to apply on interrupt return.
///
/// Must only be called from IRQ context on `cpu`, after every observable
/// field of the target thread has been updated: the stub runs immediately
/// after the dispatcher returns and will land on the target context.
pub(crate) fn publish_pending_switch(cpu: usize, stack_pointer: u64, new_thread: bool) {
    PENDING[cpu].new_thread.store(new_thread, Ordering::Relaxed);
    PENDING[cpu].stack_pointer.store(stack_pointer, Ordering::Release);
}

/// Consumes the pending switch for this CPU, if one was published.
pub fn take_pending_switch(cpu: usize) -> Option<PendingSwitch> {
    let stack_pointer = PENDING[cpu].stack_pointer.swap(0, Ordering::Acquire);
    if stack_pointer == 0 {
        return None;
    }
    Some(PendingSwitch {
        stack_pointer,
        new_thread: PENDING[cpu].new_thread.load(Ordering::Relaxed),
    })
}

// ============================================================================
// CPU LOAD GAUGES
// ============================================================================

const ZERO: AtomicU64 = AtomicU64::new(0);

/// Lock-free per-CPU load advertisements, maintained by the active policy
/// and read by `select_cpu` without touching remote locks.
static CPU_LOAD: [AtomicU64; MAX_CPUS] = [ZERO; MAX_CPUS];

pub(crate) fn load_add(cpu: usize, amount: u64) {
    CPU_LOAD[cpu].fetch_add(amount, Ordering::Relaxed);
}

pub(crate) fn load_sub(cpu: usize, amount: u64) {
    CPU_LOAD[cpu].fetch_sub(amount, Ordering::Relaxed);
}

pub(crate) fn load_set(cpu: usize, amount: u64) {
    CPU_LOAD[cpu].store(amount, Ordering::Relaxed);
}

pub fn load_of(cpu: usize) -> u64 {
    CPU_LOAD[cpu].load(Ordering::Relaxed)
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Snapshot of one thread's accounting, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ThreadStats {
    pub id: ThreadId,
    pub state: ThreadState,
    pub total_runtime_ticks: u64,
    pub runtime_percent: u64,
}
