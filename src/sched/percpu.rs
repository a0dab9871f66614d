/*
 * Per-CPU Scheduler State
 *
 * Everything one CPU's scheduling depends on, guarded by one spinlock in
 * the manager. Threads live in the owning CPU's map; a thread moves between
 * maps only through the migration path, under both CPUs' locks.
 */

use alloc::collections::BTreeMap;

use super::policies::CpuPolicyExt;
use super::thread::{Thread, ThreadId};

/// Dead threads parked here until a non-IRQ path reclaims their stacks.
/// Sized generously; overflow leaks the thread and is counted.
pub const GRAVEYARD_CAPACITY: usize = 16;

/// Read-only view of a sibling CPU's scheduler state, captured for the
/// policy's balance hook. A snapshot is taken under the sibling's lock but
/// outlives it, so the hook can inspect every other CPU without the manager
/// holding two per-CPU locks across a policy call.
#[derive(Debug, Clone, Copy)]
pub struct CpuSnapshot {
    pub cpu_id: usize,
    /// Advertised load (the ticket total, for the stride policy).
    pub load: u64,
    /// Runnable threads queued at snapshot time.
    pub queued: usize,
    /// Threads owned by the CPU, including idle and the unreaped dead.
    pub thread_count: usize,
}

pub struct PerCpuState {
    pub cpu_id: usize,

    /// Currently running thread. `None` only between `initialize` and
    /// `setup_idle_thread`.
    pub current: Option<ThreadId>,

    /// The pinned, never-dying idle thread installed at bring-up.
    pub idle: Option<ThreadId>,

    /// Timer tick most recently observed on this CPU.
    pub last_tick_at: u64,

    /// Threads owned by this CPU, including idle and the dead-but-unreaped.
    pub threads: BTreeMap<ThreadId, Thread>,

    /// Dead threads awaiting stack reclamation. Never drained from IRQ
    /// context and never on the dying thread's own stack.
    pub graveyard: heapless::Vec<Thread, GRAVEYARD_CAPACITY>,

    /// Threads lost to a full graveyard.
    pub leaked_threads: u64,

    /// Policy extension slot; owned by the active policy between
    /// `initialize_cpu` and `shutdown_cpu`.
    pub ext: CpuPolicyExt,
}

impl PerCpuState {
    pub fn new(cpu_id: usize) -> PerCpuState {
        PerCpuState {
            cpu_id,
            current: None,
            idle: None,
            last_tick_at: 0,
            threads: BTreeMap::new(),
            graveyard: heapless::Vec::new(),
            leaked_threads: 0,
            ext: CpuPolicyExt::None,
        }
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(&id)
    }

    /// Captures the balance-hook view of this CPU.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            cpu_id: self.cpu_id,
            load: super::load_of(self.cpu_id),
            queued: self.ext.queued_len(),
            thread_count: self.threads.len(),
        }
    }

    /// Parks a dead thread for later reclamation.
    pub fn bury(&mut self, thread: Thread) {
        if let Err(thread) = self.graveyard.push(thread) {
            // Graveyard full: the stack leaks rather than being freed from
            // a context that must not touch the allocator.
            self.leaked_threads += 1;
            core::mem::forget(thread);
        }
    }
}
