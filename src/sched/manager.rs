/*
 * Scheduler Manager
 *
 * The process-wide facade over the per-CPU scheduler state and the active
 * policy. Two kinds of entry points live here:
 *
 * - Thread-context operations (create, ready, block, sleep, exit, priority,
 *   migrate): acquire the target CPU's spinlock under an interrupt-mask
 *   scope, apply the state transition, then run the policy hook - the
 *   policy never observes a half-applied transition.
 *
 * - IRQ-context operations (`on_timer_interrupt`, the switch decision):
 *   run with interrupts already masked, take only the bare lock word, and
 *   hand the chosen context switch to the interrupt dispatcher through the
 *   per-CPU pending-switch record. Publication happens only after every
 *   observable field of the target thread is updated, because the stub
 *   consumes the record immediately after the dispatcher returns.
 *
 * Policy installation happens under the global scheduler lock and only
 * while the scheduler is down; once it is enabled, the policy reference is
 * read-only and the IRQ path reads it without locking.
 */

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::arch::{self, ThreadContext};
use crate::config::{MAX_CPUS, THREAD_STACK_SIZE};
use crate::interrupts;
use crate::sync::{IrqSpinLock, SpinLock};
use crate::utils::timer;

use super::percpu::{CpuSnapshot, PerCpuState};
use super::policy::SchedPolicy;
use super::thread::{Thread, ThreadEntry, ThreadId, ThreadState};
use super::{SchedError, ThreadStats, publish_pending_switch};

static SCHED_ENABLED: AtomicBool = AtomicBool::new(false);
static CPU_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Kernel-wide thread id counter. A single atomic: ids are unique across
/// CPUs by construction.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Global scheduler lock, held only while installing a policy.
static GLOBAL_SCHED_LOCK: SpinLock = SpinLock::new();

/// Ticks between invocations of the policy's balance hook.
const BALANCE_INTERVAL_TICKS: u64 = 128;

/// The active scheduling policy. Mutated only under the global lock before
/// `enable`; the IRQ path reads it lock-free afterwards.
static POLICY: IrqSpinLock<Option<Box<dyn SchedPolicy>>> = IrqSpinLock::new(None);

/// Per-CPU scheduler state, one spinlock each.
static CPUS: [IrqSpinLock<Option<PerCpuState>>; MAX_CPUS] =
    [const { IrqSpinLock::new(None) }; MAX_CPUS];

fn cpu_count() -> usize {
    CPU_COUNT.load(Ordering::Acquire)
}

fn check_initialized() {
    // Using the scheduler before initialize() is a kernel bug, not a
    // recoverable condition.
    assert!(cpu_count() > 0, "scheduler used before initialization");
}

fn check_cpu(cpu: usize) -> Result<(), SchedError> {
    check_initialized();
    if cpu >= cpu_count() {
        return Err(SchedError::BadCpu);
    }
    Ok(())
}

fn allocate_thread_id() -> ThreadId {
    ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
}

/// Threads whose entry function returns land here via the synthesized
/// return address; the thread then terminates normally.
pub extern "C" fn thread_exit_landing() -> ! {
    SchedulerManager::exit_current()
}

/// Handler bound to the voluntary-switch vector. Identical to the timer
/// path except the reschedule is unconditional.
fn yield_interrupt_handler(ctx: &mut ThreadContext) {
    SchedulerManager::schedule_from_interrupt(
        arch::cpu_id(),
        ctx as *mut ThreadContext as u64,
    );
}

/// Scheduling control and thread lifecycle operations.
///
/// A zero-sized namespace over the scheduler's global state, in the style
/// of the other kernel component managers.
pub struct SchedulerManager;

impl SchedulerManager {
    // ========================================================================
    // BRING-UP
    // ========================================================================

    /// Allocates the per-CPU state array. Must be called exactly once,
    /// before any other scheduler operation.
    pub fn initialize(cpus: usize) {
        assert!(
            cpus >= 1 && cpus <= MAX_CPUS,
            "CPU count {} outside supported range",
            cpus
        );
        assert!(cpu_count() == 0, "scheduler initialized twice");

        for cpu in 0..cpus {
            *CPUS[cpu].lock() = Some(PerCpuState::new(cpu));
        }
        CPU_COUNT.store(cpus, Ordering::Release);

        log::info!("Scheduler initialized for {} CPU(s)", cpus);
    }

    /// Installs (or replaces) the scheduling policy.
    ///
    /// Held under the global scheduler lock. Replacement shuts down the old
    /// policy's per-CPU slots first. Hot swap while threads run is not
    /// supported: after `enable` this returns an error.
    pub fn set_scheduler(policy: Box<dyn SchedPolicy>) -> Result<(), SchedError> {
        check_initialized();
        if Self::is_enabled() {
            return Err(SchedError::BadState);
        }

        GLOBAL_SCHED_LOCK.acquire();
        let name = policy.name();

        let mut slot = POLICY.lock();
        if let Some(old) = slot.as_ref() {
            for cpu in 0..cpu_count() {
                let mut guard = CPUS[cpu].lock();
                old.shutdown_cpu(guard.as_mut().expect("per-CPU state missing"));
            }
        }
        for cpu in 0..cpu_count() {
            let mut guard = CPUS[cpu].lock();
            policy.initialize_cpu(guard.as_mut().expect("per-CPU state missing"));
        }
        *slot = Some(policy);
        drop(slot);

        GLOBAL_SCHED_LOCK.release();
        log::info!("Scheduling policy installed: {}", name);
        Ok(())
    }

    /// Installs the idle thread for a CPU, adopting the stack that CPU is
    /// booting on. The current thread becomes the idle thread.
    ///
    /// Must run for every CPU strictly before `enable`, so no timer tick
    /// can observe a CPU without a current thread.
    pub fn setup_idle_thread(
        cpu: usize,
        stack_base: u64,
        stack_size: usize,
    ) -> Result<ThreadId, SchedError> {
        check_cpu(cpu)?;

        let mut guard = CPUS[cpu].lock();
        let state = guard.as_mut().expect("per-CPU state missing");
        if state.idle.is_some() {
            return Err(SchedError::BadState);
        }

        let id = allocate_thread_id();
        let idle = Thread::adopt_boot_stack(id, cpu, stack_base, stack_size);
        state.threads.insert(id, idle);
        state.idle = Some(id);
        state.current = Some(id);

        log::info!("CPU {}: idle thread installed ({})", cpu, id);
        Ok(id)
    }

    /// Enables preemption. After this returns, timer ticks switch contexts.
    pub fn enable() {
        check_initialized();
        assert!(
            unsafe { POLICY.raw() }.is_some(),
            "enable() before set_scheduler()"
        );
        for cpu in 0..cpu_count() {
            let guard = CPUS[cpu].lock();
            assert!(
                guard.as_ref().is_some_and(|s| s.idle.is_some()),
                "setup_idle_thread must run for CPU {} before enable()",
                cpu
            );
        }

        interrupts::set_handler(arch::YIELD_VECTOR, yield_interrupt_handler);
        SCHED_ENABLED.store(true, Ordering::SeqCst);
        log::info!("Scheduler enabled - preemptive multitasking active");
    }

    pub fn is_enabled() -> bool {
        SCHED_ENABLED.load(Ordering::SeqCst)
    }

    pub fn cpus() -> usize {
        cpu_count()
    }

    // ========================================================================
    // THREAD LIFECYCLE FACADE
    // ========================================================================

    /// Creates a kernel thread and places it on the CPU the policy selects.
    /// The thread starts in Created state and does not run until readied.
    ///
    /// Returns the new id and the owning CPU. On allocation failure no TCB
    /// is published and no policy hook has run.
    pub fn create_thread(
        entry: ThreadEntry,
        arg: usize,
        priority: Option<u64>,
    ) -> Result<(ThreadId, usize), SchedError> {
        check_initialized();
        Self::reap(arch::cpu_id());

        let id = allocate_thread_id();
        let mut thread = Thread::new_kernel(id, entry, arg, THREAD_STACK_SIZE, 0)?;

        let slot = POLICY.lock();
        let policy = slot.as_ref().ok_or(SchedError::NoPolicy)?;

        let target = policy.select_cpu(&thread, arch::cpu_id(), cpu_count());
        thread.cpu = target;

        let mut guard = CPUS[target].lock();
        let state = guard.as_mut().expect("per-CPU state missing");
        policy.on_thread_create(state, &mut thread);
        if let Some(priority) = priority {
            policy.set_priority(state, &mut thread, priority);
        }
        state.threads.insert(id, thread);

        Ok((id, target))
    }

    /// Creates a thread and immediately makes it runnable.
    pub fn spawn(entry: ThreadEntry, arg: usize) -> Result<ThreadId, SchedError> {
        let (id, cpu) = Self::create_thread(entry, arg, None)?;
        Self::ready_thread(cpu, id)?;
        Ok(id)
    }

    /// Makes a thread runnable: first readying of a Created thread, or a
    /// wake from Blocked/Sleeping.
    ///
    /// # Panics
    ///
    /// Waking a Dead thread is an invariant violation and panics.
    pub fn ready_thread(cpu: usize, id: ThreadId) -> Result<(), SchedError> {
        check_cpu(cpu)?;

        let slot = POLICY.lock();
        let policy = slot.as_ref().ok_or(SchedError::NoPolicy)?;

        let mut guard = CPUS[cpu].lock();
        let state = guard.as_mut().expect("per-CPU state missing");
        let mut thread = state.threads.remove(&id).ok_or(SchedError::NoSuchThread)?;

        let result = match thread.state {
            ThreadState::Dead => {
                panic!("attempt to wake dead thread {}", id);
            }
            ThreadState::Running => Err(SchedError::BadState),
            ThreadState::Ready => Ok(()), // already runnable
            ThreadState::Created => {
                // State stays Created until the first dispatch so the stub
                // can take the new-thread restore path.
                policy.on_thread_ready(state, &mut thread);
                Ok(())
            }
            ThreadState::Blocked | ThreadState::Sleeping => {
                thread.state = ThreadState::Ready;
                thread.wake_up_at = 0;
                policy.on_thread_ready(state, &mut thread);
                Ok(())
            }
        };

        state.threads.insert(id, thread);
        result
    }

    /// Moves a thread out of the runnable set until it is readied again.
    pub fn block_thread(cpu: usize, id: ThreadId) -> Result<(), SchedError> {
        check_cpu(cpu)?;

        let slot = POLICY.lock();
        let policy = slot.as_ref().ok_or(SchedError::NoPolicy)?;

        let mut guard = CPUS[cpu].lock();
        let state = guard.as_mut().expect("per-CPU state missing");

        if state.idle == Some(id) {
            return Err(SchedError::BadState);
        }
        let mut thread = state.threads.remove(&id).ok_or(SchedError::NoSuchThread)?;

        let result = match thread.state {
            ThreadState::Dead => {
                panic!("attempt to block dead thread {}", id);
            }
            ThreadState::Blocked | ThreadState::Sleeping => Ok(()), // already parked
            ThreadState::Created | ThreadState::Ready | ThreadState::Running => {
                thread.state = ThreadState::Blocked;
                policy.on_thread_blocked(state, &mut thread);
                Ok(())
            }
        };

        state.threads.insert(id, thread);
        result
    }

    /// Blocks the calling thread and switches away. The caller must arrange
    /// for a later `ready_thread`, or the thread never runs again.
    pub fn block_current() -> Result<(), SchedError> {
        if !Self::is_enabled() {
            return Err(SchedError::Disabled);
        }

        let cpu = arch::cpu_id();
        let id = Self::current_thread_id(cpu).ok_or(SchedError::BadState)?;
        Self::block_thread(cpu, id)?;
        Self::yield_now();
        Ok(())
    }

    /// Puts the calling thread to sleep for at least `ms` milliseconds.
    /// The tick path wakes it when the deadline passes.
    pub fn sleep_current(ms: u64) -> Result<(), SchedError> {
        if !Self::is_enabled() {
            return Err(SchedError::Disabled);
        }

        let cpu = arch::cpu_id();
        let nanos_per_tick = timer::nanos_per_tick().max(1);
        let ticks = (ms * 1_000_000).div_ceil(nanos_per_tick).max(1);

        {
            let slot = POLICY.lock();
            let policy = slot.as_ref().ok_or(SchedError::NoPolicy)?;

            let mut guard = CPUS[cpu].lock();
            let state = guard.as_mut().expect("per-CPU state missing");
            let id = state.current.ok_or(SchedError::BadState)?;
            if state.idle == Some(id) {
                return Err(SchedError::BadState);
            }
            let mut thread = state.threads.remove(&id).ok_or(SchedError::NoSuchThread)?;

            thread.state = ThreadState::Sleeping;
            thread.wake_up_at = timer::now_ticks() + ticks;
            policy.on_thread_blocked(state, &mut thread);
            state.threads.insert(id, thread);
        }

        Self::yield_now();
        Ok(())
    }

    /// Marks a thread Dead and removes it from scheduling. Stack and
    /// extension reclamation is deferred: a running thread is buried by the
    /// switch path after the CPU has left its stack, everything else is
    /// buried immediately.
    pub fn exit_thread(cpu: usize, id: ThreadId) -> Result<(), SchedError> {
        check_cpu(cpu)?;

        let slot = POLICY.lock();
        let policy = slot.as_ref().ok_or(SchedError::NoPolicy)?;

        let mut guard = CPUS[cpu].lock();
        let state = guard.as_mut().expect("per-CPU state missing");

        if state.idle == Some(id) {
            // The idle thread is created once and never destroyed.
            return Err(SchedError::BadState);
        }
        let mut thread = state.threads.remove(&id).ok_or(SchedError::NoSuchThread)?;
        if thread.state == ThreadState::Dead {
            state.threads.insert(id, thread);
            return Ok(());
        }

        thread.state = ThreadState::Dead;
        policy.on_thread_exit(state, &mut thread);

        if state.current == Some(id) {
            // Still on this thread's stack; the switch path buries it.
            state.threads.insert(id, thread);
        } else {
            state.bury(thread);
        }
        Ok(())
    }

    /// Terminates the calling thread. Never returns.
    pub fn exit_current() -> ! {
        let cpu = arch::cpu_id();
        let id = Self::current_thread_id(cpu).expect("exit_current outside a thread");
        Self::exit_thread(cpu, id).expect("current thread must be exitable");

        // The switch away happens on the yield vector; interrupts must be
        // open for it to fire.
        arch::enable_interrupts();
        loop {
            arch::raise_yield_interrupt();
            arch::halt();
        }
    }

    /// Voluntarily gives up the CPU.
    ///
    /// Rides the same interrupt-return edge as timer preemption: a software
    /// interrupt saves the context, the scheduler picks, the stub restores.
    pub fn yield_now() {
        if !Self::is_enabled() {
            return;
        }
        // Inside an interrupt-mask scope a switch would deadlock the lock
        // discipline; the caller keeps the CPU instead.
        if !arch::interrupts_enabled() {
            return;
        }
        arch::raise_yield_interrupt();
    }

    /// Rewrites a thread's priority; semantics belong to the policy.
    pub fn set_priority(cpu: usize, id: ThreadId, priority: u64) -> Result<(), SchedError> {
        check_cpu(cpu)?;

        let slot = POLICY.lock();
        let policy = slot.as_ref().ok_or(SchedError::NoPolicy)?;

        let mut guard = CPUS[cpu].lock();
        let state = guard.as_mut().expect("per-CPU state missing");
        let mut thread = state.threads.remove(&id).ok_or(SchedError::NoSuchThread)?;
        policy.set_priority(state, &mut thread, priority);
        state.threads.insert(id, thread);
        Ok(())
    }

    pub fn get_priority(cpu: usize, id: ThreadId) -> Result<u64, SchedError> {
        check_cpu(cpu)?;

        let slot = POLICY.lock();
        let policy = slot.as_ref().ok_or(SchedError::NoPolicy)?;

        let guard = CPUS[cpu].lock();
        let state = guard.as_ref().expect("per-CPU state missing");
        let thread = state.thread(id).ok_or(SchedError::NoSuchThread)?;
        Ok(policy.get_priority(thread))
    }

    /// Moves a parked (non-running) thread to another CPU, extension slot
    /// and all, under both CPUs' locks.
    pub fn migrate_thread(id: ThreadId, from: usize, to: usize) -> Result<(), SchedError> {
        check_cpu(from)?;
        check_cpu(to)?;
        if from == to {
            return Ok(());
        }

        let slot = POLICY.lock();
        let policy = slot.as_ref().ok_or(SchedError::NoPolicy)?;

        // Lock both CPUs in index order so concurrent migrations cannot
        // deadlock.
        let (lo, hi) = (from.min(to), from.max(to));
        let mut guard_lo = CPUS[lo].lock();
        let mut guard_hi = CPUS[hi].lock();
        let (src, dst) = if from == lo {
            (guard_lo.as_mut(), guard_hi.as_mut())
        } else {
            (guard_hi.as_mut(), guard_lo.as_mut())
        };
        let src = src.expect("per-CPU state missing");
        let dst = dst.expect("per-CPU state missing");

        if src.current == Some(id) {
            return Err(SchedError::BadState);
        }
        let mut thread = src.threads.remove(&id).ok_or(SchedError::NoSuchThread)?;
        if thread.flags.contains(super::ThreadFlags::PINNED) {
            src.threads.insert(id, thread);
            return Err(SchedError::BadState);
        }

        let was_runnable = matches!(thread.state, ThreadState::Created | ThreadState::Ready);

        // Dequeue from the source, move ownership, re-enqueue at the
        // destination if the thread was runnable.
        policy.on_thread_blocked(src, &mut thread);
        thread.cpu = to;
        policy.on_thread_migrate(&mut thread, from, to);
        if was_runnable {
            policy.on_thread_ready(dst, &mut thread);
        }
        dst.threads.insert(id, thread);
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn current_thread_id(cpu: usize) -> Option<ThreadId> {
        if check_cpu(cpu).is_err() {
            return None;
        }
        CPUS[cpu].lock().as_ref().and_then(|s| s.current)
    }

    pub fn thread_state(cpu: usize, id: ThreadId) -> Option<ThreadState> {
        if check_cpu(cpu).is_err() {
            return None;
        }
        CPUS[cpu]
            .lock()
            .as_ref()
            .and_then(|s| s.thread(id).map(|t| t.state))
    }

    /// Accounting snapshot for every thread on a CPU.
    pub fn stats(cpu: usize) -> Result<Vec<ThreadStats>, SchedError> {
        check_cpu(cpu)?;
        let now = timer::now_ticks();
        let uptime = now.max(1);

        let guard = CPUS[cpu].lock();
        let state = guard.as_ref().expect("per-CPU state missing");

        Ok(state
            .threads
            .values()
            .map(|t| {
                let mut runtime = t.total_runtime;
                if state.current == Some(t.id) {
                    runtime += now.saturating_sub(t.last_scheduled_at);
                }
                ThreadStats {
                    id: t.id,
                    state: t.state,
                    total_runtime_ticks: runtime,
                    runtime_percent: runtime * 100 / uptime,
                }
            })
            .collect())
    }

    // ========================================================================
    // IRQ PATH
    // ========================================================================

    /// Timer tick entry, invoked from the timer vector with interrupts
    /// masked. Wakes expired sleepers, runs the policy's accounting, and
    /// schedules if the policy asks for it.
    pub fn on_timer_interrupt(cpu: usize, saved_stack_pointer: u64, elapsed_ns: u64) {
        if !Self::is_enabled() || cpu >= cpu_count() {
            return;
        }
        let slot = unsafe { POLICY.raw() };
        let policy = match slot.as_ref() {
            Some(policy) => policy.as_ref(),
            None => return,
        };

        let now = timer::now_ticks();
        let resched = {
            let mut guard = CPUS[cpu].lock_from_irq();
            let state = match guard.as_mut() {
                Some(state) => state,
                None => return,
            };
            state.last_tick_at = now;

            Self::wake_sleepers(policy, state, now);

            // Periodic, non-mandatory balancing opportunity, fed a snapshot
            // of every sibling whose lock was free this round.
            if now % BALANCE_INTERVAL_TICKS == 0 {
                let others = Self::snapshot_siblings(cpu);
                policy.balance(state, &others);
            }

            let current_id = match state.current {
                Some(id) => id,
                None => return,
            };
            let mut current = match state.threads.remove(&current_id) {
                Some(thread) => thread,
                None => return,
            };
            let resched = policy.on_tick(state, &mut current, elapsed_ns);
            state.threads.insert(current_id, current);
            resched
        };

        if resched {
            Self::schedule_from_interrupt(cpu, saved_stack_pointer);
        }
    }

    /// Picks the next thread and publishes the switch for the dispatcher.
    ///
    /// Runs in IRQ context. Never takes the scoped per-CPU acquire - only
    /// the bare lock word - and never touches the allocator. If the policy
    /// has nothing and no idle thread exists, nothing is mutated.
    pub fn schedule_from_interrupt(cpu: usize, saved_stack_pointer: u64) {
        if !Self::is_enabled() || cpu >= cpu_count() {
            return;
        }
        let slot = unsafe { POLICY.raw() };
        let policy = match slot.as_ref() {
            Some(policy) => policy.as_ref(),
            None => return,
        };

        let mut guard = CPUS[cpu].lock_from_irq();
        let state = match guard.as_mut() {
            Some(state) => state,
            None => return,
        };
        let prev_id = match state.current {
            Some(id) => id,
            None => return,
        };

        let next_id = match policy.pick_next(state) {
            Some(id) => id,
            None => match state.idle {
                Some(id) => id,
                None => return,
            },
        };
        if next_id == prev_id {
            return;
        }

        let now = timer::now_ticks();

        // Save the outgoing thread.
        let mut prev = match state.threads.remove(&prev_id) {
            Some(thread) => thread,
            None => return,
        };
        if prev.state == ThreadState::Dead {
            // Exited thread: the CPU leaves its stack now, so it can be
            // parked for reclamation. No field of it is read again.
            state.bury(prev);
        } else {
            prev.saved_stack_pointer = saved_stack_pointer;
            prev.total_runtime += now.saturating_sub(prev.last_scheduled_at);
            if prev.state == ThreadState::Running {
                prev.state = ThreadState::Ready;
                if !prev.is_idle() {
                    // Preempted or yielded: back into the run queue.
                    policy.on_thread_yield(state, &mut prev);
                }
            }
            state.threads.insert(prev_id, prev);
        }

        // Dispatch the incoming thread.
        let mut next = match state.threads.remove(&next_id) {
            Some(thread) => thread,
            None => return,
        };
        let is_new = next.state == ThreadState::Created;
        let next_stack_pointer = next.saved_stack_pointer;
        next.state = ThreadState::Running;
        next.saved_stack_pointer = 0; // stale while running
        next.last_scheduled_at = now;
        state.current = Some(next_id);
        state.threads.insert(next_id, next);
        drop(guard);

        // Publish last: the stub applies the swap right after the
        // dispatcher returns and must never see a half-updated thread.
        publish_pending_switch(cpu, next_stack_pointer, is_new);
    }

    /// Captures the balance-hook view of every CPU except `cpu`.
    ///
    /// Runs in IRQ context while `cpu`'s own lock is held, so sibling locks
    /// are only tried, never spun on: a sibling busy in its own tick is left
    /// out of this round's snapshot.
    fn snapshot_siblings(cpu: usize) -> heapless::Vec<CpuSnapshot, MAX_CPUS> {
        let mut others = heapless::Vec::new();
        for sibling in 0..cpu_count() {
            if sibling == cpu {
                continue;
            }
            let guard = match CPUS[sibling].try_lock_from_irq() {
                Some(guard) => guard,
                None => continue,
            };
            if let Some(state) = guard.as_ref() {
                let _ = others.push(state.snapshot());
            }
        }
        others
    }

    fn wake_sleepers(policy: &dyn SchedPolicy, state: &mut PerCpuState, now: u64) {
        loop {
            let expired = state
                .threads
                .iter()
                .find(|(_, t)| t.state == ThreadState::Sleeping && t.wake_up_at <= now)
                .map(|(&id, _)| id);
            let id = match expired {
                Some(id) => id,
                None => break,
            };

            let mut thread = match state.threads.remove(&id) {
                Some(thread) => thread,
                None => break,
            };
            thread.state = ThreadState::Ready;
            thread.wake_up_at = 0;
            policy.on_thread_ready(state, &mut thread);
            state.threads.insert(id, thread);
        }
    }

    /// Frees the stacks of buried threads. Runs in thread context; the
    /// drop happens after the lock is released so the allocator is never
    /// touched under a scheduler lock.
    fn reap(cpu: usize) {
        if cpu >= cpu_count() {
            return;
        }
        let dead: heapless::Vec<Thread, { super::percpu::GRAVEYARD_CAPACITY }> = {
            let mut guard = CPUS[cpu].lock();
            match guard.as_mut() {
                Some(state) => core::mem::take(&mut state.graveyard),
                None => return,
            }
        };
        if !dead.is_empty() {
            log::debug!("CPU {}: reclaimed {} dead thread(s)", cpu, dead.len());
        }
        drop(dead);
    }
}
