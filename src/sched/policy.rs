/*
 * Scheduler Policy Interface
 *
 * The pluggable half of the scheduler. The manager owns the mechanism
 * (locks, state transitions, the context-switch publication); a policy
 * decides who runs next and for how long.
 *
 * Policies are installed once, before the scheduler is enabled, and their
 * methods take `&self`: all mutable policy state lives in the typed
 * extension slots on PerCpuState and Thread, so one policy instance serves
 * every CPU without internal locking. The manager invokes each hook under
 * the owning CPU's lock (or from the IRQ path, which owns the CPU).
 *
 * Hook ordering per thread is a prefix of
 *   create, (ready | blocked | yield)*, exit
 * with create first and exit last exactly once. The policy creates the
 * thread's extension slot in `on_thread_create` and destroys it in
 * `on_thread_exit`.
 */

use super::percpu::{CpuSnapshot, PerCpuState};
use super::thread::{Thread, ThreadId};

pub trait SchedPolicy: Send + Sync {
    /// Policy name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Creates this policy's per-CPU extension slot.
    fn initialize_cpu(&self, cpu: &mut PerCpuState);

    /// Destroys the per-CPU extension slot. Called with an empty run queue
    /// (policy replacement only happens while the scheduler is down).
    fn shutdown_cpu(&self, cpu: &mut PerCpuState);

    /// A thread was created on this CPU. The policy allocates the thread's
    /// extension slot; the thread is not yet runnable.
    fn on_thread_create(&self, cpu: &mut PerCpuState, thread: &mut Thread);

    /// A thread became runnable (first readying, or a wake from Blocked or
    /// Sleeping). The policy enqueues it.
    fn on_thread_ready(&self, cpu: &mut PerCpuState, thread: &mut Thread);

    /// A thread left the runnable set to wait.
    fn on_thread_blocked(&self, cpu: &mut PerCpuState, thread: &mut Thread);

    /// A thread is terminating. The policy removes it from its structures
    /// and destroys the extension slot. Last hook for this thread.
    fn on_thread_exit(&self, cpu: &mut PerCpuState, thread: &mut Thread);

    /// The running thread was preempted or yielded and returns to the run
    /// queue.
    fn on_thread_yield(&self, cpu: &mut PerCpuState, thread: &mut Thread);

    /// Picks the next thread to run, or `None` when the queue is empty (the
    /// manager substitutes the idle thread).
    fn pick_next(&self, cpu: &mut PerCpuState) -> Option<ThreadId>;

    /// Timer tick accounting for the running thread. Returns true when the
    /// manager should reschedule.
    fn on_tick(&self, cpu: &mut PerCpuState, current: &mut Thread, elapsed_ns: u64) -> bool;

    /// Placement decision at creation and wake time.
    fn select_cpu(&self, thread: &Thread, current_cpu: usize, cpu_count: usize) -> usize;

    /// Informational: a thread moved between CPUs.
    fn on_thread_migrate(&self, thread: &mut Thread, from: usize, to: usize);

    /// Periodic, non-mandatory load balancing opportunity. Along with
    /// `select_cpu`, the only place a policy observes the other CPUs:
    /// `others` holds a snapshot of every sibling the manager could capture
    /// this round.
    fn balance(&self, cpu: &mut PerCpuState, others: &[CpuSnapshot]);

    /// Priority semantics are policy-defined.
    fn set_priority(&self, cpu: &mut PerCpuState, thread: &mut Thread, priority: u64);
    fn get_priority(&self, thread: &Thread) -> u64;
}
