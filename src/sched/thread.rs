/*
 * Thread Control Block
 *
 * Identity, state machine, stack ownership and timing for one runnable unit
 * of execution. A thread's saved stack pointer always refers to a fully
 * populated ThreadContext inside its own stack region; while the thread is
 * Running the field is stale and held at zero.
 */

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use super::SchedError;
use super::policies::ThreadPolicyExt;
use crate::arch::{self, ThreadContext};

/// Thread identifier, allocated from a single kernel-wide counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.0)
    }
}

/// Thread lifecycle states.
///
/// Created is kept until the first dispatch so the interrupt stub can apply
/// the new-thread restore path; a created thread sits in the run queue in
/// this state. Dead is terminal: only the stack region may be touched
/// afterwards, for reclamation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Created,
    Ready,
    Running,
    Blocked,
    Sleeping,
    Dead,
}

bitflags! {
    /// Thread attribute flags. The upper bits are reserved for policies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadFlags: u8 {
        const KERNEL = 1 << 0;
        const IDLE   = 1 << 1;
        const PINNED = 1 << 2;
    }
}

/// Entry point of a kernel thread. Returning from it lands in the exit
/// trampoline, which terminates the thread.
pub type ThreadEntry = extern "C" fn(usize);

/// One runnable unit of execution.
pub struct Thread {
    pub id: ThreadId,
    /// Owning CPU. The owner's lock guards every mutable field.
    pub cpu: usize,
    pub state: ThreadState,
    pub flags: ThreadFlags,

    /// Backing storage for the stack; `None` for threads that adopted a
    /// boot stack (the per-CPU idle threads).
    stack: Option<Box<[u8]>>,
    stack_base: u64,
    stack_size: usize,

    /// Points at the thread's saved ThreadContext. Zero (stale) while the
    /// thread is Running.
    pub saved_stack_pointer: u64,

    // Timing, in timer ticks.
    pub created_at: u64,
    pub total_runtime: u64,
    pub last_scheduled_at: u64,
    pub wake_up_at: u64,

    /// Policy extension slot; created by `on_thread_create`, destroyed by
    /// `on_thread_exit`.
    pub ext: ThreadPolicyExt,
}

impl Thread {
    /// Allocates a stack and synthesizes the context that makes the first
    /// dispatch "return" into `entry(arg)`.
    ///
    /// On allocation failure nothing is left behind: the caller has no TCB
    /// to publish and no policy hook has run.
    pub fn new_kernel(
        id: ThreadId,
        entry: ThreadEntry,
        arg: usize,
        stack_size: usize,
        cpu: usize,
    ) -> Result<Thread, SchedError> {
        let mut backing = Vec::new();
        backing
            .try_reserve_exact(stack_size)
            .map_err(|_| SchedError::OutOfMemory)?;
        backing.resize(stack_size, 0);
        let stack = backing.into_boxed_slice();

        let stack_base = stack.as_ptr() as u64;
        let stack_top = stack_base + stack_size as u64;

        let mut ctx = ThreadContext::initialize(
            entry as usize as u64,
            arch::KERNEL_CODE_SEGMENT,
            arg as u64,
            stack_top,
        );
        unsafe {
            arch::install_return_landing(
                &mut ctx,
                stack_top,
                super::manager::thread_exit_landing as usize as u64,
            );
        }

        // Park the context just below the thread's entry stack pointer,
        // 16-byte aligned as the restore path requires.
        let ctx_addr = (arch::entry_stack_pointer(stack_top)
            - core::mem::size_of::<ThreadContext>() as u64)
            & !15;
        unsafe {
            core::ptr::write(ctx_addr as *mut ThreadContext, ctx);
        }

        Ok(Thread {
            id,
            cpu,
            state: ThreadState::Created,
            flags: ThreadFlags::KERNEL,
            stack: Some(stack),
            stack_base,
            stack_size,
            saved_stack_pointer: ctx_addr,
            created_at: crate::utils::timer::now_ticks(),
            total_runtime: 0,
            last_scheduled_at: 0,
            wake_up_at: 0,
            ext: ThreadPolicyExt::None,
        })
    }

    /// Builds the idle thread for a CPU out of the stack the CPU is already
    /// running on. The boot control flow becomes the idle thread at the
    /// first preemption, so the TCB starts out Running with a stale saved
    /// stack pointer.
    pub fn adopt_boot_stack(
        id: ThreadId,
        cpu: usize,
        stack_base: u64,
        stack_size: usize,
    ) -> Thread {
        Thread {
            id,
            cpu,
            state: ThreadState::Running,
            flags: ThreadFlags::KERNEL | ThreadFlags::IDLE | ThreadFlags::PINNED,
            stack: None,
            stack_base,
            stack_size,
            saved_stack_pointer: 0,
            created_at: crate::utils::timer::now_ticks(),
            total_runtime: 0,
            last_scheduled_at: 0,
            wake_up_at: 0,
            ext: ThreadPolicyExt::None,
        }
    }

    pub fn stack_base(&self) -> u64 {
        self.stack_base
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Whether a stack pointer lies strictly within this thread's stack.
    pub fn owns_stack_pointer(&self, sp: u64) -> bool {
        sp >= self.stack_base && sp < self.stack_base + self.stack_size as u64
    }

    pub fn is_idle(&self) -> bool {
        self.flags.contains(ThreadFlags::IDLE)
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("cpu", &self.cpu)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn dummy_entry(_arg: usize) {}

    #[test]
    fn new_kernel_thread_starts_created() {
        let t = Thread::new_kernel(ThreadId(7), dummy_entry, 0, 16 * 1024, 0).unwrap();
        assert_eq!(t.state, ThreadState::Created);
        assert_eq!(t.id, ThreadId(7));
        assert!(t.flags.contains(ThreadFlags::KERNEL));
        assert!(!t.is_idle());
    }

    #[test]
    fn saved_stack_pointer_lies_within_stack() {
        let t = Thread::new_kernel(ThreadId(1), dummy_entry, 0, 16 * 1024, 0).unwrap();
        assert!(t.owns_stack_pointer(t.saved_stack_pointer));
        // The whole context must fit between the pointer and the stack top.
        assert!(
            t.saved_stack_pointer + core::mem::size_of::<ThreadContext>() as u64
                <= t.stack_base() + t.stack_size() as u64
        );
        assert_eq!(t.saved_stack_pointer % 16, 0);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn synthesized_context_resumes_at_entry() {
        let t = Thread::new_kernel(ThreadId(2), dummy_entry, 0x1234, 16 * 1024, 0).unwrap();
        let ctx = unsafe { &*(t.saved_stack_pointer as *const ThreadContext) };

        assert_eq!(ctx.frame.rip, dummy_entry as usize as u64);
        assert_eq!(ctx.rdi, 0x1234);
        // Entry stack pointer: 16-byte aligned minus the return-address word.
        assert_eq!(ctx.frame.rsp % 16, 8);
        assert!(t.owns_stack_pointer(ctx.frame.rsp));
        // The return-address word leads to the exit trampoline.
        let landing = unsafe { *(ctx.frame.rsp as *const u64) };
        assert_eq!(
            landing,
            crate::sched::manager::thread_exit_landing as usize as u64
        );
    }
}
