/*
 * Interrupt Manager
 *
 * Vector-to-handler routing and the managed half of the interrupt entry
 * path. The per-vector stubs funnel every trap into `dispatch_interrupt`,
 * which looks up the installed handler, invokes it against the on-stack
 * ThreadContext, completes the interrupt at the controller, and finally
 * applies any context switch the scheduler published while the handler ran.
 *
 * The handler table is a fixed array of atomics holding function pointers;
 * installation is last-writer-wins and dispatch is lock-free, so the IRQ
 * path never contends with handler registration.
 */

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::arch::{self, ThreadContext};

pub mod fatal;

/// An installed interrupt handler. Handlers run in IRQ context with
/// interrupts masked and may mutate the saved context.
pub type InterruptHandler = fn(&mut ThreadContext);

/// Verdict returned to the entry stub: the stack pointer to resume on and
/// whether it refers to a context that has never been restored before.
#[repr(C)]
pub struct SwitchTarget {
    pub stack_pointer: u64,
    pub new_thread: u64,
}

const NO_HANDLER: AtomicUsize = AtomicUsize::new(0);

/// Vector routing table. A zero entry means no handler installed.
static HANDLERS: [AtomicUsize; arch::MAX_VECTORS] = [NO_HANDLER; arch::MAX_VECTORS];

/// Binds the fatal-exception vectors and loads the architecture's
/// descriptor tables and interrupt controller.
pub fn init() {
    arch::init();
    fatal::init();

    #[cfg(target_arch = "x86_64")]
    {
        // 8259 lines 7 and 15 fire spuriously under bus noise; they carry
        // no device work.
        set_handler(arch::IRQ_VECTOR_BASE + 7, spurious_irq_handler);
        set_handler(arch::IRQ_VECTOR_BASE + 15, spurious_irq_handler);
    }

    log::info!("Interrupt manager initialized");
}

#[cfg(target_arch = "x86_64")]
fn spurious_irq_handler(_ctx: &mut ThreadContext) {}

/// Installs or replaces the handler for a vector. Last writer wins.
pub fn set_handler(vector: u8, handler: InterruptHandler) {
    HANDLERS[vector as usize].store(handler as usize, Ordering::Release);
}

fn handler_for(vector: u16) -> Option<InterruptHandler> {
    if vector as usize >= arch::MAX_VECTORS {
        return None;
    }
    let raw = HANDLERS[vector as usize].load(Ordering::Acquire);
    if raw == 0 {
        None
    } else {
        // Entries are only ever written from `set_handler` with a valid
        // function pointer.
        Some(unsafe { core::mem::transmute::<usize, InterruptHandler>(raw) })
    }
}

/// Routes a hardware IRQ line to a vector at the platform controller.
pub fn route_irq(irq: u8, vector: u8, start_masked: bool) {
    if let Err(err) = arch::irq_controller_route(irq, vector, start_masked) {
        panic!("failed to route IRQ {} to vector {}: {}", irq, vector, err);
    }
}

/// Signals end-of-interrupt at the platform controller.
pub fn send_eoi(vector: u8) {
    arch::irq_controller_send_eoi(vector);
}

/// Acknowledge read at the platform controller. Controllers that present
/// vectors directly return their sentinel.
pub fn ack_interrupt() -> u32 {
    arch::irq_controller_ack()
}

/// Whether the platform interrupt controller is up.
pub fn controller_initialized() -> bool {
    arch::irq_controller_initialized()
}

/// The managed dispatcher, called by the entry stubs with a pointer to the
/// stack-resident context of whatever was interrupted.
///
/// Runs with interrupts masked for its whole duration; the two-slot pending
/// switch record the scheduler may publish is consumed exactly once, right
/// before returning to the stub.
#[unsafe(no_mangle)]
pub extern "C" fn dispatch_interrupt(ctx: &mut ThreadContext) -> SwitchTarget {
    let same_stack = ctx as *mut ThreadContext as u64;

    let info = arch::classify_interrupt(ctx);
    if arch::is_spurious(info.vector) {
        return SwitchTarget {
            stack_pointer: same_stack,
            new_thread: 0,
        };
    }

    match handler_for(info.vector) {
        Some(handler) => handler(ctx),
        None => fatal::unexpected_interrupt(ctx, info.vector),
    }

    arch::complete_interrupt(&info);

    match crate::sched::take_pending_switch(arch::cpu_id()) {
        Some(switch) => SwitchTarget {
            stack_pointer: switch.stack_pointer,
            new_thread: switch.new_thread as u64,
        },
        None => SwitchTarget {
            stack_pointer: same_stack,
            new_thread: 0,
        },
    }
}
