/*
 * AArch64 Architecture Support
 *
 * Partial port: the context layout, exception vectors, generic timer and
 * GIC glue are in place; the boot path and SMP bring-up remain x86-only.
 */

use core::arch::asm;

pub mod context;
pub mod gic;
pub mod vectors;

pub use context::{ThreadContext, entry_stack_pointer};

/// Number of interrupt vectors the kernel's routing table covers.
/// Interrupt ids map directly onto vectors; the three non-IRQ exception
/// classes are folded into the top of the range.
pub const MAX_VECTORS: usize = 256;

/// Synthetic vectors for the non-IRQ exception classes.
pub const SYNC_VECTOR: u8 = 0xFC;
pub const FIQ_VECTOR: u8 = 0xFD;
pub const SERROR_VECTOR: u8 = 0xFE;

/// Generic timer PPI and its vector (interrupt ids are vectors on the GIC).
pub const TIMER_VECTOR: u8 = 30;
pub const TIMER_IRQ: u8 = 30;

/// SGI used for voluntary context switches.
pub const YIELD_VECTOR: u8 = 1;

/// There is no code-segment concept here; contexts ignore the value.
pub const KERNEL_CODE_SEGMENT: u16 = 0;

static TIMER_INTERVAL: core::sync::atomic::AtomicU64 = core::sync::atomic::AtomicU64::new(0);

/// Installs the vector table and brings up the interrupt controller.
pub fn init() {
    // The vector stubs save and restore NEON state; EL1 FP access must be
    // open before the first exception.
    unsafe {
        asm!(
            "msr CPACR_EL1, {}",
            "isb",
            in(reg) 3u64 << 20,
            options(nomem, nostack, preserves_flags)
        );
    }

    vectors::init();
    gic::init();
}

/// Identifies the executing CPU from MPIDR_EL1 affinity level 0.
pub fn cpu_id() -> usize {
    let mpidr: u64;
    unsafe {
        asm!("mrs {}, MPIDR_EL1", out(reg) mpidr, options(nomem, nostack, preserves_flags));
    }
    (mpidr & 0xFF) as usize
}

/// Waits for the next interrupt.
pub fn halt() {
    unsafe {
        asm!("wfi", options(nomem, nostack, preserves_flags));
    }
}

pub fn interrupts_enabled() -> bool {
    let daif: u64;
    unsafe {
        asm!("mrs {}, DAIF", out(reg) daif, options(nomem, nostack, preserves_flags));
    }
    daif & (1 << 7) == 0
}

pub fn enable_interrupts() {
    unsafe {
        asm!("msr DAIFClr, #2", options(nomem, nostack, preserves_flags));
    }
}

pub fn disable_interrupts() {
    unsafe {
        asm!("msr DAIFSet, #2", options(nomem, nostack, preserves_flags));
    }
}

/// Programs the EL1 physical timer; returns nanoseconds per tick.
pub fn timer_init(frequency_hz: u32) -> u64 {
    let cntfrq: u64;
    unsafe {
        asm!("mrs {}, CNTFRQ_EL0", out(reg) cntfrq, options(nomem, nostack, preserves_flags));
    }

    let interval = (cntfrq / frequency_hz as u64).max(1);
    TIMER_INTERVAL.store(interval, core::sync::atomic::Ordering::Relaxed);
    timer_rearm();
    unsafe {
        asm!("msr CNTP_CTL_EL0, {}", in(reg) 1u64, options(nomem, nostack, preserves_flags));
    }

    interval * 1_000_000_000 / cntfrq
}

/// Re-arms the one-shot countdown for the next tick.
pub fn timer_rearm() {
    let interval = TIMER_INTERVAL.load(core::sync::atomic::Ordering::Relaxed);
    unsafe {
        asm!("msr CNTP_TVAL_EL0, {}", in(reg) interval, options(nomem, nostack, preserves_flags));
    }
}

/// FAR_EL1 as captured by the vector stub; exposed for symmetry with x86.
pub fn read_fault_address() -> u64 {
    let far: u64;
    unsafe {
        asm!("mrs {}, FAR_EL1", out(reg) far, options(nomem, nostack, preserves_flags));
    }
    far
}

/// Raises the voluntary-switch SGI on the current CPU.
pub fn raise_yield_interrupt() {
    gic::raise_sgi_self(YIELD_VECTOR);
}

// ============================================================================
// INTERRUPT CONTROLLER DELEGATION
// ============================================================================

pub fn irq_controller_initialized() -> bool {
    gic::is_initialized()
}

pub fn irq_controller_send_eoi(vector: u8) {
    gic::send_eoi(vector as u32);
}

pub fn irq_controller_route(irq: u8, vector: u8, start_masked: bool) -> Result<(), &'static str> {
    gic::route_irq(irq, vector, start_masked)
}

pub fn irq_controller_ack() -> u32 {
    gic::ack_interrupt()
}

/// Every GIC-delivered id needs an EOI; synthetic class vectors do not.
pub fn is_irq_vector(vector: u8) -> bool {
    vector < SYNC_VECTOR
}

// ============================================================================
// DISPATCH GLUE
// ============================================================================

use super::IrqInfo;

/// Classifies a trap for the dispatcher.
///
/// IRQs need an acknowledge read to learn the interrupt id, which then
/// doubles as the routing-table vector. The other exception classes map to
/// their synthetic vectors.
pub fn classify_interrupt(ctx: &mut ThreadContext) -> IrqInfo {
    match ctx.vector {
        context::CLASS_IRQ => {
            let id = gic::ack_interrupt();
            if id >= gic::SPURIOUS_ID {
                return IrqInfo {
                    vector: gic::SPURIOUS_ID as u16,
                    ack: u32::MAX,
                };
            }
            IrqInfo {
                vector: id as u16,
                ack: id,
            }
        }
        context::CLASS_SYNC => IrqInfo {
            vector: SYNC_VECTOR as u16,
            ack: u32::MAX,
        },
        context::CLASS_FIQ => IrqInfo {
            vector: FIQ_VECTOR as u16,
            ack: u32::MAX,
        },
        _ => IrqInfo {
            vector: SERROR_VECTOR as u16,
            ack: u32::MAX,
        },
    }
}

/// Completes a trap after its handler ran: acknowledged ids get their EOI.
pub fn complete_interrupt(info: &IrqInfo) {
    if info.ack != u32::MAX {
        gic::send_eoi(info.ack);
    }
}

/// The GIC's "nothing pending" sentinel, as surfaced by classification.
/// Must agree with `classify_interrupt`: both compare against
/// `gic::SPURIOUS_ID`.
pub fn is_spurious(vector: u16) -> bool {
    vector >= gic::SPURIOUS_ID as u16
}

/// Hooks a synthesized context up so that a return from the thread's entry
/// function lands in `landing`. The return address lives in X30 here, not
/// on the stack.
///
/// # Safety
///
/// Exists for signature parity with x86-64; only the context is touched.
pub unsafe fn install_return_landing(ctx: &mut ThreadContext, _stack_top: u64, landing: u64) {
    ctx.x[30] = landing;
}
