/*
 * x86-64 Architecture Support
 *
 * Segmentation, interrupt plumbing, the saved-context layout and the
 * platform timer/interrupt-controller pair. Everything the generic kernel
 * needs from the architecture funnels through the functions re-exported
 * from `arch::`.
 */

pub mod context;
pub mod gdt;
pub mod idt;
pub mod interrupts;
pub mod pic;
pub mod pit;
pub mod stubs;

pub use context::{KERNEL_CODE_SEGMENT, ThreadContext, entry_stack_pointer};

/// Number of interrupt vectors the architecture defines.
pub const MAX_VECTORS: usize = 256;

/// Vector of the scheduler timer (IRQ 0 behind the remapped PIC).
pub const TIMER_VECTOR: u8 = 32;

/// Hardware IRQ line of the scheduler timer.
pub const TIMER_IRQ: u8 = 0;

/// Software vector used for voluntary context switches.
pub const YIELD_VECTOR: u8 = 0x81;

/// First and one-past-last vector of the hardware IRQ range.
pub const IRQ_VECTOR_BASE: u8 = pic::PIC_OFFSET;
pub const IRQ_VECTOR_LIMIT: u8 = pic::PIC_OFFSET + 16;

/// Loads descriptor tables and brings up the interrupt controller.
pub fn init() {
    enable_sse();
    gdt::init();
    idt::init();
    pic::init();
}

/// Enables SSE. The entry stubs save and restore XMM state on every
/// interrupt, so this must happen before the IDT goes live.
fn enable_sse() {
    use x86_64::registers::control::{Cr0, Cr0Flags, Cr4, Cr4Flags};

    unsafe {
        Cr0::update(|cr0| {
            cr0.remove(Cr0Flags::EMULATE_COPROCESSOR);
            cr0.insert(Cr0Flags::MONITOR_COPROCESSOR);
        });
        Cr4::update(|cr4| {
            cr4.insert(Cr4Flags::OSFXSR | Cr4Flags::OSXMMEXCPT_ENABLE);
        });
    }
}

/// Identifies the executing CPU.
///
/// Reads the APIC id from CPUID leaf 1; firmware assigns ids contiguously
/// from zero, so the APIC id doubles as the scheduler's CPU index.
pub fn cpu_id() -> usize {
    let ebx = unsafe { core::arch::x86_64::__cpuid(1).ebx };
    (ebx >> 24) as usize
}

/// Halts the CPU until the next interrupt.
pub fn halt() {
    x86_64::instructions::hlt();
}

pub fn interrupts_enabled() -> bool {
    interrupts::are_enabled()
}

pub fn enable_interrupts() {
    interrupts::enable();
}

pub fn disable_interrupts() {
    interrupts::disable();
}

/// Programs the tick device; returns nanoseconds per tick.
pub fn timer_init(frequency_hz: u32) -> u64 {
    pit::init(frequency_hz)
}

/// Address that faulted, for page faults (CR2).
pub fn read_fault_address() -> u64 {
    x86_64::registers::control::Cr2::read_raw()
}

/// Vector number of the page fault exception.
pub const PAGE_FAULT_VECTOR: u8 = 14;

/// Raises the voluntary-switch software interrupt on the current CPU.
///
/// Control returns here only after this thread has been scheduled again.
pub fn raise_yield_interrupt() {
    unsafe {
        core::arch::asm!("int 0x81", options(nostack));
    }
}

// ============================================================================
// INTERRUPT CONTROLLER DELEGATION
// ============================================================================

pub fn irq_controller_initialized() -> bool {
    pic::is_initialized()
}

pub fn irq_controller_send_eoi(vector: u8) {
    pic::send_eoi(vector);
}

pub fn irq_controller_route(irq: u8, vector: u8, start_masked: bool) -> Result<(), &'static str> {
    pic::route_irq(irq, vector, start_masked)
}

pub fn irq_controller_ack() -> u32 {
    pic::ack_interrupt()
}

/// Whether a vector belongs to the hardware IRQ range (needs an EOI).
pub fn is_irq_vector(vector: u8) -> bool {
    (IRQ_VECTOR_BASE..IRQ_VECTOR_LIMIT).contains(&vector)
}

// ============================================================================
// DISPATCH GLUE
// ============================================================================

use super::IrqInfo;

/// Classifies a trap for the dispatcher.
///
/// The vector number was pushed by the entry stub; page faults additionally
/// get the faulting address pulled out of CR2 before any handler can
/// clobber it.
pub fn classify_interrupt(ctx: &mut ThreadContext) -> IrqInfo {
    let vector = ctx.vector as u16;
    if vector == PAGE_FAULT_VECTOR as u16 {
        ctx.fault_address = read_fault_address();
    }
    IrqInfo {
        vector,
        ack: pic::ACK_NONE,
    }
}

/// Completes a trap after its handler ran: hardware IRQs get their EOI.
pub fn complete_interrupt(info: &IrqInfo) {
    if info.vector <= u8::MAX as u16 && is_irq_vector(info.vector as u8) {
        irq_controller_send_eoi(info.vector as u8);
    }
}

/// The 8259 path never reports spurious ids through classification.
pub fn is_spurious(_vector: u16) -> bool {
    false
}

/// Hooks a synthesized context up so that a return from the thread's entry
/// function lands in `landing`: the call ABI expects the return address on
/// the stack, one word below the aligned top.
///
/// # Safety
///
/// `stack_top` must be the writable top of the thread's stack.
pub unsafe fn install_return_landing(_ctx: &mut ThreadContext, stack_top: u64, landing: u64) {
    unsafe {
        *(entry_stack_pointer(stack_top) as *mut u64) = landing;
    }
}

/// Arms the next tick. The PIT free-runs; nothing to do.
pub fn timer_rearm() {}
