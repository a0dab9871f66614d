/*
 * x86-64 Thread Context
 *
 * The exact image of a thread's machine state as the interrupt stubs lay it
 * out on the stack. The field order is the save order: the CPU pushes the
 * five-word interrupt frame, the stub pushes the fault slots, the fifteen
 * general-purpose registers, then stores the SIMD registers below them. A
 * pointer to the `simd` field is therefore a pointer to the whole context.
 *
 * A freshly synthesized context and a preempted one restore through the same
 * stub path; the only difference is that a fresh context carries no SIMD
 * image, which the stub's first-dispatch branch accounts for.
 */

/// Kernel code segment selector, as laid out by the GDT.
pub const KERNEL_CODE_SEGMENT: u16 = 0x08;

/// Kernel data segment selector.
pub const KERNEL_DATA_SEGMENT: u16 = 0x10;

/// RFLAGS image for a new thread: IF=1, reserved bit 1 set.
pub const RFLAGS_INTERRUPTS_ENABLED: u64 = 0x202;

/// Bytes of SIMD state saved per context (XMM0..XMM15).
pub const SIMD_SAVE_SIZE: usize = 256;

/// Interrupt frame pushed by the CPU on every interrupt, in hardware order.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InterruptFrame {
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Complete saved CPU state of a thread.
///
/// Lives on the owning thread's stack: written in place by the interrupt
/// stub on every interrupt, consumed by the stub on return. The stack
/// pointer a `Thread` saves always points at one of these.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct ThreadContext {
    /// XMM0..XMM15, 16 bytes each, stored by the stub with movaps.
    pub simd: [u8; SIMD_SAVE_SIZE],

    // General-purpose registers in stub push order (r15 pushed last, so it
    // sits lowest).
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,

    // Fault information filled by the stub (and the dispatcher for the
    // faulting address).
    pub vector: u64,
    pub error_code: u64,
    pub fault_address: u64,
    pub scratch: u64,

    /// Hardware interrupt frame.
    pub frame: InterruptFrame,
}

// Layout guards: the interrupt stubs hard-code these offsets.
const _: () = assert!(core::mem::size_of::<ThreadContext>() == 448);
const _: () = assert!(core::mem::offset_of!(ThreadContext, r15) == 256);
const _: () = assert!(core::mem::offset_of!(ThreadContext, vector) == 376);
const _: () = assert!(core::mem::offset_of!(ThreadContext, frame) == 408);

impl ThreadContext {
    /// Synthesizes the context of a thread that has never run.
    ///
    /// When the stub restores this context, control resumes at `entry_point`
    /// with `first_arg` in RDI, every other general-purpose register zero,
    /// a clean frame pointer, and interrupts enabled. The stack pointer is
    /// 16-byte aligned minus 8, matching what a function entered by `call`
    /// expects.
    pub fn initialize(
        entry_point: u64,
        code_segment: u16,
        first_arg: u64,
        stack_top: u64,
    ) -> ThreadContext {
        let mut ctx: ThreadContext = unsafe { core::mem::zeroed() };

        ctx.rdi = first_arg;
        ctx.frame = InterruptFrame {
            rip: entry_point,
            cs: code_segment as u64,
            rflags: RFLAGS_INTERRUPTS_ENABLED,
            rsp: entry_stack_pointer(stack_top),
            ss: KERNEL_DATA_SEGMENT as u64,
        };

        ctx
    }
}

/// The stack pointer a new thread starts with: 16-byte aligned, minus the
/// one word the call ABI expects to already be on the stack.
pub fn entry_stack_pointer(stack_top: u64) -> u64 {
    (stack_top & !15) - 8
}

#[cfg(test)]
mod tests {
    use super::*;

    // A simulated restore just reads the fields the stub would load.

    #[test]
    fn initialize_sets_entry_and_argument() {
        let ctx = ThreadContext::initialize(0x1000, KERNEL_CODE_SEGMENT, 0x1234, 0x8_0000);

        assert_eq!(ctx.frame.rip, 0x1000);
        assert_eq!(ctx.rdi, 0x1234);
        assert_eq!(ctx.frame.cs, KERNEL_CODE_SEGMENT as u64);
        assert_eq!(ctx.frame.ss, KERNEL_DATA_SEGMENT as u64);
    }

    #[test]
    fn initialize_enables_interrupts() {
        let ctx = ThreadContext::initialize(0x1000, KERNEL_CODE_SEGMENT, 0, 0x8_0000);
        assert_eq!(ctx.frame.rflags & 0x200, 0x200);
    }

    #[test]
    fn initialize_aligns_stack_for_call_abi() {
        // An unaligned top must be rounded down before the -8 adjustment.
        let ctx = ThreadContext::initialize(0x1000, KERNEL_CODE_SEGMENT, 0, 0x8_0007);
        assert_eq!(ctx.frame.rsp, 0x7_FFF8);
        assert_eq!(ctx.frame.rsp % 16, 8);
    }

    #[test]
    fn initialize_zeroes_remaining_registers() {
        let ctx = ThreadContext::initialize(0x1000, KERNEL_CODE_SEGMENT, 0xAB, 0x8_0000);
        assert_eq!(ctx.rax, 0);
        assert_eq!(ctx.rbp, 0);
        assert_eq!(ctx.rsi, 0);
        assert_eq!(ctx.r15, 0);
        assert!(ctx.simd.iter().all(|&b| b == 0));
    }
}
