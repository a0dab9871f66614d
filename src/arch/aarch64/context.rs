/*
 * AArch64 Thread Context
 *
 * Saved machine state as the exception vectors lay it out on the stack:
 * the NEON register file, X0..X30, the interrupted stack pointer, the
 * exception return state (ELR, SPSR) and the fault information. The total
 * is padded to a 16-byte multiple so a context can sit directly on an
 * aligned stack.
 */

/// Bytes of NEON state saved per context (Q0..Q31).
pub const NEON_SAVE_SIZE: usize = 512;

/// Exception class indices stored in `vector` by the vector stubs.
pub const CLASS_SYNC: u64 = 0;
pub const CLASS_IRQ: u64 = 1;
pub const CLASS_FIQ: u64 = 2;
pub const CLASS_SERROR: u64 = 3;

/// SPSR image for a new kernel thread: EL1h, all interrupt masks clear.
pub const SPSR_EL1H_INTERRUPTS_ENABLED: u64 = 0x5;

/// Complete saved CPU state of a thread.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct ThreadContext {
    /// Q0..Q31, stored by the vector stub.
    pub neon: [u8; NEON_SAVE_SIZE],

    /// X0..X30 (X30 is the link register).
    pub x: [u64; 31],

    /// Stack pointer at the point of interruption.
    pub sp: u64,

    /// Exception link register: resume address.
    pub elr: u64,

    /// Saved program status.
    pub spsr: u64,

    // Fault information.
    pub vector: u64,
    pub esr: u64,
    pub far: u64,

    _pad: u64,
}

// The vector stubs hard-code these offsets.
const _: () = assert!(core::mem::size_of::<ThreadContext>() == 816);
const _: () = assert!(core::mem::offset_of!(ThreadContext, x) == 512);
const _: () = assert!(core::mem::offset_of!(ThreadContext, sp) == 760);
const _: () = assert!(core::mem::offset_of!(ThreadContext, elr) == 768);
const _: () = assert!(core::mem::offset_of!(ThreadContext, vector) == 784);

impl ThreadContext {
    /// Synthesizes the context of a thread that has never run.
    ///
    /// Restoring this context resumes at `entry_point` with `first_arg` in
    /// X0, every other register zero and IRQs unmasked. `code_segment` has
    /// no meaning on this architecture and is ignored. The stack pointer is
    /// aligned to 16 bytes as AAPCS64 requires; no call-frame word is
    /// reserved because the return address lives in X30.
    pub fn initialize(
        entry_point: u64,
        _code_segment: u16,
        first_arg: u64,
        stack_top: u64,
    ) -> ThreadContext {
        let mut ctx: ThreadContext = unsafe { core::mem::zeroed() };

        ctx.x[0] = first_arg;
        ctx.sp = entry_stack_pointer(stack_top);
        ctx.elr = entry_point;
        ctx.spsr = SPSR_EL1H_INTERRUPTS_ENABLED;

        ctx
    }
}

/// The stack pointer a new thread starts with.
pub fn entry_stack_pointer(stack_top: u64) -> u64 {
    stack_top & !15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_sets_entry_and_argument() {
        let ctx = ThreadContext::initialize(0x4_0000, 0, 0x1234, 0x9_0000);
        assert_eq!(ctx.elr, 0x4_0000);
        assert_eq!(ctx.x[0], 0x1234);
        assert_eq!(ctx.sp % 16, 0);
    }

    #[test]
    fn initialize_unmasks_interrupts() {
        let ctx = ThreadContext::initialize(0x4_0000, 0, 0, 0x9_0000);
        // DAIF image bits [9:6] must all be clear.
        assert_eq!(ctx.spsr & 0x3C0, 0);
    }
}
