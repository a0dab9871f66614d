/*
 * EL1 Exception Vectors
 *
 * The vector table branches every current-EL (SPx) exception into a common
 * save path that materializes a ThreadContext on the interrupted stack and
 * calls the Rust dispatcher, mirroring the x86-64 stubs. Exceptions from
 * lower ELs and SP0 are not taken: the kernel runs EL1h only.
 *
 * Offsets into the context are written as immediates below and are pinned
 * by the layout asserts in context.rs.
 */

use core::arch::global_asm;

global_asm!(
    r#"
.macro vela_exception_entry class
    sub sp, sp, #816

    stp q0,  q1,  [sp, #0x000]
    stp q2,  q3,  [sp, #0x020]
    stp q4,  q5,  [sp, #0x040]
    stp q6,  q7,  [sp, #0x060]
    stp q8,  q9,  [sp, #0x080]
    stp q10, q11, [sp, #0x0A0]
    stp q12, q13, [sp, #0x0C0]
    stp q14, q15, [sp, #0x0E0]
    stp q16, q17, [sp, #0x100]
    stp q18, q19, [sp, #0x120]
    stp q20, q21, [sp, #0x140]
    stp q22, q23, [sp, #0x160]
    stp q24, q25, [sp, #0x180]
    stp q26, q27, [sp, #0x1A0]
    stp q28, q29, [sp, #0x1C0]
    stp q30, q31, [sp, #0x1E0]

    str x0,  [sp, #512]
    str x1,  [sp, #520]
    str x2,  [sp, #528]
    str x3,  [sp, #536]
    str x4,  [sp, #544]
    str x5,  [sp, #552]
    str x6,  [sp, #560]
    str x7,  [sp, #568]
    str x8,  [sp, #576]
    str x9,  [sp, #584]
    str x10, [sp, #592]
    str x11, [sp, #600]
    str x12, [sp, #608]
    str x13, [sp, #616]
    str x14, [sp, #624]
    str x15, [sp, #632]
    str x16, [sp, #640]
    str x17, [sp, #648]
    str x18, [sp, #656]
    str x19, [sp, #664]
    str x20, [sp, #672]
    str x21, [sp, #680]
    str x22, [sp, #688]
    str x23, [sp, #696]
    str x24, [sp, #704]
    str x25, [sp, #712]
    str x26, [sp, #720]
    str x27, [sp, #728]
    str x28, [sp, #736]
    str x29, [sp, #744]
    str x30, [sp, #752]

    add x0, sp, #816
    str x0, [sp, #760]          // interrupted SP
    mrs x0, ELR_EL1
    str x0, [sp, #768]
    mrs x0, SPSR_EL1
    str x0, [sp, #776]
    mov x0, #\class
    str x0, [sp, #784]          // vector (exception class)
    mrs x0, ESR_EL1
    str x0, [sp, #792]
    mrs x0, FAR_EL1
    str x0, [sp, #800]

    mov x0, sp
    bl {dispatch}

    // x0 = stack pointer to resume on, x1 != 0 for a first dispatch.
    mov sp, x0
    cbnz x1, 1f

    ldp q0,  q1,  [sp, #0x000]
    ldp q2,  q3,  [sp, #0x020]
    ldp q4,  q5,  [sp, #0x040]
    ldp q6,  q7,  [sp, #0x060]
    ldp q8,  q9,  [sp, #0x080]
    ldp q10, q11, [sp, #0x0A0]
    ldp q12, q13, [sp, #0x0C0]
    ldp q14, q15, [sp, #0x0E0]
    ldp q16, q17, [sp, #0x100]
    ldp q18, q19, [sp, #0x120]
    ldp q20, q21, [sp, #0x140]
    ldp q22, q23, [sp, #0x160]
    ldp q24, q25, [sp, #0x180]
    ldp q26, q27, [sp, #0x1A0]
    ldp q28, q29, [sp, #0x1C0]
    ldp q30, q31, [sp, #0x1E0]
1:
    ldr x2, [sp, #768]
    msr ELR_EL1, x2
    ldr x2, [sp, #776]
    msr SPSR_EL1, x2

    ldr x2,  [sp, #528]
    ldr x3,  [sp, #536]
    ldr x4,  [sp, #544]
    ldr x5,  [sp, #552]
    ldr x6,  [sp, #560]
    ldr x7,  [sp, #568]
    ldr x8,  [sp, #576]
    ldr x9,  [sp, #584]
    ldr x10, [sp, #592]
    ldr x11, [sp, #600]
    ldr x12, [sp, #608]
    ldr x13, [sp, #616]
    ldr x14, [sp, #624]
    ldr x15, [sp, #632]
    ldr x16, [sp, #640]
    ldr x17, [sp, #648]
    ldr x18, [sp, #656]
    ldr x19, [sp, #664]
    ldr x20, [sp, #672]
    ldr x21, [sp, #680]
    ldr x22, [sp, #688]
    ldr x23, [sp, #696]
    ldr x24, [sp, #704]
    ldr x25, [sp, #712]
    ldr x26, [sp, #720]
    ldr x27, [sp, #728]
    ldr x28, [sp, #736]
    ldr x29, [sp, #744]
    ldr x30, [sp, #752]

    // Pivot to the target stack, then pull X0/X1 through the old base.
    ldr x1, [sp, #760]
    mov x0, sp
    mov sp, x1
    ldr x1, [x0, #520]
    ldr x0, [x0, #512]
    eret
.endm

vela_handle_sync:
    vela_exception_entry 0
vela_handle_irq:
    vela_exception_entry 1
vela_handle_fiq:
    vela_exception_entry 2
vela_handle_serror:
    vela_exception_entry 3

// Exceptions the kernel never takes (SP0 and lower-EL entries) hang hard.
vela_handle_unexpected:
    b vela_handle_unexpected

.balign 2048
.global vela_vector_table
vela_vector_table:
    // Current EL with SP0
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
    // Current EL with SPx
    .balign 0x80
    b vela_handle_sync
    .balign 0x80
    b vela_handle_irq
    .balign 0x80
    b vela_handle_fiq
    .balign 0x80
    b vela_handle_serror
    // Lower EL, AArch64
    .balign 0x80
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
    // Lower EL, AArch32
    .balign 0x80
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
    .balign 0x80
    b vela_handle_unexpected
"#,
    dispatch = sym crate::interrupts::dispatch_interrupt,
);

unsafe extern "C" {
    static vela_vector_table: u8;
}

/// Installs the vector table into VBAR_EL1.
pub fn init() {
    unsafe {
        let base = &vela_vector_table as *const u8 as u64;
        core::arch::asm!("msr VBAR_EL1, {}", in(reg) base);
    }
}
