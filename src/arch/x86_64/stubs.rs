/*
 * Interrupt Entry Stubs
 *
 * One naked stub per vector. Each stub completes the ThreadContext image on
 * the interrupted stack (fault slots, general-purpose registers, SIMD
 * state), hands a pointer to it to the Rust dispatcher, and applies the
 * dispatcher's verdict on return: either fall back onto the same context or
 * pivot the stack pointer to another thread's saved context before the
 * restore sequence and iretq.
 *
 * The CPU pushes an error code for vectors 8, 10-14, 17, 21, 29 and 30; for
 * those the pushed word lands in the context's scratch slot and is copied
 * into the error_code slot. All other vectors synthesize a zero.
 *
 * A first dispatch of a new thread (RDX != 0 from the dispatcher) skips the
 * SIMD image restore: a synthesized context has no valid image, so the x87
 * and SSE state is reset instead.
 */

use core::arch::global_asm;

/// MXCSR loaded for a thread's first dispatch: all SSE exceptions masked.
#[unsafe(no_mangle)]
static DEFAULT_MXCSR: u32 = 0x1F80;

global_asm!(
    r#"
.altmacro

.macro vela_stub num
vela_vector_stub_\num:
    .if (\num == 8) || ((\num >= 10) && (\num <= 14)) || (\num == 17) || (\num == 21) || (\num == 29) || (\num == 30)
    // CPU pushed an error code; it occupies the scratch slot.
    push 0                      // fault_address
    push qword ptr [rsp + 8]    // error_code, copied from the CPU's word
    .else
    push 0                      // scratch
    push 0                      // fault_address
    push 0                      // error_code
    .endif
    push \num                   // vector
    jmp vela_interrupt_common
.endm

.macro vela_stub_ref num
    .quad vela_vector_stub_\num
.endm

.set vec, 0
.rept 256
    vela_stub %vec
    .set vec, vec + 1
.endr

.balign 8
.global VECTOR_STUB_TABLE
VECTOR_STUB_TABLE:
.set vec, 0
.rept 256
    vela_stub_ref %vec
    .set vec, vec + 1
.endr
.noaltmacro

vela_interrupt_common:
    push rax
    push rbx
    push rcx
    push rdx
    push rsi
    push rdi
    push rbp
    push r8
    push r9
    push r10
    push r11
    push r12
    push r13
    push r14
    push r15

    sub rsp, 256
    movaps [rsp + 0x00], xmm0
    movaps [rsp + 0x10], xmm1
    movaps [rsp + 0x20], xmm2
    movaps [rsp + 0x30], xmm3
    movaps [rsp + 0x40], xmm4
    movaps [rsp + 0x50], xmm5
    movaps [rsp + 0x60], xmm6
    movaps [rsp + 0x70], xmm7
    movaps [rsp + 0x80], xmm8
    movaps [rsp + 0x90], xmm9
    movaps [rsp + 0xA0], xmm10
    movaps [rsp + 0xB0], xmm11
    movaps [rsp + 0xC0], xmm12
    movaps [rsp + 0xD0], xmm13
    movaps [rsp + 0xE0], xmm14
    movaps [rsp + 0xF0], xmm15

    // The stack now holds a complete ThreadContext; dispatch on it.
    mov rdi, rsp
    call {dispatch}

    // RAX = stack pointer to resume on, RDX != 0 for a first dispatch.
    mov rsp, rax
    test rdx, rdx
    jnz 2f

    movaps xmm0,  [rsp + 0x00]
    movaps xmm1,  [rsp + 0x10]
    movaps xmm2,  [rsp + 0x20]
    movaps xmm3,  [rsp + 0x30]
    movaps xmm4,  [rsp + 0x40]
    movaps xmm5,  [rsp + 0x50]
    movaps xmm6,  [rsp + 0x60]
    movaps xmm7,  [rsp + 0x70]
    movaps xmm8,  [rsp + 0x80]
    movaps xmm9,  [rsp + 0x90]
    movaps xmm10, [rsp + 0xA0]
    movaps xmm11, [rsp + 0xB0]
    movaps xmm12, [rsp + 0xC0]
    movaps xmm13, [rsp + 0xD0]
    movaps xmm14, [rsp + 0xE0]
    movaps xmm15, [rsp + 0xF0]
    jmp 3f

2:  // First dispatch: reset x87/SSE state instead of loading the image.
    fninit
    ldmxcsr [rip + {mxcsr}]

3:
    add rsp, 256
    pop r15
    pop r14
    pop r13
    pop r12
    pop r11
    pop r10
    pop r9
    pop r8
    pop rbp
    pop rdi
    pop rsi
    pop rdx
    pop rcx
    pop rbx
    pop rax

    // Skip vector, error_code, fault_address and scratch.
    add rsp, 32
    iretq
"#,
    dispatch = sym crate::interrupts::dispatch_interrupt,
    mxcsr = sym DEFAULT_MXCSR,
);

unsafe extern "C" {
    /// Addresses of the 256 per-vector entry stubs.
    static VECTOR_STUB_TABLE: [u64; 256];
}

/// Entry address of the stub for the given vector.
pub fn stub_address(vector: u8) -> u64 {
    unsafe { VECTOR_STUB_TABLE[vector as usize] }
}
