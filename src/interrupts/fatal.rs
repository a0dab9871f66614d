/*
 * Fatal Exception Path
 *
 * The CPU exceptions no kernel recovers from are bound here at init. The
 * report writes the vector name, every saved register and the auxiliary
 * fault data byte-by-byte to the serial port through the raw, lock-free
 * writers, then masks interrupts and halts forever. Nothing on this path
 * allocates or takes a lock: it must work with a corrupt heap and a wedged
 * logger.
 */

use crate::arch::{self, ThreadContext};
use crate::drivers::serial::{write_hex, write_string};

/// Exception vectors that always take the fatal path, with their names.
#[cfg(target_arch = "x86_64")]
const FATAL_VECTORS: &[(u8, &str)] = &[
    (0, "Divide Error"),
    (6, "Invalid Opcode"),
    (8, "Double Fault"),
    (11, "Segment Not Present"),
    (12, "Stack Segment Fault"),
    (13, "General Protection Fault"),
    (14, "Page Fault"),
    (17, "Alignment Check"),
    (18, "Machine Check"),
];

#[cfg(target_arch = "aarch64")]
const FATAL_VECTORS: &[(u8, &str)] = &[
    (arch::SYNC_VECTOR, "Synchronous Exception"),
    (arch::SERROR_VECTOR, "SError"),
];

/// Binds every fatal vector to the report-and-halt handler.
pub fn init() {
    for &(vector, _) in FATAL_VECTORS {
        super::set_handler(vector, fatal_exception_handler);
    }
}

fn vector_name(vector: u16) -> &'static str {
    FATAL_VECTORS
        .iter()
        .find(|&&(v, _)| v as u16 == vector)
        .map(|&(_, name)| name)
        .unwrap_or("Unknown Exception")
}

/// Handler installed on the fatal vectors. Reports and halts; the stub
/// never sees a return from this.
fn fatal_exception_handler(ctx: &mut ThreadContext) {
    report(ctx, ctx.vector as u16);
    halt_forever();
}

/// Taken when a vector with no installed handler fires.
pub fn unexpected_interrupt(ctx: &mut ThreadContext, vector: u16) -> ! {
    write_string("\n!! Unhandled interrupt vector ");
    write_hex(vector as u64);
    write_string("\n");
    report(ctx, vector);
    halt_forever();
}

fn line(label: &str, value: u64) {
    write_string("  ");
    write_string(label);
    write_string(" = ");
    write_hex(value);
    write_string("\n");
}

#[cfg(target_arch = "x86_64")]
fn report(ctx: &ThreadContext, vector: u16) {
    write_string("\n!! FATAL EXCEPTION: ");
    write_string(vector_name(vector));
    write_string(" (vector ");
    write_hex(vector as u64);
    write_string(")\n");

    line("RIP", ctx.frame.rip);
    line("CS ", ctx.frame.cs);
    line("RFLAGS", ctx.frame.rflags);
    line("RSP", ctx.frame.rsp);
    line("SS ", ctx.frame.ss);
    line("RAX", ctx.rax);
    line("RBX", ctx.rbx);
    line("RCX", ctx.rcx);
    line("RDX", ctx.rdx);
    line("RSI", ctx.rsi);
    line("RDI", ctx.rdi);
    line("RBP", ctx.rbp);
    line("R8 ", ctx.r8);
    line("R9 ", ctx.r9);
    line("R10", ctx.r10);
    line("R11", ctx.r11);
    line("R12", ctx.r12);
    line("R13", ctx.r13);
    line("R14", ctx.r14);
    line("R15", ctx.r15);
    line("error code", ctx.error_code);
    line("fault address", ctx.fault_address);
}

#[cfg(target_arch = "aarch64")]
fn report(ctx: &ThreadContext, vector: u16) {
    write_string("\n!! FATAL EXCEPTION: ");
    write_string(vector_name(vector));
    write_string(" (class ");
    write_hex(ctx.vector);
    write_string(")\n");

    line("ELR", ctx.elr);
    line("SPSR", ctx.spsr);
    line("SP ", ctx.sp);
    for (i, value) in ctx.x.iter().enumerate() {
        write_string("  X");
        crate::drivers::serial::write_number(i as u64);
        write_string(" = ");
        write_hex(*value);
        write_string("\n");
    }
    line("ESR", ctx.esr);
    line("FAR", ctx.far);
}

/// Masks interrupts and spins in halt. The CPU never comes back.
fn halt_forever() -> ! {
    arch::disable_interrupts();
    loop {
        arch::halt();
    }
}
