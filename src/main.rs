/*
 * Vela Kernel Entry Point
 *
 * Boot flow: the loader drops all cores into `_start`, which identifies the
 * BSP, moves it onto the kernel's own stack and calls `kstart`. Application
 * processors park until the scheduler grows SMP bring-up. `kstart` brings
 * the subsystems up in dependency order and finally becomes CPU 0's idle
 * thread.
 */

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]
#![cfg_attr(not(test), feature(alloc_error_handler))]
#![allow(dead_code)]

extern crate alloc;
#[cfg(not(test))]
extern crate rlibc;

#[cfg(not(test))]
use core::panic::PanicInfo;

#[macro_use]
mod utils;

mod arch;
mod bootinfo;
mod config;
mod drivers;
mod interrupts;
mod io;
mod memory;
mod sched;
mod sync;
mod tests;

const BSP_STACK_SIZE: usize = 64 * 1024;

#[repr(C, align(16))]
pub struct AlignedBspStack([u8; BSP_STACK_SIZE]);

#[unsafe(no_mangle)]
pub static mut BSP_STACK: AlignedBspStack = AlignedBspStack([0; BSP_STACK_SIZE]);

/// ===============================
///  EARLY ENTRY POINT (_start)
/// ===============================
///
/// Called by the loader on ALL cores. Required to:
///   - Identify the BSP via the boot info's bspid
///   - Switch the BSP onto its 64 KiB kernel stack
///   - Call into Rust's `kstart`
///   - Park APs
#[cfg(all(not(test), target_arch = "x86_64"))]
#[unsafe(naked)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _start() -> ! {
    core::arch::naked_asm!(
        // CPUID leaf 1: EBX[31:24] = APIC id of this core
        "mov eax, 1",
        "cpuid",
        "shr ebx, 24",

        // bspid lives at offset 0x0C of the boot info block
        "lea rax, [rip + bootinfo]",
        "movzx ecx, word ptr [rax + 0x0C]",
        "cmp ebx, ecx",
        "jne 2f",

        // BSP: switch to the kernel stack and enter Rust
        "lea rax, [rip + BSP_STACK]",
        "add rax, {stack_size}",
        "mov rsp, rax",
        "jmp kstart",

        // APs park here until SMP bring-up exists
        "2:",
        "hlt",
        "jmp 2b",

        stack_size = const BSP_STACK_SIZE,
    );
}

#[cfg(all(not(test), target_arch = "aarch64"))]
core::arch::global_asm!(
    r#"
.global _start
_start:
    // Core 0 boots; everything else parks.
    mrs x0, MPIDR_EL1
    and x0, x0, #0xFF
    cbnz x0, 1f

    adrp x1, BSP_STACK
    add x1, x1, :lo12:BSP_STACK
    add x1, x1, {stack_size}
    mov sp, x1
    b kstart

1:
    wfe
    b 1b
"#,
    stack_size = const BSP_STACK_SIZE,
);

/// ===============================
///  RUST KERNEL ENTRY POINT
/// ===============================
///
/// Runs on the BSP only, on the kernel's own stack.
#[cfg(not(test))]
#[unsafe(no_mangle)]
pub extern "C" fn kstart() -> ! {
    use alloc::boxed::Box;
    use sched::SchedulerManager;
    use sched::policies::StridePolicy;

    // Debug output first: everything after this can log.
    drivers::serial::init_debug_port();
    utils::logger::init(true);
    log::info!("Vela kernel starting...");

    // Descriptor tables, entry stubs, interrupt controller, fatal vectors.
    interrupts::init();

    // Heap from the loader's memory map.
    let boot = unsafe { &bootinfo::bootinfo };
    memory::heap::init(boot).expect("heap initialization failed");
    {
        let mut probe = alloc::vec::Vec::new();
        probe.push(42u64);
        probe.push(1337);
        log::info!("Heap self-test: {:?}", probe);
    }

    // Tick source for preemption.
    utils::timer::init(config::TIMER_FREQUENCY_HZ);

    // Scheduler: per-CPU state, policy, idle thread.
    // Single-CPU bring-up: APs stay parked in _start.
    SchedulerManager::initialize(1);
    SchedulerManager::set_scheduler(Box::new(StridePolicy::new()))
        .expect("policy installation failed");

    let stack_base = &raw const BSP_STACK as u64;
    SchedulerManager::setup_idle_thread(0, stack_base, BSP_STACK_SIZE)
        .expect("idle thread installation failed");

    // Ticks may arrive from here on; preemption stays off until enable().
    arch::enable_interrupts();
    log::info!("Interrupts enabled");

    tests::spawn_suite();

    SchedulerManager::enable();

    // This control flow is now the idle thread: halt until preempted.
    loop {
        arch::halt();
    }
}

/// Kernel panic: report over the raw serial path and halt. Never allocates;
/// the heap may be the thing that failed.
#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    use core::fmt::Write;

    arch::disable_interrupts();

    let mut out = drivers::serial::RawWriter;
    let _ = out.write_str("\n!! KERNEL PANIC: ");
    let _ = write!(out, "{}", info.message());
    if let Some(location) = info.location() {
        let _ = write!(out, "\n   at {}:{}", location.file(), location.line());
    }
    let _ = out.write_str("\n");

    loop {
        arch::halt();
    }
}
