/*
 * Interrupt Descriptor Table
 *
 * Every one of the 256 vectors is routed through the per-vector entry stubs
 * so that a single save/restore path produces the ThreadContext layout the
 * dispatcher and the scheduler agree on. Handler selection happens in the
 * interrupt manager, not here: the IDT's only job is to get every vector
 * into the common stub path.
 */

use lazy_static::lazy_static;
use x86_64::VirtAddr;
use x86_64::structures::idt::InterruptDescriptorTable;

use super::gdt;
use super::stubs::stub_address;

fn stub(vector: u8) -> VirtAddr {
    VirtAddr::new(stub_address(vector))
}

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        unsafe {
            idt.divide_error.set_handler_addr(stub(0));
            idt.debug.set_handler_addr(stub(1));
            idt.non_maskable_interrupt.set_handler_addr(stub(2));
            idt.breakpoint.set_handler_addr(stub(3));
            idt.overflow.set_handler_addr(stub(4));
            idt.bound_range_exceeded.set_handler_addr(stub(5));
            idt.invalid_opcode.set_handler_addr(stub(6));
            idt.device_not_available.set_handler_addr(stub(7));
            // Double faults run on their own IST stack; a corrupt thread
            // stack must not take down the fault report.
            idt.double_fault
                .set_handler_addr(stub(8))
                .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
            idt.invalid_tss.set_handler_addr(stub(10));
            idt.segment_not_present.set_handler_addr(stub(11));
            idt.stack_segment_fault.set_handler_addr(stub(12));
            idt.general_protection_fault.set_handler_addr(stub(13));
            idt.page_fault.set_handler_addr(stub(14));
            idt.x87_floating_point.set_handler_addr(stub(16));
            idt.alignment_check.set_handler_addr(stub(17));
            idt.machine_check.set_handler_addr(stub(18));
            idt.simd_floating_point.set_handler_addr(stub(19));
            idt.virtualization.set_handler_addr(stub(20));
            idt.cp_protection_exception.set_handler_addr(stub(21));
            idt.hv_injection_exception.set_handler_addr(stub(28));
            idt.vmm_communication_exception.set_handler_addr(stub(29));
            idt.security_exception.set_handler_addr(stub(30));

            for vector in 32..=255u8 {
                idt[vector].set_handler_addr(stub(vector));
            }
        }

        idt
    };
}

/// Loads the IDT.
///
/// Must be called after the GDT is in place and before interrupts are
/// enabled.
pub fn init() {
    log::info!("Loading IDT...");
    IDT.load();
    log::info!("IDT initialized: 256 vectors routed through the entry stubs");
}
