/*
 * GICv2 Interrupt Controller
 *
 * The platform interrupt controller collaborator on AArch64 (QEMU virt
 * machine layout). Unlike the 8259, the GIC requires an acknowledge read
 * (GICC_IAR) to learn the interrupt id, and the matching end-of-interrupt
 * write must carry that id back.
 */

use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{AtomicBool, Ordering};

/// Distributor base (QEMU virt).
const GICD_BASE: usize = 0x0800_0000;
/// CPU interface base (QEMU virt).
const GICC_BASE: usize = 0x0801_0000;

const GICD_CTLR: usize = 0x000;
const GICD_ISENABLER: usize = 0x100;
const GICD_ICENABLER: usize = 0x180;
const GICD_SGIR: usize = 0xF00;

const GICC_CTLR: usize = 0x000;
const GICC_PMR: usize = 0x004;
const GICC_IAR: usize = 0x00C;
const GICC_EOIR: usize = 0x010;

/// Spurious interrupt id returned by an IAR read with nothing pending.
pub const SPURIOUS_ID: u32 = 1023;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

fn gicd(offset: usize) -> *mut u32 {
    (GICD_BASE + offset) as *mut u32
}

fn gicc(offset: usize) -> *mut u32 {
    (GICC_BASE + offset) as *mut u32
}

/// Enables the distributor and this CPU's interface, accepting all
/// priorities.
pub fn init() {
    unsafe {
        write_volatile(gicd(GICD_CTLR), 1);
        write_volatile(gicc(GICC_PMR), 0xFF);
        write_volatile(gicc(GICC_CTLR), 1);
    }
    INITIALIZED.store(true, Ordering::Release);
    log::info!("GICv2 enabled");
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// Acknowledges the pending interrupt, returning its id.
pub fn ack_interrupt() -> u32 {
    unsafe { read_volatile(gicc(GICC_IAR)) & 0x3FF }
}

/// Signals end-of-interrupt for a previously acknowledged id.
pub fn send_eoi(intid: u32) {
    unsafe {
        write_volatile(gicc(GICC_EOIR), intid);
    }
}

/// Enables (or masks) an interrupt line in the distributor.
///
/// The GIC presents interrupt ids directly; the `vector` the kernel routes
/// to must equal the id.
pub fn route_irq(intid: u8, vector: u8, start_masked: bool) -> Result<(), &'static str> {
    if vector != intid {
        return Err("GIC interrupt ids map one-to-one onto vectors");
    }

    let reg = intid as usize / 32;
    let bit = 1u32 << (intid % 32);
    unsafe {
        if start_masked {
            write_volatile(gicd(GICD_ICENABLER + reg * 4), bit);
        } else {
            write_volatile(gicd(GICD_ISENABLER + reg * 4), bit);
        }
    }
    Ok(())
}

/// Raises a software-generated interrupt on the current CPU.
pub fn raise_sgi_self(sgi: u8) {
    // Target list filter 0b10: this CPU only.
    unsafe {
        write_volatile(gicd(GICD_SGIR), (0b10 << 24) | (sgi as u32 & 0xF));
    }
}
