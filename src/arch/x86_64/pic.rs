/*
 * 8259 Programmable Interrupt Controller
 *
 * The platform interrupt controller collaborator on x86-64. The chained
 * PICs are remapped above the exception range; IRQ lines map rigidly to
 * vectors PIC_OFFSET + irq, so routing only validates the mapping and
 * drives the mask bits.
 */

use core::sync::atomic::{AtomicBool, Ordering};

use pic8259::ChainedPics;
use spin::Mutex;

/// First vector of the primary PIC (IRQ 0..7 -> 32..39).
pub const PIC_OFFSET: u8 = 32;

/// First vector of the secondary PIC (IRQ 8..15 -> 40..47).
pub const PIC_2_OFFSET: u8 = PIC_OFFSET + 8;

/// Sentinel returned by `ack_interrupt`: the 8259 presents the vector
/// directly, no acknowledge read is required.
pub const ACK_NONE: u32 = u32::MAX;

static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_OFFSET, PIC_2_OFFSET) });

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Remaps the PICs and masks every line.
///
/// Lines are unmasked individually through `route_irq`.
pub fn init() {
    unsafe {
        let mut pics = PICS.lock();
        pics.initialize();
        pics.write_masks(0xFF, 0xFF);
    }
    INITIALIZED.store(true, Ordering::Release);
    log::info!("PIC remapped to vectors {}..{}", PIC_OFFSET, PIC_2_OFFSET + 8);
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// Signals end-of-interrupt for the given vector.
pub fn send_eoi(vector: u8) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(vector);
    }
}

/// Routes a hardware IRQ line to its vector, optionally leaving it masked.
///
/// The 8259 cannot re-target lines, so the requested vector must match the
/// fixed `PIC_OFFSET + irq` mapping.
pub fn route_irq(irq: u8, vector: u8, start_masked: bool) -> Result<(), &'static str> {
    if irq >= 16 {
        return Err("IRQ line out of range");
    }
    if vector != PIC_OFFSET + irq {
        return Err("8259 cannot remap an IRQ line to an arbitrary vector");
    }

    unsafe {
        let mut pics = PICS.lock();
        let [mut master, mut slave] = pics.read_masks();
        if irq < 8 {
            if start_masked {
                master |= 1 << irq;
            } else {
                master &= !(1 << irq);
            }
        } else {
            if start_masked {
                slave |= 1 << (irq - 8);
            } else {
                slave &= !(1 << (irq - 8));
            }
            // Cascade line must be open for any secondary IRQ.
            master &= !(1 << 2);
        }
        pics.write_masks(master, slave);
    }

    Ok(())
}

/// Acknowledge read. The 8259 needs none; callers get the sentinel.
pub fn ack_interrupt() -> u32 {
    ACK_NONE
}
