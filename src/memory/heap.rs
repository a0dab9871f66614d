/*
 * Kernel Heap Allocator
 *
 * Dynamic memory for the kernel on top of the linked_list_allocator crate.
 * The scheduler only performs fixed-size allocations through this heap:
 * thread control blocks, thread stacks, and run-queue nodes.
 *
 * The loader identity-maps usable RAM, so the heap can be carved directly
 * out of the largest free region of the boot memory map.
 */

use linked_list_allocator::LockedHeap;

use crate::bootinfo::BootInfo;

/// Upper bound on the kernel heap (16 MiB).
///
/// Each thread stack is 64 KiB, so this comfortably covers the maximum
/// thread population plus scheduler bookkeeping.
pub const HEAP_MAX_SIZE: u64 = 16 * 1024 * 1024;

/// Regions below this address are left to firmware and legacy devices.
const HEAP_MIN_BASE: u64 = 0x10_0000;

/// Global allocator instance used by Rust's allocation APIs.
#[cfg_attr(not(test), global_allocator)]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initializes the heap over an explicit region.
///
/// # Safety
///
/// The region must be identity-mapped, writable, unused by anything else,
/// and this function must be called exactly once.
pub unsafe fn init_heap(base: u64, size: u64) {
    unsafe {
        ALLOCATOR.lock().init(base as *mut u8, size as usize);
    }
    log::info!(
        "Heap initialized: 0x{:x} - 0x{:x} ({} KiB)",
        base,
        base + size - 1,
        size / 1024
    );
}

/// Initializes the heap from the loader's memory map.
///
/// Picks the largest free region, clamps it to [`HEAP_MAX_SIZE`], and hands
/// it to the allocator.
pub fn init(boot: &BootInfo) -> Result<(), &'static str> {
    let (mut base, mut size) = boot
        .largest_free_region()
        .ok_or("no free region in boot memory map")?;

    if base < HEAP_MIN_BASE {
        let shift = HEAP_MIN_BASE - base;
        if shift >= size {
            return Err("free region below usable range");
        }
        base += shift;
        size -= shift;
    }
    size = size.min(HEAP_MAX_SIZE);

    unsafe { init_heap(base, size) };
    Ok(())
}

#[cfg(not(test))]
#[alloc_error_handler]
fn alloc_error(layout: core::alloc::Layout) -> ! {
    panic!("kernel heap exhausted: allocation of {:?} failed", layout)
}
