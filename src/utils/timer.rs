/*
 * System Timer
 *
 * Tick accounting for the preemptive scheduler. The platform timer is
 * programmed at a fixed frequency; every interrupt advances the global tick
 * counter and feeds the scheduler the elapsed time in nanoseconds, computed
 * once from the device's actual rate.
 */

use core::sync::atomic::{AtomicU64, Ordering};

use crate::arch;
use crate::interrupts;
use crate::sched::SchedulerManager;

/// Timer ticks since boot.
static TICKS: AtomicU64 = AtomicU64::new(0);

/// Nanoseconds represented by one tick, derived from the device rate.
static NANOS_PER_TICK: AtomicU64 = AtomicU64::new(0);

/// Programs the platform timer and installs the tick handler.
///
/// Must run after the interrupt manager is initialized and before interrupts
/// are enabled.
pub fn init(frequency_hz: u32) {
    let nanos = arch::timer_init(frequency_hz);
    NANOS_PER_TICK.store(nanos, Ordering::Relaxed);

    interrupts::set_handler(arch::TIMER_VECTOR, timer_interrupt_handler);
    interrupts::route_irq(arch::TIMER_IRQ, arch::TIMER_VECTOR, false);

    log::info!(
        "Timer configured: {} Hz ({} ns per tick)",
        frequency_hz,
        nanos
    );
}

/// Tick handler, invoked by the interrupt dispatcher on the timer vector.
///
/// Runs in IRQ context with interrupts masked. The saved context pointer is
/// handed to the scheduler so a preemption decision can publish a switch for
/// the dispatcher to apply on return.
fn timer_interrupt_handler(ctx: &mut arch::ThreadContext) {
    TICKS.fetch_add(1, Ordering::Relaxed);
    arch::timer_rearm();

    SchedulerManager::on_timer_interrupt(
        arch::cpu_id(),
        ctx as *mut arch::ThreadContext as u64,
        nanos_per_tick(),
    );
}

/// Timer ticks since boot.
pub fn now_ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Nanoseconds per timer tick.
pub fn nanos_per_tick() -> u64 {
    NANOS_PER_TICK.load(Ordering::Relaxed)
}

/// Uptime in milliseconds, derived from the tick counter.
pub fn uptime_ms() -> u64 {
    now_ticks() * nanos_per_tick() / 1_000_000
}
