/*
 * Compile-time kernel configuration
 */

/// Maximum number of CPUs the scheduler will manage.
pub const MAX_CPUS: usize = 8;

/// Default kernel thread stack size (64 KiB).
pub const THREAD_STACK_SIZE: usize = 64 * 1024;

/// Platform timer frequency driving preemption.
pub const TIMER_FREQUENCY_HZ: u32 = 100;
