/*
 * In-Kernel Test Suite
 *
 * Scheduler scenarios that need live preemption: fairness under the timer,
 * block/wake, first dispatch of a fresh thread, sleep wakeup and exit
 * reclamation. The suite runs in its own kernel thread (the idle thread
 * cannot sleep) and reports through the log.
 *
 * Pure logic is covered by the `#[cfg(test)]` units next to the code it
 * tests; this suite exercises the interrupt-driven paths those units
 * cannot reach.
 */

pub mod sched_suite;

use crate::sched::SchedulerManager;

extern "C" fn suite_entry(_arg: usize) {
    let (passed, failed) = sched_suite::run_scheduler_suite();
    if failed == 0 {
        log::info!("[Suite] All {} scheduler tests passed", passed);
    } else {
        log::error!("[Suite] {} passed, {} FAILED", passed, failed);
    }
}

/// Spawns the suite runner; call before enabling the scheduler.
pub fn spawn_suite() {
    SchedulerManager::spawn(suite_entry, 0).expect("failed to spawn test suite");
    log::info!("Scheduler test suite thread created");
}
