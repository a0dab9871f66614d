/*
 * Scheduler Scenario Tests
 *
 * Each test drives the live scheduler through its public facade and checks
 * the observable outcome. The suite assumes the single-CPU bring-up used by
 * the boot path: with one run queue, two spinning threads genuinely
 * compete for the CPU and fairness is measurable.
 */

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::sched::{SchedulerManager, ThreadState};

/// =======================
///  SPINNER FIXTURE
/// =======================

static STOP_SPINNERS: AtomicBool = AtomicBool::new(false);
static SPIN_COUNTS: [AtomicU64; 2] = [AtomicU64::new(0), AtomicU64::new(0)];

extern "C" fn spinner(arg: usize) {
    while !STOP_SPINNERS.load(Ordering::Relaxed) {
        SPIN_COUNTS[arg].fetch_add(1, Ordering::Relaxed);
    }
}

fn reset_spinners() {
    STOP_SPINNERS.store(false, Ordering::Relaxed);
    SPIN_COUNTS[0].store(0, Ordering::Relaxed);
    SPIN_COUNTS[1].store(0, Ordering::Relaxed);
}

/// Runs two spinners with the given priorities for `duration_ms` and
/// returns their progress counts.
fn race_spinners(priority_a: Option<u64>, priority_b: Option<u64>, duration_ms: u64) -> (u64, u64) {
    reset_spinners();

    let (a, cpu_a) = SchedulerManager::create_thread(spinner, 0, priority_a).unwrap();
    let (b, cpu_b) = SchedulerManager::create_thread(spinner, 1, priority_b).unwrap();
    SchedulerManager::ready_thread(cpu_a, a).unwrap();
    SchedulerManager::ready_thread(cpu_b, b).unwrap();

    SchedulerManager::sleep_current(duration_ms).unwrap();
    STOP_SPINNERS.store(true, Ordering::Relaxed);

    // Give both spinners a chance to observe the stop flag and exit.
    SchedulerManager::sleep_current(50).unwrap();

    (
        SPIN_COUNTS[0].load(Ordering::Relaxed),
        SPIN_COUNTS[1].load(Ordering::Relaxed),
    )
}

/// =======================
///  BLOCK / WAKE FIXTURE
/// =======================

static BLOCK_STAGE: AtomicUsize = AtomicUsize::new(0);

extern "C" fn blocker(_arg: usize) {
    BLOCK_STAGE.store(1, Ordering::SeqCst);
    SchedulerManager::block_current().unwrap();
    BLOCK_STAGE.store(2, Ordering::SeqCst);
}

/// =======================
///  FIRST DISPATCH FIXTURE
/// =======================

static FIRST_ARG_SEEN: AtomicU64 = AtomicU64::new(0);

extern "C" fn first_dispatch_probe(arg: usize) {
    FIRST_ARG_SEEN.store(arg as u64, Ordering::SeqCst);
}

/// =======================
///  SUITE
/// =======================

fn check(name: &str, condition: bool, passed: &mut usize, failed: &mut usize) {
    if condition {
        log::info!("[Sched Test] {} ... ok", name);
        *passed += 1;
    } else {
        log::error!("[Sched Test] {} ... FAILED", name);
        *failed += 1;
    }
}

/// Runs every scenario; returns (passed, failed).
pub fn run_scheduler_suite() -> (usize, usize) {
    let mut passed = 0;
    let mut failed = 0;

    log::info!("[Sched Test] starting scheduler scenario suite");

    test_equal_share(&mut passed, &mut failed);
    test_weighted_share(&mut passed, &mut failed);
    test_block_and_wake(&mut passed, &mut failed);
    test_first_dispatch(&mut passed, &mut failed);
    test_sleep_duration(&mut passed, &mut failed);
    test_exit_reclamation(&mut passed, &mut failed);

    (passed, failed)
}

/// Two equal-weight spinners must make comparable progress.
fn test_equal_share(passed: &mut usize, failed: &mut usize) {
    let (a, b) = race_spinners(None, None, 500);
    let total = a + b;

    // Each side should land near half, with generous slack for timer
    // quantization.
    let fair = total > 0 && a * 100 / total >= 30 && b * 100 / total >= 30;
    check("equal tickets share the CPU evenly", fair, passed, failed);
}

/// A 3:1 ticket split must show up in the progress ratio.
fn test_weighted_share(passed: &mut usize, failed: &mut usize) {
    let (a, b) = race_spinners(Some(3), Some(1), 500);

    let weighted = b > 0 && a > b && a * 100 / (a + b) >= 55;
    check("weighted tickets bias the CPU share", weighted, passed, failed);
}

/// Blocked threads leave the runnable set and resume on ready.
fn test_block_and_wake(passed: &mut usize, failed: &mut usize) {
    BLOCK_STAGE.store(0, Ordering::SeqCst);

    let (id, cpu) = SchedulerManager::create_thread(blocker, 0, None).unwrap();
    SchedulerManager::ready_thread(cpu, id).unwrap();

    // Wait for the thread to block itself.
    while BLOCK_STAGE.load(Ordering::SeqCst) < 1 {
        SchedulerManager::sleep_current(10).unwrap();
    }
    SchedulerManager::sleep_current(50).unwrap();

    let blocked = SchedulerManager::thread_state(cpu, id) == Some(ThreadState::Blocked);
    check("blocked thread parks in Blocked state", blocked, passed, failed);

    SchedulerManager::ready_thread(cpu, id).unwrap();
    let mut waited = 0;
    while BLOCK_STAGE.load(Ordering::SeqCst) < 2 && waited < 100 {
        SchedulerManager::sleep_current(10).unwrap();
        waited += 1;
    }
    check(
        "woken thread resumes past the block",
        BLOCK_STAGE.load(Ordering::SeqCst) == 2,
        passed,
        failed,
    );
}

/// A fresh thread's first dispatch must deliver the entry argument.
fn test_first_dispatch(passed: &mut usize, failed: &mut usize) {
    FIRST_ARG_SEEN.store(0, Ordering::SeqCst);

    let (id, cpu) = SchedulerManager::create_thread(first_dispatch_probe, 0x1234, None).unwrap();
    SchedulerManager::ready_thread(cpu, id).unwrap();

    let mut waited = 0;
    while FIRST_ARG_SEEN.load(Ordering::SeqCst) == 0 && waited < 100 {
        SchedulerManager::sleep_current(10).unwrap();
        waited += 1;
    }
    check(
        "first dispatch lands in entry(arg)",
        FIRST_ARG_SEEN.load(Ordering::SeqCst) == 0x1234,
        passed,
        failed,
    );
}

/// sleep_current must not wake early.
fn test_sleep_duration(passed: &mut usize, failed: &mut usize) {
    let before = crate::utils::timer::uptime_ms();
    SchedulerManager::sleep_current(100).unwrap();
    let elapsed = crate::utils::timer::uptime_ms() - before;

    check("sleep lasts at least the requested time", elapsed >= 100, passed, failed);
}

/// Exited threads disappear from the CPU's thread table once buried.
fn test_exit_reclamation(passed: &mut usize, failed: &mut usize) {
    let (id, cpu) = SchedulerManager::create_thread(first_dispatch_probe, 1, None).unwrap();
    SchedulerManager::ready_thread(cpu, id).unwrap();

    // Let it run to completion and get switched away from.
    SchedulerManager::sleep_current(100).unwrap();

    let state = SchedulerManager::thread_state(cpu, id);
    check(
        "exited thread leaves the thread table",
        state.is_none(),
        passed,
        failed,
    );
}
