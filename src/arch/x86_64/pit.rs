/*
 * Programmable Interval Timer
 *
 * PIT channel 0 drives the scheduler tick. The divisor quantizes the
 * requested frequency, so the nanoseconds-per-tick figure handed back to
 * the timer module is computed from the divisor actually programmed, not
 * from the requested rate.
 */

use x86_64::instructions::port::Port;

/// PIT input clock rate in Hz.
const PIT_BASE_HZ: u64 = 1_193_182;

/// Programs channel 0 in square-wave mode at (approximately) the requested
/// frequency. Returns the nanoseconds represented by one tick.
pub fn init(frequency_hz: u32) -> u64 {
    let divisor = (PIT_BASE_HZ / frequency_hz as u64).clamp(1, 65535) as u16;

    unsafe {
        let mut command = Port::<u8>::new(0x43);
        let mut channel0 = Port::<u8>::new(0x40);

        // Channel 0, access mode lo/hi, mode 3 (square wave), binary.
        command.write(0x36);
        channel0.write((divisor & 0xFF) as u8);
        channel0.write((divisor >> 8) as u8);
    }

    log::info!("PIT programmed: divisor {}", divisor);

    divisor as u64 * 1_000_000_000 / PIT_BASE_HZ
}
