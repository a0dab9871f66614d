/*
 * Device Drivers
 *
 * The scheduler core only depends on two devices: the serial UART for debug
 * and panic output, and the platform timer (owned by the architecture layer).
 */

pub mod serial;
