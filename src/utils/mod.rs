/*
 * Kernel Utilities
 */

#[macro_use]
pub mod macros;

pub mod logger;
pub mod timer;
