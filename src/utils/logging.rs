//! Conditional logging macros gated on a module-level `ENABLE_LOGS` const.
//!
//! The tick loops log every capture and dispatch when enabled, which is far
//! too chatty for normal runs; each loop module declares
//! `const ENABLE_LOGS: bool = ...;` and flips it during debugging. The
//! macros are exported at the crate root.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
