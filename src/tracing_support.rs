//! Logging hooks for stage workers.
//!
//! With the `tracing` feature these forward to the `tracing` macros; without
//! it they expand to nothing.

macro_rules! stage_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::debug!($($arg)*);
        }
    };
}

macro_rules! stage_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::trace!($($arg)*);
        }
    };
}

macro_rules! stage_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::warn!($($arg)*);
        }
    };
}
