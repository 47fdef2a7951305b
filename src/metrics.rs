//! Per-stage counters, recorded through the `metrics` facade when the
//! `metrics` feature is enabled.

use crate::stage::StageKind;

pub const ITEMS_IN: &str = "pipeweld_items_in_total";
pub const ITEMS_OUT: &str = "pipeweld_items_out_total";
pub const WORKERS_CLOSED: &str = "pipeweld_workers_closed_total";

/// An item was read from upstream
#[inline]
pub(crate) fn record_in(stage: StageKind) {
    #[cfg(feature = "metrics")]
    {
        ::metrics::counter!(ITEMS_IN, "stage" => stage.as_str()).increment(1);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = stage;
}

/// An item was written downstream
#[inline]
pub(crate) fn record_out(stage: StageKind) {
    #[cfg(feature = "metrics")]
    {
        ::metrics::counter!(ITEMS_OUT, "stage" => stage.as_str()).increment(1);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = stage;
}

#[inline]
pub(crate) fn record_closed(stage: StageKind) {
    #[cfg(feature = "metrics")]
    {
        ::metrics::counter!(WORKERS_CLOSED, "stage" => stage.as_str()).increment(1);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = stage;
}
