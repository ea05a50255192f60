/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field so every event can be routed or
/// filtered by subsystem. Domains: `sys` (bootstrap and shutdown), `conn`
/// (live feed connection), `pipe` (records flowing through capture, filter
/// and windows), `res` (storage and output artifacts), `conf` (configuration).
///
/// ```ignore
/// tc_info!(sys, windows = 3, "dispatch complete");
/// tc_warn!(res, error = %e, record = %rec, "batch commit failed");
/// tc_debug!(conn, addr = %addr, "feed connected");
/// ```
///
/// The domain is a bare identifier, not a string.

#[doc(hidden)]
macro_rules! tc_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! tc_error {
    ($domain:ident, $($rest:tt)*) => {
        tc_log!(error, $domain, $($rest)*)
    };
}

macro_rules! tc_warn {
    ($domain:ident, $($rest:tt)*) => {
        tc_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! tc_info {
    ($domain:ident, $($rest:tt)*) => {
        tc_log!(info, $domain, $($rest)*)
    };
}

macro_rules! tc_debug {
    ($domain:ident, $($rest:tt)*) => {
        tc_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! tc_trace {
    ($domain:ident, $($rest:tt)*) => {
        tc_log!(trace, $domain, $($rest)*)
    };
}
