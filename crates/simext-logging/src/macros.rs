//! ---
//! simext_section: "03-logging"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Structured logging macros."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
/// Emit an event at `level` carrying the fields of a [`LogContext`](crate::LogContext).
#[macro_export]
macro_rules! sim_event {
    ($level:expr, context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            run = ctx.run.unwrap_or(""),
            engine = ctx.engine.unwrap_or(""),
            period = ctx.period.unwrap_or_default(),
            sub_step = ctx.sub_step.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($level:expr, $($arg:tt)+) => {{
        $crate::sim_event!($level, context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit an informational log enriched with run context.
#[macro_export]
macro_rules! sim_info {
    ($($arg:tt)+) => { $crate::sim_event!(tracing::Level::INFO, $($arg)+) };
}

/// Emit a debug log enriched with run context.
#[macro_export]
macro_rules! sim_debug {
    ($($arg:tt)+) => { $crate::sim_event!(tracing::Level::DEBUG, $($arg)+) };
}

/// Emit a warning enriched with run context.
#[macro_export]
macro_rules! sim_warn {
    ($($arg:tt)+) => { $crate::sim_event!(tracing::Level::WARN, $($arg)+) };
}

/// Emit an error log enriched with run context.
#[macro_export]
macro_rules! sim_error {
    ($($arg:tt)+) => { $crate::sim_event!(tracing::Level::ERROR, $($arg)+) };
}
