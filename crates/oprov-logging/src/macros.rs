//! ---
//! oprov_section: "03-logging"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Structured logging adapters and sinks."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---

#[doc(hidden)]
#[macro_export]
macro_rules! __prov_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext = &$ctx;
        $crate::tracing::event!(
            $level,
            phase = ctx.phase.unwrap_or(""),
            model = ctx.model.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with reconciliation context.
#[macro_export]
macro_rules! prov_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__prov_event!($crate::tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__prov_event!($crate::tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with reconciliation context. Used for lookup
/// misses that reduce the desired state without aborting the run.
#[macro_export]
macro_rules! prov_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__prov_event!($crate::tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__prov_event!($crate::tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error enriched with reconciliation context.
#[macro_export]
macro_rules! prov_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__prov_event!($crate::tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__prov_event!($crate::tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
