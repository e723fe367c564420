//! Sampling-aware span macros (grounded on the teacher's
//! `core/observability/macros.rs`). Head-based sampling: the root request
//! makes the keep/drop decision, every child span is created unconditionally
//! once a parent is active, so a kept trace is never missing spans partway
//! through.

/// Root span for one inbound request, sampled at `sample_percent` unless a
/// parent span is already active (e.g. under a test harness), in which case
/// it's always created.
#[macro_export]
macro_rules! sample_or_attach_root_span {
    ($sample_percent:expr, $span_name:literal) => {{
        let current = tracing::Span::current();
        if !current.is_disabled() || rand::random::<f32>() < $sample_percent {
            tracing::info_span!($span_name)
        } else {
            tracing::Span::none()
        }
    }};
    ($sample_percent:expr, $span_name:literal, $($fields:tt)*) => {{
        let current = tracing::Span::current();
        if !current.is_disabled() || rand::random::<f32>() < $sample_percent {
            tracing::info_span!($span_name, $($fields)*)
        } else {
            tracing::Span::none()
        }
    }};
}

/// Child span created only when the parent is active, so unsampled requests
/// pay no span-construction cost.
#[macro_export]
macro_rules! child_span_info {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

#[macro_export]
macro_rules! child_span_debug {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}
