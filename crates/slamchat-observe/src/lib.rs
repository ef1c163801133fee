//! Observability setup for SlamChat: structured logging with an optional
//! OpenTelemetry bridge.

pub mod tracing_setup;
