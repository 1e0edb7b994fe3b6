//! Tracing setup: a single `EnvFilter`-driven `fmt` subscriber. No OTLP
//! bridge, no structured-event backend registry — this binary is a single
//! broker process, not a multi-tenant service, so `tracing`'s own fmt
//! layer is the whole observability stack.

use tracing_subscriber::EnvFilter;

pub fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
