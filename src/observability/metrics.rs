//! Navigation metrics.
//!
//! # Metrics
//! - `router_navigations_total` (counter): navigations by outcome
//! - `router_navigation_duration_seconds` (histogram): resolve + hooks
//! - `router_notifications_dropped_total` (counter): history events an
//!   instance ignored because it was mid-transition
//! - `router_instances` (gauge): registered instances
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the embedding application
//!   picks the recorder, and without one every call is a no-op

use std::time::Instant;

pub fn record_navigation(outcome: &'static str, start_time: Instant) {
    metrics::counter!("router_navigations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("router_navigation_duration_seconds")
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_notification_dropped() {
    metrics::counter!("router_notifications_dropped_total").increment(1);
}

pub fn record_instances(count: usize) {
    metrics::gauge!("router_instances").set(count as f64);
}
