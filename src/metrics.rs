//! Prometheus metrics for the services link.
//!
//! - `p10_command_total{command}` - Inbound lines dispatched by command
//! - `p10_command_duration_seconds{command}` - Dispatch latency histogram
//! - `services_registrations_total{outcome}` - `N` registrations by outcome
//! - `services_trust_verdicts_total{verdict}` - Trust-check replies sent
//! - `services_burst_channels_total` - Channels sent in our burst
//! - `services_users` / `services_channels` - Size of the network mirror

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Inbound lines by command token.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Dispatch latency by command token.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Registrations by outcome (committed, updated, rejected).
pub static REGISTRATIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Trust-check replies by verdict.
pub static TRUST_VERDICTS: OnceLock<IntCounterVec> = OnceLock::new();

pub static BURST_CHANNELS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

pub static USERS: OnceLock<IntGauge> = OnceLock::new();

pub static CHANNELS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the metrics registry.
///
/// Safe to call more than once; later calls change nothing.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("p10_command_total", "P10 lines dispatched by command"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("p10_command_duration_seconds", "P10 dispatch latency by command")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["command"]));
    register!(REGISTRATIONS, IntCounterVec::new(Opts::new("services_registrations_total", "User registrations by outcome"), &["outcome"]));
    register!(TRUST_VERDICTS, IntCounterVec::new(Opts::new("services_trust_verdicts_total", "Trust-check verdicts sent"), &["verdict"]));
    register!(BURST_CHANNELS, IntCounter::new("services_burst_channels_total", "Channels sent in our burst"));
    register!(USERS, IntGauge::new("services_users", "Users in the network mirror"));
    register!(CHANNELS, IntGauge::new("services_channels", "Channels in the network mirror"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Update helpers. All are no-ops until `init` has run.
// ============================================================================

/// Record a dispatched line with its latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

#[inline]
pub fn record_registration(outcome: &str) {
    if let Some(c) = REGISTRATIONS.get() {
        c.with_label_values(&[outcome]).inc();
    }
}

#[inline]
pub fn record_trust_verdict(verdict: &str) {
    if let Some(c) = TRUST_VERDICTS.get() {
        c.with_label_values(&[verdict]).inc();
    }
}

#[inline]
pub fn record_burst(channels: usize) {
    if let Some(c) = BURST_CHANNELS.get() {
        c.inc_by(channels as u64);
    }
}

/// Refresh the mirror size gauges.
#[inline]
pub fn set_state_gauges(users: usize, channels: usize) {
    if let Some(g) = USERS.get() {
        g.set(users as i64);
    }
    if let Some(g) = CHANNELS.get() {
        g.set(channels as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();
        init();

        record_command("N", 0.001);
        record_registration("committed");
        record_trust_verdict("OK");
        record_burst(2);
        set_state_gauges(3, 1);

        let output = gather_metrics();
        assert!(output.contains("p10_command_total"));
        assert!(output.contains("services_registrations_total"));
        assert!(output.contains("services_users"));
    }
}
