//! Log-based metrics for the endpoint sync handler
//!
//! Outcomes are emitted as structured events under the `metrics` target so a
//! log pipeline can count them; there is no exporter in-process.

use tracing::info;

/// Metrics recorder for endpoint sync invocations
#[derive(Clone, Default)]
pub struct Metrics;

impl Metrics {
    /// Record the terminal outcome of one invocation
    pub fn record_invocation(&self, event_kind: &str, outcome: &str) {
        info!(
            target: "metrics",
            event_kind = %event_kind,
            outcome = %outcome,
            "Recorded invocation"
        );
    }

    /// Record an endpoint group update result
    pub fn record_update(&self, success: bool, endpoint_count: usize) {
        info!(
            target: "metrics",
            success = success,
            endpoint_count = endpoint_count,
            "Recorded endpoint group update"
        );
    }

    /// Record a lifecycle abandon result
    pub fn record_abandon(&self, success: bool, auto_scaling_group_name: &str) {
        info!(
            target: "metrics",
            success = success,
            auto_scaling_group_name = %auto_scaling_group_name,
            "Recorded lifecycle abandon"
        );
    }

    /// Record processing error
    pub fn record_error(&self, error_type: &str) {
        info!(target: "metrics", error_type = %error_type, "Recorded error");
    }
}
