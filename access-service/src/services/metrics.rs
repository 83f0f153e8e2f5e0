//! Domain counters. Rendering lives with the Prometheus recorder installed
//! at startup.

use metrics::counter;

pub const AUTH_ATTEMPTS_TOTAL: &str = "auth_attempts_total";
pub const GUARD_DECISIONS_TOTAL: &str = "guard_decisions_total";

pub fn record_auth_outcome(outcome: &'static str) {
    counter!(AUTH_ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_guard_decision(resource: &'static str, decision: &'static str) {
    counter!(GUARD_DECISIONS_TOTAL, "resource" => resource, "decision" => decision).increment(1);
}
