//! Maintenance-threshold alert engine.
//!
//! Each maintenance log is compared against its aircraft's threshold. At or
//! over the threshold the log's alert is opened (or refreshed and reopened);
//! under it, any open alert for the same log is resolved. Alerts are never
//! deleted by the engine, and there is at most one per
//! (aircraft, maintenance log) pair.

use serde::Serialize;

use crate::model::Severity;

/// Headline used for every threshold alert.
pub const THRESHOLD_TITLE: &str = "Maintenance Threshold Reached";

/// Default role that receives threshold alerts.
pub const DEFAULT_RECIPIENT_ROLE: &str = "maintenance";

/// Title, message, and severity for an alert about to be raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTemplate {
    /// Headline.
    pub title: String,
    /// Operator-facing text.
    pub message: String,
    /// Severity.
    pub severity: Severity,
    /// Role expected to act on the alert.
    pub recipient_role: String,
}

impl AlertTemplate {
    /// Template for a log of `hours` on `tail_number` against `threshold`.
    #[must_use]
    pub fn threshold(tail_number: &str, hours: f64, threshold: f64, recipient_role: &str) -> Self {
        Self {
            title: THRESHOLD_TITLE.to_string(),
            message: threshold_message(tail_number, hours, threshold),
            severity: Severity::High,
            recipient_role: recipient_role.to_string(),
        }
    }
}

/// Operator-facing alert text. Hours keep their decimal point, so a whole
/// number renders as `120.0`.
#[must_use]
pub fn threshold_message(tail_number: &str, hours: f64, threshold: f64) -> String {
    format!(
        "Aircraft {tail_number} recorded {} flight hours (threshold: {}). \
         Maintenance officer action required.",
        hours_text(hours),
        hours_text(threshold),
    )
}

/// Plain decimal notation, never an exponent.
fn hours_text(hours: f64) -> String {
    let text = hours.to_string();
    if hours.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

/// Whether `hours` has reached `threshold`.
#[must_use]
pub fn threshold_reached(hours: f64, threshold: f64) -> bool {
    hours >= threshold
}

/// What the engine wants done to the alert for one maintenance log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    /// Create the alert, or overwrite and reopen the existing one.
    Raise(AlertTemplate),
    /// Resolve the alert if it is open.
    Clear,
}

/// Decide the alert state for a log.
#[must_use]
pub fn evaluate(
    tail_number: &str,
    hours: f64,
    threshold: f64,
    recipient_role: &str,
) -> AlertDecision {
    if threshold_reached(hours, threshold) {
        AlertDecision::Raise(AlertTemplate::threshold(
            tail_number,
            hours,
            threshold,
            recipient_role,
        ))
    } else {
        AlertDecision::Clear
    }
}

/// What applying a decision actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AlertOutcome {
    /// A new alert was created.
    Opened {
        /// The new alert.
        alert_id: i64,
    },
    /// A resolved alert was forced open again.
    Reopened {
        /// The reopened alert.
        alert_id: i64,
    },
    /// An already open alert had its text refreshed.
    Refreshed {
        /// The refreshed alert.
        alert_id: i64,
    },
    /// An open alert was marked resolved.
    Resolved {
        /// The resolved alert.
        alert_id: i64,
    },
    /// Nothing to do.
    Unchanged,
}

impl AlertOutcome {
    /// The alert touched, if any.
    #[must_use]
    pub fn alert_id(self) -> Option<i64> {
        match self {
            Self::Opened { alert_id }
            | Self::Reopened { alert_id }
            | Self::Refreshed { alert_id }
            | Self::Resolved { alert_id } => Some(alert_id),
            Self::Unchanged => None,
        }
    }

    /// Whether the alert is open after this outcome.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(
            self,
            Self::Opened { .. } | Self::Reopened { .. } | Self::Refreshed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_reached_is_inclusive() {
        assert!(threshold_reached(100.0, 100.0));
        assert!(threshold_reached(120.0, 100.0));
        assert!(!threshold_reached(99.9, 100.0));
    }

    #[test]
    fn test_nan_hours_never_reach_threshold() {
        assert!(!threshold_reached(f64::NAN, 100.0));
    }

    #[test]
    fn test_message_format() {
        assert_eq!(
            threshold_message("GAF-002", 120.0, 100.0),
            "Aircraft GAF-002 recorded 120.0 flight hours (threshold: 100.0). \
             Maintenance officer action required."
        );
        assert!(threshold_message("GAF-001", 101.25, 100.0).contains("recorded 101.25 flight"));
        assert!(threshold_message("GAF-001", 1e16, 100.0).contains("recorded 10000000000000000.0 flight"));
        assert!(threshold_message("GAF-001", 0.000_1, 1.0).contains("recorded 0.0001 flight"));
    }

    #[test]
    fn test_evaluate_raise() {
        match evaluate("GAF-002", 120.0, 100.0, DEFAULT_RECIPIENT_ROLE) {
            AlertDecision::Raise(template) => {
                assert_eq!(template.title, THRESHOLD_TITLE);
                assert_eq!(template.severity, Severity::High);
                assert_eq!(template.recipient_role, "maintenance");
            }
            AlertDecision::Clear => panic!("expected raise"),
        }
    }

    #[test]
    fn test_evaluate_clear() {
        assert_eq!(
            evaluate("GAF-002", 80.0, 100.0, DEFAULT_RECIPIENT_ROLE),
            AlertDecision::Clear
        );
    }

    #[test]
    fn test_outcome_helpers() {
        assert_eq!(AlertOutcome::Opened { alert_id: 3 }.alert_id(), Some(3));
        assert!(AlertOutcome::Reopened { alert_id: 3 }.is_open());
        assert!(!AlertOutcome::Resolved { alert_id: 3 }.is_open());
        assert_eq!(AlertOutcome::Unchanged.alert_id(), None);
    }
}
