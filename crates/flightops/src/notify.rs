//! Best-effort change notifications.
//!
//! Writes publish a [`Notification`] after their transaction commits so that
//! live consumers such as a dashboard can recompute. Delivery is
//! at most once and never affects the write: [`publish`] logs and swallows
//! every failure.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors a notifier can report. They never reach the caller of a write.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Nobody is listening.
    #[error("no subscribers")]
    NoSubscribers,

    /// The transport is gone.
    #[error("notification channel closed")]
    Closed,

    /// Transport-specific failure.
    #[error("notification failed: {0}")]
    Failed(String),
}

/// Which change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A threshold alert was created.
    MaintenanceAlert,
    /// A maintenance log was created.
    MaintenanceLogCreated,
    /// A flight log was created.
    FlightLogCreated,
    /// A telemetry sample was recorded.
    FlightDataLogged,
    /// Something else on the dashboard changed.
    DashboardRefresh,
}

impl EventKind {
    /// Wire name of the event.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaintenanceAlert => "maintenance_alert",
            Self::MaintenanceLogCreated => "maintenance_log_created",
            Self::FlightLogCreated => "flight_log_created",
            Self::FlightDataLogged => "flight_data_logged",
            Self::DashboardRefresh => "dashboard_refresh",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event name and its small JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Which change happened.
    pub event: EventKind,
    /// Ids of the affected records.
    pub payload: Value,
}

impl Notification {
    /// `maintenance_alert {alert_id}`.
    #[must_use]
    pub fn maintenance_alert(alert_id: i64) -> Self {
        Self {
            event: EventKind::MaintenanceAlert,
            payload: json!({ "alert_id": alert_id }),
        }
    }

    /// `maintenance_log_created {maintenance_log_id}`.
    #[must_use]
    pub fn maintenance_log_created(maintenance_log_id: i64) -> Self {
        Self {
            event: EventKind::MaintenanceLogCreated,
            payload: json!({ "maintenance_log_id": maintenance_log_id }),
        }
    }

    /// `flight_log_created {flight_log_id}`.
    #[must_use]
    pub fn flight_log_created(flight_log_id: i64) -> Self {
        Self {
            event: EventKind::FlightLogCreated,
            payload: json!({ "flight_log_id": flight_log_id }),
        }
    }

    /// `flight_data_logged {flight_data_id}`.
    #[must_use]
    pub fn flight_data_logged(flight_data_id: i64) -> Self {
        Self {
            event: EventKind::FlightDataLogged,
            payload: json!({ "flight_data_id": flight_data_id }),
        }
    }

    /// `dashboard_refresh {}`.
    #[must_use]
    pub fn dashboard_refresh() -> Self {
        Self {
            event: EventKind::DashboardRefresh,
            payload: json!({}),
        }
    }
}

/// A sink for change notifications.
///
/// Implementations must not block: `notify` is called on the write path
/// right after commit.
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be handed off.
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Deliver `notification`, logging instead of failing.
pub fn publish(notifier: &dyn Notifier, notification: &Notification) {
    match notifier.notify(notification) {
        Ok(()) => debug!("Published {}", notification.event),
        Err(NotifyError::NoSubscribers) => {
            debug!("No subscribers for {}", notification.event);
        }
        Err(e) => warn!("Dropped {} notification: {}", notification.event, e),
    }
}

/// Fan-out over a `tokio` broadcast channel.
///
/// Sending never waits. Slow subscribers lag and miss old notifications
/// rather than holding up writers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    /// Create a channel that buffers up to `capacity` notifications per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Start receiving notifications published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.sender.receiver_count() == 0 {
            return Err(NotifyError::NoSubscribers);
        }
        self.sender
            .send(notification.clone())
            .map(|_| ())
            .map_err(|_| NotifyError::Closed)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// A shared notifier handle.
pub type SharedNotifier = Arc<dyn Notifier>;
