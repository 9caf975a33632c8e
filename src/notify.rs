use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// Severity of a user-facing alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Success,
    Error,
}

/// A dismissible notification shown to the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
}

impl Alert {
    pub fn error(message: impl Into<String>) -> Self {
        Alert {
            severity: AlertSeverity::Error,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Alert {
            severity: AlertSeverity::Success,
            message: message.into(),
        }
    }
}

/// Sink for user-facing alerts.
///
/// Injected explicitly wherever alerts are raised, so the only global
/// notification queue is the one the caller hands in.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: Alert);
}

/// Forwards alerts into an mpsc channel drained by the main event loop.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelNotifier { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, alert: Alert) {
        if let Err(e) = self.tx.send(alert) {
            warn!("Alert receiver gone, dropping alert: {}", e.0.message);
        }
    }
}

/// Keeps every alert in memory so tests can assert on exactly what was raised.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: std::sync::Mutex<Vec<Alert>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, alert: Alert) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert);
        }
    }
}
