//! Destinations for reminder notifications.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::info;

use crate::model::NotificationEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("notification backend unavailable: {0}")]
    Unavailable(String),
}

/// Receives reminders from the scheduler. `Ok` means the event was handed off;
/// only then is the reminder recorded as fired.
#[async_trait]
pub trait NotifierSink: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), SinkError>;
}

/// Writes reminders to the log and never fails.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl NotifierSink for LogNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        info!(title = %event.title, body = %event.body, url = %event.url, "reminder");
        Ok(())
    }
}

/// Shows a desktop notification through `notify-send`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    app_name: String,
    timeout: Duration,
}

impl Default for CommandNotifier {
    fn default() -> Self {
        Self {
            program: "notify-send".into(),
            app_name: "Canvas Assignments".into(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl CommandNotifier {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the binary can be spawned at all.
    pub async fn ensure_available(&self) -> Result<(), SinkError> {
        let status = Command::new(&self.program)
            .arg("--version")
            .kill_on_drop(true)
            .status()
            .await;
        match status {
            Ok(s) if s.success() => Ok(()),
            Ok(s) => Err(SinkError::Unavailable(format!(
                "{} exited with status {}",
                self.program, s
            ))),
            Err(e) => Err(SinkError::Unavailable(format!("{}: {}", self.program, e))),
        }
    }
}

#[async_trait]
impl NotifierSink for CommandNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        let body = if event.url.is_empty() {
            event.body.clone()
        } else {
            format!("{}\n{}", event.body, event.url)
        };
        let run = Command::new(&self.program)
            .arg("--app-name")
            .arg(&self.app_name)
            .arg("--icon")
            .arg("dialog-information-symbolic")
            .arg(&event.title)
            .arg(body)
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(s)) if s.success() => Ok(()),
            Ok(Ok(s)) => Err(SinkError::Unavailable(format!(
                "{} exited with status {}",
                self.program, s
            ))),
            Ok(Err(e)) => Err(SinkError::Unavailable(format!("{}: {}", self.program, e))),
            Err(_) => Err(SinkError::Unavailable(format!(
                "{} did not finish within {:?}",
                self.program, self.timeout
            ))),
        }
    }
}

/// Forwards reminders into a channel, e.g. for a UI shell that renders them.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl ChannelNotifier {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotifierSink for ChannelNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), SinkError> {
        self.tx
            .try_send(event.clone())
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> NotificationEvent {
        NotificationEvent {
            title: "Assignment Due in 1 Hour".into(),
            body: "CHEM 1: Lab".into(),
            url: "https://canvas.example.edu/a/1".into(),
        }
    }

    #[tokio::test]
    async fn channel_notifier_forwards_events() {
        let (sink, mut rx) = ChannelNotifier::new(4);
        sink.notify(&event()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), event());
    }

    #[tokio::test]
    async fn channel_notifier_reports_closed_receiver() {
        let (sink, rx) = ChannelNotifier::new(1);
        drop(rx);
        let err = sink.notify(&event()).await.unwrap_err();
        assert!(matches!(err, SinkError::Unavailable(_)));
    }

    #[tokio::test]
    async fn channel_notifier_reports_full_buffer() {
        let (sink, _rx) = ChannelNotifier::new(1);
        sink.notify(&event()).await.unwrap();
        assert!(sink.notify(&event()).await.is_err());
    }

    #[tokio::test]
    async fn missing_command_is_unavailable() {
        let sink = CommandNotifier::with_program("definitely-not-a-real-notifier-binary");
        let err = sink.notify(&event()).await.unwrap_err();
        assert!(matches!(err, SinkError::Unavailable(_)));
        assert!(sink.ensure_available().await.is_err());
    }

    #[tokio::test]
    async fn command_notifier_succeeds_when_program_exits_zero() {
        let sink = CommandNotifier::with_program("true").with_timeout(Duration::from_secs(2));
        sink.notify(&event()).await.unwrap();
    }

    #[tokio::test]
    async fn log_notifier_accepts_everything() {
        LogNotifier.notify(&event()).await.unwrap();
    }
}
