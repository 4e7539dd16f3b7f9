use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// One-way message queue from a session worker to its caller. The worker
/// pushes, the caller drains; a dropped receiver makes pushes no-ops.
#[derive(Clone)]
pub struct SessionLog {
    sender: UnboundedSender<LogEntry>,
}

impl SessionLog {
    pub fn new() -> (Self, UnboundedReceiver<LogEntry>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn push(&self, message: impl Into<String>) {
        let _ = self.sender.send(LogEntry {
            timestamp: Local::now(),
            message: message.into(),
        });
    }
}
