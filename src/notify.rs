//! 用户通知通道
//! 发出即忘，不等待确认

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub at: DateTime<Utc>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// 通过 tracing 输出通知
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => tracing::info!(%message, "Notification"),
            Severity::Warning => tracing::warn!(%message, "Notification"),
            Severity::Error => tracing::error!(%message, "Notification"),
        }
    }
}

/// 把通知推入 channel，由 UI 侧消费
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        // 接收端已关闭时直接丢弃
        let _ = self.tx.send(Notification {
            message: message.to_string(),
            severity,
            at: Utc::now(),
        });
    }
}
