//! 宿主事件
//!
//! 分享选择器、目录选择器、重新索引通知都以消息形式投递到宿主任务，
//! 核心逻辑只负责发送，不等待宿主处理结果。

use std::path::Path;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::storage::ShareTicket;

use super::{DirectoryPicker, DispatchError, ReindexNotifier, ShareDispatcher};

/// 宿主事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum HostEvent {
    /// 弹出分享选择器
    ShareChooser { ticket: ShareTicket },
    /// 弹出目录选择器
    DirectoryPicker,
    /// 通知外部文件浏览工具重新索引
    Reindex { path: String, mime_type: String },
}

/// 宿主事件发送端
#[derive(Debug, Clone)]
pub struct HostEventSender {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl HostEventSender {
    /// 创建发送端与接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: HostEvent) -> Result<(), DispatchError> {
        self.tx.send(event).map_err(|_| DispatchError::ChannelClosed)
    }
}

impl ShareDispatcher for HostEventSender {
    fn present_chooser(&self, ticket: ShareTicket) -> Result<(), DispatchError> {
        self.send(HostEvent::ShareChooser { ticket })
    }
}

impl DirectoryPicker for HostEventSender {
    fn request_directory_selection(&self) -> Result<(), DispatchError> {
        self.send(HostEvent::DirectoryPicker)
    }
}

impl ReindexNotifier for HostEventSender {
    fn notify(&self, path: &Path, mime_type: &str) -> Result<(), DispatchError> {
        self.send(HostEvent::Reindex {
            path: path.to_string_lossy().to_string(),
            mime_type: mime_type.to_string(),
        })
    }
}

/// 宿主侧事件循环：消费事件并记录日志，直到所有发送端关闭
pub async fn pump_host_events(mut rx: mpsc::UnboundedReceiver<HostEvent>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => info!("宿主事件: {}", json),
            Err(e) => warn!("宿主事件序列化失败: {:?}, 错误: {}", event, e),
        }
    }
    info!("宿主事件通道已关闭");
}
