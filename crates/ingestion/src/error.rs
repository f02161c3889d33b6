//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 订阅泵任务异常退出
    #[error("subscription pump for topic '{topic}' failed: {message}")]
    PumpFailed {
        /// 订阅 topic
        topic: String,
        /// 错误消息
        message: String,
    },

    /// 订阅已关闭
    #[error("subscription for topic '{topic}' is already closed")]
    AlreadyClosed {
        /// 订阅 topic
        topic: String,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
