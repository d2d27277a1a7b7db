//! 统一错误类型定义.
//!
//! 码流解析层共用的错误类型, 上层检查器再将其映射为诊断信息.

use thiserror::Error;

/// 码流解析统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaoError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的语法或特性
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,
}

impl TaoError {
    /// 是否为数据截断导致的错误
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

/// 统一 Result 类型
pub type TaoResult<T> = Result<T, TaoError>;
