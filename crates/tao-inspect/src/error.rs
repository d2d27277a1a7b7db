//! 检查器诊断错误.
//!
//! 所有错误都是局部的: 在子单元、单元或流的边界被捕获, 记录到对应报告中, 其余处理继续进行.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use tao_core::TaoError;
use thiserror::Error;

/// 诊断类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 声明长度超出剩余字节
    Truncated,
    /// 长度为 0 或不足以容纳头部
    ZeroOrInvalidSize,
    /// 语法解析原语失败
    DecodePrimitiveFailure,
    /// 不支持的编解码器
    UnsupportedCodec,
    /// 缺少解码配置
    MissingConfiguration,
    /// 提取器记录损坏
    CorruptExtractor,
    /// 加密内容无法解析
    Encrypted,
    /// 其他无效数据
    InvalidData,
    /// 报告输出失败
    Sink,
}

impl ErrorKind {
    /// 序列化名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Truncated => "truncated",
            Self::ZeroOrInvalidSize => "zero_or_invalid_size",
            Self::DecodePrimitiveFailure => "decode_primitive_failure",
            Self::UnsupportedCodec => "unsupported_codec",
            Self::MissingConfiguration => "missing_configuration",
            Self::CorruptExtractor => "corrupt_extractor",
            Self::Encrypted => "encrypted",
            Self::InvalidData => "invalid_data",
            Self::Sink => "sink",
        }
    }
}

/// 检查器诊断
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    /// 声明长度超出剩余字节, `unit` 为单元名称 (NALU / OBU / SEI message ...)
    #[error("{unit} is corrupted: size is {declared} but only {remaining} remains")]
    Truncated {
        /// 单元名称
        unit: String,
        /// 声明长度
        declared: u64,
        /// 实际剩余字节
        remaining: u64,
    },

    /// 子单元长度为 0 或 (HEVC) 仅 1 字节
    #[error("invalid nal size {0}")]
    ZeroOrInvalidSize(usize),

    /// 语法解析原语失败
    #[error("{0}")]
    DecodePrimitiveFailure(String),

    /// 不支持的编解码器
    #[error("bitstream analysis for codec {0} not supported")]
    UnsupportedCodec(String),

    /// 缺少解码配置, 在有效配置到达前不分析该流
    #[error("缺少解码配置: codec={0}")]
    MissingConfiguration(String),

    /// 提取器记录声明的长度超出剩余字节
    #[error("{0}")]
    CorruptExtractor(String),

    /// 加密内容
    #[error("{0}")]
    Encrypted(String),

    /// 其他无效数据
    #[error("{0}")]
    InvalidData(String),

    /// 报告输出失败
    #[error("报告输出失败: {0}")]
    Sink(String),
}

impl InspectError {
    /// 诊断类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Truncated { .. } => ErrorKind::Truncated,
            Self::ZeroOrInvalidSize(_) => ErrorKind::ZeroOrInvalidSize,
            Self::DecodePrimitiveFailure(_) => ErrorKind::DecodePrimitiveFailure,
            Self::UnsupportedCodec(_) => ErrorKind::UnsupportedCodec,
            Self::MissingConfiguration(_) => ErrorKind::MissingConfiguration,
            Self::CorruptExtractor(_) => ErrorKind::CorruptExtractor,
            Self::Encrypted(_) => ErrorKind::Encrypted,
            Self::InvalidData(_) => ErrorKind::InvalidData,
            Self::Sink(_) => ErrorKind::Sink,
        }
    }

    /// 构造截断诊断
    pub fn truncated(unit: impl Into<String>, declared: u64, remaining: u64) -> Self {
        Self::Truncated {
            unit: unit.into(),
            declared,
            remaining,
        }
    }

    /// 截断诊断的缺失字节数, 其他诊断返回 None
    pub fn shortfall(&self) -> Option<u64> {
        match self {
            Self::Truncated {
                declared,
                remaining,
                ..
            } => Some(declared.saturating_sub(*remaining)),
            _ => None,
        }
    }
}

impl From<TaoError> for InspectError {
    fn from(err: TaoError) -> Self {
        Self::DecodePrimitiveFailure(err.to_string())
    }
}

impl From<std::io::Error> for InspectError {
    fn from(err: std::io::Error) -> Self {
        Self::Sink(err.to_string())
    }
}

impl From<serde_json::Error> for InspectError {
    fn from(err: serde_json::Error) -> Self {
        Self::Sink(err.to_string())
    }
}

impl Serialize for InspectError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("InspectError", 2)?;
        s.serialize_field("kind", self.kind().name())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

/// 检查器 Result 类型
pub type InspectResult<T> = Result<T, InspectError>;
