//! 检查工具配置文件.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tao_inspect::InspectOptions;

use crate::logging::LoggingConfig;

/// 检查工具配置
///
/// ```json
/// {
///     "logging": { "level": "debug", "directory": "logs" },
///     "inspect": { "dump_crc": true, "duration": { "num": 10, "den": 1 } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// 日志
    pub logging: LoggingConfig,
    /// 检查选项
    pub inspect: InspectOptions,
}

impl InspectorConfig {
    /// 从 JSON 文本解析
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("解析检查配置失败")
    }

    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("配置文件无效, path={}", path.display()))
    }
}
