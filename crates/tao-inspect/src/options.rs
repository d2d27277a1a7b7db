//! 检查选项.

use serde::{Deserialize, Serialize};
use tao_core::Rational;

/// SEI 消息越过 NAL 边界时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeiBoundaryPolicy {
    /// 停止扫描并附加截断诊断 (消息类型与缺失字节数)
    #[default]
    Report,
    /// 静默停止扫描
    SilentStop,
}

/// 检查选项
///
/// 未出现在配置文件中的字段取默认值.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectOptions {
    /// 解析负载中的子单元
    pub analyze: bool,
    /// 报告包级字段 (时间戳、标志、CRC 等)
    pub deep: bool,
    /// 确定性模式: 省略随实现变化的详细字段
    pub deterministic: bool,
    /// 为每个子单元附加 CRC32
    pub dump_crc: bool,
    /// 以十六进制输出包负载, 代替 CRC32
    pub dump_data: bool,
    /// 时间码使用 ffmpeg 约定 (紧凑计数器, 非整数帧率视为丢帧)
    pub fftmcd: bool,
    /// 报告时钟参考 (PCR) 包
    pub pcr: bool,
    /// 每条流的检查时长 (秒), 0/0 表示不限制
    pub duration: Rational,
    /// SEI 越界处理方式
    pub sei_boundary: SeiBoundaryPolicy,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            analyze: true,
            deep: true,
            deterministic: false,
            dump_crc: false,
            dump_data: false,
            fftmcd: false,
            pcr: false,
            duration: Rational::UNDEFINED,
            sei_boundary: SeiBoundaryPolicy::Report,
        }
    }
}

impl InspectOptions {
    /// 是否启用时长上限
    pub fn has_duration_limit(&self) -> bool {
        self.duration.num != 0 && self.duration.den != 0
    }
}
