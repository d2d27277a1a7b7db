//! AVC/HEVC NAL 单元分发与报告.
//!
//! 每个家族有一张解码表 (类型 -> 名称, 类别), 分发按类别进行:
//! 参数集调用对应的解析原语, 切片在未加密时解析切片头, SEI 扫描消息,
//! 提取器解析记录, 其余类别只报告名称.

mod avc;
mod hevc;

pub use avc::{avc_nal_entry, inspect_avc_nal};
pub use hevc::{hevc_nal_entry, inspect_hevc_nal};

use tao_core::crc::crc32;

use crate::error::InspectError;
use crate::options::{InspectOptions, SeiBoundaryPolicy};
use crate::report::{UnitKind, UnitReport};
use crate::unit_iter::SizePrefixedUnitIterator;

/// NAL 类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalClass {
    /// 参数集 (VPS/SPS/PPS 及扩展)
    ParameterSet,
    /// 编码切片 (含数据分区、辅助切片)
    Slice,
    /// 访问单元分隔、序列/码流结束、前缀
    Delimiter,
    /// 填充数据
    Filler,
    /// SEI
    Sei,
    /// 聚合器
    Aggregator,
    /// 提取器
    Extractor,
    /// 未知类型
    Unknown,
}

/// 解码表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalTableEntry {
    /// nal_unit_type
    pub code: u8,
    /// 报告名称
    pub name: &'static str,
    /// 类别
    pub class: NalClass,
    /// 是否调用解析原语
    pub decode: bool,
}

impl NalTableEntry {
    const fn new(code: u8, name: &'static str, class: NalClass, decode: bool) -> Self {
        Self {
            code,
            name,
            class,
            decode,
        }
    }
}

/// NAL 报告参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalDumpContext {
    /// 长度字段宽度, 提取器参考记录使用相同宽度
    pub length_size: usize,
    /// SVC 流 (影响类型 20 的名称)
    pub is_svc: bool,
    /// CENC 加密 (AVC): 跳过所有解析原语与 SEI 扫描
    pub encrypted: bool,
    /// 附加 CRC32
    pub dump_crc: bool,
    /// 确定性模式
    pub deterministic: bool,
    /// SEI 越界处理
    pub sei_boundary: SeiBoundaryPolicy,
}

impl NalDumpContext {
    /// 从检查选项构造
    pub fn new(opts: &InspectOptions, length_size: usize) -> Self {
        Self {
            length_size,
            is_svc: false,
            encrypted: false,
            dump_crc: opts.dump_crc,
            deterministic: opts.deterministic,
            sei_boundary: opts.sei_boundary,
        }
    }
}

/// 创建 NAL 单元报告, 依次检查空单元并附加 CRC
///
/// 空单元返回 `Err(报告)`, 调用方直接使用该报告.
pub(crate) fn start_unit(nal: &[u8], ctx: &NalDumpContext) -> Result<UnitReport, UnitReport> {
    let mut unit = UnitReport::new(UnitKind::Nalu).with_size(nal.len() as u64);
    if nal.is_empty() {
        unit.diagnose(InspectError::ZeroOrInvalidSize(0));
        return Err(unit);
    }
    if ctx.dump_crc {
        unit.push("crc", crc32(nal));
    }
    Ok(unit)
}

/// 遍历长度前缀 NAL 单元, 对每个单元调用 `dump`
///
/// 截断时停止, 返回已报告的单元与截断诊断.
pub fn inspect_nal_units<F>(data: &[u8], width: usize, mut dump: F) -> (Vec<UnitReport>, Option<InspectError>)
where
    F: FnMut(&[u8]) -> UnitReport,
{
    let iter = match SizePrefixedUnitIterator::new(data, width) {
        Ok(it) => it,
        Err(e) => return (Vec::new(), Some(e)),
    };
    let mut units = Vec::new();
    for item in iter {
        match item {
            Ok(sub) => units.push(dump(sub.data)),
            Err(e) => return (units, Some(e)),
        }
    }
    (units, None)
}
