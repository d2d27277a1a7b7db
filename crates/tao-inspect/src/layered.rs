//! 分层编码 (SVC/L-HEVC) 聚合器与提取器子单元.
//!
//! 聚合器只作为标记报告. 提取器记录引用其他轨道的数据 (参考记录) 或直接携带数据 (内联记录).

use crate::error::InspectError;
use crate::report::{UnitKind, UnitReport};
use crate::unit_iter::read_be;

/// AVC 提取器 NAL 头部区域长度 (NAL 头 + SVC 扩展)
const AVC_EXTRACTOR_HEADER: usize = 4;
/// HEVC NAL 头长度
const HEVC_EXTRACTOR_HEADER: usize = 2;

/// 参考记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayeredUnitReference {
    /// track_ref_index
    pub track_ref_index: u8,
    /// sample_offset
    pub sample_offset: i8,
    /// data_offset
    pub data_offset: u64,
    /// data_length
    pub data_size: u64,
}

/// 提取器记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorRecord {
    /// 内联数据, 记录其长度
    Inband {
        /// 内联数据字节数
        size: u8,
    },
    /// 参考其他轨道样本
    Reference(LayeredUnitReference),
}

impl ExtractorRecord {
    /// 转换为子单元报告
    pub fn to_unit(&self) -> UnitReport {
        let mut unit = UnitReport::new(UnitKind::ExtractorRecord);
        match self {
            Self::Inband { size } => unit.push("inband_size", *size),
            Self::Reference(r) => {
                unit.push("track_ref_index", r.track_ref_index);
                unit.push("sample_offset", r.sample_offset);
                unit.push("data_offset", r.data_offset);
                unit.push("data_size", r.data_size);
            }
        }
        unit
    }
}

/// 提取器解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractorScan {
    /// 解析成功的记录
    pub records: Vec<ExtractorRecord>,
    /// 损坏诊断; 出现后不再解析后续记录
    pub error: Option<InspectError>,
}

fn ref_size_error(needed: usize, remain: usize) -> InspectError {
    InspectError::CorruptExtractor(format!(
        "invalid ref data extractor size: {} vs {} remaining",
        needed, remain
    ))
}

/// 读取一条参考记录, `data` 从 track_ref_index 开始
fn read_reference(data: &[u8], width: usize) -> Result<LayeredUnitReference, InspectError> {
    let needed = 2 + 2 * width;
    if data.len() < needed {
        return Err(ref_size_error(needed, data.len()));
    }
    Ok(LayeredUnitReference {
        track_ref_index: data[0],
        sample_offset: data[1] as i8,
        data_offset: read_be(&data[2..], width),
        data_size: read_be(&data[2 + width..], width),
    })
}

/// 解析 AVC 提取器 (NAL 类型 31), `width` 为长度字段宽度
pub fn decode_avc_extractor(nal: &[u8], width: usize) -> ExtractorScan {
    let body = nal.get(AVC_EXTRACTOR_HEADER..).unwrap_or_default();
    match read_reference(body, width) {
        Ok(r) => ExtractorScan {
            records: vec![ExtractorRecord::Reference(r)],
            error: None,
        },
        Err(e) => ExtractorScan {
            records: Vec::new(),
            error: Some(e),
        },
    }
}

/// 解析 HEVC 提取器 (NAL 类型 49), `width` 为长度字段宽度
pub fn decode_hevc_extractor(nal: &[u8], width: usize) -> ExtractorScan {
    let mut scan = ExtractorScan::default();
    let mut s = nal.get(HEVC_EXTRACTOR_HEADER..).unwrap_or_default();

    while let Some((&mode, rest)) = s.split_first() {
        s = rest;
        let remain = s.len();
        if mode != 0 {
            let len = s.first().copied().unwrap_or(0);
            if remain == 0 || usize::from(len) + 1 > remain {
                scan.error = Some(InspectError::CorruptExtractor(format!(
                    "invalid inband data extractor size: {} vs {} remaining",
                    len, remain
                )));
                break;
            }
            scan.records.push(ExtractorRecord::Inband { size: len });
            s = &s[usize::from(len) + 1..];
        } else {
            match read_reference(s, width) {
                Ok(r) => {
                    scan.records.push(ExtractorRecord::Reference(r));
                    s = &s[2 + 2 * width..];
                }
                Err(e) => {
                    scan.error = Some(e);
                    break;
                }
            }
        }
    }
    scan
}
