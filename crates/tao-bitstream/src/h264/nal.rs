//! H.264 NAL 单元头部.
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! 类型 14 / 20 额外携带 3 字节 SVC/MVC 头部扩展.

use tao_core::{TaoError, TaoResult};

/// 非 IDR 切片
pub const NAL_SLICE: u8 = 1;
/// 数据分区 A
pub const NAL_DP_A: u8 = 2;
/// 数据分区 B
pub const NAL_DP_B: u8 = 3;
/// 数据分区 C
pub const NAL_DP_C: u8 = 4;
/// IDR 切片
pub const NAL_IDR_SLICE: u8 = 5;
/// SEI
pub const NAL_SEI: u8 = 6;
/// SPS
pub const NAL_SPS: u8 = 7;
/// PPS
pub const NAL_PPS: u8 = 8;
/// 访问单元分隔符
pub const NAL_AUD: u8 = 9;
/// 序列结束
pub const NAL_END_OF_SEQ: u8 = 10;
/// 流结束
pub const NAL_END_OF_STREAM: u8 = 11;
/// 填充数据
pub const NAL_FILLER: u8 = 12;
/// SPS 扩展
pub const NAL_SPS_EXT: u8 = 13;
/// SVC 前缀
pub const NAL_SVC_PREFIX: u8 = 14;
/// 子集 SPS
pub const NAL_SUBSET_SPS: u8 = 15;
/// 辅助切片
pub const NAL_SLICE_AUX: u8 = 19;
/// SVC/MVC 编码切片扩展
pub const NAL_SLICE_EXT: u8 = 20;
/// SVC 聚合器
pub const NAL_SVC_AGGREGATOR: u8 = 30;
/// SVC 提取器
pub const NAL_SVC_EXTRACTOR: u8 = 31;

/// NAL 头部字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    /// nal_unit_type
    pub nal_type: u8,
    /// nal_ref_idc (0-3)
    pub ref_idc: u8,
}

impl NalHeader {
    /// 从 NAL 首字节解析
    pub fn parse(data: &[u8]) -> TaoResult<Self> {
        let header = *data
            .first()
            .ok_or_else(|| TaoError::InvalidData("H.264: NAL 单元数据为空".into()))?;
        Ok(Self {
            nal_type: header & 0x1F,
            ref_idc: (header & 0x60) >> 5,
        })
    }

    /// NAL 头部长度 (含 SVC/MVC 扩展)
    pub fn header_len(&self) -> usize {
        match self.nal_type {
            NAL_SVC_PREFIX | NAL_SLICE_EXT => 4,
            _ => 1,
        }
    }

    /// 是否为 IDR 切片
    pub fn is_idr(&self) -> bool {
        self.nal_type == NAL_IDR_SLICE
    }
}
