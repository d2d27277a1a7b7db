//! AVC 解析状态: 参数集表、当前切片上下文与 POC 状态.

use log::debug;
use tao_core::rbsp::remove_emulation_prevention;
use tao_core::{TaoError, TaoResult};

use super::nal::{NAL_IDR_SLICE, NAL_SLICE, NAL_SLICE_EXT, NalHeader};
use super::pps::{Pps, parse_pps};
use super::slice::{PocState, SliceInfo, parse_slice_header, peek_pps_id};
use super::sps::{Sps, parse_sps};

/// 子集 SPS 在 SPS 表中的存储偏移
pub const SUBSET_SPS_ID_SHIFT: u32 = 16;

const MAX_SPS: usize = 32;
const MAX_PPS: usize = 256;

/// AVC 流解析状态
///
/// SPS 表共 32 项: 普通 SPS 使用 0-31, 子集 SPS 存储在 `sps_id + 16`.
#[derive(Debug, Clone)]
pub struct AvcState {
    sps: Vec<Option<Sps>>,
    pps: Vec<Option<Pps>>,
    /// 最近成功解析的 SPS 索引
    last_sps: Option<u32>,
    /// 最近成功解析的切片上下文
    slice: SliceInfo,
    poc: PocState,
}

impl Default for AvcState {
    fn default() -> Self {
        Self::new()
    }
}

impl AvcState {
    /// 创建空状态
    pub fn new() -> Self {
        Self {
            sps: vec![None; MAX_SPS],
            pps: vec![None; MAX_PPS],
            last_sps: None,
            slice: SliceInfo::default(),
            poc: PocState::default(),
        }
    }

    /// 解析 SPS 或子集 SPS NAL (含 NAL 头), 返回存储索引
    pub fn read_sps(&mut self, nal: &[u8], subset: bool) -> TaoResult<u32> {
        let rbsp = remove_emulation_prevention(nal.get(1..).unwrap_or_default());
        let sps = parse_sps(&rbsp)?;
        let idx = if subset {
            if sps.sps_id >= SUBSET_SPS_ID_SHIFT {
                return Err(TaoError::InvalidData(format!(
                    "H.264: 子集 SPS id 超出范围, sps_id={}",
                    sps.sps_id
                )));
            }
            sps.sps_id + SUBSET_SPS_ID_SHIFT
        } else {
            sps.sps_id
        };
        debug!("H.264: 解析 SPS, 存储索引={}, {}x{}", idx, sps.width, sps.height);
        self.sps[idx as usize] = Some(sps);
        self.last_sps = Some(idx);
        Ok(idx)
    }

    /// 解析 PPS NAL (含 NAL 头), 返回 pps_id
    pub fn read_pps(&mut self, nal: &[u8]) -> TaoResult<u32> {
        let rbsp = remove_emulation_prevention(nal.get(1..).unwrap_or_default());
        let pps = parse_pps(&rbsp)?;
        let id = pps.pps_id;
        self.pps[id as usize] = Some(pps);
        Ok(id)
    }

    /// 解析切片 NAL (类型 1/5/20, 含 NAL 头), 更新并返回切片上下文
    pub fn parse_slice(&mut self, nal: &[u8]) -> TaoResult<SliceInfo> {
        let hdr = NalHeader::parse(nal)?;
        if !matches!(hdr.nal_type, NAL_SLICE | NAL_IDR_SLICE | NAL_SLICE_EXT) {
            return Err(TaoError::InvalidArgument(format!(
                "H.264: NAL 类型 {} 不是切片",
                hdr.nal_type
            )));
        }
        let payload = nal.get(hdr.header_len()..).ok_or(TaoError::Eof)?;
        let rbsp = remove_emulation_prevention(payload);

        let pps_id = peek_pps_id(&rbsp)?;
        let pps = self.pps[pps_id as usize].as_ref().ok_or_else(|| {
            TaoError::InvalidData(format!("H.264: 切片引用了未定义的 PPS, pps_id={}", pps_id))
        })?;
        let sps_idx = if hdr.nal_type == NAL_SLICE_EXT {
            pps.sps_id + SUBSET_SPS_ID_SHIFT
        } else {
            pps.sps_id
        };
        let sps = self
            .sps
            .get(sps_idx as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                TaoError::InvalidData(format!("H.264: PPS 引用了未定义的 SPS, sps_idx={}", sps_idx))
            })?;

        // SVC/MVC 扩展切片的 IDR 标志位于头部扩展 (idr_flag / non_idr_flag)
        let idr = match hdr.nal_type {
            NAL_IDR_SLICE => true,
            NAL_SLICE_EXT => nal.get(1).is_some_and(|b| b & 0x80 != 0 && b & 0x40 != 0),
            _ => false,
        };
        let parse_type = if idr { NAL_IDR_SLICE } else { NAL_SLICE };
        let slice = parse_slice_header(&rbsp, parse_type, sps, pps)?;
        let poc = self.poc.compute(sps, &slice, idr, hdr.ref_idc);

        self.slice = SliceInfo {
            poc,
            pps_id,
            field_pic_flag: slice.field_pic_flag,
            slice_type: slice.slice_type,
            frame_num: slice.frame_num,
            idr,
        };
        Ok(self.slice)
    }

    /// 按存储索引获取 SPS
    pub fn sps(&self, idx: u32) -> Option<&Sps> {
        self.sps.get(idx as usize).and_then(Option::as_ref)
    }

    /// 按 id 获取 PPS
    pub fn pps(&self, id: u32) -> Option<&Pps> {
        self.pps.get(id as usize).and_then(Option::as_ref)
    }

    /// 最近成功解析的 SPS
    pub fn last_sps(&self) -> Option<&Sps> {
        self.last_sps.and_then(|idx| self.sps(idx))
    }

    /// 最近一个切片的上下文
    pub fn slice_info(&self) -> SliceInfo {
        self.slice
    }
}
