//! HEVC 解析状态: VPS/SPS/PPS 表、当前切片段上下文与 POC 状态.

use log::debug;
use tao_core::rbsp::remove_emulation_prevention;
use tao_core::{TaoError, TaoResult};

use super::nal::{HevcNalUnitType, NalHeader};
use super::pps::{HevcPps, parse_pps};
use super::slice::{HevcPocState, HevcSliceType, parse_slice_segment_header, peek_pps_id};
use super::sps::{HevcSps, parse_sps, peek_vps_id};
use super::vps::{Vps, parse_vps};

const MAX_VPS: usize = 16;
const MAX_SPS: usize = 16;
const MAX_PPS: usize = 64;

/// 最近一个切片段的上下文
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HevcSliceInfo {
    /// 切片类型, 尚未解析过独立切片段时为 None
    pub slice_type: Option<HevcSliceType>,
    /// PicOrderCntVal
    pub poc: i32,
    /// first_slice_segment_in_pic_flag
    pub first_slice_segment_in_pic_flag: bool,
    /// dependent_slice_segment_flag
    pub dependent_slice_segment_flag: bool,
    /// slice_segment_address
    pub slice_segment_address: u32,
    /// slice_qp_delta
    pub slice_qp_delta: i32,
    /// slice_pic_parameter_set_id
    pub pps_id: u32,
}

/// HEVC 流解析状态
#[derive(Debug, Clone)]
pub struct HevcState {
    vps: Vec<Option<Vps>>,
    sps: Vec<Option<HevcSps>>,
    pps: Vec<Option<HevcPps>>,
    slice: HevcSliceInfo,
    poc: HevcPocState,
}

impl Default for HevcState {
    fn default() -> Self {
        Self::new()
    }
}

fn rbsp_of(nal: &[u8]) -> Vec<u8> {
    remove_emulation_prevention(nal.get(2..).unwrap_or_default())
}

impl HevcState {
    /// 创建空状态
    pub fn new() -> Self {
        Self {
            vps: vec![None; MAX_VPS],
            sps: vec![None; MAX_SPS],
            pps: vec![None; MAX_PPS],
            slice: HevcSliceInfo::default(),
            poc: HevcPocState::default(),
        }
    }

    /// 解析 VPS NAL (含 2 字节头), 返回 vps_id
    pub fn read_vps(&mut self, nal: &[u8]) -> TaoResult<u8> {
        NalHeader::parse(nal)?;
        let vps = parse_vps(&rbsp_of(nal))?;
        let id = vps.vps_id;
        self.vps[usize::from(id)] = Some(vps);
        Ok(id)
    }

    /// 解析 SPS NAL (含 2 字节头), 返回 sps_id
    pub fn read_sps(&mut self, nal: &[u8]) -> TaoResult<u32> {
        let hdr = NalHeader::parse(nal)?;
        let rbsp = rbsp_of(nal);
        let vps = peek_vps_id(&rbsp).and_then(|id| self.vps(id));
        let sps = parse_sps(&rbsp, hdr.layer_id, vps)?;
        let id = sps.sps_id;
        debug!(
            "HEVC: 解析 SPS, sps_id={}, layer_id={}, {}x{}",
            id, hdr.layer_id, sps.width, sps.height
        );
        self.sps[id as usize] = Some(sps);
        Ok(id)
    }

    /// 解析 PPS NAL (含 2 字节头), 返回 pps_id
    pub fn read_pps(&mut self, nal: &[u8]) -> TaoResult<u32> {
        NalHeader::parse(nal)?;
        let pps = parse_pps(&rbsp_of(nal))?;
        let id = pps.pps_id;
        self.pps[id as usize] = Some(pps);
        Ok(id)
    }

    /// 解析一个 NAL 单元 (含 2 字节头)
    ///
    /// 参数集更新对应的表, 切片段更新切片上下文, EOS 重置 POC 序列起点.
    /// 返回值表示该 NAL 是否为新图像的首个切片段.
    pub fn parse_nalu(&mut self, nal: &[u8]) -> TaoResult<bool> {
        let hdr = NalHeader::parse(nal)?;
        match hdr.nal_type {
            HevcNalUnitType::Vps => self.read_vps(nal).map(|_| false),
            HevcNalUnitType::Sps => self.read_sps(nal).map(|_| false),
            HevcNalUnitType::Pps => self.read_pps(nal).map(|_| false),
            HevcNalUnitType::Eos => {
                self.poc.end_of_sequence();
                Ok(false)
            }
            ty if ty.is_vcl() => self.parse_slice(nal, &hdr),
            _ => Ok(false),
        }
    }

    fn parse_slice(&mut self, nal: &[u8], hdr: &NalHeader) -> TaoResult<bool> {
        let rbsp = rbsp_of(nal);
        let pps_id = peek_pps_id(&rbsp, hdr)?;
        let pps = self.pps(pps_id).ok_or_else(|| {
            TaoError::InvalidData(format!("HEVC: 切片引用了未定义的 PPS, pps_id={}", pps_id))
        })?;
        let sps = self.sps(pps.sps_id).ok_or_else(|| {
            TaoError::InvalidData(format!("HEVC: PPS 引用了未定义的 SPS, sps_id={}", pps.sps_id))
        })?;
        let seg = parse_slice_segment_header(&rbsp, hdr, sps, pps)?;
        let log2_max_poc_lsb = sps.log2_max_pic_order_cnt_lsb;

        let mut info = HevcSliceInfo {
            first_slice_segment_in_pic_flag: seg.first_slice_segment_in_pic_flag,
            dependent_slice_segment_flag: seg.dependent_slice_segment_flag,
            slice_segment_address: seg.slice_segment_address,
            pps_id,
            ..self.slice
        };
        if !seg.dependent_slice_segment_flag {
            info.slice_type = seg.slice_type;
            info.slice_qp_delta = seg.slice_qp_delta;
        }
        if seg.first_slice_segment_in_pic_flag {
            info.poc = self.poc.compute(hdr, log2_max_poc_lsb, seg.poc_lsb);
        }
        self.slice = info;
        Ok(seg.first_slice_segment_in_pic_flag)
    }

    /// 按 id 获取 VPS
    pub fn vps(&self, id: u8) -> Option<&Vps> {
        self.vps.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// 按 id 获取 SPS
    pub fn sps(&self, id: u32) -> Option<&HevcSps> {
        self.sps.get(id as usize).and_then(Option::as_ref)
    }

    /// 按 id 获取 PPS
    pub fn pps(&self, id: u32) -> Option<&HevcPps> {
        self.pps.get(id as usize).and_then(Option::as_ref)
    }

    /// 最近一个切片段的上下文
    pub fn slice_info(&self) -> HevcSliceInfo {
        self.slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h265::nal::build_nal_header;
    use crate::h265::pps::tests::{HevcPpsSpec, build_pps_rbsp};
    use crate::h265::slice::tests::build_slice_rbsp;
    use crate::h265::sps::tests::{HevcSpsSpec, build_sps_rbsp};
    use crate::h265::vps::tests::build_vps_rbsp;

    fn nal(type_id: u8, rbsp: Vec<u8>) -> Vec<u8> {
        let mut out = build_nal_header(type_id, 0, 0).to_vec();
        out.extend(rbsp);
        out
    }

    fn primed_state() -> HevcState {
        let mut state = HevcState::new();
        assert!(!state.parse_nalu(&nal(32, build_vps_rbsp(0, 0))).unwrap());
        assert!(!state.parse_nalu(&nal(33, build_sps_rbsp(&HevcSpsSpec::default()))).unwrap());
        assert!(!state.parse_nalu(&nal(34, build_pps_rbsp(&HevcPpsSpec::default()))).unwrap());
        state
    }

    #[test]
    fn test_hevc_state_param_sets_and_slices() {
        let mut state = primed_state();
        assert!(state.vps(0).is_some());
        assert_eq!(state.sps(0).map(|s| s.width), Some(1920));
        assert!(state.pps(0).is_some());

        assert!(state.parse_nalu(&nal(19, build_slice_rbsp(19, 0, 0, 2))).unwrap());
        let info = state.slice_info();
        assert_eq!(info.slice_type, Some(HevcSliceType::I));
        assert_eq!(info.poc, 0);
        assert_eq!(info.slice_qp_delta, 2);

        assert!(state.parse_nalu(&nal(1, build_slice_rbsp(1, 0, 3, -1))).unwrap());
        let info = state.slice_info();
        assert_eq!(info.slice_type, Some(HevcSliceType::P));
        assert_eq!(info.poc, 3);
    }

    #[test]
    fn test_hevc_state_eos_resets_cra() {
        let mut state = primed_state();
        state.parse_nalu(&nal(19, build_slice_rbsp(19, 0, 0, 0))).unwrap();
        state.parse_nalu(&nal(1, build_slice_rbsp(1, 0, 100, 0))).unwrap();
        state.parse_nalu(&nal(1, build_slice_rbsp(1, 0, 200, 0))).unwrap();
        state.parse_nalu(&nal(36, Vec::new())).unwrap();
        state.parse_nalu(&nal(21, build_slice_rbsp(21, 0, 5, 0))).unwrap();
        assert_eq!(state.slice_info().poc, 5, "EOS 之后的 CRA 重新开始 POC");
    }

    #[test]
    fn test_hevc_state_missing_pps() {
        let mut state = HevcState::new();
        let err = state
            .parse_nalu(&nal(1, build_slice_rbsp(1, 3, 0, 0)))
            .expect_err("缺少 PPS 应失败");
        assert!(format!("{err}").contains("PPS"));
        assert_eq!(state.slice_info(), HevcSliceInfo::default(), "失败时状态不变");
    }
}
