//! H.265/HEVC 切片段头解析 (7.3.6.1, 到 slice_qp_delta 为止) 与 POC 推导 (8.3.1).

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

use super::nal::NalHeader;
use super::pps::HevcPps;
use super::sps::{HevcSps, parse_short_term_rps};

/// HEVC 切片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HevcSliceType {
    /// B 切片 (0)
    B,
    /// P 切片 (1)
    P,
    /// I 切片 (2)
    I,
}

impl HevcSliceType {
    /// 从 slice_type 语法值转换
    pub fn from_raw(value: u32) -> TaoResult<Self> {
        match value {
            0 => Ok(Self::B),
            1 => Ok(Self::P),
            2 => Ok(Self::I),
            _ => Err(TaoError::InvalidData(format!(
                "HEVC: slice_type 非法, value={}",
                value
            ))),
        }
    }

    /// slice_type 语法值
    pub fn raw(self) -> u32 {
        match self {
            Self::B => 0,
            Self::P => 1,
            Self::I => 2,
        }
    }

    /// 单字母标签
    pub fn label(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::P => "P",
            Self::I => "I",
        }
    }
}

/// 切片段头
///
/// 依赖切片段只携带前 4 个字段, 其余字段沿用前一个独立切片段.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceSegmentHeader {
    /// first_slice_segment_in_pic_flag
    pub first_slice_segment_in_pic_flag: bool,
    /// slice_pic_parameter_set_id
    pub pps_id: u32,
    /// dependent_slice_segment_flag
    pub dependent_slice_segment_flag: bool,
    /// slice_segment_address
    pub slice_segment_address: u32,
    /// no_output_of_prior_pics_flag
    pub no_output_of_prior_pics_flag: bool,
    /// slice_type
    pub slice_type: Option<HevcSliceType>,
    /// pic_output_flag (缺省为 1)
    pub pic_output_flag: bool,
    /// colour_plane_id
    pub colour_plane_id: u8,
    /// slice_pic_order_cnt_lsb
    pub poc_lsb: u32,
    /// short_term_ref_pic_set_sps_flag
    pub short_term_ref_pic_set_sps_flag: bool,
    /// short_term_ref_pic_set_idx
    pub short_term_ref_pic_set_idx: u32,
    /// num_long_term_sps
    pub num_long_term_sps: u32,
    /// num_long_term_pics
    pub num_long_term_pics: u32,
    /// NumPicTotalCurr
    pub num_pic_total_curr: u32,
    /// slice_temporal_mvp_enabled_flag
    pub slice_temporal_mvp_enabled_flag: bool,
    /// slice_sao_luma_flag
    pub slice_sao_luma_flag: bool,
    /// slice_sao_chroma_flag
    pub slice_sao_chroma_flag: bool,
    /// num_ref_idx_l0_active_minus1 + 1
    pub num_ref_idx_l0_active: u32,
    /// num_ref_idx_l1_active_minus1 + 1
    pub num_ref_idx_l1_active: u32,
    /// collocated_from_l0_flag
    pub collocated_from_l0_flag: bool,
    /// collocated_ref_idx
    pub collocated_ref_idx: u32,
    /// five_minus_max_num_merge_cand
    pub five_minus_max_num_merge_cand: u32,
    /// slice_qp_delta
    pub slice_qp_delta: i32,
}

fn ceil_log2(n: u32) -> u32 {
    if n <= 1 { 0 } else { 32 - (n - 1).leading_zeros() }
}

/// 读取切片段头中的 pps_id
pub fn peek_pps_id(rbsp: &[u8], nal: &NalHeader) -> TaoResult<u32> {
    let mut br = BitReader::new(rbsp);
    br.skip_bits(1)?;
    if nal.nal_type.is_irap() {
        br.skip_bits(1)?;
    }
    br.read_ue_max(63, "HEVC: slice_pic_parameter_set_id")
}

/// 解析切片段头
///
/// `rbsp` 为 2 字节 NAL 头之后的 RBSP 数据.
pub fn parse_slice_segment_header(
    rbsp: &[u8],
    nal: &NalHeader,
    sps: &HevcSps,
    pps: &HevcPps,
) -> TaoResult<SliceSegmentHeader> {
    let mut br = BitReader::new(rbsp);
    let mut hdr = SliceSegmentHeader {
        first_slice_segment_in_pic_flag: br.read_flag()?,
        pic_output_flag: true,
        collocated_from_l0_flag: true,
        ..Default::default()
    };
    if nal.nal_type.is_irap() {
        hdr.no_output_of_prior_pics_flag = br.read_flag()?;
    }
    hdr.pps_id = br.read_ue_max(63, "HEVC: slice_pic_parameter_set_id")?;

    if !hdr.first_slice_segment_in_pic_flag {
        if pps.dependent_slice_segments_enabled_flag {
            hdr.dependent_slice_segment_flag = br.read_flag()?;
        }
        hdr.slice_segment_address = br.read_bits(ceil_log2(sps.pic_size_in_ctbs()))?;
    }
    if hdr.dependent_slice_segment_flag {
        return Ok(hdr);
    }

    br.skip_bits(pps.num_extra_slice_header_bits)?;
    let slice_type = HevcSliceType::from_raw(br.read_ue()?)?;
    hdr.slice_type = Some(slice_type);
    if pps.output_flag_present_flag {
        hdr.pic_output_flag = br.read_flag()?;
    }
    if sps.separate_colour_plane_flag {
        hdr.colour_plane_id = br.read_bits(2)? as u8;
    }

    if !nal.nal_type.is_idr() {
        hdr.poc_lsb = br.read_bits(sps.log2_max_pic_order_cnt_lsb)?;
        hdr.short_term_ref_pic_set_sps_flag = br.read_flag()?;
        let num_sets = sps.short_term_rps.len();
        let owned_rps;
        let rps = if !hdr.short_term_ref_pic_set_sps_flag {
            owned_rps = parse_short_term_rps(&mut br, num_sets, num_sets, &sps.short_term_rps)?;
            Some(&owned_rps)
        } else {
            if num_sets > 1 {
                hdr.short_term_ref_pic_set_idx = br.read_bits(ceil_log2(num_sets as u32))?;
            }
            sps.short_term_rps.get(hdr.short_term_ref_pic_set_idx as usize)
        };
        let rps = rps.ok_or_else(|| {
            TaoError::InvalidData(format!(
                "HEVC: short_term_ref_pic_set_idx 超出范围, idx={}, num_sets={}",
                hdr.short_term_ref_pic_set_idx, num_sets
            ))
        })?;
        hdr.num_pic_total_curr = rps.num_used_by_curr();

        if sps.long_term_ref_pics_present_flag {
            let lt_in_sps = sps.num_long_term_ref_pic_sps();
            if lt_in_sps > 0 {
                hdr.num_long_term_sps = br.read_ue_max(lt_in_sps, "HEVC: num_long_term_sps")?;
            }
            hdr.num_long_term_pics = br.read_ue_max(32, "HEVC: num_long_term_pics")?;
            for i in 0..hdr.num_long_term_sps + hdr.num_long_term_pics {
                let used = if i < hdr.num_long_term_sps {
                    let lt_idx = if lt_in_sps > 1 {
                        br.read_bits(ceil_log2(lt_in_sps))?
                    } else {
                        0
                    };
                    sps.used_by_curr_pic_lt_sps
                        .get(lt_idx as usize)
                        .copied()
                        .unwrap_or(false)
                } else {
                    br.skip_bits(sps.log2_max_pic_order_cnt_lsb)?; // poc_lsb_lt
                    br.read_flag()?
                };
                if used {
                    hdr.num_pic_total_curr += 1;
                }
                if br.read_flag()? {
                    br.read_ue()?; // delta_poc_msb_cycle_lt
                }
            }
        }
        if sps.temporal_mvp_enable_flag {
            hdr.slice_temporal_mvp_enabled_flag = br.read_flag()?;
        }
    }

    if sps.sample_adaptive_offset_enabled_flag {
        hdr.slice_sao_luma_flag = br.read_flag()?;
        if sps.chroma_array_type() != 0 {
            hdr.slice_sao_chroma_flag = br.read_flag()?;
        }
    }

    if slice_type != HevcSliceType::I {
        let is_b = slice_type == HevcSliceType::B;
        hdr.num_ref_idx_l0_active = pps.num_ref_idx_l0_default_active;
        if is_b {
            hdr.num_ref_idx_l1_active = pps.num_ref_idx_l1_default_active;
        }
        if br.read_flag()? {
            hdr.num_ref_idx_l0_active = br.read_ue_max(14, "HEVC: num_ref_idx_l0_active_minus1")? + 1;
            if is_b {
                hdr.num_ref_idx_l1_active =
                    br.read_ue_max(14, "HEVC: num_ref_idx_l1_active_minus1")? + 1;
            }
        }

        if pps.lists_modification_present_flag && hdr.num_pic_total_curr > 1 {
            let bits = ceil_log2(hdr.num_pic_total_curr);
            if br.read_flag()? {
                br.skip_bits(bits * hdr.num_ref_idx_l0_active)?; // list_entry_l0
            }
            if is_b && br.read_flag()? {
                br.skip_bits(bits * hdr.num_ref_idx_l1_active)?; // list_entry_l1
            }
        }

        if is_b {
            br.skip_bits(1)?; // mvd_l1_zero_flag
        }
        if pps.cabac_init_present_flag {
            br.skip_bits(1)?; // cabac_init_flag
        }
        if hdr.slice_temporal_mvp_enabled_flag {
            if is_b {
                hdr.collocated_from_l0_flag = br.read_flag()?;
            }
            let active = if hdr.collocated_from_l0_flag {
                hdr.num_ref_idx_l0_active
            } else {
                hdr.num_ref_idx_l1_active
            };
            if active > 1 {
                hdr.collocated_ref_idx = br.read_ue_max(active - 1, "HEVC: collocated_ref_idx")?;
            }
        }
        if (pps.weighted_pred_flag && slice_type == HevcSliceType::P)
            || (pps.weighted_bipred_flag && is_b)
        {
            skip_pred_weight_table(&mut br, sps.chroma_array_type(), &hdr, is_b)?;
        }
        hdr.five_minus_max_num_merge_cand = br.read_ue_max(4, "HEVC: five_minus_max_num_merge_cand")?;
    }

    hdr.slice_qp_delta = br.read_se()?;
    Ok(hdr)
}

/// 跳过 pred_weight_table (7.3.6.3)
fn skip_pred_weight_table(
    br: &mut BitReader,
    chroma_array_type: u32,
    hdr: &SliceSegmentHeader,
    is_b: bool,
) -> TaoResult<()> {
    br.read_ue_max(7, "HEVC: luma_log2_weight_denom")?;
    if chroma_array_type != 0 {
        br.read_se()?; // delta_chroma_log2_weight_denom
    }
    let lists: &[u32] = if is_b {
        &[hdr.num_ref_idx_l0_active, hdr.num_ref_idx_l1_active]
    } else {
        &[hdr.num_ref_idx_l0_active]
    };
    for &count in lists {
        let count = count as usize;
        let mut luma = [false; 16];
        let mut chroma = [false; 16];
        for flag in luma.iter_mut().take(count) {
            *flag = br.read_flag()?;
        }
        if chroma_array_type != 0 {
            for flag in chroma.iter_mut().take(count) {
                *flag = br.read_flag()?;
            }
        }
        for i in 0..count {
            if luma[i] {
                br.read_se()?; // delta_luma_weight
                br.read_se()?; // luma_offset
            }
            if chroma[i] {
                for _ in 0..2 {
                    br.read_se()?; // delta_chroma_weight
                    br.read_se()?; // delta_chroma_offset
                }
            }
        }
    }
    Ok(())
}

// ============================================================
// POC
// ============================================================

/// POC 推导跨图像保存的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcPocState {
    prev_tid0_poc: i32,
    /// 下一个 CRA 视为 NoRaslOutputFlag=1 (码流开始或序列结束之后)
    cra_starts_sequence: bool,
}

impl Default for HevcPocState {
    fn default() -> Self {
        Self {
            prev_tid0_poc: 0,
            cra_starts_sequence: true,
        }
    }
}

impl HevcPocState {
    /// 收到 End of Sequence 后调用
    pub fn end_of_sequence(&mut self) {
        self.cra_starts_sequence = true;
    }

    /// 计算图像首个切片段的 POC 并更新状态
    pub fn compute(&mut self, nal: &NalHeader, log2_max_poc_lsb: u32, poc_lsb: u32) -> i32 {
        let max_lsb = 1i32 << log2_max_poc_lsb;
        let lsb = poc_lsb as i32;
        let ty = nal.nal_type;

        let no_rasl_output = ty.is_idr() || ty.is_bla() || (ty.is_irap() && self.cra_starts_sequence);
        let msb = if ty.is_irap() && no_rasl_output {
            0
        } else {
            let prev_lsb = self.prev_tid0_poc & (max_lsb - 1);
            let prev_msb = self.prev_tid0_poc - prev_lsb;
            if lsb < prev_lsb && prev_lsb - lsb >= max_lsb / 2 {
                prev_msb + max_lsb
            } else if lsb > prev_lsb && lsb - prev_lsb > max_lsb / 2 {
                prev_msb - max_lsb
            } else {
                prev_msb
            }
        };
        let poc = msb + lsb;

        if ty.is_irap() {
            self.cra_starts_sequence = false;
        }
        if nal.temporal_id == 0 && !ty.is_leading() && !ty.is_sub_layer_non_ref() {
            self.prev_tid0_poc = poc;
        }
        poc
    }
}
