//! H.265/HEVC SPS 解析器 (含多层扩展 SPS 头部).
//!
//! 同时提供 VPS 共用的 profile_tier_level 与 hrd_parameters 解析.

use log::debug;
use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

use super::vps::Vps;

/// 每个 SPS 最多的短期参考图像集数量
pub const MAX_SHORT_TERM_RPS: u32 = 64;
const MAX_DPB_PICS: usize = 16;

// ============================================================
// profile_tier_level
// ============================================================

/// profile_tier_level 的 general 部分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileTierLevel {
    /// general_profile_space
    pub profile_space: u8,
    /// general_tier_flag
    pub tier_flag: bool,
    /// general_profile_idc
    pub profile_idc: u8,
    /// general_profile_compatibility_flags
    pub profile_compatibility: u32,
    /// progressive/interlaced/non_packed/frame_only 及 43+1 位约束标志, 共 48 位
    pub constraint_indicator: u64,
    /// general_level_idc
    pub level_idc: u8,
}

/// 解析 profile_tier_level (7.3.3)
pub(crate) fn parse_profile_tier_level(
    br: &mut BitReader,
    profile_present: bool,
    max_sub_layers_minus1: u8,
) -> TaoResult<ProfileTierLevel> {
    let mut ptl = ProfileTierLevel::default();
    if profile_present {
        ptl.profile_space = br.read_bits(2)? as u8;
        ptl.tier_flag = br.read_flag()?;
        ptl.profile_idc = br.read_bits(5)? as u8;
        ptl.profile_compatibility = br.read_bits(32)?;
        ptl.constraint_indicator = br.read_bits_u64(48)?;
    }
    ptl.level_idc = br.read_bits(8)? as u8;

    let sub_layers = usize::from(max_sub_layers_minus1);
    let mut profile_flags = [false; 8];
    let mut level_flags = [false; 8];
    for i in 0..sub_layers {
        profile_flags[i] = br.read_flag()?;
        level_flags[i] = br.read_flag()?;
    }
    if sub_layers > 0 {
        for _ in sub_layers..8 {
            br.skip_bits(2)?; // reserved_zero_2bits
        }
    }
    for i in 0..sub_layers {
        if profile_flags[i] {
            br.skip_bits(88)?;
        }
        if level_flags[i] {
            br.skip_bits(8)?; // sub_layer_level_idc
        }
    }
    Ok(ptl)
}

// ============================================================
// hrd_parameters
// ============================================================

fn skip_sub_layer_hrd(br: &mut BitReader, cpb_cnt: u32, sub_pic_params: bool) -> TaoResult<()> {
    for _ in 0..cpb_cnt {
        br.read_ue()?; // bit_rate_value_minus1
        br.read_ue()?; // cpb_size_value_minus1
        if sub_pic_params {
            br.read_ue()?; // cpb_size_du_value_minus1
            br.read_ue()?; // bit_rate_du_value_minus1
        }
        br.skip_bits(1)?; // cbr_flag
    }
    Ok(())
}

/// 跳过 hrd_parameters (E.2.2)
pub(crate) fn skip_hrd_parameters(
    br: &mut BitReader,
    common_inf_present: bool,
    max_sub_layers_minus1: u8,
) -> TaoResult<()> {
    let mut nal_hrd = false;
    let mut vcl_hrd = false;
    let mut sub_pic_params = false;
    if common_inf_present {
        nal_hrd = br.read_flag()?;
        vcl_hrd = br.read_flag()?;
        if nal_hrd || vcl_hrd {
            sub_pic_params = br.read_flag()?;
            if sub_pic_params {
                br.skip_bits(8 + 5 + 1 + 5)?;
            }
            br.skip_bits(4 + 4)?; // bit_rate_scale, cpb_size_scale
            if sub_pic_params {
                br.skip_bits(4)?; // cpb_size_du_scale
            }
            br.skip_bits(5 + 5 + 5)?;
        }
    }

    for _ in 0..=max_sub_layers_minus1 {
        let fixed_pic_rate_general = br.read_flag()?;
        // general 标志为 1 时 within_cvs 推断为 1
        let fixed_pic_rate_within_cvs = fixed_pic_rate_general || br.read_flag()?;
        let mut low_delay = false;
        if fixed_pic_rate_within_cvs {
            br.read_ue_max(2047, "HEVC: elemental_duration_in_tc_minus1")?;
        } else {
            low_delay = br.read_flag()?;
        }
        let mut cpb_cnt_minus1 = 0;
        if !low_delay {
            cpb_cnt_minus1 = br.read_ue_max(31, "HEVC: cpb_cnt_minus1")?;
        }
        if nal_hrd {
            skip_sub_layer_hrd(br, cpb_cnt_minus1 + 1, sub_pic_params)?;
        }
        if vcl_hrd {
            skip_sub_layer_hrd(br, cpb_cnt_minus1 + 1, sub_pic_params)?;
        }
    }
    Ok(())
}

// ============================================================
// scaling_list_data
// ============================================================

/// 跳过 scaling_list_data (7.3.4)
pub(crate) fn skip_scaling_list_data(br: &mut BitReader) -> TaoResult<()> {
    for size_id in 0..4u32 {
        let step = if size_id == 3 { 3 } else { 1 };
        for _ in (0..6).step_by(step) {
            if !br.read_flag()? {
                br.read_ue()?; // scaling_list_pred_matrix_id_delta
            } else {
                let coef_num = 1u32 << (4 + (size_id << 1)).min(6);
                if size_id > 1 {
                    br.read_se()?; // scaling_list_dc_coef_minus8
                }
                for _ in 0..coef_num {
                    br.read_se()?; // scaling_list_delta_coef
                }
            }
        }
    }
    Ok(())
}

// ============================================================
// st_ref_pic_set
// ============================================================

/// 短期参考图像集 (7.3.7)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortTermRps {
    /// DeltaPocS0
    pub delta_poc_s0: Vec<i32>,
    /// UsedByCurrPicS0
    pub used_s0: Vec<bool>,
    /// DeltaPocS1
    pub delta_poc_s1: Vec<i32>,
    /// UsedByCurrPicS1
    pub used_s1: Vec<bool>,
}

impl ShortTermRps {
    /// NumDeltaPocs
    pub fn num_delta_pocs(&self) -> usize {
        self.delta_poc_s0.len() + self.delta_poc_s1.len()
    }

    /// 当前图像使用的参考数
    pub fn num_used_by_curr(&self) -> u32 {
        self.used_s0.iter().chain(&self.used_s1).filter(|u| **u).count() as u32
    }

    fn push_s0(&mut self, delta: i32, used: bool) {
        self.delta_poc_s0.push(delta);
        self.used_s0.push(used);
    }

    fn push_s1(&mut self, delta: i32, used: bool) {
        self.delta_poc_s1.push(delta);
        self.used_s1.push(used);
    }
}

/// 解析 st_ref_pic_set(idx)
///
/// `num_sets` 为 num_short_term_ref_pic_sets, 切片头中 `idx == num_sets`.
/// `sets` 为 SPS 中已解析的集合.
pub(crate) fn parse_short_term_rps(
    br: &mut BitReader,
    idx: usize,
    num_sets: usize,
    sets: &[ShortTermRps],
) -> TaoResult<ShortTermRps> {
    let inter_rps_pred = idx != 0 && br.read_flag()?;
    let mut rps = ShortTermRps::default();

    if inter_rps_pred {
        let mut delta_idx_minus1 = 0;
        if idx == num_sets {
            delta_idx_minus1 = br.read_ue_max(idx as u32 - 1, "HEVC: delta_idx_minus1")? as usize;
        }
        let sign = br.read_flag()?;
        let abs_minus1 = br.read_ue_max(32767, "HEVC: abs_delta_rps_minus1")? as i32;
        let delta_rps = if sign { -(abs_minus1 + 1) } else { abs_minus1 + 1 };

        let ref_idx = idx.checked_sub(delta_idx_minus1 + 1).ok_or_else(|| {
            TaoError::InvalidData(format!("HEVC: RefRpsIdx 超出范围, idx={}", idx))
        })?;
        let reference = sets.get(ref_idx).ok_or_else(|| {
            TaoError::InvalidData(format!("HEVC: 引用的 RPS 不存在, ref_idx={}", ref_idx))
        })?;

        let count = reference.num_delta_pocs();
        let mut used_by_curr = Vec::with_capacity(count + 1);
        let mut use_delta = Vec::with_capacity(count + 1);
        for _ in 0..=count {
            let used = br.read_flag()?;
            used_by_curr.push(used);
            use_delta.push(used || br.read_flag()?);
        }

        let n_neg = reference.delta_poc_s0.len();
        // (7-61)
        for j in (0..reference.delta_poc_s1.len()).rev() {
            let d_poc = reference.delta_poc_s1[j] + delta_rps;
            if d_poc < 0 && use_delta[n_neg + j] {
                rps.push_s0(d_poc, used_by_curr[n_neg + j]);
            }
        }
        if delta_rps < 0 && use_delta[count] {
            rps.push_s0(delta_rps, used_by_curr[count]);
        }
        for j in 0..n_neg {
            let d_poc = reference.delta_poc_s0[j] + delta_rps;
            if d_poc < 0 && use_delta[j] {
                rps.push_s0(d_poc, used_by_curr[j]);
            }
        }
        // (7-62)
        for j in (0..n_neg).rev() {
            let d_poc = reference.delta_poc_s0[j] + delta_rps;
            if d_poc > 0 && use_delta[j] {
                rps.push_s1(d_poc, used_by_curr[j]);
            }
        }
        if delta_rps > 0 && use_delta[count] {
            rps.push_s1(delta_rps, used_by_curr[count]);
        }
        for j in 0..reference.delta_poc_s1.len() {
            let d_poc = reference.delta_poc_s1[j] + delta_rps;
            if d_poc > 0 && use_delta[n_neg + j] {
                rps.push_s1(d_poc, used_by_curr[n_neg + j]);
            }
        }
        if rps.num_delta_pocs() > MAX_DPB_PICS {
            return Err(TaoError::InvalidData(format!(
                "HEVC: 预测 RPS 条目过多, count={}",
                rps.num_delta_pocs()
            )));
        }
    } else {
        let num_negative = br.read_ue_max(MAX_DPB_PICS as u32, "HEVC: num_negative_pics")?;
        let num_positive = br.read_ue_max(
            MAX_DPB_PICS as u32 - num_negative,
            "HEVC: num_positive_pics",
        )?;
        let mut poc = 0i32;
        for _ in 0..num_negative {
            poc -= br.read_ue_max(32767, "HEVC: delta_poc_s0_minus1")? as i32 + 1;
            let used = br.read_flag()?;
            rps.push_s0(poc, used);
        }
        poc = 0;
        for _ in 0..num_positive {
            poc += br.read_ue_max(32767, "HEVC: delta_poc_s1_minus1")? as i32 + 1;
            let used = br.read_flag()?;
            rps.push_s1(poc, used);
        }
    }
    Ok(rps)
}

// ============================================================
// VUI
// ============================================================

/// HEVC VUI 参数 (E.2.1)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HevcVui {
    /// aspect_ratio_info_present_flag
    pub aspect_ratio_info_present_flag: bool,
    /// aspect_ratio_idc
    pub sar_idc: u8,
    /// sar_width (Extended_SAR)
    pub sar_width: u16,
    /// sar_height (Extended_SAR)
    pub sar_height: u16,
    /// overscan_info_present_flag
    pub overscan_info_present: bool,
    /// overscan_appropriate_flag
    pub overscan_appropriate: bool,
    /// video_signal_type_present_flag
    pub video_signal_type_present_flag: bool,
    /// video_format
    pub video_format: u8,
    /// video_full_range_flag
    pub video_full_range_flag: bool,
    /// colour_description_present_flag
    pub colour_description_present_flag: bool,
    /// colour_primaries
    pub colour_primaries: u8,
    /// transfer_characteristics
    pub transfer_characteristic: u8,
    /// matrix_coeffs
    pub matrix_coeffs: u8,
    /// chroma_loc_info_present_flag
    pub chroma_loc_info_present_flag: bool,
    /// chroma_sample_loc_type_top_field
    pub chroma_sample_loc_type_top_field: u32,
    /// chroma_sample_loc_type_bottom_field
    pub chroma_sample_loc_type_bottom_field: u32,
    /// neutral_chroma_indication_flag
    pub neutral_chroma_indication_flag: bool,
    /// field_seq_flag
    pub field_seq_flag: bool,
    /// frame_field_info_present_flag
    pub frame_field_info_present_flag: bool,
    /// default_display_window_flag
    pub default_display_window_flag: bool,
    /// def_disp_win_left_offset
    pub left_offset: u32,
    /// def_disp_win_right_offset
    pub right_offset: u32,
    /// def_disp_win_top_offset
    pub top_offset: u32,
    /// def_disp_win_bottom_offset
    pub bottom_offset: u32,
    /// vui_timing_info_present_flag
    pub has_timing_info: bool,
    /// vui_num_units_in_tick
    pub num_units_in_tick: u32,
    /// vui_time_scale
    pub time_scale: u32,
    /// vui_poc_proportional_to_timing_flag
    pub poc_proportional_to_timing_flag: bool,
    /// vui_num_ticks_poc_diff_one_minus1
    pub num_ticks_poc_diff_one_minus1: u32,
    /// vui_hrd_parameters_present_flag
    pub hrd_parameters_present_flag: bool,
    /// bitstream_restriction_flag
    pub bitstream_restriction_flag: bool,
}

impl HevcVui {
    /// 未携带 VUI 时的默认值 (颜色描述为未指定)
    pub fn unspecified() -> Self {
        Self {
            video_format: 5,
            colour_primaries: 2,
            transfer_characteristic: 2,
            matrix_coeffs: 2,
            ..Default::default()
        }
    }
}

fn parse_vui(br: &mut BitReader, max_sub_layers_minus1: u8) -> TaoResult<HevcVui> {
    let mut vui = HevcVui::unspecified();

    vui.aspect_ratio_info_present_flag = br.read_flag()?;
    if vui.aspect_ratio_info_present_flag {
        vui.sar_idc = br.read_bits(8)? as u8;
        if vui.sar_idc == 255 {
            vui.sar_width = br.read_bits(16)? as u16;
            vui.sar_height = br.read_bits(16)? as u16;
        }
    }

    vui.overscan_info_present = br.read_flag()?;
    if vui.overscan_info_present {
        vui.overscan_appropriate = br.read_flag()?;
    }

    vui.video_signal_type_present_flag = br.read_flag()?;
    if vui.video_signal_type_present_flag {
        vui.video_format = br.read_bits(3)? as u8;
        vui.video_full_range_flag = br.read_flag()?;
        vui.colour_description_present_flag = br.read_flag()?;
        if vui.colour_description_present_flag {
            vui.colour_primaries = br.read_bits(8)? as u8;
            vui.transfer_characteristic = br.read_bits(8)? as u8;
            vui.matrix_coeffs = br.read_bits(8)? as u8;
        }
    }

    vui.chroma_loc_info_present_flag = br.read_flag()?;
    if vui.chroma_loc_info_present_flag {
        vui.chroma_sample_loc_type_top_field = br.read_ue_max(5, "HEVC: chroma_sample_loc_type_top_field")?;
        vui.chroma_sample_loc_type_bottom_field =
            br.read_ue_max(5, "HEVC: chroma_sample_loc_type_bottom_field")?;
    }

    vui.neutral_chroma_indication_flag = br.read_flag()?;
    vui.field_seq_flag = br.read_flag()?;
    vui.frame_field_info_present_flag = br.read_flag()?;

    vui.default_display_window_flag = br.read_flag()?;
    if vui.default_display_window_flag {
        vui.left_offset = br.read_ue()?;
        vui.right_offset = br.read_ue()?;
        vui.top_offset = br.read_ue()?;
        vui.bottom_offset = br.read_ue()?;
    }

    vui.has_timing_info = br.read_flag()?;
    if vui.has_timing_info {
        vui.num_units_in_tick = br.read_bits(32)?;
        vui.time_scale = br.read_bits(32)?;
        vui.poc_proportional_to_timing_flag = br.read_flag()?;
        if vui.poc_proportional_to_timing_flag {
            vui.num_ticks_poc_diff_one_minus1 = br.read_ue()?;
        }
        vui.hrd_parameters_present_flag = br.read_flag()?;
        if vui.hrd_parameters_present_flag {
            skip_hrd_parameters(br, true, max_sub_layers_minus1)?;
        }
    }

    vui.bitstream_restriction_flag = br.read_flag()?;
    if vui.bitstream_restriction_flag {
        br.skip_bits(3)?; // tiles_fixed, mv_over_pic_boundaries, restricted_ref_pic_lists
        br.read_ue_max(4095, "HEVC: min_spatial_segmentation_idc")?;
        br.read_ue()?; // max_bytes_per_pic_denom
        br.read_ue()?; // max_bits_per_min_cu_denom
        br.read_ue_max(16, "HEVC: log2_max_mv_length_horizontal")?;
        br.read_ue_max(15, "HEVC: log2_max_mv_length_vertical")?;
    }

    Ok(vui)
}

// ============================================================
// SPS
// ============================================================

/// HEVC SPS 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HevcSps {
    /// sps_video_parameter_set_id
    pub vps_id: u8,
    /// 层 0 为 sps_max_sub_layers_minus1, 其他层为 sps_ext_or_max_sub_layers_minus1
    pub sps_ext_or_max_sub_layers_minus1: u8,
    /// 实际生效的 sps_max_sub_layers_minus1
    pub max_sub_layers_minus1: u8,
    /// MultiLayerExtSpsFlag
    pub multi_layer_ext: bool,
    /// profile_tier_level (多层扩展 SPS 中不存在)
    pub ptl: ProfileTierLevel,
    /// sps_seq_parameter_set_id
    pub sps_id: u32,
    /// update_rep_format_flag
    pub update_rep_format_flag: bool,
    /// sps_rep_format_idx
    pub rep_format_idx: u8,
    /// chroma_format_idc
    pub chroma_format_idc: u32,
    /// separate_colour_plane_flag
    pub separate_colour_plane_flag: bool,
    /// pic_width_in_luma_samples
    pub width: u32,
    /// pic_height_in_luma_samples
    pub height: u32,
    /// conformance_window_flag
    pub cw_flag: bool,
    /// conf_win_left_offset
    pub cw_left: u32,
    /// conf_win_right_offset
    pub cw_right: u32,
    /// conf_win_top_offset
    pub cw_top: u32,
    /// conf_win_bottom_offset
    pub cw_bottom: u32,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
    /// log2_max_pic_order_cnt_lsb_minus4 + 4
    pub log2_max_pic_order_cnt_lsb: u32,
    /// sub_layer_ordering_info_present_flag
    pub sub_layer_ordering_info_present_flag: bool,
    /// log2_min_luma_coding_block_size_minus3 + 3
    pub log2_min_luma_coding_block_size: u32,
    /// log2_diff_max_min_luma_coding_block_size
    pub log2_diff_max_min_luma_coding_block_size: u32,
    /// log2_min_luma_transform_block_size_minus2 + 2
    pub log2_min_transform_block_size: u32,
    /// 最大变换块 log2 尺寸
    pub log2_max_transform_block_size: u32,
    /// max_transform_hierarchy_depth_inter
    pub max_transform_hierarchy_depth_inter: u32,
    /// max_transform_hierarchy_depth_intra
    pub max_transform_hierarchy_depth_intra: u32,
    /// CTB 宽度
    pub max_cu_width: u32,
    /// CTB 高度
    pub max_cu_height: u32,
    /// 最大 CU 划分深度
    pub max_cu_depth: u32,
    /// scaling_list_enabled_flag
    pub scaling_list_enable_flag: bool,
    /// infer_scaling_list_flag
    pub infer_scaling_list_flag: bool,
    /// scaling_list_ref_layer_id
    pub scaling_list_ref_layer_id: u8,
    /// sps_scaling_list_data_present_flag
    pub scaling_list_data_present_flag: bool,
    /// amp_enabled_flag
    pub asymmetric_motion_partitions_enabled_flag: bool,
    /// sample_adaptive_offset_enabled_flag
    pub sample_adaptive_offset_enabled_flag: bool,
    /// pcm_enabled_flag
    pub pcm_enabled_flag: bool,
    /// pcm_sample_bit_depth_luma_minus1
    pub pcm_sample_bit_depth_luma_minus1: u8,
    /// pcm_sample_bit_depth_chroma_minus1
    pub pcm_sample_bit_depth_chroma_minus1: u8,
    /// log2_min_pcm_luma_coding_block_size_minus3
    pub log2_min_pcm_luma_coding_block_size_minus3: u32,
    /// log2_diff_max_min_pcm_luma_coding_block_size
    pub log2_diff_max_min_pcm_luma_coding_block_size: u32,
    /// pcm_loop_filter_disabled_flag
    pub pcm_loop_filter_disable_flag: bool,
    /// 短期参考图像集
    pub short_term_rps: Vec<ShortTermRps>,
    /// long_term_ref_pics_present_flag
    pub long_term_ref_pics_present_flag: bool,
    /// used_by_curr_pic_lt_sps_flag (长度即 num_long_term_ref_pics_sps)
    pub used_by_curr_pic_lt_sps: Vec<bool>,
    /// sps_temporal_mvp_enabled_flag
    pub temporal_mvp_enable_flag: bool,
    /// strong_intra_smoothing_enabled_flag
    pub strong_intra_smoothing_enable_flag: bool,
    /// vui_parameters_present_flag
    pub vui_parameters_present_flag: bool,
    /// VUI 参数
    pub vui: HevcVui,
}

impl HevcSps {
    /// num_short_term_ref_pic_sets
    pub fn num_short_term_ref_pic_sets(&self) -> u32 {
        self.short_term_rps.len() as u32
    }

    /// num_long_term_ref_pics_sps
    pub fn num_long_term_ref_pic_sps(&self) -> u32 {
        self.used_by_curr_pic_lt_sps.len() as u32
    }

    /// ChromaArrayType
    pub fn chroma_array_type(&self) -> u32 {
        if self.separate_colour_plane_flag {
            0
        } else {
            self.chroma_format_idc
        }
    }

    /// PicSizeInCtbsY
    pub fn pic_size_in_ctbs(&self) -> u32 {
        if self.max_cu_width == 0 {
            return 0;
        }
        self.width.div_ceil(self.max_cu_width) * self.height.div_ceil(self.max_cu_height)
    }
}

/// 读取 SPS RBSP 首部的 vps_id
pub fn peek_vps_id(rbsp: &[u8]) -> Option<u8> {
    rbsp.first().map(|b| b >> 4)
}

/// 从 RBSP 数据 (不含 2 字节 NAL 头) 解析 SPS
///
/// `layer_id` 为 NAL 头中的 nuh_layer_id. 多层扩展 SPS 的子层数取自 `vps`.
pub fn parse_sps(rbsp: &[u8], layer_id: u8, vps: Option<&Vps>) -> TaoResult<HevcSps> {
    if rbsp.len() < 2 {
        return Err(TaoError::InvalidData("HEVC: SPS RBSP 太短".into()));
    }
    let mut br = BitReader::new(rbsp);
    let mut sps = HevcSps {
        vps_id: br.read_bits(4)? as u8,
        sps_ext_or_max_sub_layers_minus1: br.read_bits(3)? as u8,
        vui: HevcVui::unspecified(),
        ..Default::default()
    };
    sps.multi_layer_ext = layer_id != 0 && sps.sps_ext_or_max_sub_layers_minus1 == 7;
    sps.max_sub_layers_minus1 = if sps.multi_layer_ext {
        match vps {
            Some(v) => v.max_sub_layers_minus1,
            None => {
                debug!("HEVC: 多层扩展 SPS 引用的 VPS 不存在, vps_id={}", sps.vps_id);
                0
            }
        }
    } else {
        sps.sps_ext_or_max_sub_layers_minus1
    };
    if sps.max_sub_layers_minus1 > 6 {
        return Err(TaoError::InvalidData(format!(
            "HEVC: sps_max_sub_layers_minus1 超出范围, value={}",
            sps.max_sub_layers_minus1
        )));
    }

    if !sps.multi_layer_ext {
        br.skip_bits(1)?; // sps_temporal_id_nesting_flag
        sps.ptl = parse_profile_tier_level(&mut br, true, sps.max_sub_layers_minus1)?;
    }

    sps.sps_id = br.read_ue_max(15, "HEVC: sps_id")?;

    if sps.multi_layer_ext {
        // 分辨率与位深来自 VPS 扩展中的 rep_format, 这里保留默认值
        sps.update_rep_format_flag = br.read_flag()?;
        if sps.update_rep_format_flag {
            sps.rep_format_idx = br.read_bits(8)? as u8;
        }
        sps.chroma_format_idc = 1;
        sps.bit_depth_luma = 8;
        sps.bit_depth_chroma = 8;
    } else {
        sps.chroma_format_idc = br.read_ue_max(3, "HEVC: chroma_format_idc")?;
        if sps.chroma_format_idc == 3 {
            sps.separate_colour_plane_flag = br.read_flag()?;
        }
        sps.width = br.read_ue()?;
        sps.height = br.read_ue()?;
        sps.cw_flag = br.read_flag()?;
        if sps.cw_flag {
            sps.cw_left = br.read_ue()?;
            sps.cw_right = br.read_ue()?;
            sps.cw_top = br.read_ue()?;
            sps.cw_bottom = br.read_ue()?;
        }
        sps.bit_depth_luma = br.read_ue_max(8, "HEVC: bit_depth_luma_minus8")? + 8;
        sps.bit_depth_chroma = br.read_ue_max(8, "HEVC: bit_depth_chroma_minus8")? + 8;
    }

    sps.log2_max_pic_order_cnt_lsb = br.read_ue_max(12, "HEVC: log2_max_pic_order_cnt_lsb_minus4")? + 4;

    let mut max_dec_pic_buffering_minus1 = 0;
    if !sps.multi_layer_ext {
        sps.sub_layer_ordering_info_present_flag = br.read_flag()?;
        let first = if sps.sub_layer_ordering_info_present_flag {
            0
        } else {
            sps.max_sub_layers_minus1
        };
        for _ in first..=sps.max_sub_layers_minus1 {
            max_dec_pic_buffering_minus1 = br.read_ue_max(15, "HEVC: sps_max_dec_pic_buffering_minus1")?;
            br.read_ue()?; // sps_max_num_reorder_pics
            br.read_ue()?; // sps_max_latency_increase_plus1
        }
    }
    debug!(
        "HEVC: SPS max_dec_pic_buffering_minus1={}",
        max_dec_pic_buffering_minus1
    );

    sps.log2_min_luma_coding_block_size = br.read_ue_max(3, "HEVC: log2_min_luma_coding_block_size_minus3")? + 3;
    sps.log2_diff_max_min_luma_coding_block_size =
        br.read_ue_max(3, "HEVC: log2_diff_max_min_luma_coding_block_size")?;
    sps.log2_min_transform_block_size = br.read_ue_max(3, "HEVC: log2_min_luma_transform_block_size_minus2")? + 2;
    sps.log2_max_transform_block_size = sps.log2_min_transform_block_size
        + br.read_ue_max(3, "HEVC: log2_diff_max_min_luma_transform_block_size")?;
    sps.max_transform_hierarchy_depth_inter = br.read_ue()?;
    sps.max_transform_hierarchy_depth_intra = br.read_ue()?;

    sps.max_cu_width =
        1 << (sps.log2_min_luma_coding_block_size + sps.log2_diff_max_min_luma_coding_block_size);
    sps.max_cu_height = sps.max_cu_width;
    let min_cb_size = sps.max_cu_width >> sps.log2_diff_max_min_luma_coding_block_size;
    let mut extra_depth = 0;
    while min_cb_size > (1 << (sps.log2_min_transform_block_size + extra_depth)) {
        extra_depth += 1;
    }
    sps.max_cu_depth = sps.log2_diff_max_min_luma_coding_block_size + extra_depth;

    sps.scaling_list_enable_flag = br.read_flag()?;
    if sps.scaling_list_enable_flag {
        if sps.multi_layer_ext {
            sps.infer_scaling_list_flag = br.read_flag()?;
        }
        if sps.infer_scaling_list_flag {
            sps.scaling_list_ref_layer_id = br.read_bits(6)? as u8;
        } else {
            sps.scaling_list_data_present_flag = br.read_flag()?;
            if sps.scaling_list_data_present_flag {
                skip_scaling_list_data(&mut br)?;
            }
        }
    }

    sps.asymmetric_motion_partitions_enabled_flag = br.read_flag()?;
    sps.sample_adaptive_offset_enabled_flag = br.read_flag()?;

    sps.pcm_enabled_flag = br.read_flag()?;
    if sps.pcm_enabled_flag {
        sps.pcm_sample_bit_depth_luma_minus1 = br.read_bits(4)? as u8;
        sps.pcm_sample_bit_depth_chroma_minus1 = br.read_bits(4)? as u8;
        sps.log2_min_pcm_luma_coding_block_size_minus3 = br.read_ue()?;
        sps.log2_diff_max_min_pcm_luma_coding_block_size = br.read_ue()?;
        sps.pcm_loop_filter_disable_flag = br.read_flag()?;
    }

    let num_rps = br.read_ue_max(MAX_SHORT_TERM_RPS, "HEVC: num_short_term_ref_pic_sets")?;
    for idx in 0..num_rps as usize {
        let rps = parse_short_term_rps(&mut br, idx, num_rps as usize, &sps.short_term_rps)?;
        sps.short_term_rps.push(rps);
    }

    sps.long_term_ref_pics_present_flag = br.read_flag()?;
    if sps.long_term_ref_pics_present_flag {
        let count = br.read_ue_max(32, "HEVC: num_long_term_ref_pics_sps")?;
        for _ in 0..count {
            br.skip_bits(sps.log2_max_pic_order_cnt_lsb)?; // lt_ref_pic_poc_lsb_sps
            sps.used_by_curr_pic_lt_sps.push(br.read_flag()?);
        }
    }

    sps.temporal_mvp_enable_flag = br.read_flag()?;
    sps.strong_intra_smoothing_enable_flag = br.read_flag()?;

    sps.vui_parameters_present_flag = br.read_flag()?;
    if sps.vui_parameters_present_flag {
        sps.vui = parse_vui(&mut br, sps.max_sub_layers_minus1)?;
    }

    Ok(sps)
}
