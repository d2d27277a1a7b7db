//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! 同时用于普通 SPS (NAL 7) 与子集 SPS (NAL 15) 的 seq_parameter_set_data 部分.
//! VUI 完整解析 (含 HRD), 以便得到 low_delay_hrd_flag 等报告字段.

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

/// VUI 参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vui {
    /// aspect_ratio_info_present_flag
    pub aspect_ratio_info_present_flag: bool,
    /// 像素宽高比分子 (未指定时为 0)
    pub par_num: u32,
    /// 像素宽高比分母 (未指定时为 0)
    pub par_den: u32,
    /// overscan_info_present_flag
    pub overscan_info_present_flag: bool,
    /// overscan_appropriate_flag
    pub overscan_appropriate_flag: bool,
    /// video_signal_type_present_flag
    pub video_signal_type_present_flag: bool,
    /// video_format
    pub video_format: u8,
    /// video_full_range_flag
    pub video_full_range_flag: bool,
    /// colour_description_present_flag
    pub colour_description_present_flag: bool,
    /// colour_primaries (默认 2 = 未指定)
    pub colour_primaries: u8,
    /// transfer_characteristics
    pub transfer_characteristics: u8,
    /// matrix_coefficients
    pub matrix_coefficients: u8,
    /// timing_info_present_flag
    pub timing_info_present_flag: bool,
    /// num_units_in_tick
    pub num_units_in_tick: u32,
    /// time_scale
    pub time_scale: u32,
    /// fixed_frame_rate_flag
    pub fixed_frame_rate_flag: bool,
    /// nal_hrd_parameters_present_flag
    pub nal_hrd_parameters_present_flag: bool,
    /// vcl_hrd_parameters_present_flag
    pub vcl_hrd_parameters_present_flag: bool,
    /// low_delay_hrd_flag
    pub low_delay_hrd_flag: bool,
    /// pic_struct_present_flag
    pub pic_struct_present_flag: bool,
    /// bitstream_restriction_flag
    pub bitstream_restriction_flag: bool,
    /// max_dec_frame_buffering
    pub max_dec_frame_buffering: u32,
}

impl Vui {
    fn unspecified() -> Self {
        Self {
            colour_primaries: 2,
            transfer_characteristics: 2,
            matrix_coefficients: 2,
            video_format: 5,
            ..Default::default()
        }
    }
}

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc
    pub profile_idc: u8,
    /// constraint_set 标志位
    pub constraint_set_flags: u8,
    /// level_idc
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// chroma_format_idc (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// separate_colour_plane_flag
    pub separate_colour_plane_flag: bool,
    /// bit_depth_luma_minus8
    pub bit_depth_luma_minus8: u32,
    /// bit_depth_chroma_minus8
    pub bit_depth_chroma_minus8: u32,
    /// log2(MaxFrameNum)
    pub log2_max_frame_num: u32,
    /// pic_order_cnt_type (0, 1, 2)
    pub poc_type: u32,
    /// log2(MaxPicOrderCntLsb), 仅 poc_type==0
    pub log2_max_poc_lsb: u32,
    /// delta_pic_order_always_zero_flag, 仅 poc_type==1
    pub delta_pic_order_always_zero_flag: bool,
    /// offset_for_non_ref_pic, 仅 poc_type==1
    pub offset_for_non_ref_pic: i32,
    /// offset_for_top_to_bottom_field, 仅 poc_type==1
    pub offset_for_top_to_bottom_field: i32,
    /// offset_for_ref_frame 列表, 仅 poc_type==1
    pub offset_for_ref_frame: Vec<i32>,
    /// max_num_ref_frames
    pub max_num_ref_frames: u32,
    /// gaps_in_frame_num_value_allowed_flag
    pub gaps_in_frame_num_value_allowed_flag: bool,
    /// pic_width_in_mbs_minus1 + 1
    pub pic_width_in_mbs: u32,
    /// pic_height_in_map_units_minus1 + 1
    pub pic_height_in_map_units: u32,
    /// frame_mbs_only_flag
    pub frame_mbs_only_flag: bool,
    /// mb_adaptive_frame_field_flag
    pub mb_adaptive_frame_field_flag: bool,
    /// direct_8x8_inference_flag
    pub direct_8x8_inference_flag: bool,
    /// 裁剪量 (亮度采样单位)
    pub crop_left: u32,
    /// 裁剪量 (亮度采样单位)
    pub crop_right: u32,
    /// 裁剪量 (亮度采样单位)
    pub crop_top: u32,
    /// 裁剪量 (亮度采样单位)
    pub crop_bottom: u32,
    /// 图像宽度 (已裁剪)
    pub width: u32,
    /// 图像高度 (已裁剪)
    pub height: u32,
    /// vui_parameters_present_flag
    pub vui_parameters_present_flag: bool,
    /// VUI 参数 (未携带时为默认值)
    pub vui: Vui,
}

/// 预定义的 SAR 表 (ITU-T H.264 表 E-1), 索引 0 为未指定
const SAR_TABLE: [(u32, u32); 17] = [
    (0, 0),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

/// 从 RBSP 数据 (不含 NAL 头) 解析 SPS
pub fn parse_sps(rbsp: &[u8]) -> TaoResult<Sps> {
    if rbsp.len() < 3 {
        return Err(TaoError::InvalidData("H.264: SPS RBSP 太短".into()));
    }

    let mut br = BitReader::new(rbsp);

    let profile_idc = br.read_bits(8)? as u8;
    let constraint_set_flags = br.read_bits(8)? as u8;
    let level_idc = br.read_bits(8)? as u8;
    let sps_id = br.read_ue_max(31, "H.264: sps_id")?;

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane_flag = false;
    let mut bit_depth_luma_minus8 = 0;
    let mut bit_depth_chroma_minus8 = 0;

    if is_high_profile(profile_idc) {
        chroma_format_idc = br.read_ue_max(3, "H.264: chroma_format_idc")?;
        if chroma_format_idc == 3 {
            separate_colour_plane_flag = br.read_flag()?;
        }
        bit_depth_luma_minus8 = br.read_ue_max(6, "H.264: bit_depth_luma_minus8")?;
        bit_depth_chroma_minus8 = br.read_ue_max(6, "H.264: bit_depth_chroma_minus8")?;
        br.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag
        if br.read_flag()? {
            let list_count = if chroma_format_idc != 3 { 8 } else { 12 };
            for idx in 0..list_count {
                if br.read_flag()? {
                    skip_scaling_list(&mut br, if idx < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    let log2_max_frame_num = br.read_ue_max(12, "H.264: log2_max_frame_num_minus4")? + 4;

    let poc_type = br.read_ue_max(2, "H.264: pic_order_cnt_type")?;
    let mut log2_max_poc_lsb = 0;
    let mut delta_pic_order_always_zero_flag = false;
    let mut offset_for_non_ref_pic = 0;
    let mut offset_for_top_to_bottom_field = 0;
    let mut offset_for_ref_frame = Vec::new();
    match poc_type {
        0 => {
            log2_max_poc_lsb = br.read_ue_max(12, "H.264: log2_max_pic_order_cnt_lsb_minus4")? + 4;
        }
        1 => {
            delta_pic_order_always_zero_flag = br.read_flag()?;
            offset_for_non_ref_pic = br.read_se()?;
            offset_for_top_to_bottom_field = br.read_se()?;
            let cycle = br.read_ue_max(255, "H.264: num_ref_frames_in_pic_order_cnt_cycle")?;
            for _ in 0..cycle {
                offset_for_ref_frame.push(br.read_se()?);
            }
        }
        _ => {}
    }

    let max_num_ref_frames = br.read_ue_max(16, "H.264: max_num_ref_frames")?;
    let gaps_in_frame_num_value_allowed_flag = br.read_flag()?;
    let pic_width_in_mbs = br.read_ue()? + 1;
    let pic_height_in_map_units = br.read_ue()? + 1;

    let frame_mbs_only_flag = br.read_flag()?;
    let mut mb_adaptive_frame_field_flag = false;
    if !frame_mbs_only_flag {
        mb_adaptive_frame_field_flag = br.read_flag()?;
    }
    let direct_8x8_inference_flag = br.read_flag()?;

    let mut crop = [0u32; 4]; // left, right, top, bottom
    if br.read_flag()? {
        for slot in crop.iter_mut() {
            *slot = br.read_ue()?;
        }
    }

    // 计算像素尺寸
    let chroma_array_type = if separate_colour_plane_flag {
        0
    } else {
        chroma_format_idc
    };
    let (crop_unit_x, crop_unit_y) = cropping_unit(chroma_array_type, frame_mbs_only_flag);
    let raw_width = pic_width_in_mbs
        .checked_mul(16)
        .ok_or_else(|| TaoError::InvalidData("H.264: 计算宽度时发生溢出".into()))?;
    let raw_height = pic_height_in_map_units
        .checked_mul(if frame_mbs_only_flag { 16 } else { 32 })
        .ok_or_else(|| TaoError::InvalidData("H.264: 计算高度时发生溢出".into()))?;
    let [crop_left, crop_right, crop_top, crop_bottom] = [
        crop[0].saturating_mul(crop_unit_x),
        crop[1].saturating_mul(crop_unit_x),
        crop[2].saturating_mul(crop_unit_y),
        crop[3].saturating_mul(crop_unit_y),
    ];
    let crop_x = crop_left.saturating_add(crop_right);
    let crop_y = crop_top.saturating_add(crop_bottom);
    if crop_x >= raw_width || crop_y >= raw_height {
        return Err(TaoError::InvalidData(format!(
            "H.264: 裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
            raw_width, raw_height, crop_x, crop_y
        )));
    }

    let vui_parameters_present_flag = br.read_flag()?;
    let vui = if vui_parameters_present_flag {
        parse_vui(&mut br)?
    } else {
        Vui::unspecified()
    };

    Ok(Sps {
        profile_idc,
        constraint_set_flags,
        level_idc,
        sps_id,
        chroma_format_idc,
        separate_colour_plane_flag,
        bit_depth_luma_minus8,
        bit_depth_chroma_minus8,
        log2_max_frame_num,
        poc_type,
        log2_max_poc_lsb,
        delta_pic_order_always_zero_flag,
        offset_for_non_ref_pic,
        offset_for_top_to_bottom_field,
        offset_for_ref_frame,
        max_num_ref_frames,
        gaps_in_frame_num_value_allowed_flag,
        pic_width_in_mbs,
        pic_height_in_map_units,
        frame_mbs_only_flag,
        mb_adaptive_frame_field_flag,
        direct_8x8_inference_flag,
        crop_left,
        crop_right,
        crop_top,
        crop_bottom,
        width: raw_width - crop_x,
        height: raw_height - crop_y,
        vui_parameters_present_flag,
        vui,
    })
}

// ============================================================
// 辅助函数
// ============================================================

/// 是否为携带色度/位深扩展字段的 profile
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// 获取 cropping 单位
fn cropping_unit(chroma_array_type: u32, frame_mbs_only: bool) -> (u32, u32) {
    let height_mult = if frame_mbs_only { 1 } else { 2 };
    match chroma_array_type {
        1 => (2, 2 * height_mult),
        2 => (2, height_mult),
        _ => (1, height_mult),
    }
}

/// 跳过 scaling_list() 语法
fn skip_scaling_list(br: &mut BitReader, size: usize) -> TaoResult<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = br.read_se()?;
            next_scale = (last_scale + delta_scale).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// 解析 VUI 参数
fn parse_vui(br: &mut BitReader) -> TaoResult<Vui> {
    let mut vui = Vui::unspecified();

    vui.aspect_ratio_info_present_flag = br.read_flag()?;
    if vui.aspect_ratio_info_present_flag {
        let ar_idc = br.read_bits(8)? as usize;
        if ar_idc == 255 {
            vui.par_num = br.read_bits(16)?;
            vui.par_den = br.read_bits(16)?;
        } else if let Some(&(num, den)) = SAR_TABLE.get(ar_idc) {
            vui.par_num = num;
            vui.par_den = den;
        } else {
            log::debug!("H.264: VUI aspect_ratio_idc 保留值, value={}", ar_idc);
        }
    }

    vui.overscan_info_present_flag = br.read_flag()?;
    if vui.overscan_info_present_flag {
        vui.overscan_appropriate_flag = br.read_flag()?;
    }

    vui.video_signal_type_present_flag = br.read_flag()?;
    if vui.video_signal_type_present_flag {
        vui.video_format = br.read_bits(3)? as u8;
        vui.video_full_range_flag = br.read_flag()?;
        vui.colour_description_present_flag = br.read_flag()?;
        if vui.colour_description_present_flag {
            vui.colour_primaries = br.read_bits(8)? as u8;
            vui.transfer_characteristics = br.read_bits(8)? as u8;
            vui.matrix_coefficients = br.read_bits(8)? as u8;
        }
    }

    // chroma_loc_info_present_flag
    if br.read_flag()? {
        br.read_ue()?; // chroma_sample_loc_type_top_field
        br.read_ue()?; // chroma_sample_loc_type_bottom_field
    }

    vui.timing_info_present_flag = br.read_flag()?;
    if vui.timing_info_present_flag {
        vui.num_units_in_tick = br.read_bits(32)?;
        vui.time_scale = br.read_bits(32)?;
        vui.fixed_frame_rate_flag = br.read_flag()?;
    }

    vui.nal_hrd_parameters_present_flag = br.read_flag()?;
    if vui.nal_hrd_parameters_present_flag {
        skip_hrd_parameters(br)?;
    }
    vui.vcl_hrd_parameters_present_flag = br.read_flag()?;
    if vui.vcl_hrd_parameters_present_flag {
        skip_hrd_parameters(br)?;
    }
    if vui.nal_hrd_parameters_present_flag || vui.vcl_hrd_parameters_present_flag {
        vui.low_delay_hrd_flag = br.read_flag()?;
    }
    vui.pic_struct_present_flag = br.read_flag()?;

    // 部分编码器会截断 VUI 尾部, bitstream_restriction 缺失时按未携带处理
    if br.bits_left() == 0 {
        return Ok(vui);
    }
    vui.bitstream_restriction_flag = br.read_flag()?;
    if vui.bitstream_restriction_flag {
        br.skip_bits(1)?; // motion_vectors_over_pic_boundaries_flag
        br.read_ue()?; // max_bytes_per_pic_denom
        br.read_ue()?; // max_bits_per_mb_denom
        br.read_ue()?; // log2_max_mv_length_horizontal
        br.read_ue()?; // log2_max_mv_length_vertical
        br.read_ue()?; // max_num_reorder_frames
        vui.max_dec_frame_buffering = br.read_ue()?;
    }

    Ok(vui)
}

/// 跳过 hrd_parameters() (E.1.2)
fn skip_hrd_parameters(br: &mut BitReader) -> TaoResult<()> {
    let cpb_cnt = br.read_ue_max(31, "H.264: cpb_cnt_minus1")? + 1;
    br.skip_bits(4)?; // bit_rate_scale
    br.skip_bits(4)?; // cpb_size_scale
    for _ in 0..cpb_cnt {
        br.read_ue()?; // bit_rate_value_minus1
        br.read_ue()?; // cpb_size_value_minus1
        br.skip_bits(1)?; // cbr_flag
    }
    // initial_cpb_removal_delay_length_minus1, cpb_removal_delay_length_minus1,
    // dpb_output_delay_length_minus1, time_offset_length
    br.skip_bits(20)?;
    Ok(())
}
