//! H.265/HEVC VPS 解析器.
//!
//! 解析基础部分 (7.3.2.1) 到 vps_timing_info 为止, 不处理 vps_extension.

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

use super::sps::{ProfileTierLevel, parse_profile_tier_level, skip_hrd_parameters};

/// VPS 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vps {
    /// vps_video_parameter_set_id
    pub vps_id: u8,
    /// vps_base_layer_internal_flag
    pub base_layer_internal: bool,
    /// vps_base_layer_available_flag
    pub base_layer_available: bool,
    /// vps_max_layers_minus1
    pub max_layers_minus1: u8,
    /// vps_max_sub_layers_minus1
    pub max_sub_layers_minus1: u8,
    /// vps_temporal_id_nesting_flag
    pub temporal_id_nesting: bool,
    /// profile_tier_level
    pub ptl: ProfileTierLevel,
    /// vps_max_layer_id
    pub max_layer_id: u8,
    /// vps_num_layer_sets_minus1 + 1
    pub num_layer_sets: u32,
    /// vps_timing_info_present_flag
    pub timing_info_present: bool,
    /// vps_num_units_in_tick
    pub num_units_in_tick: u32,
    /// vps_time_scale
    pub time_scale: u32,
    /// vps_num_hrd_parameters
    pub num_hrd_parameters: u32,
}

/// 从 RBSP 数据 (不含 2 字节 NAL 头) 解析 VPS
pub fn parse_vps(rbsp: &[u8]) -> TaoResult<Vps> {
    if rbsp.len() < 4 {
        return Err(TaoError::InvalidData("HEVC: VPS RBSP 太短".into()));
    }
    let mut br = BitReader::new(rbsp);
    let mut vps = Vps {
        vps_id: br.read_bits(4)? as u8,
        base_layer_internal: br.read_flag()?,
        base_layer_available: br.read_flag()?,
        max_layers_minus1: br.read_bits(6)? as u8,
        max_sub_layers_minus1: br.read_bits(3)? as u8,
        temporal_id_nesting: br.read_flag()?,
        ..Default::default()
    };
    if vps.max_sub_layers_minus1 > 6 {
        return Err(TaoError::InvalidData(format!(
            "HEVC: vps_max_sub_layers_minus1 超出范围, value={}",
            vps.max_sub_layers_minus1
        )));
    }
    br.skip_bits(16)?; // vps_reserved_0xffff_16bits
    vps.ptl = parse_profile_tier_level(&mut br, true, vps.max_sub_layers_minus1)?;

    let ordering_info_present = br.read_flag()?;
    let first = if ordering_info_present {
        0
    } else {
        vps.max_sub_layers_minus1
    };
    for _ in first..=vps.max_sub_layers_minus1 {
        br.read_ue()?; // vps_max_dec_pic_buffering_minus1
        br.read_ue()?; // vps_max_num_reorder_pics
        br.read_ue()?; // vps_max_latency_increase_plus1
    }

    vps.max_layer_id = br.read_bits(6)? as u8;
    vps.num_layer_sets = br.read_ue_max(1023, "HEVC: vps_num_layer_sets_minus1")? + 1;
    for _ in 1..vps.num_layer_sets {
        br.skip_bits(u32::from(vps.max_layer_id) + 1)?; // layer_id_included_flag
    }

    vps.timing_info_present = br.read_flag()?;
    if vps.timing_info_present {
        vps.num_units_in_tick = br.read_bits(32)?;
        vps.time_scale = br.read_bits(32)?;
        if br.read_flag()? {
            br.read_ue()?; // vps_num_ticks_poc_diff_one_minus1
        }
        vps.num_hrd_parameters = br.read_ue_max(vps.num_layer_sets, "HEVC: vps_num_hrd_parameters")?;
        for i in 0..vps.num_hrd_parameters {
            br.read_ue()?; // hrd_layer_set_idx
            let common_inf_present = i == 0 || br.read_flag()?;
            skip_hrd_parameters(&mut br, common_inf_present, vps.max_sub_layers_minus1)?;
        }
    }

    Ok(vps)
}
