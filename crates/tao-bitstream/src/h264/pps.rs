//! H.264 PPS (Picture Parameter Set) 解析器.
//!
//! 解析到 redundant_pic_cnt_present_flag 为止, 其后的 8x8 变换与量化矩阵字段不参与切片头解析.

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

/// PPS 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pps {
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// entropy_coding_mode_flag (CABAC)
    pub entropy_coding_mode_flag: bool,
    /// bottom_field_pic_order_in_frame_present_flag
    pub pic_order_present: bool,
    /// num_slice_groups_minus1 + 1
    pub slice_group_count: u32,
    /// slice_group_map_type
    pub mb_slice_group_map_type: u32,
    /// slice_group_change_rate_minus1
    pub slice_group_change_rate_minus1: u32,
    /// pic_size_in_map_units_minus1 (slice_group_map_type == 6)
    pub pic_size_in_map_units_minus1: u32,
    /// num_ref_idx_l0_default_active_minus1
    pub num_ref_idx_l0_default_active_minus1: u32,
    /// num_ref_idx_l1_default_active_minus1
    pub num_ref_idx_l1_default_active_minus1: u32,
    /// weighted_pred_flag
    pub weighted_pred_flag: bool,
    /// weighted_bipred_idc
    pub weighted_bipred_idc: u32,
    /// pic_init_qp_minus26
    pub pic_init_qp_minus26: i32,
    /// deblocking_filter_control_present_flag
    pub deblocking_filter_control_present_flag: bool,
    /// constrained_intra_pred_flag
    pub constrained_intra_pred_flag: bool,
    /// redundant_pic_cnt_present_flag
    pub redundant_pic_cnt_present: bool,
}

/// 从 RBSP 数据 (不含 NAL 头) 解析 PPS
pub fn parse_pps(rbsp: &[u8]) -> TaoResult<Pps> {
    if rbsp.is_empty() {
        return Err(TaoError::InvalidData("H.264: PPS RBSP 为空".into()));
    }

    let mut br = BitReader::new(rbsp);
    let mut pps = Pps {
        pps_id: br.read_ue_max(255, "H.264: pps_id")?,
        sps_id: br.read_ue_max(31, "H.264: pps.sps_id")?,
        entropy_coding_mode_flag: br.read_flag()?,
        pic_order_present: br.read_flag()?,
        ..Default::default()
    };

    let num_slice_groups_minus1 = br.read_ue_max(7, "H.264: num_slice_groups_minus1")?;
    pps.slice_group_count = num_slice_groups_minus1 + 1;
    if num_slice_groups_minus1 > 0 {
        pps.mb_slice_group_map_type = br.read_ue_max(6, "H.264: slice_group_map_type")?;
        match pps.mb_slice_group_map_type {
            0 => {
                for _ in 0..=num_slice_groups_minus1 {
                    br.read_ue()?; // run_length_minus1
                }
            }
            2 => {
                for _ in 0..num_slice_groups_minus1 {
                    br.read_ue()?; // top_left
                    br.read_ue()?; // bottom_right
                }
            }
            3..=5 => {
                br.skip_bits(1)?; // slice_group_change_direction_flag
                pps.slice_group_change_rate_minus1 = br.read_ue()?;
            }
            6 => {
                pps.pic_size_in_map_units_minus1 = br.read_ue()?;
                let bits = 32 - num_slice_groups_minus1.leading_zeros();
                let count = u64::from(pps.pic_size_in_map_units_minus1) + 1;
                if count * u64::from(bits) > br.bits_left() as u64 {
                    return Err(TaoError::Eof);
                }
                for _ in 0..count {
                    br.skip_bits(bits)?; // slice_group_id
                }
            }
            _ => {}
        }
    }

    pps.num_ref_idx_l0_default_active_minus1 =
        br.read_ue_max(31, "H.264: num_ref_idx_l0_default_active_minus1")?;
    pps.num_ref_idx_l1_default_active_minus1 =
        br.read_ue_max(31, "H.264: num_ref_idx_l1_default_active_minus1")?;
    pps.weighted_pred_flag = br.read_flag()?;
    pps.weighted_bipred_idc = br.read_bits(2)?;
    pps.pic_init_qp_minus26 = br.read_se()?;
    br.read_se()?; // pic_init_qs_minus26
    br.read_se()?; // chroma_qp_index_offset
    pps.deblocking_filter_control_present_flag = br.read_flag()?;
    pps.constrained_intra_pred_flag = br.read_flag()?;
    pps.redundant_pic_cnt_present = br.read_flag()?;

    Ok(pps)
}
