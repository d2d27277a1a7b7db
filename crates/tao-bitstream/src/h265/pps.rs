//! H.265/HEVC PPS 解析器 (7.3.2.3.1, 不含 pps_extension).

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

use super::sps::skip_scaling_list_data;

/// PPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcPps {
    /// pps_pic_parameter_set_id
    pub pps_id: u32,
    /// pps_seq_parameter_set_id
    pub sps_id: u32,
    /// dependent_slice_segments_enabled_flag
    pub dependent_slice_segments_enabled_flag: bool,
    /// output_flag_present_flag
    pub output_flag_present_flag: bool,
    /// num_extra_slice_header_bits
    pub num_extra_slice_header_bits: u32,
    /// sign_data_hiding_enabled_flag
    pub sign_data_hiding_flag: bool,
    /// cabac_init_present_flag
    pub cabac_init_present_flag: bool,
    /// num_ref_idx_l0_default_active_minus1 + 1
    pub num_ref_idx_l0_default_active: u32,
    /// num_ref_idx_l1_default_active_minus1 + 1
    pub num_ref_idx_l1_default_active: u32,
    /// init_qp_minus26
    pub pic_init_qp_minus26: i32,
    /// constrained_intra_pred_flag
    pub constrained_intra_pred_flag: bool,
    /// transform_skip_enabled_flag
    pub transform_skip_enabled_flag: bool,
    /// cu_qp_delta_enabled_flag
    pub cu_qp_delta_enabled_flag: bool,
    /// diff_cu_qp_delta_depth
    pub diff_cu_qp_delta_depth: u32,
    /// pps_cb_qp_offset
    pub pic_cb_qp_offset: i32,
    /// pps_cr_qp_offset
    pub pic_cr_qp_offset: i32,
    /// pps_slice_chroma_qp_offsets_present_flag
    pub slice_chroma_qp_offsets_present_flag: bool,
    /// weighted_pred_flag
    pub weighted_pred_flag: bool,
    /// weighted_bipred_flag
    pub weighted_bipred_flag: bool,
    /// transquant_bypass_enabled_flag
    pub transquant_bypass_enable_flag: bool,
    /// tiles_enabled_flag
    pub tiles_enabled_flag: bool,
    /// entropy_coding_sync_enabled_flag
    pub entropy_coding_sync_enabled_flag: bool,
    /// num_tile_columns_minus1 + 1
    pub num_tile_columns: u32,
    /// num_tile_rows_minus1 + 1
    pub num_tile_rows: u32,
    /// uniform_spacing_flag
    pub uniform_spacing_flag: bool,
    /// column_width_minus1 + 1 (非均匀划分时)
    pub column_width: Vec<u32>,
    /// row_height_minus1 + 1 (非均匀划分时)
    pub row_height: Vec<u32>,
    /// loop_filter_across_tiles_enabled_flag
    pub loop_filter_across_tiles_enabled_flag: bool,
    /// pps_loop_filter_across_slices_enabled_flag
    pub loop_filter_across_slices_enabled_flag: bool,
    /// deblocking_filter_control_present_flag
    pub deblocking_filter_control_present_flag: bool,
    /// deblocking_filter_override_enabled_flag
    pub deblocking_filter_override_enabled_flag: bool,
    /// pps_deblocking_filter_disabled_flag
    pub pic_disable_deblocking_filter_flag: bool,
    /// pps_beta_offset_div2
    pub beta_offset_div2: i32,
    /// pps_tc_offset_div2
    pub tc_offset_div2: i32,
    /// pps_scaling_list_data_present_flag
    pub pic_scaling_list_data_present_flag: bool,
    /// lists_modification_present_flag
    pub lists_modification_present_flag: bool,
    /// log2_parallel_merge_level_minus2
    pub log2_parallel_merge_level_minus2: u32,
    /// slice_segment_header_extension_present_flag
    pub slice_segment_header_extension_present_flag: bool,
}

/// 从 RBSP 数据 (不含 2 字节 NAL 头) 解析 PPS
pub fn parse_pps(rbsp: &[u8]) -> TaoResult<HevcPps> {
    if rbsp.is_empty() {
        return Err(TaoError::InvalidData("HEVC: PPS RBSP 为空".into()));
    }
    let mut br = BitReader::new(rbsp);

    let pps_id = br.read_ue_max(63, "HEVC: pps_id")?;
    let sps_id = br.read_ue_max(15, "HEVC: pps.sps_id")?;
    let dependent_slice_segments_enabled_flag = br.read_flag()?;
    let output_flag_present_flag = br.read_flag()?;
    let num_extra_slice_header_bits = br.read_bits(3)?;
    let sign_data_hiding_flag = br.read_flag()?;
    let cabac_init_present_flag = br.read_flag()?;
    let num_ref_idx_l0_default_active =
        br.read_ue_max(14, "HEVC: num_ref_idx_l0_default_active_minus1")? + 1;
    let num_ref_idx_l1_default_active =
        br.read_ue_max(14, "HEVC: num_ref_idx_l1_default_active_minus1")? + 1;
    let pic_init_qp_minus26 = br.read_se()?;
    let constrained_intra_pred_flag = br.read_flag()?;
    let transform_skip_enabled_flag = br.read_flag()?;
    let cu_qp_delta_enabled_flag = br.read_flag()?;
    let diff_cu_qp_delta_depth = if cu_qp_delta_enabled_flag {
        br.read_ue()?
    } else {
        0
    };

    let mut pps = HevcPps {
        pps_id,
        sps_id,
        dependent_slice_segments_enabled_flag,
        output_flag_present_flag,
        num_extra_slice_header_bits,
        sign_data_hiding_flag,
        cabac_init_present_flag,
        num_ref_idx_l0_default_active,
        num_ref_idx_l1_default_active,
        pic_init_qp_minus26,
        constrained_intra_pred_flag,
        transform_skip_enabled_flag,
        cu_qp_delta_enabled_flag,
        diff_cu_qp_delta_depth,
        pic_cb_qp_offset: br.read_se()?,
        pic_cr_qp_offset: br.read_se()?,
        slice_chroma_qp_offsets_present_flag: br.read_flag()?,
        weighted_pred_flag: br.read_flag()?,
        weighted_bipred_flag: br.read_flag()?,
        transquant_bypass_enable_flag: br.read_flag()?,
        tiles_enabled_flag: br.read_flag()?,
        entropy_coding_sync_enabled_flag: br.read_flag()?,
        num_tile_columns: 1,
        num_tile_rows: 1,
        uniform_spacing_flag: true,
        column_width: Vec::new(),
        row_height: Vec::new(),
        loop_filter_across_tiles_enabled_flag: true,
        loop_filter_across_slices_enabled_flag: false,
        deblocking_filter_control_present_flag: false,
        deblocking_filter_override_enabled_flag: false,
        pic_disable_deblocking_filter_flag: false,
        beta_offset_div2: 0,
        tc_offset_div2: 0,
        pic_scaling_list_data_present_flag: false,
        lists_modification_present_flag: false,
        log2_parallel_merge_level_minus2: 0,
        slice_segment_header_extension_present_flag: false,
    };

    if pps.tiles_enabled_flag {
        pps.num_tile_columns = br.read_ue_max(19, "HEVC: num_tile_columns_minus1")? + 1;
        pps.num_tile_rows = br.read_ue_max(21, "HEVC: num_tile_rows_minus1")? + 1;
        pps.uniform_spacing_flag = br.read_flag()?;
        if !pps.uniform_spacing_flag {
            for _ in 1..pps.num_tile_columns {
                pps.column_width.push(br.read_ue()? + 1);
            }
            for _ in 1..pps.num_tile_rows {
                pps.row_height.push(br.read_ue()? + 1);
            }
        }
        pps.loop_filter_across_tiles_enabled_flag = br.read_flag()?;
    }

    pps.loop_filter_across_slices_enabled_flag = br.read_flag()?;
    pps.deblocking_filter_control_present_flag = br.read_flag()?;
    if pps.deblocking_filter_control_present_flag {
        pps.deblocking_filter_override_enabled_flag = br.read_flag()?;
        pps.pic_disable_deblocking_filter_flag = br.read_flag()?;
        if !pps.pic_disable_deblocking_filter_flag {
            pps.beta_offset_div2 = br.read_se()?;
            pps.tc_offset_div2 = br.read_se()?;
        }
    }

    pps.pic_scaling_list_data_present_flag = br.read_flag()?;
    if pps.pic_scaling_list_data_present_flag {
        skip_scaling_list_data(&mut br)?;
    }
    pps.lists_modification_present_flag = br.read_flag()?;
    pps.log2_parallel_merge_level_minus2 = br.read_ue()?;
    pps.slice_segment_header_extension_present_flag = br.read_flag()?;

    Ok(pps)
}
