//! HEVC/L-HEVC NAL 单元报告.

use tao_bitstream::h265::{HevcNalUnitType, HevcState};

use super::{NalClass, NalDumpContext, NalTableEntry, start_unit};
use crate::error::InspectError;
use crate::layered::decode_hevc_extractor;
use crate::report::UnitReport;
use crate::sei::scan_sei;

const NAL_VPS: u8 = 32;
const NAL_SPS: u8 = 33;
const NAL_PPS: u8 = 34;
const NAL_AUD: u8 = 35;

/// 查找 HEVC 解码表, 名称取自 NAL 类型表, 未收录的类型为 `UNKNOWN`
pub fn hevc_nal_entry(code: u8) -> NalTableEntry {
    let name = HevcNalUnitType::from_type_id(code).name();
    let (class, decode) = match code {
        0..=31 => (NalClass::Slice, true),
        NAL_VPS..=NAL_PPS => (NalClass::ParameterSet, true),
        NAL_AUD => (NalClass::Delimiter, true),
        36 | 37 => (NalClass::Delimiter, false),
        38 => (NalClass::Filler, false),
        39 | 40 => (NalClass::Sei, false),
        48 => (NalClass::Aggregator, false),
        49 => (NalClass::Extractor, true),
        _ => (NalClass::Unknown, true),
    };
    NalTableEntry::new(code, name.unwrap_or("UNKNOWN"), class, decode)
}

fn push_sps(unit: &mut UnitReport, state: &HevcState, id: u32, deterministic: bool) {
    unit.push("sps_id", id);
    if deterministic {
        return;
    }
    let Some(sps) = state.sps(id) else {
        return;
    };
    let vui = &sps.vui;
    unit.push("aspect_ratio_info_present_flag", vui.aspect_ratio_info_present_flag);
    unit.push("bit_depth_chroma", sps.bit_depth_chroma);
    unit.push("bit_depth_luma", sps.bit_depth_luma);
    unit.push("chroma_format_idc", sps.chroma_format_idc);
    unit.push("colour_description_present_flag", vui.colour_description_present_flag);
    unit.push("colour_primaries", vui.colour_primaries);
    unit.push("cw_flag", sps.cw_flag);
    if sps.cw_flag {
        unit.push("cw_bottom", sps.cw_bottom);
        unit.push("cw_top", sps.cw_top);
        unit.push("cw_left", sps.cw_left);
        unit.push("cw_right", sps.cw_right);
    }
    unit.push("height", sps.height);
    unit.push("width", sps.width);
    unit.push("log2_max_pic_order_cnt_lsb", sps.log2_max_pic_order_cnt_lsb);
    unit.push("long_term_ref_pics_present_flag", sps.long_term_ref_pics_present_flag);
    unit.push("matrix_coeffs", vui.matrix_coeffs);
    unit.push("max_CU_depth", sps.max_cu_depth);
    unit.push("max_CU_width", sps.max_cu_width);
    unit.push("max_CU_height", sps.max_cu_height);
    unit.push("num_long_term_ref_pic_sps", sps.num_long_term_ref_pic_sps());
    unit.push("num_short_term_ref_pic_sets", sps.num_short_term_ref_pic_sets());
    unit.push("has_timing_info", vui.has_timing_info);
    if vui.has_timing_info {
        unit.push("time_scale", vui.time_scale);
        unit.push("num_ticks_poc_diff_one_minus1", vui.num_ticks_poc_diff_one_minus1);
        unit.push("num_units_in_tick", vui.num_units_in_tick);
        unit.push("poc_proportional_to_timing_flag", vui.poc_proportional_to_timing_flag);
    }
    unit.push("rep_format_idx", sps.rep_format_idx);
    unit.push("sample_adaptive_offset_enabled_flag", sps.sample_adaptive_offset_enabled_flag);
    unit.push("sar_idc", vui.sar_idc);
    unit.push("separate_colour_plane_flag", sps.separate_colour_plane_flag);
    unit.push("temporal_mvp_enable_flag", sps.temporal_mvp_enable_flag);
    unit.push("transfer_characteristic", vui.transfer_characteristic);
    unit.push("video_full_range_flag", vui.video_full_range_flag);
    unit.push("sps_ext_or_max_sub_layers_minus1", sps.sps_ext_or_max_sub_layers_minus1);
    unit.push("max_sub_layers_minus1", sps.max_sub_layers_minus1);
    unit.push("update_rep_format_flag", sps.update_rep_format_flag);
    unit.push("sub_layer_ordering_info_present_flag", sps.sub_layer_ordering_info_present_flag);
    unit.push("scaling_list_enable_flag", sps.scaling_list_enable_flag);
    unit.push("infer_scaling_list_flag", sps.infer_scaling_list_flag);
    unit.push("scaling_list_ref_layer_id", sps.scaling_list_ref_layer_id);
    unit.push("scaling_list_data_present_flag", sps.scaling_list_data_present_flag);
    unit.push(
        "asymmetric_motion_partitions_enabled_flag",
        sps.asymmetric_motion_partitions_enabled_flag,
    );
    unit.push("pcm_enabled_flag", sps.pcm_enabled_flag);
    unit.push("strong_intra_smoothing_enable_flag", sps.strong_intra_smoothing_enable_flag);
    unit.push("vui_parameters_present_flag", sps.vui_parameters_present_flag);
    unit.push(
        "log2_diff_max_min_luma_coding_block_size",
        sps.log2_diff_max_min_luma_coding_block_size,
    );
    unit.push("log2_min_transform_block_size", sps.log2_min_transform_block_size);
    unit.push("log2_min_luma_coding_block_size", sps.log2_min_luma_coding_block_size);
    unit.push("log2_max_transform_block_size", sps.log2_max_transform_block_size);
    unit.push("max_transform_hierarchy_depth_inter", sps.max_transform_hierarchy_depth_inter);
    unit.push("max_transform_hierarchy_depth_intra", sps.max_transform_hierarchy_depth_intra);
    unit.push("pcm_sample_bit_depth_luma_minus1", sps.pcm_sample_bit_depth_luma_minus1);
    unit.push("pcm_sample_bit_depth_chroma_minus1", sps.pcm_sample_bit_depth_chroma_minus1);
    unit.push("pcm_loop_filter_disable_flag", sps.pcm_loop_filter_disable_flag);
    unit.push(
        "log2_min_pcm_luma_coding_block_size_minus3",
        sps.log2_min_pcm_luma_coding_block_size_minus3,
    );
    unit.push(
        "log2_diff_max_min_pcm_luma_coding_block_size",
        sps.log2_diff_max_min_pcm_luma_coding_block_size,
    );
    unit.push("overscan_info_present", vui.overscan_info_present);
    unit.push("overscan_appropriate", vui.overscan_appropriate);
    unit.push("video_signal_type_present_flag", vui.video_signal_type_present_flag);
    unit.push("video_format", vui.video_format);
    unit.push("chroma_loc_info_present_flag", vui.chroma_loc_info_present_flag);
    unit.push("chroma_sample_loc_type_top_field", vui.chroma_sample_loc_type_top_field);
    unit.push("chroma_sample_loc_type_bottom_field", vui.chroma_sample_loc_type_bottom_field);
    unit.push("neutral_chroma_indication_flag", vui.neutral_chroma_indication_flag);
    unit.push("field_seq_flag", vui.field_seq_flag);
    unit.push("frame_field_info_present_flag", vui.frame_field_info_present_flag);
    unit.push("default_display_window_flag", vui.default_display_window_flag);
    unit.push("left_offset", vui.left_offset);
    unit.push("right_offset", vui.right_offset);
    unit.push("top_offset", vui.top_offset);
    unit.push("bottom_offset", vui.bottom_offset);
    unit.push("hrd_parameters_present_flag", vui.hrd_parameters_present_flag);
}

/// 每个宽度后跟一个空格
fn tile_sizes(sizes: &[u32]) -> String {
    sizes.iter().map(|s| format!("{} ", s)).collect()
}

fn push_pps(unit: &mut UnitReport, state: &HevcState, id: u32, deterministic: bool) {
    unit.push("pps_id", id);
    if deterministic {
        return;
    }
    let Some(pps) = state.pps(id) else {
        return;
    };
    unit.push("cabac_init_present_flag", pps.cabac_init_present_flag);
    unit.push(
        "dependent_slice_segments_enabled_flag",
        pps.dependent_slice_segments_enabled_flag,
    );
    unit.push("entropy_coding_sync_enabled_flag", pps.entropy_coding_sync_enabled_flag);
    unit.push("lists_modification_present_flag", pps.lists_modification_present_flag);
    unit.push(
        "loop_filter_across_slices_enabled_flag",
        pps.loop_filter_across_slices_enabled_flag,
    );
    unit.push(
        "loop_filter_across_tiles_enabled_flag",
        pps.loop_filter_across_tiles_enabled_flag,
    );
    unit.push("num_extra_slice_header_bits", pps.num_extra_slice_header_bits);
    unit.push("num_ref_idx_l0_default_active", pps.num_ref_idx_l0_default_active);
    unit.push("num_ref_idx_l1_default_active", pps.num_ref_idx_l1_default_active);
    unit.push("tiles_enabled_flag", pps.tiles_enabled_flag);
    if pps.tiles_enabled_flag {
        unit.push("uniform_spacing_flag", pps.uniform_spacing_flag);
        if !pps.uniform_spacing_flag {
            unit.push("num_tile_columns", pps.num_tile_columns);
            unit.push("num_tile_rows", pps.num_tile_rows);
            unit.push("columns_width", tile_sizes(&pps.column_width));
            unit.push("rows_height", tile_sizes(&pps.row_height));
        }
    }
    unit.push("output_flag_present_flag", pps.output_flag_present_flag);
    unit.push("pic_init_qp_minus26", pps.pic_init_qp_minus26);
    unit.push(
        "slice_chroma_qp_offsets_present_flag",
        pps.slice_chroma_qp_offsets_present_flag,
    );
    unit.push(
        "slice_segment_header_extension_present_flag",
        pps.slice_segment_header_extension_present_flag,
    );
    unit.push("weighted_pred_flag", pps.weighted_pred_flag);
    unit.push("weighted_bipred_flag", pps.weighted_bipred_flag);
    unit.push("sign_data_hiding_flag", pps.sign_data_hiding_flag);
    unit.push("constrained_intra_pred_flag", pps.constrained_intra_pred_flag);
    unit.push("transform_skip_enabled_flag", pps.transform_skip_enabled_flag);
    unit.push("cu_qp_delta_enabled_flag", pps.cu_qp_delta_enabled_flag);
    if pps.cu_qp_delta_enabled_flag {
        unit.push("diff_cu_qp_delta_depth", pps.diff_cu_qp_delta_depth);
    }
    unit.push("transquant_bypass_enable_flag", pps.transquant_bypass_enable_flag);
    unit.push("pic_cb_qp_offset", pps.pic_cb_qp_offset);
    unit.push("pic_cr_qp_offset", pps.pic_cr_qp_offset);
    unit.push(
        "deblocking_filter_control_present_flag",
        pps.deblocking_filter_control_present_flag,
    );
    if pps.deblocking_filter_control_present_flag {
        unit.push(
            "deblocking_filter_override_enabled_flag",
            pps.deblocking_filter_override_enabled_flag,
        );
        unit.push(
            "pic_disable_deblocking_filter_flag",
            pps.pic_disable_deblocking_filter_flag,
        );
        unit.push("beta_offset_div2", pps.beta_offset_div2);
        unit.push("tc_offset_div2", pps.tc_offset_div2);
    }
    unit.push("pic_scaling_list_data_present_flag", pps.pic_scaling_list_data_present_flag);
    unit.push("log2_parallel_merge_level_minus2", pps.log2_parallel_merge_level_minus2);
}

fn push_slice_context(unit: &mut UnitReport, state: &HevcState, deterministic: bool) {
    let info = state.slice_info();
    unit.push("slice", info.slice_type.map_or("Unknown", |t| t.label()));
    unit.push("poc", info.poc);
    unit.push("first_slice_in_pic", info.first_slice_segment_in_pic_flag);
    unit.push("dependent_slice_segment", info.dependent_slice_segment_flag);
    if deterministic {
        return;
    }
    unit.push("slice_qp_delta", info.slice_qp_delta);
    unit.push("slice_segment_address", info.slice_segment_address);
    if let Some(t) = info.slice_type {
        unit.push("slice_type", t.raw());
    }
}

fn parse_failure(unit: &mut UnitReport, id_field: &'static str, err: impl std::fmt::Display) {
    unit.push(id_field, "PARSING FAILURE");
    unit.diagnose(InspectError::DecodePrimitiveFailure(err.to_string()));
}

/// 报告一个 HEVC NAL 单元 (含 2 字节 NAL 头)
///
/// 单元长度为 0 或 1 时只报告错误. 除提取器损坏外, 每个单元都报告 layer_id 与 temporal_id.
pub fn inspect_hevc_nal(nal: &[u8], state: &mut HevcState, ctx: &NalDumpContext) -> UnitReport {
    let mut unit = match start_unit(nal, ctx) {
        Ok(u) => u,
        Err(u) => return u,
    };
    let &[b0, b1, ..] = nal else {
        unit.diagnose(InspectError::ZeroOrInvalidSize(nal.len()));
        return unit;
    };
    let code = (b0 >> 1) & 0x3F;
    let layer_id = ((b0 & 1) << 5) | (b1 >> 3);
    let temporal_id = (b1 & 0x07).saturating_sub(1);
    let entry = hevc_nal_entry(code);
    unit = unit.with_code(u32::from(code));

    // 解析原语返回值: 新图像首个切片段为 1, 其他成功为 0, 失败为 -1
    let mut ret = 0;
    match code {
        NAL_VPS => match state.read_vps(nal) {
            Ok(id) => unit.push("vps_id", id),
            Err(e) => parse_failure(&mut unit, "vps_id", e),
        },
        NAL_SPS => match state.read_sps(nal) {
            Ok(id) => push_sps(&mut unit, state, id, ctx.deterministic),
            Err(e) => parse_failure(&mut unit, "sps_id", e),
        },
        NAL_PPS => match state.read_pps(nal) {
            Ok(id) => push_pps(&mut unit, state, id, ctx.deterministic),
            Err(e) => parse_failure(&mut unit, "pps_id", e),
        },
        _ => match state.parse_nalu(nal) {
            Ok(first) => ret = i32::from(first),
            Err(e) => {
                ret = -1;
                unit.diagnose(InspectError::DecodePrimitiveFailure(e.to_string()));
            }
        },
    }

    unit.name = Some(match entry.class {
        NalClass::Unknown => format!("UNKNOWN (parsing return {})", ret),
        _ => entry.name.to_string(),
    });

    match entry.class {
        NalClass::Delimiter if code == NAL_AUD => match nal.get(2) {
            Some(b) => unit.push("primary_pic_type", b >> 5),
            None => unit.diagnose(InspectError::truncated("AU Delimiter", 3, 2)),
        },
        NalClass::Extractor => {
            let scan = decode_hevc_extractor(nal, ctx.length_size);
            unit.children.extend(scan.records.iter().map(|r| r.to_unit()));
            if let Some(e) = scan.error {
                unit.diagnose(e);
                return unit;
            }
        }
        NalClass::Sei => {
            let scan = scan_sei(nal, 2, ctx.sei_boundary);
            unit.children.extend(scan.to_units());
            if let Some(e) = scan.error {
                unit.diagnose(e);
            }
        }
        _ => {}
    }

    if code < NAL_VPS {
        push_slice_context(&mut unit, state, ctx.deterministic);
    }
    unit.push("layer_id", layer_id);
    unit.push("temporal_id", temporal_id);
    unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::InspectOptions;
    use crate::report::FieldValue;
    use crate::testutil::{hevc_nal, hevc_pps, hevc_slice, hevc_sps, hevc_vps};
    use tao_bitstream::h265::nal::build_nal_header;

    fn ctx() -> NalDumpContext {
        NalDumpContext::new(&InspectOptions::default(), 4)
    }

    fn text(unit: &UnitReport, name: &str) -> String {
        unit.field(name).map(ToString::to_string).unwrap_or_default()
    }

    #[test]
    fn test_hevc_table_lookup() {
        assert_eq!(hevc_nal_entry(19).name, "IDR slice (W DLP)");
        assert_eq!(hevc_nal_entry(19).class, NalClass::Slice);
        assert_eq!(hevc_nal_entry(33).class, NalClass::ParameterSet);
        assert_eq!(hevc_nal_entry(40).class, NalClass::Sei);
        assert_eq!(hevc_nal_entry(49).class, NalClass::Extractor);
        assert_eq!(hevc_nal_entry(41).class, NalClass::Unknown);
        assert_eq!(hevc_nal_entry(12).class, NalClass::Slice, "保留 VCL 类型仍按切片处理");
    }

    #[test]
    fn test_parameter_sets_and_slices() {
        let mut state = HevcState::new();
        let c = ctx();

        let vps = inspect_hevc_nal(&hevc_vps(), &mut state, &c);
        assert_eq!(vps.name.as_deref(), Some("Video Parameter Set"));
        assert_eq!(vps.field("vps_id"), Some(&FieldValue::UInt(0)));
        assert_eq!(vps.field("layer_id"), Some(&FieldValue::UInt(0)));

        let sps = inspect_hevc_nal(&hevc_sps(), &mut state, &c);
        assert_eq!(sps.code, Some(33));
        assert_eq!(text(&sps, "width"), "1920");
        assert_eq!(text(&sps, "height"), "1080");
        assert_eq!(text(&sps, "cw_flag"), "1");
        assert_eq!(text(&sps, "num_short_term_ref_pic_sets"), "1");

        let pps = inspect_hevc_nal(&hevc_pps(None), &mut state, &c);
        assert_eq!(text(&pps, "pps_id"), "0");
        assert_eq!(text(&pps, "num_ref_idx_l0_default_active"), "2");
        assert!(pps.field("uniform_spacing_flag").is_none());

        let idr = inspect_hevc_nal(&hevc_slice(19, 0, 3), &mut state, &c);
        assert!(idr.is_clean(), "{:?}", idr.diagnostics);
        assert_eq!(idr.name.as_deref(), Some("IDR slice (W DLP)"));
        assert_eq!(text(&idr, "slice"), "I");
        assert_eq!(idr.field("poc"), Some(&FieldValue::Int(0)));
        assert_eq!(text(&idr, "first_slice_in_pic"), "1");
        assert_eq!(text(&idr, "slice_qp_delta"), "3");
        assert_eq!(text(&idr, "slice_type"), "2");
        assert!(idr.field("redundant_pic_cnt").is_none(), "HEVC 切片头没有 redundant_pic_cnt");

        let trail = inspect_hevc_nal(&hevc_slice(1, 5, -2), &mut state, &c);
        assert_eq!(text(&trail, "slice"), "P");
        assert_eq!(trail.field("poc"), Some(&FieldValue::Int(5)));
        let names: Vec<_> = trail.fields.iter().map(|f| f.name).collect();
        assert_eq!(&names[names.len() - 2..], ["layer_id", "temporal_id"]);
    }

    #[test]
    fn test_deterministic_mode() {
        let mut state = HevcState::new();
        let opts = InspectOptions {
            deterministic: true,
            ..Default::default()
        };
        let c = NalDumpContext::new(&opts, 4);
        inspect_hevc_nal(&hevc_vps(), &mut state, &c);
        let sps = inspect_hevc_nal(&hevc_sps(), &mut state, &c);
        let names: Vec<_> = sps.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, ["sps_id", "layer_id", "temporal_id"]);
        inspect_hevc_nal(&hevc_pps(None), &mut state, &c);
        let idr = inspect_hevc_nal(&hevc_slice(19, 0, 3), &mut state, &c);
        assert!(idr.field("slice_qp_delta").is_none());
        assert!(idr.field("dependent_slice_segment").is_some());
    }

    #[test]
    fn test_non_uniform_tiles() {
        let mut state = HevcState::new();
        let pps = inspect_hevc_nal(&hevc_pps(Some((vec![2, 3], vec![4]))), &mut state, &ctx());
        assert_eq!(text(&pps, "tiles_enabled_flag"), "1");
        assert_eq!(text(&pps, "uniform_spacing_flag"), "0");
        assert_eq!(text(&pps, "num_tile_columns"), "3");
        assert_eq!(text(&pps, "num_tile_rows"), "2");
        assert_eq!(text(&pps, "columns_width"), "2 3 ");
        assert_eq!(text(&pps, "rows_height"), "4 ");
    }

    #[test]
    fn test_invalid_sizes_and_unknown() {
        let mut state = HevcState::new();
        let opts = InspectOptions {
            dump_crc: true,
            ..Default::default()
        };
        let c = NalDumpContext::new(&opts, 4);
        let one = inspect_hevc_nal(&[0x40], &mut state, &c);
        assert_eq!(one.diagnostics[0].to_string(), "invalid nal size 1");
        assert!(one.field("crc").is_some(), "长度为 1 时仍先计算 CRC");
        let zero = inspect_hevc_nal(&[], &mut state, &c);
        assert_eq!(zero.diagnostics[0].to_string(), "invalid nal size 0");

        let unknown = inspect_hevc_nal(&hevc_nal(41, &[0xAB]), &mut state, &ctx());
        assert_eq!(unknown.name.as_deref(), Some("UNKNOWN (parsing return 0)"));
        assert_eq!(unknown.code, Some(41));
        assert!(unknown.field("temporal_id").is_some());
    }

    #[test]
    fn test_slice_without_parameter_sets() {
        let mut state = HevcState::new();
        let unit = inspect_hevc_nal(&hevc_slice(1, 5, 0), &mut state, &ctx());
        assert_eq!(unit.diagnostics.len(), 1);
        assert_eq!(text(&unit, "slice"), "Unknown", "尚无切片上下文");
    }

    #[test]
    fn test_extractor_and_sei() {
        let mut state = HevcState::new();
        let mut body = vec![1u8, 2, 0xAA, 0xBB, 0, 2, (-5i8) as u8];
        body.extend_from_slice(&1000u32.to_be_bytes());
        body.extend_from_slice(&2000u32.to_be_bytes());
        let unit = inspect_hevc_nal(&hevc_nal(49, &body), &mut state, &ctx());
        assert_eq!(unit.name.as_deref(), Some("HEVCExtractor"));
        assert_eq!(unit.children.len(), 2);
        assert_eq!(unit.children[0].field("inband_size"), Some(&FieldValue::UInt(2)));
        assert_eq!(unit.children[1].field("data_size"), Some(&FieldValue::UInt(2000)));

        let corrupt = inspect_hevc_nal(&hevc_nal(49, &[1, 5, 0xAA]), &mut state, &ctx());
        assert_eq!(
            corrupt.diagnostics[0].to_string(),
            "invalid inband data extractor size: 5 vs 2 remaining"
        );
        assert!(corrupt.field("layer_id").is_none(), "损坏的提取器中止本单元报告");

        let mut sei = build_nal_header(39, 0, 0).to_vec();
        sei.extend_from_slice(&[0x05, 0x01, 0xAA, 0x80]);
        let unit = inspect_hevc_nal(&sei, &mut state, &ctx());
        assert_eq!(unit.name.as_deref(), Some("SEI Prefix"));
        assert_eq!(unit.children.len(), 1);
        assert_eq!(unit.children[0].field("size"), Some(&FieldValue::UInt(1)));
    }

    #[test]
    fn test_layer_and_temporal_ids() {
        let mut state = HevcState::new();
        let mut nal = build_nal_header(38, 3, 2).to_vec();
        nal.push(0xFF);
        let unit = inspect_hevc_nal(&nal, &mut state, &ctx());
        assert_eq!(unit.name.as_deref(), Some("Filler Data"));
        assert_eq!(unit.field("layer_id"), Some(&FieldValue::UInt(3)));
        assert_eq!(unit.field("temporal_id"), Some(&FieldValue::UInt(2)));
    }
}
