//! AVC/SVC/MVC NAL 单元报告.

use tao_bitstream::h264::nal::*;
use tao_bitstream::h264::{AvcState, NalHeader, SUBSET_SPS_ID_SHIFT, SliceInfo};

use super::{NalClass, NalDumpContext, NalTableEntry, start_unit};
use crate::error::InspectError;
use crate::layered::decode_avc_extractor;
use crate::report::UnitReport;
use crate::sei::scan_sei;

const AVC_NAL_TABLE: &[NalTableEntry] = &[
    NalTableEntry::new(NAL_SLICE, "Non IDR slice", NalClass::Slice, true),
    NalTableEntry::new(NAL_DP_A, "DP Type A slice", NalClass::Slice, false),
    NalTableEntry::new(NAL_DP_B, "DP Type B slice", NalClass::Slice, false),
    NalTableEntry::new(NAL_DP_C, "DP Type C slice", NalClass::Slice, false),
    NalTableEntry::new(NAL_IDR_SLICE, "IDR slice", NalClass::Slice, true),
    NalTableEntry::new(NAL_SEI, "SEI Message", NalClass::Sei, false),
    NalTableEntry::new(NAL_SPS, "SequenceParameterSet", NalClass::ParameterSet, true),
    NalTableEntry::new(NAL_PPS, "PictureParameterSet", NalClass::ParameterSet, true),
    NalTableEntry::new(NAL_AUD, "AccessUnit delimiter", NalClass::Delimiter, true),
    NalTableEntry::new(NAL_END_OF_SEQ, "EndOfSequence", NalClass::Delimiter, false),
    NalTableEntry::new(NAL_END_OF_STREAM, "EndOfStream", NalClass::Delimiter, false),
    NalTableEntry::new(NAL_FILLER, "Filler data", NalClass::Filler, false),
    NalTableEntry::new(NAL_SPS_EXT, "SequenceParameterSetExtension", NalClass::ParameterSet, false),
    NalTableEntry::new(NAL_SVC_PREFIX, "SVCPrefix", NalClass::Delimiter, false),
    NalTableEntry::new(NAL_SUBSET_SPS, "SVCSubsequenceParameterSet", NalClass::ParameterSet, true),
    NalTableEntry::new(NAL_SLICE_AUX, "Auxiliary Slice", NalClass::Slice, false),
    NalTableEntry::new(NAL_SLICE_EXT, "CodedSliceExtension", NalClass::Slice, true),
    NalTableEntry::new(NAL_SVC_AGGREGATOR, "SVCAggregator", NalClass::Aggregator, false),
    NalTableEntry::new(NAL_SVC_EXTRACTOR, "SVCExtractor", NalClass::Extractor, true),
];

/// 查找 AVC 解码表, 未收录的类型返回 `UNKNOWN`
pub fn avc_nal_entry(code: u8) -> NalTableEntry {
    AVC_NAL_TABLE
        .iter()
        .find(|e| e.code == code)
        .copied()
        .unwrap_or(NalTableEntry::new(code, "UNKNOWN", NalClass::Unknown, false))
}

/// 切片解析结果
enum SliceOutcome {
    NotParsed,
    Parsed(SliceInfo),
    Failed,
}

fn push_sps(unit: &mut UnitReport, state: &AvcState, idx: u32, deterministic: bool) {
    unit.push("sps_id", idx);
    let Some(sps) = state.sps(idx) else {
        return;
    };
    unit.push("frame_mbs_only_flag", sps.frame_mbs_only_flag);
    unit.push("mb_adaptive_frame_field_flag", sps.mb_adaptive_frame_field_flag);
    unit.push("vui_parameters_present_flag", sps.vui_parameters_present_flag);
    unit.push("max_num_ref_frames", sps.max_num_ref_frames);
    unit.push("gaps_in_frame_num_value_allowed_flag", sps.gaps_in_frame_num_value_allowed_flag);
    unit.push("chroma_format_idc", sps.chroma_format_idc);
    unit.push("bit_depth_luma_minus8", sps.bit_depth_luma_minus8);
    unit.push("bit_depth_chroma_minus8", sps.bit_depth_chroma_minus8);
    unit.push("width", sps.width);
    unit.push("height", sps.height);
    unit.push("crop_top", sps.crop_top);
    unit.push("crop_left", sps.crop_left);
    unit.push("crop_bottom", sps.crop_bottom);
    unit.push("crop_right", sps.crop_right);
    if sps.vui_parameters_present_flag {
        let vui = &sps.vui;
        unit.push("vui_video_full_range_flag", vui.video_full_range_flag);
        unit.push("vui_video_signal_type_present_flag", vui.video_signal_type_present_flag);
        unit.push("vui_aspect_ratio_info_present_flag", vui.aspect_ratio_info_present_flag);
        unit.push("vui_aspect_ratio_num", vui.par_num);
        unit.push("vui_aspect_ratio_den", vui.par_den);
        unit.push("vui_overscan_info_present_flag", vui.overscan_info_present_flag);
        unit.push("vui_colour_description_present_flag", vui.colour_description_present_flag);
        unit.push("vui_colour_primaries", vui.colour_primaries);
        unit.push("vui_transfer_characteristics", vui.transfer_characteristics);
        unit.push("vui_matrix_coefficients", vui.matrix_coefficients);
        unit.push("vui_low_delay_hrd_flag", vui.low_delay_hrd_flag);
    }
    if deterministic {
        return;
    }
    unit.push("log2_max_poc_lsb", sps.log2_max_poc_lsb);
    unit.push("log2_max_frame_num", sps.log2_max_frame_num);
    unit.push("delta_pic_order_always_zero_flag", sps.delta_pic_order_always_zero_flag);
    unit.push("offset_for_non_ref_pic", sps.offset_for_non_ref_pic);
}

fn push_pps(unit: &mut UnitReport, state: &AvcState, id: u32, deterministic: bool) {
    unit.push("pps_id", id);
    let Some(pps) = state.pps(id) else {
        return;
    };
    unit.push("sps_id", pps.sps_id);
    unit.push("entropy_coding_mode_flag", pps.entropy_coding_mode_flag);
    if deterministic {
        return;
    }
    unit.push("deblocking_filter_control_present_flag", pps.deblocking_filter_control_present_flag);
    unit.push("mb_slice_group_map_type", pps.mb_slice_group_map_type);
    unit.push("num_ref_idx_l0_default_active_minus1", pps.num_ref_idx_l0_default_active_minus1);
    unit.push("num_ref_idx_l1_default_active_minus1", pps.num_ref_idx_l1_default_active_minus1);
    unit.push("pic_order_present", pps.pic_order_present);
    unit.push("pic_size_in_map_units_minus1", pps.pic_size_in_map_units_minus1);
    unit.push("redundant_pic_cnt_present", pps.redundant_pic_cnt_present);
    unit.push("slice_group_change_rate_minus1", pps.slice_group_change_rate_minus1);
    unit.push("slice_group_count", pps.slice_group_count);
    unit.push("weighted_pred_flag", pps.weighted_pred_flag);
    unit.push("weighted_bipred_idc", pps.weighted_bipred_idc);
}

fn parse_failure(unit: &mut UnitReport, id_field: &'static str, err: impl std::fmt::Display) {
    unit.push(id_field, "PARSING FAILURE");
    unit.diagnose(InspectError::DecodePrimitiveFailure(err.to_string()));
}

/// 报告一个 AVC NAL 单元 (含 NAL 头)
pub fn inspect_avc_nal(nal: &[u8], state: &mut AvcState, ctx: &NalDumpContext) -> UnitReport {
    let mut unit = match start_unit(nal, ctx) {
        Ok(u) => u,
        Err(u) => return u,
    };
    let hdr = match NalHeader::parse(nal) {
        Ok(h) => h,
        Err(e) => {
            unit.diagnose(e.into());
            return unit;
        }
    };
    let entry = avc_nal_entry(hdr.nal_type);
    let name = if hdr.nal_type == NAL_SLICE_EXT && ctx.is_svc {
        "SVCSlice"
    } else {
        entry.name
    };
    unit = unit.with_code(u32::from(entry.code)).with_name(name);

    let mut slice = SliceOutcome::NotParsed;
    if entry.decode && !ctx.encrypted {
        match hdr.nal_type {
            NAL_SLICE | NAL_IDR_SLICE => {
                slice = match state.parse_slice(nal) {
                    Ok(info) => SliceOutcome::Parsed(info),
                    Err(_) => SliceOutcome::Failed,
                };
            }
            NAL_SPS => match state.read_sps(nal, false) {
                Ok(idx) => push_sps(&mut unit, state, idx, ctx.deterministic),
                Err(e) => parse_failure(&mut unit, "sps_id", e),
            },
            NAL_PPS => match state.read_pps(nal) {
                Ok(id) => push_pps(&mut unit, state, id, ctx.deterministic),
                Err(e) => parse_failure(&mut unit, "pps_id", e),
            },
            NAL_AUD => match nal.get(1) {
                Some(b) => unit.push("primary_pic_type", b >> 5),
                None => unit.diagnose(InspectError::truncated("AccessUnit delimiter", 2, 1)),
            },
            NAL_SUBSET_SPS => match state.read_sps(nal, true) {
                Ok(idx) => unit.push("sps_id", idx - SUBSET_SPS_ID_SHIFT),
                Err(e) => parse_failure(&mut unit, "sps_id", e),
            },
            NAL_SLICE_EXT => {
                let parsed = state.parse_slice(nal);
                match (nal.get(2), nal.get(3)) {
                    (Some(&b2), Some(&b3)) => {
                        unit.push("dependency_id", (b2 & 0x70) >> 4);
                        unit.push("quality_id", b2 & 0x0F);
                        unit.push("temporal_id", (b3 & 0xE0) >> 5);
                    }
                    _ => unit.diagnose(InspectError::truncated(
                        "NALU header extension",
                        4,
                        nal.len() as u64,
                    )),
                }
                unit.push("poc", state.slice_info().poc);
                if let Err(e) = parsed {
                    unit.diagnose(InspectError::DecodePrimitiveFailure(e.to_string()));
                }
            }
            NAL_SVC_EXTRACTOR => {
                let scan = decode_avc_extractor(nal, ctx.length_size);
                unit.children.extend(scan.records.iter().map(|r| r.to_unit()));
                if let Some(e) = scan.error {
                    unit.diagnose(e);
                }
            }
            _ => {}
        }
    }

    if hdr.ref_idc != 0 {
        unit.push("nal_ref_idc", hdr.ref_idc);
    }
    if let SliceOutcome::Parsed(info) = slice {
        unit.push("poc", info.poc);
        unit.push("pps_id", info.pps_id);
        unit.push("field_pic_flag", info.field_pic_flag);
    }

    if entry.class == NalClass::Sei && !ctx.encrypted {
        let scan = scan_sei(nal, 1, ctx.sei_boundary);
        unit.children.extend(scan.to_units());
        if let Some(e) = scan.error {
            unit.diagnose(e);
        }
    }

    if let SliceOutcome::Failed = slice {
        unit.push("status", "error decoding slice");
        unit.diagnose(InspectError::DecodePrimitiveFailure("error decoding slice".into()));
    }
    unit
}
