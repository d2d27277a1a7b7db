//! 测试码流构造.
//!
//! 单元测试用 `BitWriter` 构造最小但语法完整的参数集、切片、OBU 与起始码对象.

use tao_bitstream::av1::{ObuType, build_obu};
use tao_bitstream::h265::nal::build_nal_header;
use tao_core::bitwriter::BitWriter;

/// 按宽度 `width` 为每个负载添加大端长度前缀并拼接
pub(crate) fn prefixed(units: &[Vec<u8>], width: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for unit in units {
        let len = unit.len() as u64;
        for i in (0..width).rev() {
            out.push((len >> (8 * i)) as u8);
        }
        out.extend_from_slice(unit);
    }
    out
}

/// 插入 emulation prevention 字节, 解析端移除后恢复原 RBSP
fn escape_rbsp(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + 4);
    let mut zeros = 0usize;
    for &b in rbsp {
        if zeros >= 2 && b <= 3 {
            out.push(3);
            zeros = 0;
        }
        zeros = if b == 0 { zeros + 1 } else { 0 };
        out.push(b);
    }
    out
}

fn with_header(header: &[u8], rbsp: &[u8]) -> Vec<u8> {
    let mut nal = header.to_vec();
    nal.extend(escape_rbsp(rbsp));
    nal
}

// ============================================================
// AVC
// ============================================================

/// Baseline SPS (sps_id 0, 120x68 宏块, 底部裁剪 8 行 -> 1920x1080)
///
/// `vui` 为真时附带宽高比 4:3、色彩描述、时序与 NAL HRD.
pub(crate) fn avc_sps(vui: bool) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(66, 8);
    bw.write_bits(0, 8);
    bw.write_bits(40, 8);
    bw.write_ue(0); // sps_id
    bw.write_ue(0); // log2_max_frame_num_minus4
    bw.write_ue(0); // pic_order_cnt_type
    bw.write_ue(2);
    bw.write_ue(4); // max_num_ref_frames
    bw.write_bit(0);
    bw.write_ue(119);
    bw.write_ue(67);
    bw.write_bit(1); // frame_mbs_only_flag
    bw.write_bit(1);
    bw.write_bit(1); // frame_cropping_flag
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(4);
    bw.write_flag(vui);
    if vui {
        bw.write_bit(1);
        bw.write_bits(255, 8); // Extended_SAR
        bw.write_bits(4, 16);
        bw.write_bits(3, 16);
        bw.write_bit(0);
        bw.write_bit(1); // video_signal_type_present_flag
        bw.write_bits(5, 3);
        bw.write_bit(1);
        bw.write_bit(1);
        bw.write_bits(1, 8);
        bw.write_bits(1, 8);
        bw.write_bits(1, 8);
        bw.write_bit(0);
        bw.write_bit(1); // timing_info_present_flag
        bw.write_bits(1001, 32);
        bw.write_bits(60000, 32);
        bw.write_bit(1);
        bw.write_bit(1); // nal_hrd_parameters_present_flag
        bw.write_ue(0);
        bw.write_bits(0, 4);
        bw.write_bits(0, 4);
        bw.write_ue(1000);
        bw.write_ue(1000);
        bw.write_bit(0);
        bw.write_bits(0, 20);
        bw.write_bit(0);
        bw.write_bit(1); // low_delay_hrd_flag
        bw.write_bit(0);
        bw.write_bit(0);
    }
    bw.write_trailing_bits();
    with_header(&[0x67], &bw.finish())
}

/// PPS 0 -> SPS 0, CAVLC
pub(crate) fn avc_pps() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_bit(0); // entropy_coding_mode_flag
    bw.write_bit(0);
    bw.write_ue(0); // num_slice_groups_minus1
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_bit(1); // weighted_pred_flag
    bw.write_bits(2, 2);
    bw.write_se(-3);
    bw.write_se(0);
    bw.write_se(0);
    bw.write_bit(1); // deblocking_filter_control_present_flag
    bw.write_bit(0);
    bw.write_bit(1);
    bw.write_trailing_bits();
    with_header(&[0x68], &bw.finish())
}

/// IDR I 切片 (frame_num 0, poc_lsb 0)
pub(crate) fn avc_idr_slice() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0); // first_mb_in_slice
    bw.write_ue(7);
    bw.write_ue(0);
    bw.write_bits(0, 4); // frame_num
    bw.write_ue(0); // idr_pic_id
    bw.write_bits(0, 6);
    bw.write_ue(0);
    bw.write_bits(0xFF, 8);
    with_header(&[0x65], &bw.finish())
}

// ============================================================
// HEVC
// ============================================================

/// 任意类型的 HEVC NAL (层 0, 时域 0)
pub(crate) fn hevc_nal(nal_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut nal = build_nal_header(nal_type, 0, 0).to_vec();
    nal.extend_from_slice(payload);
    nal
}

/// Main profile, level 93
fn write_ptl(bw: &mut BitWriter) {
    bw.write_bits(0, 2);
    bw.write_bit(0);
    bw.write_bits(1, 5);
    bw.write_bits(0x6000_0000, 32);
    bw.write_bits(0x9000, 16);
    bw.write_bits(0, 32);
    bw.write_bits(93, 8);
}

/// VPS 0, 单子层
pub(crate) fn hevc_vps() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 4);
    bw.write_bits(3, 2);
    bw.write_bits(0, 6);
    bw.write_bits(0, 3);
    bw.write_bit(1);
    bw.write_bits(0xFFFF, 16);
    write_ptl(&mut bw);
    bw.write_bit(0);
    bw.write_ue(4);
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_bits(0, 6);
    bw.write_ue(0);
    bw.write_bit(1); // vps_timing_info_present_flag
    bw.write_bits(1, 32);
    bw.write_bits(25, 32);
    bw.write_bit(0);
    bw.write_ue(0);
    bw.write_bit(0);
    bw.write_trailing_bits();
    with_header(&build_nal_header(32, 0, 0), &bw.finish())
}

/// SPS 0: 1920x1080 (一致性窗口底部 4), 10 位, 一个短期参考集
pub(crate) fn hevc_sps() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 4);
    bw.write_bits(0, 3);
    bw.write_bit(1);
    write_ptl(&mut bw);
    bw.write_ue(0); // sps_id
    bw.write_ue(1); // chroma_format_idc
    bw.write_ue(1920);
    bw.write_ue(1080);
    bw.write_bit(1); // conformance_window_flag
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(4);
    bw.write_ue(2);
    bw.write_ue(2);
    bw.write_ue(4); // log2_max_pic_order_cnt_lsb_minus4
    bw.write_bit(1);
    bw.write_ue(4);
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(3);
    bw.write_ue(0);
    bw.write_ue(3);
    bw.write_ue(1);
    bw.write_ue(1);
    bw.write_bit(0); // scaling_list_enabled_flag
    bw.write_bit(1);
    bw.write_bit(1); // sample_adaptive_offset_enabled_flag
    bw.write_bit(0);
    bw.write_ue(1); // num_short_term_ref_pic_sets
    bw.write_ue(1);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_bit(1);
    bw.write_bit(0); // long_term_ref_pics_present_flag
    bw.write_bit(1);
    bw.write_bit(1);
    bw.write_bit(0); // vui_parameters_present_flag
    bw.write_bit(0);
    bw.write_trailing_bits();
    with_header(&build_nal_header(33, 0, 0), &bw.finish())
}

/// PPS 0 -> SPS 0; `tiles` 为非均匀 tile 的列宽与行高 (CTB 数)
pub(crate) fn hevc_pps(tiles: Option<(Vec<u32>, Vec<u32>)>) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_bit(0); // dependent_slice_segments_enabled_flag
    bw.write_bit(0);
    bw.write_bits(0, 3);
    bw.write_bit(1);
    bw.write_bit(0);
    bw.write_ue(1); // num_ref_idx_l0_default_active_minus1
    bw.write_ue(0);
    bw.write_se(4);
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_bit(1); // cu_qp_delta_enabled_flag
    bw.write_ue(1);
    bw.write_se(-2);
    bw.write_se(3);
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_flag(tiles.is_some());
    bw.write_bit(0);
    if let Some((cols, rows)) = &tiles {
        bw.write_ue(cols.len() as u32);
        bw.write_ue(rows.len() as u32);
        bw.write_bit(0); // uniform_spacing_flag
        for c in cols {
            bw.write_ue(c - 1);
        }
        for r in rows {
            bw.write_ue(r - 1);
        }
        bw.write_bit(0);
    }
    bw.write_bit(1);
    bw.write_bit(1); // deblocking_filter_control_present_flag
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_se(-1);
    bw.write_se(2);
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_ue(0);
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_trailing_bits();
    with_header(&build_nal_header(34, 0, 0), &bw.finish())
}

/// 首个切片段; IDR (19/20) 为 I 切片, 其他类型为引用 RPS 0 的 P 切片
pub(crate) fn hevc_slice(nal_type: u8, poc_lsb: u32, qp_delta: i32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bit(1); // first_slice_segment_in_pic_flag
    if (16..=23).contains(&nal_type) {
        bw.write_bit(0);
    }
    bw.write_ue(0);
    if nal_type == 19 || nal_type == 20 {
        bw.write_ue(2);
        bw.write_bit(1);
        bw.write_bit(1);
    } else {
        bw.write_ue(1);
        bw.write_bits(poc_lsb, 8);
        bw.write_bit(1); // short_term_ref_pic_set_sps_flag
        bw.write_bit(1);
        bw.write_bit(1);
        bw.write_bit(0);
        bw.write_bit(0);
        bw.write_ue(1);
        bw.write_ue(0);
    }
    bw.write_se(qp_delta);
    bw.write_trailing_bits();
    with_header(&build_nal_header(nal_type, 0, 0), &bw.finish())
}

// ============================================================
// AV1
// ============================================================

/// 时域分隔符 OBU
pub(crate) fn av1_temporal_delimiter() -> Vec<u8> {
    build_obu(ObuType::TemporalDelimiter, None, &[])
}

/// 序列头 OBU: profile 0, level 8, 1920x1080, 8 位 4:2:0
pub(crate) fn av1_sequence_obu() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 3);
    bw.write_bit(0); // still_picture
    bw.write_bit(0);
    bw.write_bit(0); // timing_info_present_flag
    bw.write_bit(0);
    bw.write_bits(0, 5);
    bw.write_bits(0, 12);
    bw.write_bits(8, 5); // seq_level_idx
    bw.write_bit(0);
    bw.write_bits(15, 4);
    bw.write_bits(15, 4);
    bw.write_bits(1919, 16);
    bw.write_bits(1079, 16);
    bw.write_bit(0); // frame_id_numbers_present_flag
    bw.write_bit(0);
    bw.write_bit(1);
    bw.write_bit(1);
    bw.write_bits(0, 4);
    bw.write_bit(1); // enable_order_hint
    bw.write_bit(1);
    bw.write_bit(1);
    bw.write_bit(1);
    bw.write_bit(1);
    bw.write_bits(6, 3); // order_hint_bits_minus_1
    bw.write_bit(0);
    bw.write_bit(1);
    bw.write_bit(1);
    bw.write_bit(0); // high_bitdepth
    bw.write_bit(0);
    bw.write_bit(0); // color_description_present_flag
    bw.write_bit(1);
    bw.write_bits(0, 2);
    bw.write_bit(0);
    bw.write_bit(0); // film_grain_params_present
    bw.write_bit(1);
    build_obu(ObuType::SequenceHeader, None, &bw.finish())
}

/// 单 tile 关键帧 OBU (帧头 + 32 字节 tile 数据)
pub(crate) fn av1_frame_obu() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bit(0); // show_existing_frame
    bw.write_bits(0, 2); // KEY_FRAME
    bw.write_bit(1); // show_frame
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_bit(0); // frame_size_override_flag
    bw.write_bits(0, 7); // order_hint
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_bit(1); // uniform_tile_spacing_flag
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_bits(100, 8); // base_q_idx
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_bit(0); // using_qmatrix
    bw.write_bit(0); // segmentation_enabled
    bw.write_bit(0); // delta_q_present
    bw.write_bits(10, 6);
    bw.write_bits(10, 6);
    bw.write_bits(0, 12);
    bw.write_bits(0, 3);
    bw.write_bit(0);
    bw.write_bits(0, 2);
    bw.write_bits(0, 2);
    bw.write_bits(0, 12);
    bw.write_bits(0, 6);
    bw.write_bit(1); // tx_mode_select
    bw.write_bit(0); // reduced_tx_set
    let mut payload = bw.finish();
    payload.extend_from_slice(&[0x11; 32]);
    build_obu(ObuType::Frame, None, &payload)
}

// ============================================================
// ProRes
// ============================================================

/// ProRes 帧头描述
#[derive(Clone)]
pub(crate) struct ProResSpec {
    pub chroma_format: u8,
    pub interlaced_mode: u8,
    pub aspect_ratio: u8,
    pub framerate_code: u8,
    pub color_primaries: u8,
    pub matrix_coefficients: u8,
    pub alpha_channel_type: u8,
    pub luma_matrix: Option<[u8; 64]>,
    pub chroma_matrix: Option<[u8; 64]>,
}

impl Default for ProResSpec {
    fn default() -> Self {
        Self {
            chroma_format: 2,
            interlaced_mode: 0,
            aspect_ratio: 0,
            framerate_code: 3,
            color_primaries: 1,
            matrix_coefficients: 1,
            alpha_channel_type: 0,
            luma_matrix: None,
            chroma_matrix: None,
        }
    }
}

/// 1920x1080 帧: icpf 帧头 + 16 字节填充
pub(crate) fn build_prores_frame(spec: &ProResSpec) -> Vec<u8> {
    let mut hdr = vec![0u8, 0];
    hdr.extend_from_slice(b"apl0");
    hdr.extend_from_slice(&1920u16.to_be_bytes());
    hdr.extend_from_slice(&1080u16.to_be_bytes());
    hdr.push((spec.chroma_format << 6) | (spec.interlaced_mode << 2));
    hdr.push((spec.aspect_ratio << 4) | spec.framerate_code);
    hdr.push(spec.color_primaries);
    hdr.push(1); // transfer_characteristic
    hdr.push(spec.matrix_coefficients);
    hdr.push(spec.alpha_channel_type);
    let flags = (u16::from(spec.luma_matrix.is_some()) << 1) | u16::from(spec.chroma_matrix.is_some());
    hdr.extend_from_slice(&flags.to_be_bytes());
    for m in [spec.luma_matrix, spec.chroma_matrix].into_iter().flatten() {
        hdr.extend_from_slice(&m);
    }

    let header_size = (hdr.len() + 2) as u16;
    let frame_size = (8 + usize::from(header_size) + 16) as u32;
    let mut out = frame_size.to_be_bytes().to_vec();
    out.extend_from_slice(b"icpf");
    out.extend_from_slice(&header_size.to_be_bytes());
    out.extend_from_slice(&hdr);
    out.extend_from_slice(&[0u8; 16]);
    out
}

// ============================================================
// MPEG 视频与音频
// ============================================================

fn with_start_code(code: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = vec![0, 0, 1, code];
    out.extend(payload);
    out
}

/// VOS + VOL: 矩形 352x288, 时钟 30000, 固定增量 1001
pub(crate) fn build_m4v_config() -> Vec<u8> {
    let mut out = with_start_code(0xB0, vec![0xF5]);
    let mut bw = BitWriter::new();
    bw.write_bit(1); // random_accessible_vol
    bw.write_bits(1, 8);
    bw.write_bit(0);
    bw.write_bits(1, 4); // aspect_ratio_info 1:1
    bw.write_bit(0);
    bw.write_bits(0, 2);
    bw.write_bit(1);
    bw.write_bits(30000, 16);
    bw.write_bit(1);
    bw.write_bit(1); // fixed_vop_rate
    bw.write_bits(1001, 15);
    bw.write_bit(1);
    bw.write_bits(352, 13);
    bw.write_bit(1);
    bw.write_bits(288, 13);
    bw.write_bit(1);
    out.extend(with_start_code(0x20, bw.finish()));
    out
}

/// VOP, 时间增量 15 位
pub(crate) fn build_vop(coding_type: u32, time_inc: u32, coded: bool) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(coding_type, 2);
    bw.write_bit(1);
    bw.write_bit(0);
    bw.write_bit(1);
    bw.write_bits(time_inc, 15);
    bw.write_bit(1);
    bw.write_flag(coded);
    with_start_code(0xB6, bw.finish())
}

/// MPEG-2 序列头 (720x576, 25 fps) + 序列扩展 + GOP + 图像头 + 一个切片
pub(crate) fn build_m2v_stream(coding_type: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(720, 12);
    bw.write_bits(576, 12);
    bw.write_bits(2, 4);
    bw.write_bits(3, 4);
    bw.write_bits(0, 32);
    let mut out = with_start_code(0xB3, bw.finish());

    let mut bw = BitWriter::new();
    bw.write_bits(1, 4);
    bw.write_bits(0x48, 8); // main@main
    bw.write_bits(0, 3);
    bw.write_bits(0, 4);
    bw.write_bits(0, 13);
    out.extend(with_start_code(0xB5, bw.finish()));
    out.extend(with_start_code(0xB8, vec![0; 4]));

    let mut bw = BitWriter::new();
    bw.write_bits(0, 10);
    bw.write_bits(coding_type, 3);
    bw.write_bits(0, 19);
    out.extend(with_start_code(0x00, bw.finish()));
    out.extend(with_start_code(0x01, vec![0x11; 8]));
    out
}

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, 立体声
pub(crate) const MP3_HEADER: u32 = 0xFFFB_9000;

/// 一帧 MPEG 音频: 帧头 + 零填充 (417 字节)
pub(crate) fn build_mpa_frame(hdr: u32) -> Vec<u8> {
    let size = tao_bitstream::mpa::parse_mpa_header(hdr)
        .map(|h| h.frame_size as usize)
        .unwrap_or(4);
    let mut out = hdr.to_be_bytes().to_vec();
    out.resize(size, 0);
    out
}
