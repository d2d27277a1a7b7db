//! AV1 未压缩帧头 (5.9) 与 tile group 头 (5.11.1).
//!
//! 只保留确定语法长度所需的状态: 参考帧尺寸、order hint 与分段特征.
//! 运动矢量、CDF 等解码状态不做跟踪.

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

use super::obu::{ObuHeader, ObuType};
use super::sequence::{SELECT_INTEGER_MV, SELECT_SCREEN_CONTENT_TOOLS, SequenceHeader};

/// 参考帧槽位数
pub const NUM_REF_FRAMES: usize = 8;
/// 每帧可引用的参考帧数
pub const REFS_PER_FRAME: usize = 7;
const PRIMARY_REF_NONE: u32 = 7;
const ALL_FRAMES: u32 = 0xFF;

const SUPERRES_NUM: u32 = 8;
const SUPERRES_DENOM_MIN: u32 = 9;
const SUPERRES_DENOM_BITS: u32 = 3;

const MAX_TILE_WIDTH: u32 = 4096;
const MAX_TILE_AREA: u32 = 4096 * 2304;
const MAX_TILE_ROWS: u32 = 64;
const MAX_TILE_COLS: u32 = 64;

const MAX_SEGMENTS: usize = 8;
const SEG_LVL_MAX: usize = 8;
const SEG_LVL_ALT_Q: usize = 0;
const SEGMENTATION_FEATURE_BITS: [u32; SEG_LVL_MAX] = [8, 6, 6, 6, 6, 3, 0, 0];
const SEGMENTATION_FEATURE_SIGNED: [bool; SEG_LVL_MAX] = [true, true, true, true, true, false, false, false];
const SEGMENTATION_FEATURE_MAX: [i32; SEG_LVL_MAX] = [255, 63, 63, 63, 63, 7, 0, 0];

const GM_ABS_ALPHA_BITS: u32 = 12;
const GM_ABS_TRANS_ONLY_BITS: u32 = 9;
const GM_ABS_TRANS_BITS: u32 = 12;

/// 帧类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameType {
    /// KEY_FRAME
    #[default]
    Key,
    /// INTER_FRAME
    Inter,
    /// INTRA_ONLY_FRAME
    IntraOnly,
    /// SWITCH_FRAME
    Switch,
}

impl FrameType {
    fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::Key,
            1 => Self::Inter,
            2 => Self::IntraOnly,
            _ => Self::Switch,
        }
    }

    /// 报告标签
    pub fn label(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Inter => "inter",
            Self::IntraOnly => "intra_only",
            Self::Switch => "switch",
        }
    }

    /// FrameIsIntra
    pub fn is_intra(self) -> bool {
        matches!(self, Self::Key | Self::IntraOnly)
    }
}

/// 分段参数中影响语法长度的部分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentationFeatures {
    /// segmentation_enabled
    pub enabled: bool,
    /// FeatureEnabled
    pub feature_enabled: [[bool; SEG_LVL_MAX]; MAX_SEGMENTS],
    /// FeatureData
    pub feature_data: [[i32; SEG_LVL_MAX]; MAX_SEGMENTS],
}

/// 参考帧槽位中保存的信息 (7.20)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefFrameInfo {
    /// RefValid
    pub valid: bool,
    /// RefFrameType
    pub frame_type: FrameType,
    /// RefUpscaledWidth
    pub upscaled_width: u32,
    /// RefFrameWidth
    pub frame_width: u32,
    /// RefFrameHeight
    pub frame_height: u32,
    /// RefRenderWidth
    pub render_width: u32,
    /// RefRenderHeight
    pub render_height: u32,
    /// RefOrderHint
    pub order_hint: u32,
    /// 保存的分段特征
    pub segmentation: SegmentationFeatures,
}

/// tile 布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileInfo {
    /// TileCols
    pub tile_cols: u32,
    /// TileRows
    pub tile_rows: u32,
    /// TileColsLog2
    pub tile_cols_log2: u32,
    /// TileRowsLog2
    pub tile_rows_log2: u32,
    /// uniform_tile_spacing_flag
    pub uniform_tile_spacing_flag: bool,
    /// context_update_tile_id
    pub context_update_tile_id: u32,
    /// TileSizeBytes
    pub tile_size_bytes: u32,
}

impl Default for TileInfo {
    fn default() -> Self {
        Self {
            tile_cols: 1,
            tile_rows: 1,
            tile_cols_log2: 0,
            tile_rows_log2: 0,
            uniform_tile_spacing_flag: true,
            context_update_tile_id: 0,
            tile_size_bytes: 4,
        }
    }
}

impl TileInfo {
    /// NumTiles
    pub fn num_tiles(&self) -> u32 {
        self.tile_cols * self.tile_rows
    }
}

/// 未压缩帧头
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameHeader {
    /// show_existing_frame
    pub show_existing_frame: bool,
    /// frame_to_show_map_idx
    pub frame_to_show_map_idx: u8,
    /// frame_type
    pub frame_type: FrameType,
    /// show_frame
    pub show_frame: bool,
    /// showable_frame
    pub showable_frame: bool,
    /// error_resilient_mode
    pub error_resilient_mode: bool,
    /// disable_cdf_update
    pub disable_cdf_update: bool,
    /// allow_screen_content_tools
    pub allow_screen_content_tools: u32,
    /// force_integer_mv
    pub force_integer_mv: u32,
    /// current_frame_id
    pub current_frame_id: u32,
    /// frame_size_override_flag
    pub frame_size_override_flag: bool,
    /// order_hint
    pub order_hint: u32,
    /// primary_ref_frame
    pub primary_ref_frame: u32,
    /// refresh_frame_flags
    pub refresh_frame_flags: u32,
    /// FrameWidth
    pub frame_width: u32,
    /// FrameHeight
    pub frame_height: u32,
    /// UpscaledWidth
    pub upscaled_width: u32,
    /// RenderWidth
    pub render_width: u32,
    /// RenderHeight
    pub render_height: u32,
    /// MiCols
    pub mi_cols: u32,
    /// MiRows
    pub mi_rows: u32,
    /// allow_intrabc
    pub allow_intrabc: bool,
    /// ref_frame_idx
    pub ref_frame_idx: [u8; REFS_PER_FRAME],
    /// allow_high_precision_mv
    pub allow_high_precision_mv: bool,
    /// tile 布局
    pub tile_info: TileInfo,
    /// base_q_idx
    pub base_q_idx: u32,
    /// 分段参数
    pub segmentation: SegmentationFeatures,
    /// CodedLossless
    pub coded_lossless: bool,
    /// AllLossless
    pub all_lossless: bool,
    /// reference_select
    pub reference_select: bool,
    /// skip_mode_present
    pub skip_mode_present: bool,
    /// allow_warped_motion
    pub allow_warped_motion: bool,
    /// reduced_tx_set
    pub reduced_tx_set: bool,
    /// apply_grain
    pub apply_grain: bool,
    /// 帧头字节数 (向上取整到字节)
    pub header_bytes: u32,
}

/// 解析未压缩帧头
///
/// `refs` 为解析前的参考帧槽位, 解析成功后由调用方执行参考帧更新.
pub fn parse_frame_header(
    payload: &[u8],
    obu: &ObuHeader,
    seq: &SequenceHeader,
    refs: &[RefFrameInfo; NUM_REF_FRAMES],
) -> TaoResult<FrameHeader> {
    let mut br = BitReader::new(payload);
    let mut fh = FrameHeader::default();
    let id_len = seq.frame_id_length();
    let mut ref_order_hint: [u32; NUM_REF_FRAMES] = std::array::from_fn(|i| refs[i].order_hint);

    if seq.reduced_still_picture_header {
        fh.frame_type = FrameType::Key;
        fh.show_frame = true;
        fh.error_resilient_mode = true;
    } else {
        fh.show_existing_frame = br.read_flag()?;
        if fh.show_existing_frame {
            if obu.obu_type == ObuType::Frame {
                return Err(TaoError::InvalidData(
                    "AV1: OBU_FRAME 中 show_existing_frame 必须为 0".into(),
                ));
            }
            fh.frame_to_show_map_idx = br.read_bits(3)? as u8;
            if seq.decoder_model_info_present_flag && !seq.equal_picture_interval {
                br.skip_bits(u32::from(seq.frame_presentation_time_length_minus_1) + 1)?;
            }
            if seq.frame_id_numbers_present_flag {
                br.skip_bits(id_len)?; // display_frame_id
            }
            let shown = &refs[usize::from(fh.frame_to_show_map_idx)];
            fh.frame_type = shown.frame_type;
            fh.frame_width = shown.frame_width;
            fh.frame_height = shown.frame_height;
            fh.upscaled_width = shown.upscaled_width;
            fh.render_width = shown.render_width;
            fh.render_height = shown.render_height;
            fh.order_hint = shown.order_hint;
            fh.segmentation = shown.segmentation;
            if fh.frame_type == FrameType::Key {
                fh.refresh_frame_flags = ALL_FRAMES;
            }
            fh.header_bytes = br.bits_read().div_ceil(8) as u32;
            return Ok(fh);
        }

        fh.frame_type = FrameType::from_raw(br.read_bits(2)?);
        fh.show_frame = br.read_flag()?;
        if fh.show_frame && seq.decoder_model_info_present_flag && !seq.equal_picture_interval {
            br.skip_bits(u32::from(seq.frame_presentation_time_length_minus_1) + 1)?;
        }
        fh.showable_frame = if fh.show_frame {
            fh.frame_type != FrameType::Key
        } else {
            br.read_flag()?
        };
        fh.error_resilient_mode =
            if fh.frame_type == FrameType::Switch || (fh.frame_type == FrameType::Key && fh.show_frame) {
                true
            } else {
                br.read_flag()?
            };
    }
    let frame_is_intra = fh.frame_type.is_intra();

    if fh.frame_type == FrameType::Key && fh.show_frame {
        ref_order_hint = [0; NUM_REF_FRAMES];
    }

    fh.disable_cdf_update = br.read_flag()?;
    fh.allow_screen_content_tools = if seq.seq_force_screen_content_tools == SELECT_SCREEN_CONTENT_TOOLS {
        br.read_bit()?
    } else {
        seq.seq_force_screen_content_tools
    };
    if fh.allow_screen_content_tools > 0 {
        fh.force_integer_mv = if seq.seq_force_integer_mv == SELECT_INTEGER_MV {
            br.read_bit()?
        } else {
            seq.seq_force_integer_mv
        };
    }
    if frame_is_intra {
        fh.force_integer_mv = 1;
    }
    if seq.frame_id_numbers_present_flag {
        fh.current_frame_id = br.read_bits(id_len)?;
    }

    fh.frame_size_override_flag = if fh.frame_type == FrameType::Switch {
        true
    } else if seq.reduced_still_picture_header {
        false
    } else {
        br.read_flag()?
    };
    fh.order_hint = br.read_bits(seq.order_hint_bits)?;
    fh.primary_ref_frame = if frame_is_intra || fh.error_resilient_mode {
        PRIMARY_REF_NONE
    } else {
        br.read_bits(3)?
    };

    if seq.decoder_model_info_present_flag && br.read_flag()? {
        for op in &seq.operating_points {
            if !op.decoder_model_present {
                continue;
            }
            let in_temporal = (op.idc >> obu.temporal_id) & 1 != 0;
            let in_spatial = (op.idc >> (u32::from(obu.spatial_id) + 8)) & 1 != 0;
            if op.idc == 0 || (in_temporal && in_spatial) {
                br.skip_bits(u32::from(seq.buffer_removal_time_length_minus_1) + 1)?;
            }
        }
    }

    fh.refresh_frame_flags =
        if fh.frame_type == FrameType::Switch || (fh.frame_type == FrameType::Key && fh.show_frame) {
            ALL_FRAMES
        } else {
            br.read_bits(8)?
        };
    if (!frame_is_intra || fh.refresh_frame_flags != ALL_FRAMES)
        && fh.error_resilient_mode
        && seq.enable_order_hint
    {
        for hint in ref_order_hint.iter_mut() {
            *hint = br.read_bits(seq.order_hint_bits)?;
        }
    }

    if frame_is_intra {
        parse_frame_size(&mut br, &mut fh, seq)?;
        parse_render_size(&mut br, &mut fh)?;
        if fh.allow_screen_content_tools > 0 && fh.upscaled_width == fh.frame_width {
            fh.allow_intrabc = br.read_flag()?;
        }
    } else {
        let short_signaling = seq.enable_order_hint && br.read_flag()?;
        if short_signaling {
            let last = br.read_bits(3)? as u8;
            let gold = br.read_bits(3)? as u8;
            fh.ref_frame_idx = set_frame_refs(seq, &ref_order_hint, fh.order_hint, last, gold);
        }
        for i in 0..REFS_PER_FRAME {
            if !short_signaling {
                fh.ref_frame_idx[i] = br.read_bits(3)? as u8;
            }
            if seq.frame_id_numbers_present_flag {
                br.skip_bits(u32::from(seq.delta_frame_id_length_minus_2) + 2)?;
            }
        }
        if fh.frame_size_override_flag && !fh.error_resilient_mode {
            parse_frame_size_with_refs(&mut br, &mut fh, seq, refs)?;
        } else {
            parse_frame_size(&mut br, &mut fh, seq)?;
            parse_render_size(&mut br, &mut fh)?;
        }
        fh.allow_high_precision_mv = fh.force_integer_mv == 0 && br.read_flag()?;
        // read_interpolation_filter
        if !br.read_flag()? {
            br.skip_bits(2)?;
        }
        br.skip_bits(1)?; // is_motion_mode_switchable
        if !fh.error_resilient_mode && seq.enable_ref_frame_mvs {
            br.skip_bits(1)?; // use_ref_frame_mvs
        }
    }

    if !(seq.reduced_still_picture_header || fh.disable_cdf_update) {
        br.skip_bits(1)?; // disable_frame_end_update_cdf
    }

    // load_previous / setup_past_independence
    if fh.primary_ref_frame != PRIMARY_REF_NONE {
        let prev = fh.ref_frame_idx[fh.primary_ref_frame as usize];
        fh.segmentation = refs[usize::from(prev)].segmentation;
    }

    fh.tile_info = parse_tile_info(&mut br, &fh, seq)?;
    let num_planes = seq.color.num_planes();
    let deltas = parse_quantization_params(&mut br, &mut fh, num_planes, seq.color.separate_uv_delta_q)?;
    parse_segmentation_params(&mut br, &mut fh)?;

    // delta_q_params / delta_lf_params
    let delta_q_present = fh.base_q_idx > 0 && br.read_flag()?;
    if delta_q_present {
        br.skip_bits(2)?; // delta_q_res
        if !fh.allow_intrabc && br.read_flag()? {
            br.skip_bits(3)?; // delta_lf_res + delta_lf_multi
        }
    }

    fh.coded_lossless = (0..MAX_SEGMENTS).all(|seg| qindex(&fh, seg) == 0) && deltas;
    fh.all_lossless = fh.coded_lossless && fh.frame_width == fh.upscaled_width;

    parse_loop_filter_params(&mut br, &fh, num_planes)?;
    if !(fh.coded_lossless || fh.allow_intrabc || !seq.enable_cdef) {
        br.skip_bits(2)?; // cdef_damping_minus_3
        let cdef_bits = br.read_bits(2)?;
        let per_strength = if num_planes > 1 { 12 } else { 6 };
        br.skip_bits(per_strength * (1 << cdef_bits))?;
    }
    parse_loop_restoration_params(&mut br, &fh, seq, num_planes)?;
    if !fh.coded_lossless {
        br.skip_bits(1)?; // tx_mode_select
    }
    fh.reference_select = !frame_is_intra && br.read_flag()?;
    if skip_mode_allowed(&fh, seq, &ref_order_hint) {
        fh.skip_mode_present = br.read_flag()?;
    }
    fh.allow_warped_motion =
        !(frame_is_intra || fh.error_resilient_mode || !seq.enable_warped_motion) && br.read_flag()?;
    fh.reduced_tx_set = br.read_flag()?;
    if !frame_is_intra {
        skip_global_motion_params(&mut br, fh.allow_high_precision_mv)?;
    }
    parse_film_grain_params(&mut br, &mut fh, seq)?;

    fh.header_bytes = br.bits_read().div_ceil(8) as u32;
    Ok(fh)
}

/// 帧头解析成功后的参考帧更新 (7.20)
pub fn update_refs(fh: &FrameHeader, refs: &mut [RefFrameInfo; NUM_REF_FRAMES]) {
    if fh.show_existing_frame && fh.frame_type != FrameType::Key {
        return;
    }
    let info = if fh.show_existing_frame {
        refs[usize::from(fh.frame_to_show_map_idx)]
    } else {
        RefFrameInfo {
            valid: true,
            frame_type: fh.frame_type,
            upscaled_width: fh.upscaled_width,
            frame_width: fh.frame_width,
            frame_height: fh.frame_height,
            render_width: fh.render_width,
            render_height: fh.render_height,
            order_hint: fh.order_hint,
            segmentation: fh.segmentation,
        }
    };
    for (i, slot) in refs.iter_mut().enumerate() {
        if (fh.refresh_frame_flags >> i) & 1 != 0 {
            *slot = info;
        }
    }
}

fn compute_image_size(fh: &mut FrameHeader) {
    fh.mi_cols = 2 * ((fh.frame_width + 7) >> 3);
    fh.mi_rows = 2 * ((fh.frame_height + 7) >> 3);
}

fn parse_superres_params(br: &mut BitReader, fh: &mut FrameHeader, seq: &SequenceHeader) -> TaoResult<()> {
    let use_superres = seq.enable_superres && br.read_flag()?;
    let denom = if use_superres {
        br.read_bits(SUPERRES_DENOM_BITS)? + SUPERRES_DENOM_MIN
    } else {
        SUPERRES_NUM
    };
    fh.upscaled_width = fh.frame_width;
    fh.frame_width = (fh.upscaled_width * SUPERRES_NUM + denom / 2) / denom;
    Ok(())
}

fn parse_frame_size(br: &mut BitReader, fh: &mut FrameHeader, seq: &SequenceHeader) -> TaoResult<()> {
    if fh.frame_size_override_flag {
        fh.frame_width = br.read_bits(u32::from(seq.frame_width_bits_minus_1) + 1)? + 1;
        fh.frame_height = br.read_bits(u32::from(seq.frame_height_bits_minus_1) + 1)? + 1;
    } else {
        fh.frame_width = seq.max_frame_width;
        fh.frame_height = seq.max_frame_height;
    }
    parse_superres_params(br, fh, seq)?;
    compute_image_size(fh);
    Ok(())
}

fn parse_render_size(br: &mut BitReader, fh: &mut FrameHeader) -> TaoResult<()> {
    if br.read_flag()? {
        fh.render_width = br.read_bits(16)? + 1;
        fh.render_height = br.read_bits(16)? + 1;
    } else {
        fh.render_width = fh.upscaled_width;
        fh.render_height = fh.frame_height;
    }
    Ok(())
}

fn parse_frame_size_with_refs(
    br: &mut BitReader,
    fh: &mut FrameHeader,
    seq: &SequenceHeader,
    refs: &[RefFrameInfo; NUM_REF_FRAMES],
) -> TaoResult<()> {
    for i in 0..REFS_PER_FRAME {
        if br.read_flag()? {
            let r = &refs[usize::from(fh.ref_frame_idx[i])];
            fh.upscaled_width = r.upscaled_width;
            fh.frame_width = fh.upscaled_width;
            fh.frame_height = r.frame_height;
            fh.render_width = r.render_width;
            fh.render_height = r.render_height;
            parse_superres_params(br, fh, seq)?;
            compute_image_size(fh);
            return Ok(());
        }
    }
    parse_frame_size(br, fh, seq)?;
    parse_render_size(br, fh)
}

fn relative_dist(seq: &SequenceHeader, a: u32, b: u32) -> i32 {
    if !seq.enable_order_hint {
        return 0;
    }
    let diff = a as i32 - b as i32;
    let m = 1i32 << (seq.order_hint_bits - 1);
    (diff & (m - 1)) - (diff & m)
}

/// 7.8 set_frame_refs
fn set_frame_refs(
    seq: &SequenceHeader,
    ref_order_hint: &[u32; NUM_REF_FRAMES],
    order_hint: u32,
    last: u8,
    gold: u8,
) -> [u8; REFS_PER_FRAME] {
    // 下标为参考帧类型减 LAST: LAST, LAST2, LAST3, GOLDEN, BWDREF, ALTREF2, ALTREF
    const LAST2: usize = 1;
    const LAST3: usize = 2;
    const GOLDEN: usize = 3;
    const BWDREF: usize = 4;
    const ALTREF2: usize = 5;
    const ALTREF: usize = 6;

    let mut idx = [-1i32; REFS_PER_FRAME];
    idx[0] = i32::from(last);
    idx[GOLDEN] = i32::from(gold);
    let mut used = [false; NUM_REF_FRAMES];
    used[usize::from(last)] = true;
    used[usize::from(gold)] = true;

    let cur = 1i32 << (seq.order_hint_bits - 1);
    let shifted: [i32; NUM_REF_FRAMES] =
        std::array::from_fn(|i| cur + relative_dist(seq, ref_order_hint[i], order_hint));

    let find = |used: &[bool; NUM_REF_FRAMES], backward: bool, latest: bool| -> i32 {
        let mut found = -1i32;
        let mut best = 0i32;
        for (i, &hint) in shifted.iter().enumerate() {
            if used[i] || (hint >= cur) != backward {
                continue;
            }
            let better = if latest { hint >= best } else { hint < best };
            if found < 0 || better {
                found = i as i32;
                best = hint;
            }
        }
        found
    };

    let r = find(&used, true, true);
    if r >= 0 {
        idx[ALTREF] = r;
        used[r as usize] = true;
    }
    for slot in [BWDREF, ALTREF2] {
        let r = find(&used, true, false);
        if r >= 0 {
            idx[slot] = r;
            used[r as usize] = true;
        }
    }
    for slot in [LAST2, LAST3, BWDREF, ALTREF2, ALTREF] {
        if idx[slot] < 0 {
            let r = find(&used, false, true);
            if r >= 0 {
                idx[slot] = r;
                used[r as usize] = true;
            }
        }
    }

    let mut earliest = 0usize;
    for i in 1..NUM_REF_FRAMES {
        if shifted[i] < shifted[earliest] {
            earliest = i;
        }
    }
    idx.map(|v| if v < 0 { earliest as u8 } else { v as u8 })
}

fn tile_log2(blk_size: u32, target: u32) -> u32 {
    let mut k = 0;
    while (blk_size << k) < target {
        k += 1;
    }
    k
}

fn parse_tile_info(br: &mut BitReader, fh: &FrameHeader, seq: &SequenceHeader) -> TaoResult<TileInfo> {
    let (sb_cols, sb_rows, sb_shift) = if seq.use_128x128_superblock {
        ((fh.mi_cols + 31) >> 5, (fh.mi_rows + 31) >> 5, 5)
    } else {
        ((fh.mi_cols + 15) >> 4, (fh.mi_rows + 15) >> 4, 4)
    };
    let sb_size = sb_shift + 2;
    let max_tile_width_sb = MAX_TILE_WIDTH >> sb_size;
    let max_tile_area_sb = MAX_TILE_AREA >> (2 * sb_size);
    let min_log2_tile_cols = tile_log2(max_tile_width_sb, sb_cols);
    let max_log2_tile_cols = tile_log2(1, sb_cols.min(MAX_TILE_COLS));
    let max_log2_tile_rows = tile_log2(1, sb_rows.min(MAX_TILE_ROWS));
    let min_log2_tiles = min_log2_tile_cols.max(tile_log2(max_tile_area_sb, sb_rows * sb_cols));

    let mut ti = TileInfo {
        uniform_tile_spacing_flag: br.read_flag()?,
        ..Default::default()
    };
    if ti.uniform_tile_spacing_flag {
        ti.tile_cols_log2 = min_log2_tile_cols;
        while ti.tile_cols_log2 < max_log2_tile_cols && br.read_flag()? {
            ti.tile_cols_log2 += 1;
        }
        let tile_width_sb = (sb_cols + (1 << ti.tile_cols_log2) - 1) >> ti.tile_cols_log2;
        ti.tile_cols = sb_cols.div_ceil(tile_width_sb.max(1));

        ti.tile_rows_log2 = min_log2_tiles.saturating_sub(ti.tile_cols_log2);
        while ti.tile_rows_log2 < max_log2_tile_rows && br.read_flag()? {
            ti.tile_rows_log2 += 1;
        }
        let tile_height_sb = (sb_rows + (1 << ti.tile_rows_log2) - 1) >> ti.tile_rows_log2;
        ti.tile_rows = sb_rows.div_ceil(tile_height_sb.max(1));
    } else {
        let mut widest_tile_sb = 0;
        let mut start_sb = 0;
        ti.tile_cols = 0;
        while start_sb < sb_cols {
            let max_width = (sb_cols - start_sb).min(max_tile_width_sb);
            let size_sb = br.read_ns(max_width)? + 1;
            widest_tile_sb = widest_tile_sb.max(size_sb);
            start_sb += size_sb;
            ti.tile_cols += 1;
            if ti.tile_cols > MAX_TILE_COLS {
                return Err(TaoError::InvalidData(format!(
                    "AV1: tile 列数超出范围, value={}",
                    ti.tile_cols
                )));
            }
        }
        ti.tile_cols_log2 = tile_log2(1, ti.tile_cols);

        let area_sb = if min_log2_tiles > 0 {
            (sb_rows * sb_cols) >> (min_log2_tiles + 1)
        } else {
            sb_rows * sb_cols
        };
        let max_tile_height_sb = (area_sb / widest_tile_sb.max(1)).max(1);
        let mut start_sb = 0;
        ti.tile_rows = 0;
        while start_sb < sb_rows {
            let max_height = (sb_rows - start_sb).min(max_tile_height_sb);
            start_sb += br.read_ns(max_height)? + 1;
            ti.tile_rows += 1;
            if ti.tile_rows > MAX_TILE_ROWS {
                return Err(TaoError::InvalidData(format!(
                    "AV1: tile 行数超出范围, value={}",
                    ti.tile_rows
                )));
            }
        }
        ti.tile_rows_log2 = tile_log2(1, ti.tile_rows);
    }

    if ti.tile_cols_log2 > 0 || ti.tile_rows_log2 > 0 {
        ti.context_update_tile_id = br.read_bits(ti.tile_cols_log2 + ti.tile_rows_log2)?;
        ti.tile_size_bytes = br.read_bits(2)? + 1;
    }
    Ok(ti)
}

fn read_delta_q(br: &mut BitReader) -> TaoResult<i32> {
    if br.read_flag()? {
        br.read_bits_signed(7)
    } else {
        Ok(0)
    }
}

/// 解析量化参数, 返回所有 DC/AC 差值是否均为 0
fn parse_quantization_params(
    br: &mut BitReader,
    fh: &mut FrameHeader,
    num_planes: u32,
    separate_uv_delta_q: bool,
) -> TaoResult<bool> {
    fh.base_q_idx = br.read_bits(8)?;
    let mut all_zero = read_delta_q(br)? == 0;
    if num_planes > 1 {
        let diff_uv_delta = separate_uv_delta_q && br.read_flag()?;
        all_zero &= read_delta_q(br)? == 0;
        all_zero &= read_delta_q(br)? == 0;
        if diff_uv_delta {
            all_zero &= read_delta_q(br)? == 0;
            all_zero &= read_delta_q(br)? == 0;
        }
    }
    if br.read_flag()? {
        // using_qmatrix
        br.skip_bits(8)?;
        if separate_uv_delta_q {
            br.skip_bits(4)?;
        }
    }
    Ok(all_zero)
}

fn parse_segmentation_params(br: &mut BitReader, fh: &mut FrameHeader) -> TaoResult<()> {
    let seg = &mut fh.segmentation;
    seg.enabled = br.read_flag()?;
    if !seg.enabled {
        *seg = SegmentationFeatures::default();
        return Ok(());
    }
    let update_data = if fh.primary_ref_frame == PRIMARY_REF_NONE {
        true
    } else {
        if br.read_flag()? {
            br.skip_bits(1)?; // segmentation_temporal_update
        }
        br.read_flag()?
    };
    if fh.primary_ref_frame == PRIMARY_REF_NONE || update_data {
        seg.feature_enabled = Default::default();
        seg.feature_data = Default::default();
    }
    if update_data {
        for i in 0..MAX_SEGMENTS {
            for j in 0..SEG_LVL_MAX {
                if !br.read_flag()? {
                    continue;
                }
                seg.feature_enabled[i][j] = true;
                let bits = SEGMENTATION_FEATURE_BITS[j];
                let limit = SEGMENTATION_FEATURE_MAX[j];
                seg.feature_data[i][j] = if SEGMENTATION_FEATURE_SIGNED[j] {
                    br.read_bits_signed(1 + bits)?.clamp(-limit, limit)
                } else {
                    (br.read_bits(bits)? as i32).clamp(0, limit)
                };
            }
        }
    }
    Ok(())
}

fn qindex(fh: &FrameHeader, segment: usize) -> i32 {
    let seg = &fh.segmentation;
    let base = fh.base_q_idx as i32;
    if seg.enabled && seg.feature_enabled[segment][SEG_LVL_ALT_Q] {
        (base + seg.feature_data[segment][SEG_LVL_ALT_Q]).clamp(0, 255)
    } else {
        base
    }
}

fn parse_loop_filter_params(br: &mut BitReader, fh: &FrameHeader, num_planes: u32) -> TaoResult<()> {
    if fh.coded_lossless || fh.allow_intrabc {
        return Ok(());
    }
    let level0 = br.read_bits(6)?;
    let level1 = br.read_bits(6)?;
    if num_planes > 1 && (level0 > 0 || level1 > 0) {
        br.skip_bits(12)?;
    }
    br.skip_bits(3)?; // loop_filter_sharpness
    if br.read_flag()? && br.read_flag()? {
        // loop_filter_delta_update
        for _ in 0..(8 + 2) {
            if br.read_flag()? {
                br.skip_bits(7)?;
            }
        }
    }
    Ok(())
}

fn parse_loop_restoration_params(
    br: &mut BitReader,
    fh: &FrameHeader,
    seq: &SequenceHeader,
    num_planes: u32,
) -> TaoResult<()> {
    if fh.all_lossless || fh.allow_intrabc || !seq.enable_restoration {
        return Ok(());
    }
    let mut uses_lr = false;
    let mut uses_chroma_lr = false;
    for plane in 0..num_planes {
        if br.read_bits(2)? != 0 {
            uses_lr = true;
            uses_chroma_lr |= plane > 0;
        }
    }
    if uses_lr {
        if seq.use_128x128_superblock {
            br.skip_bits(1)?;
        } else if br.read_flag()? {
            br.skip_bits(1)?;
        }
        if seq.color.subsampling_x && seq.color.subsampling_y && uses_chroma_lr {
            br.skip_bits(1)?;
        }
    }
    Ok(())
}

fn skip_mode_allowed(fh: &FrameHeader, seq: &SequenceHeader, ref_order_hint: &[u32; NUM_REF_FRAMES]) -> bool {
    if fh.frame_type.is_intra() || !fh.reference_select || !seq.enable_order_hint {
        return false;
    }
    let mut forward: Option<u32> = None;
    let mut backward: Option<u32> = None;
    for &ref_idx in &fh.ref_frame_idx {
        let hint = ref_order_hint[usize::from(ref_idx)];
        let dist = relative_dist(seq, hint, fh.order_hint);
        if dist < 0 {
            if forward.is_none_or(|f| relative_dist(seq, hint, f) > 0) {
                forward = Some(hint);
            }
        } else if dist > 0 && backward.is_none_or(|b| relative_dist(seq, hint, b) < 0) {
            backward = Some(hint);
        }
    }
    let Some(forward_hint) = forward else {
        return false;
    };
    if backward.is_some() {
        return true;
    }
    fh.ref_frame_idx.iter().any(|&ref_idx| {
        relative_dist(seq, ref_order_hint[usize::from(ref_idx)], forward_hint) < 0
    })
}

/// decode_subexp(numSyms) (5.9.26), 只消耗比特
fn skip_subexp(br: &mut BitReader, num_syms: u32) -> TaoResult<()> {
    let mut i = 0;
    let mut mk = 0u32;
    let k = 3;
    loop {
        let b2 = if i > 0 { k + i - 1 } else { k };
        let a = 1u32 << b2;
        if num_syms <= mk + 3 * a {
            br.read_ns(num_syms - mk)?;
            return Ok(());
        }
        if !br.read_flag()? {
            br.skip_bits(b2)?;
            return Ok(());
        }
        i += 1;
        mk += a;
    }
}

fn skip_global_motion_params(br: &mut BitReader, allow_high_precision_mv: bool) -> TaoResult<()> {
    // LAST..=ALTREF
    for _ in 0..REFS_PER_FRAME {
        if !br.read_flag()? {
            continue;
        }
        let rot_zoom = br.read_flag()?;
        let translation = !rot_zoom && br.read_flag()?;
        let affine = !rot_zoom && !translation;
        let alpha_syms = 2 * (1u32 << GM_ABS_ALPHA_BITS) + 1;
        if !translation {
            let params = if affine { 4 } else { 2 };
            for _ in 0..params {
                skip_subexp(br, alpha_syms)?;
            }
        }
        let trans_bits = if translation {
            GM_ABS_TRANS_ONLY_BITS - u32::from(!allow_high_precision_mv)
        } else {
            GM_ABS_TRANS_BITS
        };
        let trans_syms = 2 * (1u32 << trans_bits) + 1;
        skip_subexp(br, trans_syms)?;
        skip_subexp(br, trans_syms)?;
    }
    Ok(())
}

fn parse_film_grain_params(br: &mut BitReader, fh: &mut FrameHeader, seq: &SequenceHeader) -> TaoResult<()> {
    if !seq.film_grain_params_present || (!fh.show_frame && !fh.showable_frame) {
        return Ok(());
    }
    fh.apply_grain = br.read_flag()?;
    if !fh.apply_grain {
        return Ok(());
    }
    br.skip_bits(16)?; // grain_seed
    let update_grain = fh.frame_type != FrameType::Inter || br.read_flag()?;
    if !update_grain {
        br.skip_bits(3)?; // film_grain_params_ref_idx
        return Ok(());
    }
    let cc = &seq.color;
    let num_y_points = br.read_bits(4)?;
    br.skip_bits(16 * num_y_points)?;
    let chroma_scaling_from_luma = !cc.mono_chrome && br.read_flag()?;
    let (mut num_cb, mut num_cr) = (0, 0);
    if !(cc.mono_chrome
        || chroma_scaling_from_luma
        || (cc.subsampling_x && cc.subsampling_y && num_y_points == 0))
    {
        num_cb = br.read_bits(4)?;
        br.skip_bits(16 * num_cb)?;
        num_cr = br.read_bits(4)?;
        br.skip_bits(16 * num_cr)?;
    }
    br.skip_bits(2)?; // grain_scaling_minus_8
    let lag = br.read_bits(2)?;
    let num_pos_luma = 2 * lag * (lag + 1);
    let num_pos_chroma = if num_y_points > 0 {
        br.skip_bits(8 * num_pos_luma)?;
        num_pos_luma + 1
    } else {
        num_pos_luma
    };
    if chroma_scaling_from_luma || num_cb > 0 {
        br.skip_bits(8 * num_pos_chroma)?;
    }
    if chroma_scaling_from_luma || num_cr > 0 {
        br.skip_bits(8 * num_pos_chroma)?;
    }
    br.skip_bits(4)?; // ar_coeff_shift_minus_6 + grain_scale_shift
    if num_cb > 0 {
        br.skip_bits(25)?;
    }
    if num_cr > 0 {
        br.skip_bits(25)?;
    }
    br.skip_bits(2)?; // overlap_flag + clip_to_restricted_range
    Ok(())
}

/// tile group 头解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGroup {
    /// tg_start
    pub tg_start: u32,
    /// tg_end
    pub tg_end: u32,
}

impl TileGroup {
    /// 本 OBU 包含的 tile 数
    pub fn num_tiles(&self) -> u32 {
        self.tg_end - self.tg_start + 1
    }

    /// 是否为帧的最后一个 tile group
    pub fn is_last(&self, tile_info: &TileInfo) -> bool {
        self.tg_end + 1 == tile_info.num_tiles()
    }
}

/// 解析 tile group 头并校验各 tile 大小字段
pub fn parse_tile_group(data: &[u8], tile_info: &TileInfo) -> TaoResult<TileGroup> {
    let mut br = BitReader::new(data);
    let num_tiles = tile_info.num_tiles();
    let present = num_tiles > 1 && br.read_flag()?;
    let tg = if present {
        let bits = tile_info.tile_cols_log2 + tile_info.tile_rows_log2;
        TileGroup {
            tg_start: br.read_bits(bits)?,
            tg_end: br.read_bits(bits)?,
        }
    } else {
        TileGroup {
            tg_start: 0,
            tg_end: num_tiles - 1,
        }
    };
    if tg.tg_end < tg.tg_start || tg.tg_end >= num_tiles {
        return Err(TaoError::InvalidData(format!(
            "AV1: tile group 范围非法, tg_start={}, tg_end={}, num_tiles={}",
            tg.tg_start, tg.tg_end, num_tiles
        )));
    }
    br.align_to_byte();

    let mut pos = br.byte_position();
    let size_bytes = tile_info.tile_size_bytes as usize;
    for _ in tg.tg_start..tg.tg_end {
        let field = data.get(pos..pos + size_bytes).ok_or(TaoError::Eof)?;
        let tile_size = field
            .iter()
            .rev()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b))
            + 1;
        pos += size_bytes + tile_size;
        if pos > data.len() {
            return Err(TaoError::InvalidData(format!(
                "AV1: tile 数据超出 OBU, tile_size={}, remain={}",
                tile_size,
                data.len().saturating_sub(pos - tile_size)
            )));
        }
    }
    Ok(tg)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::av1::obu::parse_obu_header;
    use crate::av1::obu::build_obu;
    use crate::av1::sequence::parse_sequence_header;
    use crate::av1::sequence::tests::{SeqSpec, build_sequence_header};
    use tao_core::bitwriter::BitWriter;

    fn seq(spec: &SeqSpec) -> SequenceHeader {
        parse_sequence_header(&build_sequence_header(spec)).unwrap()
    }

    fn obu_header(obu_type: ObuType) -> ObuHeader {
        parse_obu_header(&build_obu(obu_type, None, &[0])).unwrap()
    }

    /// 写入 1920x1080 默认序列头下的帧头公共尾部 (单 tile, 无分段/增量/运动)
    ///
    /// `base_q_idx` 非 0 时帧不为无损, 会写出环路滤波、CDEF、LR 与 tx_mode.
    pub(crate) fn write_frame_tail(bw: &mut BitWriter, intra: bool, base_q_idx: u32) {
        bw.write_bit(1); // uniform_tile_spacing_flag
        bw.write_bit(0); // increment_tile_cols_log2
        bw.write_bit(0); // increment_tile_rows_log2
        bw.write_bits(base_q_idx, 8);
        bw.write_bit(0); // DeltaQYDc
        bw.write_bit(0);
        bw.write_bit(0);
        bw.write_bit(0); // using_qmatrix
        bw.write_bit(0); // segmentation_enabled
        if base_q_idx > 0 {
            bw.write_bit(0); // delta_q_present
            bw.write_bits(10, 6);
            bw.write_bits(10, 6);
            bw.write_bits(0, 12);
            bw.write_bits(0, 3);
            bw.write_bit(0); // loop_filter_delta_enabled
            bw.write_bits(0, 2); // cdef_damping_minus_3
            bw.write_bits(0, 2); // cdef_bits
            bw.write_bits(0, 12);
            bw.write_bits(0, 6); // lr_type x3
            bw.write_bit(1); // tx_mode_select
        }
        if !intra {
            bw.write_bit(0); // reference_select
        }
        bw.write_bit(0); // reduced_tx_set
        if !intra {
            for _ in 0..REFS_PER_FRAME {
                bw.write_bit(0); // is_global
            }
        }
    }

    /// 构造关键帧 (show_frame=1) 帧头载荷
    pub(crate) fn build_key_frame_header(base_q_idx: u32) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bit(0); // show_existing_frame
        bw.write_bits(0, 2); // KEY_FRAME
        bw.write_bit(1); // show_frame
        bw.write_bit(0); // disable_cdf_update
        bw.write_bit(0); // allow_screen_content_tools
        bw.write_bit(0); // frame_size_override_flag
        bw.write_bits(0, 7); // order_hint
        bw.write_bit(0); // render_and_frame_size_different
        bw.write_bit(0); // disable_frame_end_update_cdf
        write_frame_tail(&mut bw, true, base_q_idx);
        bw.finish()
    }

    /// 构造显式引用的帧间帧头载荷
    pub(crate) fn build_inter_frame_header(order_hint: u32, refresh: u32) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bit(0);
        bw.write_bits(1, 2); // INTER_FRAME
        bw.write_bit(1);
        bw.write_bit(0); // error_resilient_mode
        bw.write_bit(0);
        bw.write_bit(0);
        bw.write_bit(0); // frame_size_override_flag
        bw.write_bits(order_hint, 7);
        bw.write_bits(7, 3); // primary_ref_frame = NONE
        bw.write_bits(refresh, 8);
        bw.write_bit(0); // frame_refs_short_signaling
        for _ in 0..REFS_PER_FRAME {
            bw.write_bits(0, 3);
        }
        bw.write_bit(0); // render_and_frame_size_different
        bw.write_bit(1); // allow_high_precision_mv
        bw.write_bit(1); // is_filter_switchable
        bw.write_bit(0); // is_motion_mode_switchable
        bw.write_bit(0); // use_ref_frame_mvs
        bw.write_bit(0); // disable_frame_end_update_cdf
        write_frame_tail(&mut bw, false, 60);
        bw.finish()
    }

    #[test]
    fn test_key_frame_header() {
        let seq = seq(&SeqSpec::default());
        let refs = [RefFrameInfo::default(); NUM_REF_FRAMES];
        let data = build_key_frame_header(100);
        let fh = parse_frame_header(&data, &obu_header(ObuType::FrameHeader), &seq, &refs).unwrap();
        assert_eq!(fh.frame_type, FrameType::Key);
        assert!(fh.show_frame);
        assert_eq!(fh.refresh_frame_flags, 0xFF);
        assert_eq!((fh.frame_width, fh.frame_height), (1920, 1080));
        assert_eq!((fh.mi_cols, fh.mi_rows), (480, 270));
        assert_eq!(fh.tile_info.num_tiles(), 1);
        assert_eq!(fh.base_q_idx, 100);
        assert!(!fh.coded_lossless);
        assert_eq!(fh.header_bytes as usize, data.len(), "帧头字节数应与构造的长度一致");
    }

    #[test]
    fn test_lossless_key_frame_skips_filters() {
        let seq = seq(&SeqSpec::default());
        let refs = [RefFrameInfo::default(); NUM_REF_FRAMES];
        let data = build_key_frame_header(0);
        let fh = parse_frame_header(&data, &obu_header(ObuType::FrameHeader), &seq, &refs).unwrap();
        assert!(fh.coded_lossless && fh.all_lossless);
        assert_eq!(fh.header_bytes as usize, data.len());
    }

    #[test]
    fn test_inter_frame_and_ref_update() {
        let seq = seq(&SeqSpec::default());
        let mut refs = [RefFrameInfo::default(); NUM_REF_FRAMES];
        let key = parse_frame_header(&build_key_frame_header(100), &obu_header(ObuType::Frame), &seq, &refs).unwrap();
        update_refs(&key, &mut refs);
        assert!(refs.iter().all(|r| r.valid && r.frame_width == 1920));

        let data = build_inter_frame_header(3, 0x01);
        let fh = parse_frame_header(&data, &obu_header(ObuType::FrameHeader), &seq, &refs).unwrap();
        assert_eq!(fh.frame_type, FrameType::Inter);
        assert_eq!(fh.order_hint, 3);
        assert_eq!(fh.refresh_frame_flags, 1);
        assert!(fh.allow_high_precision_mv);
        assert_eq!(fh.header_bytes as usize, data.len());
        update_refs(&fh, &mut refs);
        assert_eq!(refs[0].order_hint, 3);
        assert_eq!(refs[1].order_hint, 0);
    }

    #[test]
    fn test_show_existing_frame() {
        let seq = seq(&SeqSpec::default());
        let mut refs = [RefFrameInfo::default(); NUM_REF_FRAMES];
        refs[5] = RefFrameInfo {
            valid: true,
            frame_type: FrameType::Inter,
            frame_width: 640,
            ..Default::default()
        };
        let fh = parse_frame_header(&[0b1101_0000], &obu_header(ObuType::FrameHeader), &seq, &refs).unwrap();
        assert!(fh.show_existing_frame);
        assert_eq!(fh.frame_to_show_map_idx, 5);
        assert_eq!(fh.frame_type, FrameType::Inter);
        assert_eq!(fh.refresh_frame_flags, 0);
        assert_eq!(fh.header_bytes, 1);

        let err = parse_frame_header(&[0b1101_0000], &obu_header(ObuType::Frame), &seq, &refs);
        assert!(err.is_err(), "OBU_FRAME 不允许 show_existing_frame");
    }

    #[test]
    fn test_set_frame_refs_short_signaling() {
        let seq = seq(&SeqSpec::default());
        let hints = [0, 1, 2, 3, 5, 6, 7, 8];
        let idx = set_frame_refs(&seq, &hints, 4, 3, 0);
        assert_eq!(idx[0], 3, "LAST 取 last_frame_idx");
        assert_eq!(idx[3], 0, "GOLDEN 取 gold_frame_idx");
        assert_eq!(idx[6], 7, "ALTREF 取最晚的后向参考");
        assert_eq!(idx[4], 4, "BWDREF 取最早的后向参考");
        assert_eq!(idx[5], 5);
        assert_eq!(idx[1], 2, "LAST2 取最近的前向参考");
        assert_eq!(idx[2], 1);
    }

    #[test]
    fn test_tile_group_counts() {
        let single = TileInfo::default();
        let tg = parse_tile_group(&[0xAA; 16], &single).unwrap();
        assert_eq!(tg.num_tiles(), 1);
        assert!(tg.is_last(&single));

        let grid = TileInfo {
            tile_cols: 2,
            tile_rows: 2,
            tile_cols_log2: 1,
            tile_rows_log2: 1,
            tile_size_bytes: 1,
            ..Default::default()
        };
        // tile_start_and_end_present_flag=1, tg_start=1, tg_end=2
        let mut data = vec![0b1011_0000, 3, 0, 0, 0, 0x55, 0x55];
        let tg = parse_tile_group(&data, &grid).unwrap();
        assert_eq!((tg.tg_start, tg.tg_end), (1, 2));
        assert_eq!(tg.num_tiles(), 2);
        assert!(!tg.is_last(&grid));

        data[1] = 200;
        assert!(parse_tile_group(&data, &grid).is_err(), "tile 大小超出 OBU 应失败");
    }
}
