//! AV1 序列头 OBU (5.5).

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

/// seq_force_screen_content_tools / seq_force_integer_mv 的 "由帧决定" 取值
pub const SELECT_SCREEN_CONTENT_TOOLS: u32 = 2;
/// 见 [`SELECT_SCREEN_CONTENT_TOOLS`]
pub const SELECT_INTEGER_MV: u32 = 2;

/// 操作点
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatingPoint {
    /// operating_point_idc
    pub idc: u32,
    /// seq_level_idx
    pub seq_level_idx: u8,
    /// seq_tier
    pub seq_tier: u8,
    /// decoder_model_present_for_this_op
    pub decoder_model_present: bool,
}

/// 颜色配置 (5.5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorConfig {
    /// BitDepth
    pub bit_depth: u8,
    /// mono_chrome
    pub mono_chrome: bool,
    /// color_description_present_flag
    pub color_description_present_flag: bool,
    /// color_primaries
    pub color_primaries: u8,
    /// transfer_characteristics
    pub transfer_characteristics: u8,
    /// matrix_coefficients
    pub matrix_coefficients: u8,
    /// color_range
    pub color_range: bool,
    /// subsampling_x
    pub subsampling_x: bool,
    /// subsampling_y
    pub subsampling_y: bool,
    /// chroma_sample_position
    pub chroma_sample_position: u8,
    /// separate_uv_delta_q
    pub separate_uv_delta_q: bool,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            bit_depth: 8,
            mono_chrome: false,
            color_description_present_flag: false,
            color_primaries: 2,
            transfer_characteristics: 2,
            matrix_coefficients: 2,
            color_range: false,
            subsampling_x: true,
            subsampling_y: true,
            chroma_sample_position: 0,
            separate_uv_delta_q: false,
        }
    }
}

impl ColorConfig {
    /// NumPlanes
    pub fn num_planes(&self) -> u32 {
        if self.mono_chrome { 1 } else { 3 }
    }
}

/// 序列头
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceHeader {
    /// seq_profile
    pub seq_profile: u8,
    /// still_picture
    pub still_picture: bool,
    /// reduced_still_picture_header
    pub reduced_still_picture_header: bool,
    /// timing_info_present_flag
    pub timing_info_present_flag: bool,
    /// equal_picture_interval
    pub equal_picture_interval: bool,
    /// decoder_model_info_present_flag
    pub decoder_model_info_present_flag: bool,
    /// buffer_removal_time_length_minus_1
    pub buffer_removal_time_length_minus_1: u8,
    /// frame_presentation_time_length_minus_1
    pub frame_presentation_time_length_minus_1: u8,
    /// 操作点列表
    pub operating_points: Vec<OperatingPoint>,
    /// frame_width_bits_minus_1
    pub frame_width_bits_minus_1: u8,
    /// frame_height_bits_minus_1
    pub frame_height_bits_minus_1: u8,
    /// max_frame_width_minus_1 + 1
    pub max_frame_width: u32,
    /// max_frame_height_minus_1 + 1
    pub max_frame_height: u32,
    /// frame_id_numbers_present_flag
    pub frame_id_numbers_present_flag: bool,
    /// delta_frame_id_length_minus_2
    pub delta_frame_id_length_minus_2: u8,
    /// additional_frame_id_length_minus_1
    pub additional_frame_id_length_minus_1: u8,
    /// use_128x128_superblock
    pub use_128x128_superblock: bool,
    /// enable_filter_intra
    pub enable_filter_intra: bool,
    /// enable_intra_edge_filter
    pub enable_intra_edge_filter: bool,
    /// enable_interintra_compound
    pub enable_interintra_compound: bool,
    /// enable_masked_compound
    pub enable_masked_compound: bool,
    /// enable_warped_motion
    pub enable_warped_motion: bool,
    /// enable_dual_filter
    pub enable_dual_filter: bool,
    /// enable_order_hint
    pub enable_order_hint: bool,
    /// enable_jnt_comp
    pub enable_jnt_comp: bool,
    /// enable_ref_frame_mvs
    pub enable_ref_frame_mvs: bool,
    /// seq_force_screen_content_tools
    pub seq_force_screen_content_tools: u32,
    /// seq_force_integer_mv
    pub seq_force_integer_mv: u32,
    /// OrderHintBits
    pub order_hint_bits: u32,
    /// enable_superres
    pub enable_superres: bool,
    /// enable_cdef
    pub enable_cdef: bool,
    /// enable_restoration
    pub enable_restoration: bool,
    /// color_config
    pub color: ColorConfig,
    /// film_grain_params_present
    pub film_grain_params_present: bool,
}

impl SequenceHeader {
    /// 首个操作点的 operating_point_idc
    pub fn operating_point_idc(&self) -> u32 {
        self.operating_points.first().map_or(0, |op| op.idc)
    }

    /// 首个操作点的 seq_level_idx
    pub fn level(&self) -> u8 {
        self.operating_points.first().map_or(0, |op| op.seq_level_idx)
    }

    /// idLen, 未启用帧 ID 时为 0
    pub fn frame_id_length(&self) -> u32 {
        if self.frame_id_numbers_present_flag {
            u32::from(self.additional_frame_id_length_minus_1)
                + u32::from(self.delta_frame_id_length_minus_2)
                + 3
        } else {
            0
        }
    }
}

/// 解析序列头 OBU 载荷
pub fn parse_sequence_header(payload: &[u8]) -> TaoResult<SequenceHeader> {
    let mut br = BitReader::new(payload);
    let mut seq = SequenceHeader {
        seq_profile: br.read_bits(3)? as u8,
        still_picture: br.read_flag()?,
        reduced_still_picture_header: br.read_flag()?,
        ..Default::default()
    };
    if seq.seq_profile > 2 {
        return Err(TaoError::InvalidData(format!(
            "AV1: seq_profile 超出范围, value={}",
            seq.seq_profile
        )));
    }

    if seq.reduced_still_picture_header {
        seq.operating_points.push(OperatingPoint {
            seq_level_idx: br.read_bits(5)? as u8,
            ..Default::default()
        });
    } else {
        let mut buffer_delay_length_minus_1 = 0;
        seq.timing_info_present_flag = br.read_flag()?;
        if seq.timing_info_present_flag {
            br.skip_bits(32)?; // num_units_in_display_tick
            br.skip_bits(32)?; // time_scale
            seq.equal_picture_interval = br.read_flag()?;
            if seq.equal_picture_interval {
                br.read_uvlc()?; // num_ticks_per_picture_minus_1
            }
            seq.decoder_model_info_present_flag = br.read_flag()?;
            if seq.decoder_model_info_present_flag {
                buffer_delay_length_minus_1 = br.read_bits(5)?;
                br.skip_bits(32)?; // num_units_in_decoding_tick
                seq.buffer_removal_time_length_minus_1 = br.read_bits(5)? as u8;
                seq.frame_presentation_time_length_minus_1 = br.read_bits(5)? as u8;
            }
        }
        let initial_display_delay_present = br.read_flag()?;
        let count = br.read_bits(5)? + 1;
        for _ in 0..count {
            let mut op = OperatingPoint {
                idc: br.read_bits(12)?,
                seq_level_idx: br.read_bits(5)? as u8,
                ..Default::default()
            };
            if op.seq_level_idx > 7 {
                op.seq_tier = br.read_bits(1)? as u8;
            }
            if seq.decoder_model_info_present_flag {
                op.decoder_model_present = br.read_flag()?;
                if op.decoder_model_present {
                    let n = buffer_delay_length_minus_1 + 1;
                    br.skip_bits(n)?; // decoder_buffer_delay
                    br.skip_bits(n)?; // encoder_buffer_delay
                    br.skip_bits(1)?; // low_delay_mode_flag
                }
            }
            if initial_display_delay_present && br.read_flag()? {
                br.skip_bits(4)?; // initial_display_delay_minus_1
            }
            seq.operating_points.push(op);
        }
    }

    seq.frame_width_bits_minus_1 = br.read_bits(4)? as u8;
    seq.frame_height_bits_minus_1 = br.read_bits(4)? as u8;
    seq.max_frame_width = br.read_bits(u32::from(seq.frame_width_bits_minus_1) + 1)? + 1;
    seq.max_frame_height = br.read_bits(u32::from(seq.frame_height_bits_minus_1) + 1)? + 1;
    if !seq.reduced_still_picture_header {
        seq.frame_id_numbers_present_flag = br.read_flag()?;
    }
    if seq.frame_id_numbers_present_flag {
        seq.delta_frame_id_length_minus_2 = br.read_bits(4)? as u8;
        seq.additional_frame_id_length_minus_1 = br.read_bits(3)? as u8;
        if seq.frame_id_length() > 16 {
            return Err(TaoError::InvalidData(format!(
                "AV1: frame_id 长度超出范围, value={}",
                seq.frame_id_length()
            )));
        }
    }

    seq.use_128x128_superblock = br.read_flag()?;
    seq.enable_filter_intra = br.read_flag()?;
    seq.enable_intra_edge_filter = br.read_flag()?;
    if seq.reduced_still_picture_header {
        seq.seq_force_screen_content_tools = SELECT_SCREEN_CONTENT_TOOLS;
        seq.seq_force_integer_mv = SELECT_INTEGER_MV;
    } else {
        seq.enable_interintra_compound = br.read_flag()?;
        seq.enable_masked_compound = br.read_flag()?;
        seq.enable_warped_motion = br.read_flag()?;
        seq.enable_dual_filter = br.read_flag()?;
        seq.enable_order_hint = br.read_flag()?;
        if seq.enable_order_hint {
            seq.enable_jnt_comp = br.read_flag()?;
            seq.enable_ref_frame_mvs = br.read_flag()?;
        }
        seq.seq_force_screen_content_tools = if br.read_flag()? {
            SELECT_SCREEN_CONTENT_TOOLS
        } else {
            br.read_bit()?
        };
        seq.seq_force_integer_mv = if seq.seq_force_screen_content_tools > 0 {
            if br.read_flag()? {
                SELECT_INTEGER_MV
            } else {
                br.read_bit()?
            }
        } else {
            SELECT_INTEGER_MV
        };
        if seq.enable_order_hint {
            seq.order_hint_bits = br.read_bits(3)? + 1;
        }
    }

    seq.enable_superres = br.read_flag()?;
    seq.enable_cdef = br.read_flag()?;
    seq.enable_restoration = br.read_flag()?;
    seq.color = parse_color_config(&mut br, seq.seq_profile)?;
    seq.film_grain_params_present = br.read_flag()?;
    Ok(seq)
}

fn parse_color_config(br: &mut BitReader, seq_profile: u8) -> TaoResult<ColorConfig> {
    let mut cc = ColorConfig::default();
    let high_bitdepth = br.read_flag()?;
    cc.bit_depth = if seq_profile == 2 && high_bitdepth {
        if br.read_flag()? { 12 } else { 10 }
    } else if high_bitdepth {
        10
    } else {
        8
    };
    cc.mono_chrome = seq_profile != 1 && br.read_flag()?;

    cc.color_description_present_flag = br.read_flag()?;
    if cc.color_description_present_flag {
        cc.color_primaries = br.read_bits(8)? as u8;
        cc.transfer_characteristics = br.read_bits(8)? as u8;
        cc.matrix_coefficients = br.read_bits(8)? as u8;
    }

    if cc.mono_chrome {
        cc.color_range = br.read_flag()?;
        return Ok(cc);
    }
    // BT.709 + sRGB + Identity
    if cc.color_primaries == 1 && cc.transfer_characteristics == 13 && cc.matrix_coefficients == 0 {
        cc.color_range = true;
        cc.subsampling_x = false;
        cc.subsampling_y = false;
    } else {
        cc.color_range = br.read_flag()?;
        match seq_profile {
            0 => {}
            1 => {
                cc.subsampling_x = false;
                cc.subsampling_y = false;
            }
            _ if cc.bit_depth == 12 => {
                cc.subsampling_x = br.read_flag()?;
                cc.subsampling_y = cc.subsampling_x && br.read_flag()?;
            }
            _ => cc.subsampling_y = false,
        }
        if cc.subsampling_x && cc.subsampling_y {
            cc.chroma_sample_position = br.read_bits(2)? as u8;
        }
    }
    cc.separate_uv_delta_q = br.read_flag()?;
    Ok(cc)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tao_core::bitwriter::BitWriter;

    /// 测试用序列头描述
    #[derive(Clone)]
    pub(crate) struct SeqSpec {
        pub width: u32,
        pub height: u32,
        pub reduced_still: bool,
        pub frame_ids: bool,
        pub superblock_128: bool,
        pub order_hint_bits: u32,
        pub colour: Option<(u8, u8, u8)>,
        pub film_grain: bool,
    }

    impl Default for SeqSpec {
        fn default() -> Self {
            Self {
                width: 1920,
                height: 1080,
                reduced_still: false,
                frame_ids: false,
                superblock_128: false,
                order_hint_bits: 7,
                colour: None,
                film_grain: false,
            }
        }
    }

    /// 构造序列头载荷 (profile 0, level 8, 8 位 4:2:0)
    pub(crate) fn build_sequence_header(spec: &SeqSpec) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 3);
        bw.write_flag(spec.reduced_still);
        bw.write_flag(spec.reduced_still);
        if spec.reduced_still {
            bw.write_bits(8, 5);
        } else {
            bw.write_bit(0); // timing_info_present_flag
            bw.write_bit(0); // initial_display_delay_present_flag
            bw.write_bits(0, 5);
            bw.write_bits(0, 12);
            bw.write_bits(8, 5);
            bw.write_bit(0); // seq_tier
        }
        bw.write_bits(15, 4);
        bw.write_bits(15, 4);
        bw.write_bits(spec.width - 1, 16);
        bw.write_bits(spec.height - 1, 16);
        if !spec.reduced_still {
            bw.write_flag(spec.frame_ids);
            if spec.frame_ids {
                bw.write_bits(5, 4);
                bw.write_bits(2, 3);
            }
        }
        bw.write_flag(spec.superblock_128);
        bw.write_bit(1);
        bw.write_bit(1);
        if !spec.reduced_still {
            bw.write_bits(0, 4); // interintra / masked / warped / dual_filter
            bw.write_flag(spec.order_hint_bits > 0);
            if spec.order_hint_bits > 0 {
                bw.write_bit(1);
                bw.write_bit(1);
            }
            bw.write_bit(1); // seq_choose_screen_content_tools
            bw.write_bit(1); // seq_choose_integer_mv
            if spec.order_hint_bits > 0 {
                bw.write_bits(spec.order_hint_bits - 1, 3);
            }
        }
        bw.write_bit(0); // enable_superres
        bw.write_bit(1); // enable_cdef
        bw.write_bit(1); // enable_restoration
        bw.write_bit(0); // high_bitdepth
        bw.write_bit(0); // mono_chrome
        match spec.colour {
            Some((p, t, m)) => {
                bw.write_bit(1);
                bw.write_bits(u32::from(p), 8);
                bw.write_bits(u32::from(t), 8);
                bw.write_bits(u32::from(m), 8);
            }
            None => bw.write_bit(0),
        }
        bw.write_bit(1); // color_range
        bw.write_bits(0, 2);
        bw.write_bit(0); // separate_uv_delta_q
        bw.write_flag(spec.film_grain);
        bw.write_bit(1);
        bw.finish()
    }

    #[test]
    fn test_sequence_header_basic() {
        let seq = parse_sequence_header(&build_sequence_header(&SeqSpec {
            colour: Some((9, 16, 9)),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(seq.seq_profile, 0);
        assert_eq!((seq.max_frame_width, seq.max_frame_height), (1920, 1080));
        assert_eq!(seq.level(), 8);
        assert_eq!(seq.operating_point_idc(), 0);
        assert_eq!(seq.color.bit_depth, 8);
        assert!(seq.color.color_range);
        assert!(seq.color.color_description_present_flag);
        assert_eq!(seq.color.transfer_characteristics, 16);
        assert_eq!(seq.order_hint_bits, 7);
        assert_eq!(seq.seq_force_screen_content_tools, SELECT_SCREEN_CONTENT_TOOLS);
        assert!(seq.enable_cdef && seq.enable_restoration);
    }

    #[test]
    fn test_sequence_header_reduced_still_picture() {
        let seq = parse_sequence_header(&build_sequence_header(&SeqSpec {
            reduced_still: true,
            width: 640,
            height: 480,
            ..Default::default()
        }))
        .unwrap();
        assert!(seq.still_picture && seq.reduced_still_picture_header);
        assert_eq!(seq.operating_points.len(), 1);
        assert_eq!(seq.order_hint_bits, 0);
        assert!(!seq.frame_id_numbers_present_flag);
        assert_eq!(seq.max_frame_width, 640);
    }

    #[test]
    fn test_sequence_header_frame_ids() {
        let seq = parse_sequence_header(&build_sequence_header(&SeqSpec {
            frame_ids: true,
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(seq.delta_frame_id_length_minus_2, 5);
        assert_eq!(seq.frame_id_length(), 10);
    }

    #[test]
    fn test_sequence_header_truncated() {
        let data = build_sequence_header(&SeqSpec::default());
        assert!(parse_sequence_header(&data[..4]).is_err(), "截断的序列头应失败");
    }
}
