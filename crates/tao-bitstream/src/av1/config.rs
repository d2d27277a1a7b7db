//! AV1CodecConfigurationRecord (av1C).

use tao_core::{TaoError, TaoResult};

use super::obu::parse_obu_header;

/// av1C 配置记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Av1Config {
    /// version
    pub version: u8,
    /// seq_profile
    pub seq_profile: u8,
    /// seq_level_idx_0
    pub seq_level_idx_0: u8,
    /// seq_tier_0
    pub seq_tier_0: bool,
    /// high_bitdepth
    pub high_bitdepth: bool,
    /// twelve_bit
    pub twelve_bit: bool,
    /// monochrome
    pub monochrome: bool,
    /// chroma_subsampling_x
    pub chroma_subsampling_x: bool,
    /// chroma_subsampling_y
    pub chroma_subsampling_y: bool,
    /// chroma_sample_position
    pub chroma_sample_position: u8,
    /// initial_presentation_delay_minus_one, 未携带时为 None
    pub initial_presentation_delay_minus_one: Option<u8>,
    /// configOBUs, 每项为一个完整 OBU
    pub obus: Vec<Vec<u8>>,
}

/// 解析 av1C
pub fn parse_av1_config(data: &[u8]) -> TaoResult<Av1Config> {
    if data.len() < 4 {
        return Err(TaoError::InvalidData(format!(
            "AV1: av1C 长度不足, len={}",
            data.len()
        )));
    }
    if data[0] & 0x80 == 0 {
        return Err(TaoError::InvalidData("AV1: av1C marker 位不为 1".into()));
    }
    let mut cfg = Av1Config {
        version: data[0] & 0x7F,
        seq_profile: data[1] >> 5,
        seq_level_idx_0: data[1] & 0x1F,
        seq_tier_0: data[2] & 0x80 != 0,
        high_bitdepth: data[2] & 0x40 != 0,
        twelve_bit: data[2] & 0x20 != 0,
        monochrome: data[2] & 0x10 != 0,
        chroma_subsampling_x: data[2] & 0x08 != 0,
        chroma_subsampling_y: data[2] & 0x04 != 0,
        chroma_sample_position: data[2] & 0x03,
        initial_presentation_delay_minus_one: (data[3] & 0x10 != 0).then_some(data[3] & 0x0F),
        obus: Vec::new(),
    };

    let mut rest = &data[4..];
    while !rest.is_empty() {
        let hdr = parse_obu_header(rest)?;
        let size = hdr.obu_size as usize;
        if size > rest.len() {
            return Err(TaoError::InvalidData(format!(
                "AV1: av1C 中的 OBU 被截断, size={}, remain={}",
                size,
                rest.len()
            )));
        }
        cfg.obus.push(rest[..size].to_vec());
        rest = &rest[size..];
    }
    Ok(cfg)
}

/// 构造 av1C (8 位 4:2:0)
pub fn build_av1_config(seq_profile: u8, seq_level_idx_0: u8, obus: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0x81, (seq_profile << 5) | (seq_level_idx_0 & 0x1F), 0x0C, 0x00];
    for obu in obus {
        out.extend_from_slice(obu);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av1::obu::{ObuType, build_obu};

    #[test]
    fn test_av1_config_roundtrip_with_obus() {
        let seq = build_obu(ObuType::SequenceHeader, None, &[1, 2, 3]);
        let meta = build_obu(ObuType::Metadata, None, &[9; 5]);
        let data = build_av1_config(0, 8, &[seq.clone(), meta.clone()]);
        let cfg = parse_av1_config(&data).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.seq_level_idx_0, 8);
        assert!(cfg.chroma_subsampling_x && cfg.chroma_subsampling_y);
        assert_eq!(cfg.initial_presentation_delay_minus_one, None);
        assert_eq!(cfg.obus, vec![seq, meta]);
    }

    #[test]
    fn test_av1_config_errors() {
        assert!(parse_av1_config(&[0x81, 0, 0]).is_err(), "长度不足");
        assert!(parse_av1_config(&[0x01, 0, 0, 0]).is_err(), "marker 位错误");
        let mut data = build_av1_config(0, 8, &[build_obu(ObuType::SequenceHeader, None, &[0; 8])]);
        data.truncate(data.len() - 2);
        assert!(parse_av1_config(&data).is_err(), "截断的 OBU");
    }
}
