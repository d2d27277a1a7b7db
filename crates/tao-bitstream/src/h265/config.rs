//! HEVCDecoderConfigurationRecord (hvcC) 与 LHEVCDecoderConfigurationRecord (lhvC).
//!
//! 两种记录的参数集数组布局相同, 只有固定头部不同:
//! - hvcC: 22 字节头部 + numOfArrays
//! - lhvC: 5 字节头部 + numOfArrays

use tao_core::{TaoError, TaoResult};

const HVCC_HEADER_LEN: usize = 22;
const LHVC_HEADER_LEN: usize = 5;

/// 参数集数组 (按 NAL 类型分组)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamArray {
    /// array_completeness
    pub completeness: bool,
    /// NAL_unit_type
    pub nal_type: u8,
    /// NAL 单元 (含 2 字节头)
    pub nalus: Vec<Vec<u8>>,
}

/// 解析后的 hvcC / lhvC
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HevcDecoderConfig {
    /// configurationVersion
    pub version: u8,
    /// 是否为 lhvC (分层扩展记录)
    pub is_lhvc: bool,
    /// general_profile_space (仅 hvcC)
    pub profile_space: u8,
    /// general_tier_flag (仅 hvcC)
    pub tier_flag: bool,
    /// general_profile_idc (仅 hvcC)
    pub profile_idc: u8,
    /// general_profile_compatibility_flags (仅 hvcC)
    pub profile_compatibility: u32,
    /// general_constraint_indicator_flags, 48 位 (仅 hvcC)
    pub constraint_indicator: u64,
    /// general_level_idc (仅 hvcC)
    pub level_idc: u8,
    /// min_spatial_segmentation_idc
    pub min_spatial_segmentation_idc: u16,
    /// parallelismType
    pub parallelism_type: u8,
    /// chromaFormat (仅 hvcC)
    pub chroma_format: u8,
    /// bitDepthLumaMinus8 (仅 hvcC)
    pub bit_depth_luma_minus8: u8,
    /// bitDepthChromaMinus8 (仅 hvcC)
    pub bit_depth_chroma_minus8: u8,
    /// avgFrameRate (仅 hvcC)
    pub avg_frame_rate: u16,
    /// constantFrameRate (仅 hvcC)
    pub constant_frame_rate: u8,
    /// numTemporalLayers
    pub num_temporal_layers: u8,
    /// temporalIdNested
    pub temporal_id_nested: bool,
    /// NAL 长度前缀大小 (1-4 字节)
    pub length_size: usize,
    /// 参数集数组
    pub arrays: Vec<ParamArray>,
}

impl HevcDecoderConfig {
    /// 按数组顺序遍历所有参数集, 返回 (NAL 类型, NAL 数据)
    pub fn param_sets(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.arrays
            .iter()
            .flat_map(|a| a.nalus.iter().map(move |n| (a.nal_type, n.as_slice())))
    }
}

fn read_u16(data: &[u8], pos: usize, label: &str) -> TaoResult<u16> {
    data.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| TaoError::InvalidData(format!("HEVC: 解码配置 {} 截断, pos={}", label, pos)))
}

/// 解析 hvcC (`is_lhvc = false`) 或 lhvC (`is_lhvc = true`) 内容
pub fn parse_hevc_config(data: &[u8], is_lhvc: bool) -> TaoResult<HevcDecoderConfig> {
    let header_len = if is_lhvc { LHVC_HEADER_LEN } else { HVCC_HEADER_LEN };
    if data.len() < header_len + 1 {
        return Err(TaoError::InvalidData(format!(
            "HEVC: 解码配置数据太短, len={}, lhvc={}",
            data.len(),
            is_lhvc
        )));
    }

    let mut cfg = HevcDecoderConfig {
        version: data[0],
        is_lhvc,
        ..Default::default()
    };

    let tail = if is_lhvc {
        cfg.min_spatial_segmentation_idc = u16::from_be_bytes([data[1], data[2]]) & 0x0FFF;
        cfg.parallelism_type = data[3] & 0x03;
        data[4]
    } else {
        cfg.profile_space = data[1] >> 6;
        cfg.tier_flag = data[1] & 0x20 != 0;
        cfg.profile_idc = data[1] & 0x1F;
        cfg.profile_compatibility = u32::from_be_bytes([data[2], data[3], data[4], data[5]]);
        cfg.constraint_indicator = data[6..12]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        cfg.level_idc = data[12];
        cfg.min_spatial_segmentation_idc = u16::from_be_bytes([data[13], data[14]]) & 0x0FFF;
        cfg.parallelism_type = data[15] & 0x03;
        cfg.chroma_format = data[16] & 0x03;
        cfg.bit_depth_luma_minus8 = data[17] & 0x07;
        cfg.bit_depth_chroma_minus8 = data[18] & 0x07;
        cfg.avg_frame_rate = u16::from_be_bytes([data[19], data[20]]);
        cfg.constant_frame_rate = data[21] >> 6;
        data[21]
    };
    cfg.num_temporal_layers = (tail >> 3) & 0x07;
    cfg.temporal_id_nested = tail & 0x04 != 0;
    cfg.length_size = usize::from(tail & 0x03) + 1;

    let num_arrays = data[header_len];
    let mut pos = header_len + 1;
    for i in 0..num_arrays {
        let head = *data.get(pos).ok_or_else(|| {
            TaoError::InvalidData(format!("HEVC: 解码配置参数集数组截断, index={}", i))
        })?;
        pos += 1;
        let num_nalus = read_u16(data, pos, "numNalus")?;
        pos += 2;

        let mut array = ParamArray {
            completeness: head & 0x80 != 0,
            nal_type: head & 0x3F,
            nalus: Vec::with_capacity(usize::from(num_nalus)),
        };
        for j in 0..num_nalus {
            let len = usize::from(read_u16(data, pos, "nalUnitLength")?);
            pos += 2;
            let nal = data.get(pos..pos + len).ok_or_else(|| {
                TaoError::InvalidData(format!(
                    "HEVC: 解码配置 NAL 数据截断, type={}, index={}, declared_len={}, remain={}",
                    array.nal_type,
                    j,
                    len,
                    data.len().saturating_sub(pos)
                ))
            })?;
            array.nalus.push(nal.to_vec());
            pos += len;
        }
        cfg.arrays.push(array);
    }

    Ok(cfg)
}

/// 构建 hvcC 内容
///
/// profile / tier / level 取自首个 SPS 的 profile_tier_level 头部字节.
pub fn build_hevc_config(arrays: &[ParamArray], length_size: usize) -> TaoResult<Vec<u8>> {
    if !(1..=4).contains(&length_size) {
        return Err(TaoError::InvalidArgument(format!(
            "HEVC: length_size 非法, value={}",
            length_size
        )));
    }
    // SPS NAL 头 (2) + vps_id/max_sub_layers/nesting (1) + general PTL (12)
    let ptl = arrays
        .iter()
        .filter(|a| a.nal_type == 33)
        .flat_map(|a| a.nalus.first())
        .next()
        .and_then(|sps| sps.get(3..15));

    let mut out = vec![1];
    match ptl {
        Some(ptl) => out.extend_from_slice(ptl),
        None => out.extend_from_slice(&[0; 12]),
    }
    out.extend_from_slice(&[0xF0, 0x00, 0xFC, 0xFD, 0xF8, 0xF8, 0x00, 0x00]);
    out.push(0x0C | (length_size as u8 - 1));
    out.push(arrays.len() as u8);
    for array in arrays {
        out.push((u8::from(array.completeness) << 7) | (array.nal_type & 0x3F));
        out.extend_from_slice(&(array.nalus.len() as u16).to_be_bytes());
        for nal in &array.nalus {
            out.extend_from_slice(&(nal.len() as u16).to_be_bytes());
            out.extend_from_slice(nal);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_arrays() -> Vec<ParamArray> {
        vec![
            ParamArray {
                completeness: true,
                nal_type: 32,
                nalus: vec![vec![0x40, 0x01, 0x0C]],
            },
            ParamArray {
                completeness: true,
                nal_type: 33,
                nalus: vec![vec![
                    0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x00, 0x90, 0x00, 0x00, 0x00, 0x00,
                    0x00, 0x5D, 0xA0,
                ]],
            },
            ParamArray {
                completeness: false,
                nal_type: 34,
                nalus: vec![vec![0x44, 0x01, 0xC1], vec![0x44, 0x01, 0xC2]],
            },
        ]
    }

    #[test]
    fn test_hvcc_build_and_parse() {
        let data = build_hevc_config(&sample_arrays(), 4).unwrap();
        let cfg = parse_hevc_config(&data, false).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.profile_idc, 1);
        assert_eq!(cfg.profile_compatibility, 0x6000_0000);
        assert_eq!(cfg.level_idc, 0x5D);
        assert_eq!(cfg.length_size, 4);
        assert_eq!(cfg.chroma_format, 1);
        assert_eq!(cfg.arrays, sample_arrays());

        let types: Vec<u8> = cfg.param_sets().map(|(t, _)| t).collect();
        assert_eq!(types, vec![32, 33, 34, 34]);
    }

    #[test]
    fn test_lhvc_parse() {
        let data = [
            1, 0xF0, 0x00, 0xFC, 0x0D, // length_size = 2
            1, 0xA1, 0x00, 0x01, 0x00, 0x03, 0x42, 0x09, 0x01,
        ];
        let cfg = parse_hevc_config(&data, true).unwrap();
        assert!(cfg.is_lhvc);
        assert_eq!(cfg.length_size, 2);
        assert_eq!(cfg.num_temporal_layers, 1);
        assert_eq!(cfg.arrays.len(), 1);
        assert_eq!(cfg.arrays[0].nal_type, 33);
        assert_eq!(cfg.arrays[0].nalus[0], vec![0x42, 0x09, 0x01]);
    }

    #[test]
    fn test_hvcc_reject_truncated_nal() {
        let mut data = build_hevc_config(&sample_arrays(), 4).unwrap();
        data.truncate(data.len() - 1);
        let err = parse_hevc_config(&data, false).expect_err("截断的 NAL 应失败");
        assert!(format!("{err}").contains("NAL 数据截断"), "错误信息不匹配: {err}");
    }

    #[test]
    fn test_hvcc_reject_bad_length_size() {
        assert!(build_hevc_config(&sample_arrays(), 0).is_err());
    }
}
