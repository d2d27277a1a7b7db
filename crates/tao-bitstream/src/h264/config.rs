//! AVCDecoderConfigurationRecord (avcC) 与 SVCDecoderConfigurationRecord (svcC) 读取.
//!
//! ```text
//! configurationVersion(8) profile(8) compat(8) level(8)
//! reserved(6) lengthSizeMinusOne(2)          (svcC: complete_representation(1) reserved(5) ...)
//! reserved(3) numOfSequenceParameterSets(5)  { length(16) sps }
//! numOfPictureParameterSets(8)               { length(16) pps }
//! [High profile 扩展: chroma_format, bit depths, numOfSequenceParameterSetExt { length(16) spsext }]
//! ```

use tao_core::{TaoError, TaoResult};

/// 解析后的 AVC/SVC 解码配置记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvcDecoderConfig {
    /// configurationVersion
    pub version: u8,
    /// AVCProfileIndication
    pub profile_idc: u8,
    /// profile_compatibility
    pub profile_compat: u8,
    /// AVCLevelIndication
    pub level_idc: u8,
    /// NAL 长度前缀大小 (1-4 字节)
    pub length_size: usize,
    /// svcC complete_representation 标志
    pub complete_representation: bool,
    /// SPS 列表
    pub sps_list: Vec<Vec<u8>>,
    /// PPS 列表
    pub pps_list: Vec<Vec<u8>>,
    /// SPS 扩展列表 (仅 High profile avcC)
    pub sps_ext_list: Vec<Vec<u8>>,
    /// chroma_format (仅 High profile avcC)
    pub chroma_format: Option<u8>,
    /// bit_depth_luma_minus8 (仅 High profile avcC)
    pub bit_depth_luma_minus8: Option<u8>,
    /// bit_depth_chroma_minus8 (仅 High profile avcC)
    pub bit_depth_chroma_minus8: Option<u8>,
}

/// 读取带 16 位长度前缀的参数集列表
fn read_ps_list(data: &[u8], pos: &mut usize, count: usize, label: &str) -> TaoResult<Vec<Vec<u8>>> {
    let mut list = Vec::with_capacity(count);
    for i in 0..count {
        if *pos + 2 > data.len() {
            return Err(TaoError::InvalidData(format!(
                "H.264: 解码配置 {} 长度字段截断, index={}",
                label, i
            )));
        }
        let len = usize::from(u16::from_be_bytes([data[*pos], data[*pos + 1]]));
        *pos += 2;
        if *pos + len > data.len() {
            return Err(TaoError::InvalidData(format!(
                "H.264: 解码配置 {} 数据截断, index={}, declared_len={}, remain={}",
                label,
                i,
                len,
                data.len().saturating_sub(*pos)
            )));
        }
        list.push(data[*pos..*pos + len].to_vec());
        *pos += len;
    }
    Ok(list)
}

/// 解析 avcC (`is_svc = false`) 或 svcC (`is_svc = true`) 内容
pub fn parse_avc_config(data: &[u8], is_svc: bool) -> TaoResult<AvcDecoderConfig> {
    if data.len() < 6 {
        return Err(TaoError::InvalidData(format!(
            "H.264: 解码配置数据太短, len={}",
            data.len()
        )));
    }

    let mut cfg = AvcDecoderConfig {
        version: data[0],
        profile_idc: data[1],
        profile_compat: data[2],
        level_idc: data[3],
        length_size: usize::from(data[4] & 0x03) + 1,
        complete_representation: is_svc && (data[4] & 0x80) != 0,
        ..Default::default()
    };

    let num_sps = usize::from(data[5] & 0x1F);
    let mut pos = 6;
    cfg.sps_list = read_ps_list(data, &mut pos, num_sps, "SPS")?;

    if pos >= data.len() {
        return Err(TaoError::InvalidData(
            "H.264: 解码配置缺少 numOfPictureParameterSets 字段".into(),
        ));
    }
    let num_pps = usize::from(data[pos]);
    pos += 1;
    cfg.pps_list = read_ps_list(data, &mut pos, num_pps, "PPS")?;

    // High profile 扩展字段, 部分封装器会省略
    if !is_svc && matches!(cfg.profile_idc, 100 | 110 | 122 | 144) && pos + 4 <= data.len() {
        cfg.chroma_format = Some(data[pos] & 0x03);
        cfg.bit_depth_luma_minus8 = Some(data[pos + 1] & 0x07);
        cfg.bit_depth_chroma_minus8 = Some(data[pos + 2] & 0x07);
        let num_ext = usize::from(data[pos + 3]);
        pos += 4;
        cfg.sps_ext_list = read_ps_list(data, &mut pos, num_ext, "SPSExt")?;
    }

    Ok(cfg)
}

/// 构建 avcC 内容
///
/// profile / level 取自首个 SPS (NAL 头之后的 3 个字节).
pub fn build_avc_config(
    sps_list: &[Vec<u8>],
    pps_list: &[Vec<u8>],
    length_size: usize,
) -> TaoResult<Vec<u8>> {
    let sps0 = sps_list
        .first()
        .ok_or_else(|| TaoError::InvalidArgument("H.264: 构建 avcC 需要至少一个 SPS".into()))?;
    if sps0.len() < 4 {
        return Err(TaoError::InvalidData("H.264: SPS 数据太短".into()));
    }
    if !(1..=4).contains(&length_size) {
        return Err(TaoError::InvalidArgument(format!(
            "H.264: length_size 非法, value={}",
            length_size
        )));
    }

    let mut out = vec![
        1,
        sps0[1],
        sps0[2],
        sps0[3],
        0xFC | ((length_size as u8) - 1),
        0xE0 | (sps_list.len() as u8 & 0x1F),
    ];
    for sps in sps_list {
        out.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        out.extend_from_slice(sps);
    }
    out.push(pps_list.len() as u8);
    for pps in pps_list {
        out.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        out.extend_from_slice(pps);
    }

    Ok(out)
}
