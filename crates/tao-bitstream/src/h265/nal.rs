//! H.265/HEVC NAL 单元头部与类型.
//!
//! HEVC NAL 头部为 2 字节:
//! - forbidden_zero_bit (1 bit)
//! - nal_unit_type (6 bits)
//! - nuh_layer_id (6 bits)
//! - nuh_temporal_id_plus1 (3 bits)

use tao_core::{TaoError, TaoResult};

/// HEVC NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HevcNalUnitType {
    /// TRAIL_N
    TrailN,
    /// TRAIL_R
    TrailR,
    /// TSA_N
    TsaN,
    /// TSA_R
    TsaR,
    /// STSA_N
    StsaN,
    /// STSA_R
    StsaR,
    /// RADL_N
    RadlN,
    /// RADL_R
    RadlR,
    /// RASL_N
    RaslN,
    /// RASL_R
    RaslR,
    /// BLA_W_LP
    BlaWLp,
    /// BLA_W_RADL
    BlaWRadl,
    /// BLA_N_LP
    BlaNLp,
    /// IDR_W_RADL
    IdrWRadl,
    /// IDR_N_LP
    IdrNLp,
    /// CRA_NUT
    Cra,
    /// VPS
    Vps,
    /// SPS
    Sps,
    /// PPS
    Pps,
    /// AUD
    Aud,
    /// EOS
    Eos,
    /// EOB
    Eob,
    /// FD
    FillerData,
    /// PREFIX_SEI
    PrefixSei,
    /// SUFFIX_SEI
    SuffixSei,
    /// 聚合单元 (ISO/IEC 14496-15)
    Aggregator,
    /// 提取器 (ISO/IEC 14496-15)
    Extractor,
    /// 保留或未定义类型
    Unknown(u8),
}

impl HevcNalUnitType {
    /// 从类型编号创建
    pub fn from_type_id(id: u8) -> Self {
        match id {
            0 => Self::TrailN,
            1 => Self::TrailR,
            2 => Self::TsaN,
            3 => Self::TsaR,
            4 => Self::StsaN,
            5 => Self::StsaR,
            6 => Self::RadlN,
            7 => Self::RadlR,
            8 => Self::RaslN,
            9 => Self::RaslR,
            16 => Self::BlaWLp,
            17 => Self::BlaWRadl,
            18 => Self::BlaNLp,
            19 => Self::IdrWRadl,
            20 => Self::IdrNLp,
            21 => Self::Cra,
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            35 => Self::Aud,
            36 => Self::Eos,
            37 => Self::Eob,
            38 => Self::FillerData,
            39 => Self::PrefixSei,
            40 => Self::SuffixSei,
            48 => Self::Aggregator,
            49 => Self::Extractor,
            _ => Self::Unknown(id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::TrailN => 0,
            Self::TrailR => 1,
            Self::TsaN => 2,
            Self::TsaR => 3,
            Self::StsaN => 4,
            Self::StsaR => 5,
            Self::RadlN => 6,
            Self::RadlR => 7,
            Self::RaslN => 8,
            Self::RaslR => 9,
            Self::BlaWLp => 16,
            Self::BlaWRadl => 17,
            Self::BlaNLp => 18,
            Self::IdrWRadl => 19,
            Self::IdrNLp => 20,
            Self::Cra => 21,
            Self::Vps => 32,
            Self::Sps => 33,
            Self::Pps => 34,
            Self::Aud => 35,
            Self::Eos => 36,
            Self::Eob => 37,
            Self::FillerData => 38,
            Self::PrefixSei => 39,
            Self::SuffixSei => 40,
            Self::Aggregator => 48,
            Self::Extractor => 49,
            Self::Unknown(id) => *id,
        }
    }

    /// 检查报告中使用的类型名称, 未知类型返回 None
    pub fn name(&self) -> Option<&'static str> {
        let name = match self {
            Self::TrailN => "TRAIL_N slice segment",
            Self::TrailR => "TRAIL_R slice segment",
            Self::TsaN => "TSA_N slice segment",
            Self::TsaR => "TSA_R slice segment",
            Self::StsaN => "STSA_N slice segment",
            Self::StsaR => "STSA_R slice segment",
            Self::RadlN => "RADL_N slice segment",
            Self::RadlR => "RADL_R slice segment",
            Self::RaslN => "RASL_N slice segment",
            Self::RaslR => "RASL_R slice segment",
            Self::BlaWLp => "Broken link access slice (W LP)",
            Self::BlaWRadl => "Broken link access slice (W DLP)",
            Self::BlaNLp => "Broken link access slice (N LP)",
            Self::IdrWRadl => "IDR slice (W DLP)",
            Self::IdrNLp => "IDR slice (N LP)",
            Self::Cra => "CRA slice",
            Self::Vps => "Video Parameter Set",
            Self::Sps => "Sequence Parameter Set",
            Self::Pps => "Picture Parameter Set",
            Self::Aud => "AU Delimiter",
            Self::Eos => "End of Sequence",
            Self::Eob => "End of Stream",
            Self::FillerData => "Filler Data",
            Self::PrefixSei => "SEI Prefix",
            Self::SuffixSei => "SEI Suffix",
            Self::Aggregator => "HEVCAggregator",
            Self::Extractor => "HEVCExtractor",
            Self::Unknown(_) => return None,
        };
        Some(name)
    }

    /// 是否为 VCL NAL (含保留 VCL 类型)
    pub fn is_vcl(&self) -> bool {
        self.type_id() < 32
    }

    /// 是否为 IRAP
    pub fn is_irap(&self) -> bool {
        matches!(self.type_id(), 16..=23)
    }

    /// 是否为 IDR
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::IdrWRadl | Self::IdrNLp)
    }

    /// 是否为 BLA
    pub fn is_bla(&self) -> bool {
        matches!(self, Self::BlaWLp | Self::BlaWRadl | Self::BlaNLp)
    }

    /// 是否为 RASL / RADL 前导图像
    pub fn is_leading(&self) -> bool {
        matches!(self, Self::RadlN | Self::RadlR | Self::RaslN | Self::RaslR)
    }

    /// 是否为子层非参考图像 (类型 0-14 中的偶数)
    pub fn is_sub_layer_non_ref(&self) -> bool {
        let id = self.type_id();
        id <= 14 && id % 2 == 0
    }
}

/// HEVC NAL 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    /// NAL 类型
    pub nal_type: HevcNalUnitType,
    /// nuh_layer_id
    pub layer_id: u8,
    /// TemporalId (nuh_temporal_id_plus1 - 1)
    pub temporal_id: u8,
}

impl NalHeader {
    /// 从 NAL 数据 (含 2 字节头) 解析头部
    pub fn parse(data: &[u8]) -> TaoResult<Self> {
        if data.len() < 2 {
            return Err(TaoError::InvalidData(format!(
                "HEVC: NAL 数据太短, len={}",
                data.len()
            )));
        }
        if data[0] & 0x80 != 0 {
            return Err(TaoError::InvalidData("HEVC: forbidden_zero_bit 不为 0".into()));
        }
        let temporal_id_plus1 = data[1] & 0x07;
        if temporal_id_plus1 == 0 {
            return Err(TaoError::InvalidData("HEVC: nuh_temporal_id_plus1 为 0".into()));
        }
        Ok(Self {
            nal_type: HevcNalUnitType::from_type_id((data[0] >> 1) & 0x3F),
            layer_id: ((data[0] & 1) << 5) | (data[1] >> 3),
            temporal_id: temporal_id_plus1 - 1,
        })
    }

    /// 原始类型编号
    pub fn type_id(&self) -> u8 {
        self.nal_type.type_id()
    }
}

/// 构造 2 字节 NAL 头
pub fn build_nal_header(type_id: u8, layer_id: u8, temporal_id: u8) -> [u8; 2] {
    [
        ((type_id & 0x3F) << 1) | ((layer_id >> 5) & 1),
        ((layer_id & 0x1F) << 3) | ((temporal_id + 1) & 0x07),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nal_header_parse() {
        let hdr = NalHeader::parse(&[0x40, 0x01]).unwrap();
        assert_eq!(hdr.nal_type, HevcNalUnitType::Vps);
        assert_eq!(hdr.layer_id, 0);
        assert_eq!(hdr.temporal_id, 0);

        let raw = build_nal_header(1, 33, 2);
        let hdr = NalHeader::parse(&raw).unwrap();
        assert_eq!(hdr.nal_type, HevcNalUnitType::TrailR);
        assert_eq!(hdr.layer_id, 33, "layer_id 跨越两个字节");
        assert_eq!(hdr.temporal_id, 2);
    }

    #[test]
    fn test_nal_header_reject_invalid() {
        assert!(NalHeader::parse(&[0x40]).is_err());
        assert!(NalHeader::parse(&[0xC0, 0x01]).is_err(), "forbidden bit");
        assert!(NalHeader::parse(&[0x40, 0x00]).is_err(), "temporal_id_plus1 为 0");
    }

    #[test]
    fn test_nal_type_names_and_classes() {
        assert_eq!(HevcNalUnitType::from_type_id(17).name(), Some("Broken link access slice (W DLP)"));
        assert_eq!(HevcNalUnitType::from_type_id(49).name(), Some("HEVCExtractor"));
        assert_eq!(HevcNalUnitType::from_type_id(45).name(), None);
        assert!(HevcNalUnitType::RaslN.is_sub_layer_non_ref());
        assert!(!HevcNalUnitType::TrailR.is_sub_layer_non_ref());
        assert!(HevcNalUnitType::Cra.is_irap());
        assert!(!HevcNalUnitType::Cra.is_idr());
        assert_eq!(HevcNalUnitType::from_type_id(44).type_id(), 44);
    }
}
