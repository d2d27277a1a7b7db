//! AV1 OBU 头部 (5.3).

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

/// OBU 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObuType {
    /// OBU_SEQUENCE_HEADER (1)
    SequenceHeader,
    /// OBU_TEMPORAL_DELIMITER (2)
    TemporalDelimiter,
    /// OBU_FRAME_HEADER (3)
    FrameHeader,
    /// OBU_TILE_GROUP (4)
    TileGroup,
    /// OBU_METADATA (5)
    Metadata,
    /// OBU_FRAME (6)
    Frame,
    /// OBU_REDUNDANT_FRAME_HEADER (7)
    RedundantFrameHeader,
    /// OBU_TILE_LIST (8)
    TileList,
    /// OBU_PADDING (15)
    Padding,
    /// 保留类型 (0, 9-14)
    Reserved(u8),
}

impl ObuType {
    /// 从 4 位类型编号创建
    pub fn from_type_id(id: u8) -> Self {
        match id {
            1 => Self::SequenceHeader,
            2 => Self::TemporalDelimiter,
            3 => Self::FrameHeader,
            4 => Self::TileGroup,
            5 => Self::Metadata,
            6 => Self::Frame,
            7 => Self::RedundantFrameHeader,
            8 => Self::TileList,
            15 => Self::Padding,
            other => Self::Reserved(other),
        }
    }

    /// 类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::SequenceHeader => 1,
            Self::TemporalDelimiter => 2,
            Self::FrameHeader => 3,
            Self::TileGroup => 4,
            Self::Metadata => 5,
            Self::Frame => 6,
            Self::RedundantFrameHeader => 7,
            Self::TileList => 8,
            Self::Padding => 15,
            Self::Reserved(id) => *id,
        }
    }

    /// 报告中使用的类型名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::SequenceHeader => "seq_header",
            Self::TemporalDelimiter => "delimiter",
            Self::FrameHeader => "frame_header",
            Self::TileGroup => "tile_group",
            Self::Metadata => "metadata",
            Self::Frame => "frame",
            Self::RedundantFrameHeader => "redundant_frame_header",
            Self::TileList => "tile_list",
            Self::Padding => "padding",
            Self::Reserved(_) => "reserved",
        }
    }
}

/// OBU 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObuHeader {
    /// obu_type
    pub obu_type: ObuType,
    /// obu_extension_flag
    pub extension_flag: bool,
    /// obu_has_size_field
    pub has_size_field: bool,
    /// temporal_id
    pub temporal_id: u8,
    /// spatial_id
    pub spatial_id: u8,
    /// 头部字节数 (含扩展字节与 leb128 大小字段)
    pub header_size: u32,
    /// OBU 总字节数 (头部 + 载荷)
    pub obu_size: u64,
}

impl ObuHeader {
    /// 载荷字节数
    pub fn payload_size(&self) -> u64 {
        self.obu_size - u64::from(self.header_size)
    }
}

/// 解析 `data` 开头的 OBU 头部
///
/// 未携带大小字段时, 载荷延伸到 `data` 末尾.
/// 返回的 `obu_size` 可能大于 `data.len()`, 由调用方判断截断.
pub fn parse_obu_header(data: &[u8]) -> TaoResult<ObuHeader> {
    let mut br = BitReader::new(data);
    if br.read_flag()? {
        return Err(TaoError::InvalidData("AV1: obu_forbidden_bit 不为 0".into()));
    }
    let obu_type = ObuType::from_type_id(br.read_bits(4)? as u8);
    let extension_flag = br.read_flag()?;
    let has_size_field = br.read_flag()?;
    br.skip_bits(1)?; // obu_reserved_1bit

    let (mut temporal_id, mut spatial_id) = (0, 0);
    if extension_flag {
        temporal_id = br.read_bits(3)? as u8;
        spatial_id = br.read_bits(2)? as u8;
        br.skip_bits(3)?;
    }

    let (header_size, obu_size) = if has_size_field {
        let payload = br.read_leb128()?;
        let header_size = br.byte_position() as u32;
        (header_size, u64::from(header_size) + payload)
    } else {
        let header_size = br.byte_position() as u32;
        (header_size, data.len() as u64)
    };

    Ok(ObuHeader {
        obu_type,
        extension_flag,
        has_size_field,
        temporal_id,
        spatial_id,
        header_size,
        obu_size,
    })
}

/// 构造带大小字段的 OBU (测试与配置记录构建使用)
pub fn build_obu(obu_type: ObuType, extension: Option<(u8, u8)>, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 10);
    let ext_flag = u8::from(extension.is_some());
    out.push((obu_type.type_id() << 3) | (ext_flag << 2) | 0x02);
    if let Some((tid, sid)) = extension {
        out.push((tid << 5) | (sid << 3));
    }
    let mut len = payload.len() as u64;
    loop {
        let mut byte = (len & 0x7F) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obu_header_with_size_and_extension() {
        let data = build_obu(ObuType::TileGroup, Some((3, 1)), &[0u8; 200]);
        let hdr = parse_obu_header(&data).unwrap();
        assert_eq!(hdr.obu_type, ObuType::TileGroup);
        assert!(hdr.extension_flag && hdr.has_size_field);
        assert_eq!((hdr.temporal_id, hdr.spatial_id), (3, 1));
        assert_eq!(hdr.header_size, 4, "头部 + 扩展 + 2 字节 leb128");
        assert_eq!(hdr.obu_size, 204);
        assert_eq!(hdr.payload_size(), 200);
    }

    #[test]
    fn test_obu_header_without_size_field() {
        let data = [0x30, 0xAA, 0xBB, 0xCC];
        let hdr = parse_obu_header(&data).unwrap();
        assert_eq!(hdr.obu_type, ObuType::Frame);
        assert!(!hdr.has_size_field);
        assert_eq!(hdr.header_size, 1);
        assert_eq!(hdr.obu_size, 4, "无大小字段时延伸到末尾");
    }

    #[test]
    fn test_obu_header_declared_size_exceeds_buffer() {
        let mut data = build_obu(ObuType::Padding, None, &[0u8; 10]);
        data.truncate(5);
        let hdr = parse_obu_header(&data).unwrap();
        assert_eq!(hdr.obu_size, 12, "声明大小不受缓冲区长度限制");
        assert_eq!(hdr.obu_type.name(), "padding");
    }

    #[test]
    fn test_obu_header_forbidden_bit() {
        assert!(parse_obu_header(&[0x80]).is_err());
        assert!(parse_obu_header(&[]).is_err());
    }
}
