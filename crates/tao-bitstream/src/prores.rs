//! ProRes 帧头 (frame header) 解析.
//!
//! 帧布局: `frame_size(4) 'icpf'(4) frame_header_size(2) ...`, 帧头之后的图像数据不解析.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use tao_core::{TaoError, TaoResult};

/// 帧标识 `icpf`
pub const PRORES_FRAME_ID: u32 = u32::from_be_bytes(*b"icpf");

/// 帧头最小长度 (不含量化矩阵)
const MIN_FRAME_HEADER_SIZE: u16 = 20;

/// ProRes 帧头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProResFrameHeader {
    /// frame_size
    pub frame_size: u32,
    /// frame_identifier
    pub frame_identifier: u32,
    /// frame_header_size
    pub frame_header_size: u16,
    /// bitstream_version
    pub version: u8,
    /// encoder_identifier
    pub encoder_id: u32,
    /// horizontal_size
    pub width: u16,
    /// vertical_size
    pub height: u16,
    /// chroma_format
    pub chroma_format: u8,
    /// interlace_mode
    pub interlaced_mode: u8,
    /// aspect_ratio_information
    pub aspect_ratio_information: u8,
    /// frame_rate_code
    pub framerate_code: u8,
    /// color_primaries
    pub color_primaries: u8,
    /// transfer_characteristic
    pub transfer_characteristics: u8,
    /// matrix_coefficients
    pub matrix_coefficients: u8,
    /// alpha_channel_type
    pub alpha_channel_type: u8,
    /// 亮度量化矩阵, 未加载时为 None
    pub luma_quant_matrix: Option<[u8; 64]>,
    /// 色度量化矩阵, 未加载时为 None
    pub chroma_quant_matrix: Option<[u8; 64]>,
}

impl ProResFrameHeader {
    /// 图像数 (隔行为 2)
    pub fn num_pictures(&self) -> u32 {
        if matches!(self.interlaced_mode, 1 | 2) { 2 } else { 1 }
    }
}

fn read_matrix(cur: &mut Cursor<&[u8]>) -> TaoResult<[u8; 64]> {
    let mut m = [0u8; 64];
    cur.read_exact(&mut m).map_err(|_| TaoError::Eof)?;
    Ok(m)
}

/// 解析 ProRes 帧头
pub fn parse_prores_frame(data: &[u8]) -> TaoResult<ProResFrameHeader> {
    let mut cur = Cursor::new(data);
    let eof = |_| TaoError::Eof;

    let frame_size = cur.read_u32::<BigEndian>().map_err(eof)?;
    let frame_identifier = cur.read_u32::<BigEndian>().map_err(eof)?;
    if frame_identifier != PRORES_FRAME_ID {
        return Err(TaoError::InvalidData(format!(
            "ProRes: 帧标识不是 icpf, value=0x{:08X}",
            frame_identifier
        )));
    }
    let frame_header_size = cur.read_u16::<BigEndian>().map_err(eof)?;
    if frame_header_size < MIN_FRAME_HEADER_SIZE {
        return Err(TaoError::InvalidData(format!(
            "ProRes: frame_header_size 超出范围, value={}",
            frame_header_size
        )));
    }
    let _reserved = cur.read_u8().map_err(eof)?;
    let version = cur.read_u8().map_err(eof)?;
    let encoder_id = cur.read_u32::<BigEndian>().map_err(eof)?;
    let width = cur.read_u16::<BigEndian>().map_err(eof)?;
    let height = cur.read_u16::<BigEndian>().map_err(eof)?;

    let b = cur.read_u8().map_err(eof)?;
    let chroma_format = b >> 6;
    let interlaced_mode = (b >> 2) & 0x3;
    let b = cur.read_u8().map_err(eof)?;
    let aspect_ratio_information = b >> 4;
    let framerate_code = b & 0x0F;
    let color_primaries = cur.read_u8().map_err(eof)?;
    let transfer_characteristics = cur.read_u8().map_err(eof)?;
    let matrix_coefficients = cur.read_u8().map_err(eof)?;
    let alpha_channel_type = cur.read_u8().map_err(eof)? & 0x0F;
    let flags = cur.read_u16::<BigEndian>().map_err(eof)?;

    let luma_quant_matrix = if flags & 0x02 != 0 {
        Some(read_matrix(&mut cur)?)
    } else {
        None
    };
    let chroma_quant_matrix = if flags & 0x01 != 0 {
        Some(read_matrix(&mut cur)?)
    } else {
        None
    };

    Ok(ProResFrameHeader {
        frame_size,
        frame_identifier,
        frame_header_size,
        version,
        encoder_id,
        width,
        height,
        chroma_format,
        interlaced_mode,
        aspect_ratio_information,
        framerate_code,
        color_primaries,
        transfer_characteristics,
        matrix_coefficients,
        alpha_channel_type,
        luma_quant_matrix,
        chroma_quant_matrix,
    })
}
