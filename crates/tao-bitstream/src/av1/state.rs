//! AV1 OBU 流解析状态.

use log::debug;
use tao_core::{TaoError, TaoResult};

use super::frame::{
    FrameHeader, FrameType, NUM_REF_FRAMES, RefFrameInfo, parse_frame_header, parse_tile_group,
    update_refs,
};
use super::obu::{ObuHeader, ObuType, parse_obu_header};
use super::sequence::{SequenceHeader, parse_sequence_header};

/// 当前帧的对外可见状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Av1FrameState {
    /// 已见到当前帧的帧头, 后续帧头为副本
    pub seen_frame_header: bool,
    /// 最近一个帧头 OBU 的未压缩头字节数, 副本或解析失败时为 0
    pub uncompressed_header_bytes: u32,
    /// frame_type
    pub frame_type: FrameType,
    /// refresh_frame_flags
    pub refresh_frame_flags: u32,
    /// show_frame
    pub show_frame: bool,
    /// show_existing_frame
    pub show_existing_frame: bool,
    /// 最近一个 tile group 包含的 tile 数, 未知时为 0
    pub nb_tiles_in_obu: u32,
}

/// 单个 OBU 的解析结果
#[derive(Debug)]
pub struct ParsedObu {
    /// OBU 头部
    pub header: ObuHeader,
    /// 载荷解析错误; 头部正常但载荷语法有误时设置
    pub payload_error: Option<TaoError>,
}

/// AV1 流解析状态
#[derive(Debug, Clone, Default)]
pub struct Av1State {
    sequence: Option<SequenceHeader>,
    refs: [RefFrameInfo; NUM_REF_FRAMES],
    frame: Av1FrameState,
    current: Option<FrameHeader>,
}

impl Av1State {
    /// 创建空状态
    pub fn new() -> Self {
        Self::default()
    }

    /// 最近一个序列头
    pub fn sequence(&self) -> Option<&SequenceHeader> {
        self.sequence.as_ref()
    }

    /// 当前帧状态
    pub fn frame_state(&self) -> &Av1FrameState {
        &self.frame
    }

    /// 解析 `data` 开头的一个 OBU
    ///
    /// 仅头部无法解析时返回错误. 声明大小超出 `data` 时不解析载荷,
    /// 由调用方根据 `header.obu_size` 判断截断.
    pub fn parse_obu(&mut self, data: &[u8]) -> TaoResult<ParsedObu> {
        let header = parse_obu_header(data)?;
        if header.obu_size > data.len() as u64 {
            return Ok(ParsedObu {
                header,
                payload_error: None,
            });
        }
        let payload = &data[header.header_size as usize..header.obu_size as usize];
        let payload_error = self.parse_payload(&header, payload).err();
        if let Some(err) = &payload_error {
            debug!("AV1: {} OBU 载荷解析失败: {}", header.obu_type.name(), err);
        }
        Ok(ParsedObu {
            header,
            payload_error,
        })
    }

    fn parse_payload(&mut self, header: &ObuHeader, payload: &[u8]) -> TaoResult<()> {
        match header.obu_type {
            ObuType::TemporalDelimiter => {
                self.frame.seen_frame_header = false;
                Ok(())
            }
            ObuType::SequenceHeader => {
                self.sequence = Some(parse_sequence_header(payload)?);
                Ok(())
            }
            ObuType::FrameHeader | ObuType::RedundantFrameHeader | ObuType::Frame => {
                self.frame.uncompressed_header_bytes = 0;
                let header_bytes = if self.frame.seen_frame_header {
                    // frame_header_copy
                    0
                } else {
                    self.parse_frame_header(header, payload)?
                };
                if header.obu_type == ObuType::Frame {
                    let tiles = payload.get(header_bytes as usize..).unwrap_or_default();
                    self.parse_tile_group(tiles)?;
                }
                Ok(())
            }
            ObuType::TileGroup => self.parse_tile_group(payload),
            _ => Ok(()),
        }
    }

    fn parse_frame_header(&mut self, header: &ObuHeader, payload: &[u8]) -> TaoResult<u32> {
        let seq = self
            .sequence
            .as_ref()
            .ok_or_else(|| TaoError::InvalidData("AV1: 帧头之前没有序列头".into()))?;
        let fh = parse_frame_header(payload, header, seq, &self.refs)?;
        update_refs(&fh, &mut self.refs);

        self.frame = Av1FrameState {
            seen_frame_header: !fh.show_existing_frame,
            uncompressed_header_bytes: fh.header_bytes,
            frame_type: fh.frame_type,
            refresh_frame_flags: fh.refresh_frame_flags,
            show_frame: fh.show_frame,
            show_existing_frame: fh.show_existing_frame,
            nb_tiles_in_obu: 0,
        };
        let header_bytes = fh.header_bytes;
        self.current = (!fh.show_existing_frame).then_some(fh);
        Ok(header_bytes)
    }

    fn parse_tile_group(&mut self, data: &[u8]) -> TaoResult<()> {
        self.frame.nb_tiles_in_obu = 0;
        let fh = self
            .current
            .as_ref()
            .ok_or_else(|| TaoError::InvalidData("AV1: tile group 之前没有帧头".into()))?;
        let tg = parse_tile_group(data, &fh.tile_info)?;
        self.frame.nb_tiles_in_obu = tg.num_tiles();
        if tg.is_last(&fh.tile_info) {
            self.frame.seen_frame_header = false;
        }
        Ok(())
    }
}
