//! MPEG-1/2 视频与 MPEG-4 Part 2 视觉对象头.
//!
//! 以起始码 `00 00 01 xx` 切分对象, 对序列/VOL/图像/VOP 头解析检查所需的字段.
//! 序列级信息 ([`VideoDecSpecInfo`]) 由调用方跨包保存.

use tao_core::bitreader::BitReader;
use tao_core::rational::Rational;
use tao_core::{TaoError, TaoResult};

// ============================================================
// 起始码切分
// ============================================================

/// 一个起始码对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoObject<'a> {
    /// 起始码后的类型字节
    pub start_code: u8,
    /// `00 00 01` 前缀在缓冲区中的偏移
    pub offset: usize,
    /// 类型字节之后到下一个起始码之前的数据
    pub payload: &'a [u8],
}

fn find_prefix(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(3)
        .position(|w| w == [0, 0, 1])
        .map(|p| p + from)
}

/// 起始码对象迭代器
#[derive(Debug, Clone)]
pub struct StartCodeIter<'a> {
    data: &'a [u8],
    next: Option<usize>,
}

impl<'a> StartCodeIter<'a> {
    /// 从缓冲区中第一个起始码开始
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            next: find_prefix(data, 0),
        }
    }
}

impl<'a> Iterator for StartCodeIter<'a> {
    type Item = VideoObject<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next?;
        let Some(&start_code) = self.data.get(offset + 3) else {
            self.next = None;
            return None;
        };
        self.next = find_prefix(self.data, offset + 4);
        let end = self.next.unwrap_or(self.data.len());
        Some(VideoObject {
            start_code,
            offset,
            payload: &self.data[offset + 4..end],
        })
    }
}

// ============================================================
// 序列级信息
// ============================================================

/// 视频解码特定信息 (跨包保存)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDecSpecInfo {
    /// profile_and_level_indication
    pub video_pl: u8,
    /// random_accessible_vol
    pub rap_stream: bool,
    /// video_object_type_indication
    pub object_type: u8,
    /// 像素宽高比
    pub par: Rational,
    /// 非矩形形状
    pub has_shape: bool,
    /// vop_time_increment_resolution
    pub clock_rate: u32,
    /// fixed_vop_time_increment
    pub time_increment: u32,
    /// vop_time_increment 的位数
    pub num_bits_time_increment: u32,
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
    /// 帧率
    pub fps: f64,
}

/// 图像 / VOP 头信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PictureInfo {
    /// 编码类型: 0=I, 1=P, 2=B, 3=S
    pub frame_type: u8,
    /// vop_time_increment (MPEG-1/2 为 0)
    pub time_inc: u32,
    /// vop_coded (MPEG-1/2 恒为 true)
    pub is_coded: bool,
}

// ============================================================
// MPEG-4 Part 2
// ============================================================

/// MPEG-4 Part 2 起始码类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mpeg4ObjectKind {
    /// video_object_start_code (0x00-0x1F)
    Vo,
    /// video_object_layer_start_code (0x20-0x2F)
    Vol,
    /// visual_object_sequence_start_code (0xB0)
    Vos,
    /// user_data_start_code (0xB2)
    Udta,
    /// group_of_vop_start_code (0xB3)
    Gov,
    /// visual_object_start_code (0xB5)
    VisObj,
    /// vop_start_code (0xB6)
    Vop,
    /// 其他
    Other,
}

impl Mpeg4ObjectKind {
    /// 由起始码类型字节分类
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00..=0x1F => Self::Vo,
            0x20..=0x2F => Self::Vol,
            0xB0 => Self::Vos,
            0xB2 => Self::Udta,
            0xB3 => Self::Gov,
            0xB5 => Self::VisObj,
            0xB6 => Self::Vop,
            _ => Self::Other,
        }
    }
}

const M4V_SHAPE_RECTANGULAR: u32 = 0;
const M4V_SHAPE_BINARY_ONLY: u32 = 2;
const M4V_SHAPE_GRAYSCALE: u32 = 3;

fn m4v_par(aspect_ratio_info: u32) -> Rational {
    match aspect_ratio_info {
        1 => Rational::new(1, 1),
        2 => Rational::new(12, 11),
        3 => Rational::new(10, 11),
        4 => Rational::new(16, 11),
        5 => Rational::new(40, 33),
        _ => Rational::UNDEFINED,
    }
}

fn parse_vol(payload: &[u8], dsi: &mut VideoDecSpecInfo) -> TaoResult<()> {
    let mut br = BitReader::new(payload);
    dsi.rap_stream = br.read_flag()?;
    dsi.object_type = br.read_bits(8)? as u8;
    let mut verid = 1;
    if br.read_flag()? {
        verid = br.read_bits(4)?;
        br.skip_bits(3)?; // video_object_layer_priority
    }
    let aspect = br.read_bits(4)?;
    dsi.par = if aspect == 0xF {
        let w = br.read_bits(8)? as i32;
        let h = br.read_bits(8)? as i32;
        Rational::new(w, h)
    } else {
        m4v_par(aspect)
    };
    if br.read_flag()? {
        // vol_control_parameters
        br.skip_bits(3)?; // chroma_format + low_delay
        if br.read_flag()? {
            br.skip_bits(79)?; // vbv_parameters
        }
    }
    let shape = br.read_bits(2)?;
    dsi.has_shape = shape != M4V_SHAPE_RECTANGULAR;
    if shape == M4V_SHAPE_GRAYSCALE && verid != 1 {
        br.skip_bits(4)?;
    }
    br.skip_bits(1)?;
    dsi.clock_rate = br.read_bits(16)?;
    br.skip_bits(1)?;
    dsi.num_bits_time_increment = (32 - dsi.clock_rate.saturating_sub(1).leading_zeros()).max(1);
    dsi.time_increment = if br.read_flag()? {
        br.read_bits(dsi.num_bits_time_increment)?
    } else {
        0
    };
    if shape == M4V_SHAPE_RECTANGULAR {
        br.skip_bits(1)?;
        dsi.width = br.read_bits(13)?;
        br.skip_bits(1)?;
        dsi.height = br.read_bits(13)?;
    } else if shape != M4V_SHAPE_BINARY_ONLY {
        dsi.width = 0;
        dsi.height = 0;
    }
    Ok(())
}

fn parse_vop(payload: &[u8], dsi: &VideoDecSpecInfo) -> TaoResult<PictureInfo> {
    if dsi.num_bits_time_increment == 0 {
        return Err(TaoError::InvalidData("MPEG-4: VOP 之前没有 VOL".into()));
    }
    let mut br = BitReader::new(payload);
    let frame_type = br.read_bits(2)? as u8;
    while br.read_flag()? {} // modulo_time_base
    br.skip_bits(1)?;
    let time_inc = br.read_bits(dsi.num_bits_time_increment)?;
    br.skip_bits(1)?;
    let is_coded = br.read_flag()?;
    Ok(PictureInfo {
        frame_type,
        time_inc,
        is_coded,
    })
}

/// 解析一个 MPEG-4 Part 2 对象
///
/// VOS/VOL 更新 `dsi`, VOP 返回图像信息.
pub fn parse_mpeg4_object(
    obj: &VideoObject<'_>,
    dsi: &mut VideoDecSpecInfo,
) -> TaoResult<Option<PictureInfo>> {
    match Mpeg4ObjectKind::from_code(obj.start_code) {
        Mpeg4ObjectKind::Vos => {
            dsi.video_pl = *obj.payload.first().ok_or(TaoError::Eof)?;
            Ok(None)
        }
        Mpeg4ObjectKind::Vol => parse_vol(obj.payload, dsi).map(|_| None),
        Mpeg4ObjectKind::Vop => parse_vop(obj.payload, dsi).map(Some),
        _ => Ok(None),
    }
}

// ============================================================
// MPEG-1/2
// ============================================================

/// MPEG-1/2 起始码类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mpeg12ObjectKind {
    /// picture_start_code (0x00)
    Picture,
    /// slice_start_code (0x01-0xAF)
    Slice,
    /// user_data_start_code (0xB2)
    UserData,
    /// sequence_header_code (0xB3)
    Sequence,
    /// extension_start_code (0xB5)
    Extension,
    /// sequence_end_code (0xB7)
    SequenceEnd,
    /// group_start_code (0xB8)
    Gop,
    /// 其他
    Other,
}

impl Mpeg12ObjectKind {
    /// 由起始码类型字节分类
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Picture,
            0x01..=0xAF => Self::Slice,
            0xB2 => Self::UserData,
            0xB3 => Self::Sequence,
            0xB5 => Self::Extension,
            0xB7 => Self::SequenceEnd,
            0xB8 => Self::Gop,
            _ => Self::Other,
        }
    }
}

const MPEG12_FRAME_RATES: [(u32, u32); 9] = [
    (0, 1),
    (24000, 1001),
    (24, 1),
    (25, 1),
    (30000, 1001),
    (30, 1),
    (50, 1),
    (60000, 1001),
    (60, 1),
];

/// 由显示宽高比计算像素宽高比
fn mpeg12_sar(aspect: u32, width: u32, height: u32) -> Rational {
    let (dar_num, dar_den) = match aspect {
        1 => return Rational::new(1, 1),
        2 => (4, 3),
        3 => (16, 9),
        4 => (221, 100),
        _ => return Rational::UNDEFINED,
    };
    if width == 0 || height == 0 {
        return Rational::UNDEFINED;
    }
    Rational::new((dar_num * height) as i32, (dar_den * width) as i32).reduce()
}

fn parse_sequence_header(payload: &[u8], dsi: &mut VideoDecSpecInfo) -> TaoResult<()> {
    let mut br = BitReader::new(payload);
    dsi.width = br.read_bits(12)?;
    dsi.height = br.read_bits(12)?;
    let aspect = br.read_bits(4)?;
    let rate_code = br.read_bits(4)? as usize;
    dsi.par = mpeg12_sar(aspect, dsi.width, dsi.height);
    let (num, den) = MPEG12_FRAME_RATES.get(rate_code).copied().unwrap_or((0, 1));
    dsi.fps = f64::from(num) / f64::from(den);
    Ok(())
}

fn parse_extension(payload: &[u8], dsi: &mut VideoDecSpecInfo) -> TaoResult<()> {
    let mut br = BitReader::new(payload);
    if br.read_bits(4)? != 1 {
        return Ok(());
    }
    // sequence_extension
    dsi.video_pl = br.read_bits(8)? as u8;
    br.skip_bits(3)?; // progressive_sequence + chroma_format
    let h_ext = br.read_bits(2)?;
    let v_ext = br.read_bits(2)?;
    dsi.width = (dsi.width & 0xFFF) | (h_ext << 12);
    dsi.height = (dsi.height & 0xFFF) | (v_ext << 12);
    Ok(())
}

fn parse_picture_header(payload: &[u8]) -> TaoResult<PictureInfo> {
    let mut br = BitReader::new(payload);
    br.skip_bits(10)?; // temporal_reference
    let coding_type = br.read_bits(3)?;
    if !(1..=4).contains(&coding_type) {
        return Err(TaoError::InvalidData(format!(
            "MPEG-1/2: picture_coding_type 超出范围, value={}",
            coding_type
        )));
    }
    Ok(PictureInfo {
        frame_type: (coding_type - 1) as u8,
        time_inc: 0,
        is_coded: true,
    })
}

/// 解析一个 MPEG-1/2 对象
///
/// 序列头与序列扩展更新 `dsi`, 图像头返回图像信息.
pub fn parse_mpeg12_object(
    obj: &VideoObject<'_>,
    dsi: &mut VideoDecSpecInfo,
) -> TaoResult<Option<PictureInfo>> {
    match Mpeg12ObjectKind::from_code(obj.start_code) {
        Mpeg12ObjectKind::Sequence => parse_sequence_header(obj.payload, dsi).map(|_| None),
        Mpeg12ObjectKind::Extension => parse_extension(obj.payload, dsi).map(|_| None),
        Mpeg12ObjectKind::Picture => parse_picture_header(obj.payload).map(Some),
        _ => Ok(None),
    }
}
