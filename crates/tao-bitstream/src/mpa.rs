//! MPEG-1/2/2.5 音频帧头.

use tao_core::{TaoError, TaoResult};

/// MPEG-1
pub const MPA_VERSION_1: u8 = 3;
/// MPEG-2
pub const MPA_VERSION_2: u8 = 2;
/// MPEG-2.5
pub const MPA_VERSION_2_5: u8 = 0;

const BITRATES_V1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];
const BITRATES_V2: [[u32; 15]; 2] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];
const SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];

/// MPEG 音频帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegAudioHeader {
    /// 版本编号: 3=MPEG-1, 2=MPEG-2, 0=MPEG-2.5
    pub version: u8,
    /// 层 (1-3)
    pub layer: u8,
    /// 码率 (kbps)
    pub bitrate: u32,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: u8,
    /// padding_bit
    pub padding: bool,
    /// 每帧采样数
    pub samples_per_frame: u32,
    /// 帧字节数 (含 4 字节头)
    pub frame_size: u32,
}

/// 解析 32 位帧头
pub fn parse_mpa_header(hdr: u32) -> TaoResult<MpegAudioHeader> {
    let invalid = |what: &str, value: u32| {
        TaoError::InvalidData(format!("MPA: {} 超出范围, value={}", what, value))
    };
    if hdr >> 21 != 0x7FF {
        return Err(TaoError::InvalidData(format!("MPA: 同步字错误, header=0x{:08X}", hdr)));
    }
    let version = ((hdr >> 19) & 0x3) as u8;
    if version == 1 {
        return Err(invalid("version", 1));
    }
    let layer_bits = (hdr >> 17) & 0x3;
    if layer_bits == 0 {
        return Err(invalid("layer", 0));
    }
    let layer = (4 - layer_bits) as u8;
    let bitrate_index = ((hdr >> 12) & 0xF) as usize;
    if bitrate_index == 0 || bitrate_index == 15 {
        return Err(invalid("bitrate_index", bitrate_index as u32));
    }
    let sr_index = ((hdr >> 10) & 0x3) as usize;
    if sr_index == 3 {
        return Err(invalid("sampling_frequency", 3));
    }
    let padding = (hdr >> 9) & 1 != 0;
    let channels = if (hdr >> 6) & 0x3 == 3 { 1 } else { 2 };

    let bitrate = if version == MPA_VERSION_1 {
        BITRATES_V1[usize::from(layer - 1)][bitrate_index]
    } else {
        BITRATES_V2[usize::from(layer != 1)][bitrate_index]
    };
    let sample_rate = match version {
        MPA_VERSION_1 => SAMPLE_RATES[sr_index],
        MPA_VERSION_2 => SAMPLE_RATES[sr_index] / 2,
        _ => SAMPLE_RATES[sr_index] / 4,
    };
    let samples_per_frame = match layer {
        1 => 384,
        3 if version != MPA_VERSION_1 => 576,
        _ => 1152,
    };
    let pad = u32::from(padding);
    let frame_size = if layer == 1 {
        (12 * bitrate * 1000 / sample_rate + pad) * 4
    } else {
        samples_per_frame / 8 * bitrate * 1000 / sample_rate + pad
    };

    Ok(MpegAudioHeader {
        version,
        layer,
        bitrate,
        sample_rate,
        channels,
        padding,
        samples_per_frame,
        frame_size,
    })
}

/// 从 `from` 开始查找下一个有效帧头, 返回 (偏移, 帧头)
pub fn find_next_header(data: &[u8], from: usize) -> Option<(usize, MpegAudioHeader)> {
    let tail = data.get(from..)?;
    tail.windows(4).enumerate().find_map(|(i, w)| {
        if w[0] != 0xFF || w[1] & 0xE0 != 0xE0 {
            return None;
        }
        let hdr = u32::from_be_bytes([w[0], w[1], w[2], w[3]]);
        parse_mpa_header(hdr).ok().map(|h| (from + i, h))
    })
}

/// 音频帧遍历项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegAudioFrame {
    /// 帧头偏移
    pub offset: usize,
    /// 帧头
    pub header: MpegAudioHeader,
    /// 帧是否完整位于缓冲区内
    pub complete: bool,
}

/// 遍历缓冲区内的音频帧; 不完整的帧作为最后一项返回
#[derive(Debug, Clone)]
pub struct MpegAudioFrameIter<'a> {
    data: &'a [u8],
    pos: Option<usize>,
}

impl<'a> MpegAudioFrameIter<'a> {
    /// 创建遍历器
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: Some(0) }
    }
}

impl Iterator for MpegAudioFrameIter<'_> {
    type Item = MpegAudioFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let (offset, header) = find_next_header(self.data, self.pos?)?;
        let end = offset + header.frame_size as usize;
        let complete = end <= self.data.len();
        self.pos = complete.then_some(end);
        Some(MpegAudioFrame {
            offset,
            header,
            complete,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// MPEG-1 Layer III, 128 kbps, 44.1 kHz, 立体声
    pub(crate) const MP3_HEADER: u32 = 0xFFFB_9000;

    /// 构造一帧 (帧头 + 零填充)
    pub(crate) fn build_mpa_frame(hdr: u32) -> Vec<u8> {
        let size = parse_mpa_header(hdr).unwrap().frame_size as usize;
        let mut out = hdr.to_be_bytes().to_vec();
        out.resize(size, 0);
        out
    }

    #[test]
    fn test_mp3_header() {
        let h = parse_mpa_header(MP3_HEADER).unwrap();
        assert_eq!(h.version, MPA_VERSION_1);
        assert_eq!(h.layer, 3);
        assert_eq!(h.bitrate, 128);
        assert_eq!(h.sample_rate, 44100);
        assert_eq!(h.channels, 2);
        assert_eq!(h.samples_per_frame, 1152);
        assert_eq!(h.frame_size, 417);
    }

    #[test]
    fn test_mpeg2_layer3_and_layer1() {
        // MPEG-2 Layer III, 64 kbps, 22.05 kHz, 单声道
        let h = parse_mpa_header(0xFFF3_80C0).unwrap();
        assert_eq!((h.version, h.layer), (MPA_VERSION_2, 3));
        assert_eq!(h.bitrate, 64);
        assert_eq!(h.sample_rate, 22050);
        assert_eq!(h.channels, 1);
        assert_eq!(h.samples_per_frame, 576);
        assert_eq!(h.frame_size, 208);

        // MPEG-1 Layer I, 32 kbps, 48 kHz
        let h = parse_mpa_header(0xFFFF_1400).unwrap();
        assert_eq!(h.layer, 1);
        assert_eq!(h.samples_per_frame, 384);
        assert_eq!(h.frame_size, 32);
    }

    #[test]
    fn test_invalid_headers() {
        assert!(parse_mpa_header(0x1234_5678).is_err());
        assert!(parse_mpa_header(0xFFF9_9000).is_err(), "保留的 layer");
        assert!(parse_mpa_header(0xFFFB_F000).is_err(), "bitrate_index=15");
        assert!(parse_mpa_header(0xFFFB_9C00).is_err(), "保留的采样率");
    }

    #[test]
    fn test_frame_iter_stops_on_partial_frame() {
        let mut data = vec![0x00, 0x11];
        data.extend(build_mpa_frame(MP3_HEADER));
        data.extend(build_mpa_frame(MP3_HEADER));
        data.truncate(data.len() - 100);
        let frames: Vec<_> = MpegAudioFrameIter::new(&data).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].offset, 2, "跳过帧头之前的垃圾数据");
        assert!(frames[0].complete);
        assert_eq!(frames[1].offset, 419);
        assert!(!frames[1].complete, "末帧不完整");
    }
}
