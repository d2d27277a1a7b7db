//! 集成测试公共码流构造.

#![allow(dead_code)]

use tao_inspector::bitstream::h264::build_avc_config;
use tao_inspector::core::bitwriter::BitWriter;
use tao_inspector::inspect::{CodecId, StreamProperties};

/// 4 字节长度前缀拼接
pub fn prefixed(units: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for unit in units {
        out.extend_from_slice(&(unit.len() as u32).to_be_bytes());
        out.extend_from_slice(unit);
    }
    out
}

fn nal(header: u8, rbsp: Vec<u8>) -> Vec<u8> {
    let mut out = vec![header];
    let mut zeros = 0usize;
    for b in rbsp {
        if zeros >= 2 && b <= 3 {
            out.push(3);
            zeros = 0;
        }
        zeros = if b == 0 { zeros + 1 } else { 0 };
        out.push(b);
    }
    out
}

/// Baseline SPS 0, 1920x1080
pub fn avc_sps() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(66, 8);
    bw.write_bits(0, 8);
    bw.write_bits(40, 8);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(2);
    bw.write_ue(4);
    bw.write_bit(0);
    bw.write_ue(119);
    bw.write_ue(67);
    bw.write_bit(1);
    bw.write_bit(1);
    bw.write_bit(1);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_ue(4);
    bw.write_bit(0);
    bw.write_trailing_bits();
    nal(0x67, bw.finish())
}

/// PPS 0
pub fn avc_pps() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_bit(0);
    bw.write_bit(0);
    bw.write_ue(0);
    bw.write_ue(2);
    bw.write_ue(0);
    bw.write_bit(1);
    bw.write_bits(2, 2);
    bw.write_se(-3);
    bw.write_se(0);
    bw.write_se(0);
    bw.write_bit(1);
    bw.write_bit(0);
    bw.write_bit(1);
    bw.write_trailing_bits();
    nal(0x68, bw.finish())
}

/// IDR I 切片
pub fn avc_idr_slice() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_ue(0);
    bw.write_ue(7);
    bw.write_ue(0);
    bw.write_bits(0, 4);
    bw.write_ue(0);
    bw.write_bits(0, 6);
    bw.write_ue(0);
    bw.write_bits(0xFF, 8);
    nal(0x65, bw.finish())
}

/// 携带 avcC 的 AVC 流属性
pub fn avc_props() -> StreamProperties {
    StreamProperties::new(CodecId::Avc).with_decoder_config(build_avc_config(&[avc_sps()], &[avc_pps()], 4).unwrap())
}

/// MPEG-1 Layer III 128kbps 44.1kHz 帧头
pub const MP3_HEADER: u32 = 0xFFFB_9000;

/// 一帧 MP3: 帧头 + 零填充
pub fn mp3_frame() -> Vec<u8> {
    let mut out = MP3_HEADER.to_be_bytes().to_vec();
    out.resize(417, 0);
    out
}
