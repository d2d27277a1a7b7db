//! ProRes 帧头报告.

use std::fmt::Write as _;

use tao_bitstream::prores::{ProResFrameHeader, parse_prores_frame};
use tao_core::fourcc::fourcc_to_string;

use crate::error::InspectError;
use crate::report::{UnitKind, UnitReport};

/// 色度格式标签
pub fn chroma_format_label(v: u8) -> String {
    match v {
        0 => "reserved(0)".into(),
        1 => "reserved(1)".into(),
        2 => "4:2:2".into(),
        3 => "4:4:4".into(),
        n => format!("reserved({})", n),
    }
}

/// 隔行模式标签
pub fn interlaced_mode_label(v: u8) -> &'static str {
    match v {
        0 => "progressive",
        1 => "interlaced_top_first",
        2 => "interlaced_bottom_first",
        _ => "reserved",
    }
}

/// 宽高比标签
pub fn aspect_ratio_label(v: u8) -> String {
    match v {
        0 => "unknown".into(),
        1 => "1:1".into(),
        2 => "4:3".into(),
        n => format!("reserved({})", n),
    }
}

/// 帧率码表, 下标即 frame_rate_code
const FRAMERATES: [&str; 12] = [
    "unknown", "23.976", "24", "25", "29.97", "30", "50", "59.94", "60", "100", "119.88", "120",
];

/// 帧率标签
pub fn framerate_label(v: u8) -> String {
    FRAMERATES
        .get(usize::from(v))
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("reserved({})", v))
}

/// 色彩原色标签
pub fn color_primaries_label(v: u8) -> String {
    match v {
        0 | 2 => "unknown".into(),
        1 => "BT.709".into(),
        5 => "BT.601-625".into(),
        6 => "BT.601-525".into(),
        9 => "BT.2020".into(),
        11 => "P3".into(),
        12 => "P3-D65".into(),
        n => format!("reserved({})", n),
    }
}

/// 矩阵系数标签
pub fn matrix_coefficients_label(v: u8) -> String {
    match v {
        0 | 2 => "unknown".into(),
        1 => "BT.709".into(),
        6 => "BT.601".into(),
        9 => "BT.2020".into(),
        n => format!("reserved({})", n),
    }
}

/// Alpha 通道标签
pub fn alpha_channel_label(v: u8) -> String {
    match v {
        0 => "none".into(),
        1 => "8bits".into(),
        2 => "16bits".into(),
        n => format!("reserved({})", n),
    }
}

/// 量化矩阵文本, 每个系数为 ` %02X`
fn format_matrix(m: &[u8; 64]) -> String {
    let mut s = String::with_capacity(64 * 3);
    for c in m {
        let _ = write!(s, " {:02X}", c);
    }
    s
}

fn header_unit(hdr: &ProResFrameHeader) -> UnitReport {
    let mut unit = UnitReport::new(UnitKind::ProResFrame).with_name("ProResFrame");
    unit.push("framesize", hdr.frame_size);
    unit.push("frameID", fourcc_to_string(hdr.frame_identifier));
    unit.push("version", hdr.version);
    unit.push("encoderID", fourcc_to_string(hdr.encoder_id));
    unit.push("width", hdr.width);
    unit.push("height", hdr.height);
    unit.push("chromaFormat", chroma_format_label(hdr.chroma_format));
    unit.push("interlacedMode", interlaced_mode_label(hdr.interlaced_mode));
    unit.push("aspectRatio", aspect_ratio_label(hdr.aspect_ratio_information));
    unit.push("framerate", framerate_label(hdr.framerate_code));
    unit.push("colorPrimaries", color_primaries_label(hdr.color_primaries));
    unit.push("matrixCoefficients", matrix_coefficients_label(hdr.matrix_coefficients));
    unit.push("alphaChannel", alpha_channel_label(hdr.alpha_channel_type));
    unit.push("transferCharacteristics", hdr.transfer_characteristics);
    unit.push("numPictures", hdr.num_pictures());
    if let Some(m) = &hdr.luma_quant_matrix {
        unit.push("LumaQuantMatrix", format_matrix(m));
    }
    if let Some(m) = &hdr.chroma_quant_matrix {
        unit.push("ChromaQuantMatrix", format_matrix(m));
    }
    unit
}

/// 解析并报告一个 ProRes 帧; 帧头解析失败只影响本单元
pub fn inspect_prores_frame(data: &[u8]) -> UnitReport {
    match parse_prores_frame(data) {
        Ok(hdr) => header_unit(&hdr).with_size(data.len() as u64),
        Err(e) => {
            let mut unit = UnitReport::new(UnitKind::ProResFrame)
                .with_name("ProResFrame")
                .with_size(data.len() as u64);
            unit.diagnose(InspectError::DecodePrimitiveFailure(format!(
                "Error reading frame: {}",
                e
            )));
            unit
        }
    }
}
