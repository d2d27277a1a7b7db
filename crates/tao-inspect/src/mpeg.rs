//! MPEG-1/2/4 视频对象与 MPEG 音频帧报告.

use tao_bitstream::mpa::MpegAudioFrameIter;
use tao_bitstream::mpeg12v::{
    Mpeg4ObjectKind, Mpeg12ObjectKind, PictureInfo, StartCodeIter, VideoDecSpecInfo, VideoObject,
    parse_mpeg4_object, parse_mpeg12_object,
};
use tao_core::Rational;

use crate::error::InspectError;
use crate::report::{UnitKind, UnitReport};

fn ratio(r: Rational) -> String {
    format!("{}/{}", r.num, r.den)
}

// ============================================================
// MPEG-4 Part 2
// ============================================================

fn mpeg4_name(kind: Mpeg4ObjectKind) -> Option<&'static str> {
    match kind {
        Mpeg4ObjectKind::Vos => Some("VOS"),
        Mpeg4ObjectKind::Vol => Some("VOL"),
        Mpeg4ObjectKind::Vop => Some("VOP"),
        Mpeg4ObjectKind::Gov => Some("GOV"),
        Mpeg4ObjectKind::Udta => Some("UDTA"),
        Mpeg4ObjectKind::Vo => Some("VO"),
        Mpeg4ObjectKind::VisObj => Some("VisObj"),
        Mpeg4ObjectKind::Other => None,
    }
}

fn mpeg4_unit(obj: &VideoObject<'_>, pic: Option<PictureInfo>, dsi: &VideoDecSpecInfo) -> UnitReport {
    let kind = Mpeg4ObjectKind::from_code(obj.start_code);
    let mut unit = UnitReport::new(UnitKind::Mpeg4P2VideoObj).with_code(u32::from(obj.start_code));
    unit.push("type", format!("0x{:02X}", obj.start_code));
    if let Some(name) = mpeg4_name(kind) {
        unit.push("name", name);
        unit.name = Some(name.to_string());
    }
    match kind {
        Mpeg4ObjectKind::Vos => unit.push("PL", dsi.video_pl),
        Mpeg4ObjectKind::Vol => {
            unit.push("RAP", dsi.rap_stream);
            unit.push("objectType", dsi.object_type);
            unit.push("par", ratio(dsi.par));
            unit.push("hasShape", dsi.has_shape);
            if dsi.clock_rate != 0 {
                unit.push("clockRate", dsi.clock_rate);
            }
            if dsi.time_increment != 0 {
                unit.push("timeIncrement", dsi.time_increment);
            }
            if !dsi.has_shape {
                unit.push("width", dsi.width);
                unit.push("height", dsi.height);
            }
        }
        Mpeg4ObjectKind::Vop => {
            let pic = pic.unwrap_or_default();
            unit.push("frameType", pic.frame_type);
            unit.push("timeInc", pic.time_inc);
            unit.push("isCoded", pic.is_coded);
        }
        _ => {}
    }
    unit
}

// ============================================================
// MPEG-1/2
// ============================================================

fn mpeg12_name(kind: Mpeg12ObjectKind) -> Option<&'static str> {
    match kind {
        Mpeg12ObjectKind::Sequence => Some("SeqStart"),
        Mpeg12ObjectKind::Extension => Some("SeqStartEXT"),
        Mpeg12ObjectKind::Picture => Some("PicStart"),
        Mpeg12ObjectKind::Gop => Some("GOPStart"),
        _ => None,
    }
}

fn mpeg12_unit(obj: &VideoObject<'_>, pic: Option<PictureInfo>, dsi: &VideoDecSpecInfo) -> UnitReport {
    let kind = Mpeg12ObjectKind::from_code(obj.start_code);
    let mut unit = UnitReport::new(UnitKind::Mpeg12VideoObj).with_code(u32::from(obj.start_code));
    unit.push("type", format!("0x{:02X}", obj.start_code));
    if let Some(name) = mpeg12_name(kind) {
        unit.push("name", name);
        unit.name = Some(name.to_string());
    }
    match kind {
        Mpeg12ObjectKind::Sequence => {
            unit.push("width", dsi.width);
            unit.push("height", dsi.height);
            unit.push("sar", ratio(dsi.par));
            unit.push("fps", dsi.fps);
        }
        Mpeg12ObjectKind::Extension => {
            unit.push("width", dsi.width);
            unit.push("height", dsi.height);
            unit.push("PL", dsi.video_pl);
        }
        Mpeg12ObjectKind::Picture => {
            let pic = pic.unwrap_or_default();
            unit.push("frameType", pic.frame_type);
            unit.push("isCoded", pic.is_coded);
        }
        _ => {}
    }
    unit
}

/// 遍历起始码对象并报告
///
/// `dsi` 为流级解码信息, VOL/序列头的解析结果跨包保存. 对象解析失败时停止遍历.
/// MPEG-1/2 切片对象不单独报告.
pub fn inspect_mpeg_video(
    data: &[u8],
    dsi: &mut VideoDecSpecInfo,
    is_m4v: bool,
) -> (Vec<UnitReport>, Option<InspectError>) {
    let mut units = Vec::new();
    for obj in StartCodeIter::new(data) {
        if is_m4v {
            match parse_mpeg4_object(&obj, dsi) {
                Ok(pic) => units.push(mpeg4_unit(&obj, pic, dsi)),
                Err(e) => return (units, Some(e.into())),
            }
        } else {
            if Mpeg12ObjectKind::from_code(obj.start_code) == Mpeg12ObjectKind::Slice {
                continue;
            }
            match parse_mpeg12_object(&obj, dsi) {
                Ok(pic) => units.push(mpeg12_unit(&obj, pic, dsi)),
                Err(e) => return (units, Some(e.into())),
            }
        }
    }
    (units, None)
}

// ============================================================
// MPEG 音频
// ============================================================

/// 遍历 MPEG 音频帧; 不完整的最后一帧仍报告, 随后停止
pub fn inspect_mpeg_audio(data: &[u8]) -> Vec<UnitReport> {
    MpegAudioFrameIter::new(data)
        .map(|frame| {
            let h = &frame.header;
            let mut unit = UnitReport::new(UnitKind::MpegAudioFrame)
                .with_name("MPEGAudioFrame")
                .with_size(u64::from(h.frame_size));
            unit.push("size", h.frame_size);
            unit.push("layer", h.layer);
            unit.push("version", h.version);
            unit.push("bitrate", h.bitrate);
            unit.push("channels", h.channels);
            unit.push("samplesPerFrame", h.samples_per_frame);
            unit.push("samplerate", h.sample_rate);
            if !frame.complete {
                unit.diagnose(InspectError::truncated(
                    "MPEGAudioFrame",
                    u64::from(h.frame_size),
                    (data.len() - frame.offset) as u64,
                ));
            }
            unit
        })
        .collect()
}
