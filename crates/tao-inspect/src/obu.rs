//! AV1 OBU 遍历与报告.

use tao_bitstream::av1::{Av1State, ObuType, ParsedObu};
use tao_core::crc::crc32;

use crate::error::InspectError;
use crate::report::{UnitKind, UnitReport};

/// 生成单个 OBU 的报告, `obu` 为完整 OBU 字节 (头部 + 载荷)
fn obu_unit(parsed: &ParsedObu, obu: &[u8], state: &Av1State, dump_crc: bool) -> UnitReport {
    let hdr = &parsed.header;
    let mut unit = UnitReport::new(UnitKind::Obu)
        .with_code(u32::from(hdr.obu_type.type_id()))
        .with_name(hdr.obu_type.name())
        .with_size(hdr.obu_size);
    unit.push("size", hdr.obu_size);
    unit.push("type", hdr.obu_type.name());
    unit.push("header_size", hdr.header_size);
    unit.push("has_size_field", hdr.has_size_field);
    unit.push("has_ext", hdr.extension_flag);
    unit.push("temporalID", hdr.temporal_id);
    unit.push("spatialID", hdr.spatial_id);
    if dump_crc {
        unit.push("crc", crc32(obu));
    }

    if let Some(err) = &parsed.payload_error {
        unit.diagnose(InspectError::DecodePrimitiveFailure(err.to_string()));
    }

    match hdr.obu_type {
        ObuType::SequenceHeader if parsed.payload_error.is_none() => {
            if let Some(seq) = state.sequence() {
                unit.push("width", seq.max_frame_width);
                unit.push("height", seq.max_frame_height);
                unit.push("bit_depth", seq.color.bit_depth);
                unit.push("still_picture", seq.still_picture);
                unit.push("OperatingPointIdc", seq.operating_point_idc());
                unit.push("color_range", seq.color.color_range);
                unit.push("color_description_present_flag", seq.color.color_description_present_flag);
                unit.push("color_primaries", seq.color.color_primaries);
                unit.push("transfer_characteristics", seq.color.transfer_characteristics);
                unit.push("matrix_coefficients", seq.color.matrix_coefficients);
                unit.push("profile", seq.seq_profile);
                unit.push("level", seq.level());
            }
        }
        ObuType::FrameHeader | ObuType::Frame => {
            if let Some(seq) = state.sequence() {
                if seq.frame_id_numbers_present_flag {
                    unit.push("delta_frame_id_length_minus_2", seq.delta_frame_id_length_minus_2);
                }
                if seq.reduced_still_picture_header {
                    unit.push("reduced_still_picture_header", true);
                }
            }
            let fs = state.frame_state();
            unit.push("uncompressed_header_bytes", fs.uncompressed_header_bytes);
            if fs.uncompressed_header_bytes != 0 {
                unit.push("frame_type", fs.frame_type.label());
                unit.push("refresh_frame_flags", fs.refresh_frame_flags);
                unit.push("show_frame", fs.show_frame);
                unit.push("show_existing_frame", fs.show_existing_frame);
            }
            if hdr.obu_type == ObuType::Frame {
                push_tiles(&mut unit, state);
            }
        }
        ObuType::TileGroup => push_tiles(&mut unit, state),
        _ => {}
    }
    unit
}

fn push_tiles(unit: &mut UnitReport, state: &Av1State) {
    match state.frame_state().nb_tiles_in_obu {
        0 => unit.push("nb_tiles", "unknown"),
        n => unit.push("nb_tiles", n),
    }
}

/// 依次解析并报告 `data` 中的 OBU
///
/// 头部无法解析或声明大小超出剩余字节时停止, 返回已报告的单元与诊断.
pub fn inspect_obus(
    data: &[u8],
    state: &mut Av1State,
    dump_crc: bool,
) -> (Vec<UnitReport>, Option<InspectError>) {
    let mut units = Vec::new();
    let mut rest = data;

    while !rest.is_empty() {
        let parsed = match state.parse_obu(rest) {
            Ok(p) => p,
            Err(e) => return (units, Some(e.into())),
        };
        let size = parsed.header.obu_size;
        if size > rest.len() as u64 {
            return (units, Some(InspectError::truncated("OBU", size, rest.len() as u64)));
        }
        let (obu, tail) = rest.split_at(size as usize);
        units.push(obu_unit(&parsed, obu, state, dump_crc));
        rest = tail;
    }
    (units, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FieldValue;
    use crate::testutil::{av1_frame_obu, av1_sequence_obu, av1_temporal_delimiter};
    use tao_bitstream::av1::build_obu;

    #[test]
    fn test_sequence_header_fields() {
        let mut state = Av1State::new();
        let (units, err) = inspect_obus(&av1_sequence_obu(), &mut state, false);
        assert!(err.is_none());
        let unit = &units[0];
        assert_eq!(unit.name.as_deref(), Some("seq_header"));
        assert_eq!(unit.field("width"), Some(&FieldValue::UInt(1920)));
        assert_eq!(unit.field("height"), Some(&FieldValue::UInt(1080)));
        assert_eq!(unit.field("level"), Some(&FieldValue::UInt(8)));
        assert!(unit.field("crc").is_none());
    }

    #[test]
    fn test_temporal_unit_with_frame() {
        let mut state = Av1State::new();
        let mut data = av1_temporal_delimiter();
        data.extend(av1_sequence_obu());
        data.extend(av1_frame_obu());
        let (units, err) = inspect_obus(&data, &mut state, true);
        assert!(err.is_none(), "{:?}", err);
        let names: Vec<_> = units.iter().map(|u| u.name.clone().unwrap_or_default()).collect();
        assert_eq!(names, ["delimiter", "seq_header", "frame"]);
        let frame = &units[2];
        assert_eq!(frame.field("frame_type").map(ToString::to_string), Some("key".into()));
        assert_eq!(frame.field("show_frame"), Some(&FieldValue::Bool(true)));
        assert_eq!(frame.field("nb_tiles"), Some(&FieldValue::UInt(1)));
        assert!(frame.field("crc").is_some());
    }

    #[test]
    fn test_truncated_obu_stops_packet() {
        let mut state = Av1State::new();
        let mut data = av1_temporal_delimiter();
        let mut tg = build_obu(ObuType::TileGroup, None, &[0; 40]);
        tg.truncate(12);
        data.extend(tg);
        let (units, err) = inspect_obus(&data, &mut state, false);
        assert_eq!(units.len(), 1, "截断之前的 OBU 保留");
        assert_eq!(
            err.unwrap().to_string(),
            "OBU is corrupted: size is 42 but only 12 remains"
        );
    }

    #[test]
    fn test_frame_without_sequence_header() {
        let mut state = Av1State::new();
        let (units, err) = inspect_obus(&av1_frame_obu(), &mut state, false);
        assert!(err.is_none());
        assert_eq!(units[0].diagnostics.len(), 1, "缺少序列头时附加解析失败诊断");
        assert_eq!(units[0].field("uncompressed_header_bytes"), Some(&FieldValue::UInt(0)));
        assert_eq!(units[0].field("nb_tiles").map(ToString::to_string), Some("unknown".into()));
    }
}
