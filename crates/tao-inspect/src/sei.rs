//! SEI 消息扫描.
//!
//! 只读取每条消息的 (type, size), 负载原样跳过.

use tao_core::rbsp::remove_emulation_prevention;

use crate::error::InspectError;
use crate::options::SeiBoundaryPolicy;
use crate::report::{UnitKind, UnitReport};

/// SEI 结尾标记 (rbsp_trailing_bits)
const TRAILING_MARKER: u8 = 0x80;

/// 一条 SEI 消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeiMessageDescriptor {
    /// payloadType
    pub payload_type: u32,
    /// payloadSize
    pub payload_size: u32,
}

/// 扫描结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeiScan {
    /// 已完整扫描的消息
    pub messages: Vec<SeiMessageDescriptor>,
    /// 已消费的 RBSP 字节数 (不含 NAL 头)
    pub consumed: usize,
    /// 越界诊断, 仅在 [`SeiBoundaryPolicy::Report`] 下设置
    pub error: Option<InspectError>,
}

impl SeiScan {
    /// 转换为子单元报告
    pub fn to_units(&self) -> Vec<UnitReport> {
        self.messages
            .iter()
            .map(|m| {
                let mut unit = UnitReport::new(UnitKind::SeiMessage).with_code(m.payload_type);
                unit.push("type", m.payload_type);
                unit.push("size", m.payload_size);
                unit
            })
            .collect()
    }
}

/// 读取 0xFF 转义编码的值, 数据不足时返回 None
fn read_escaped(data: &[u8], pos: &mut usize) -> Option<u32> {
    let mut value = 0u32;
    loop {
        let b = *data.get(*pos)?;
        *pos += 1;
        value = value.saturating_add(u32::from(b));
        if b != 0xFF {
            return Some(value);
        }
    }
}

/// 扫描 SEI NAL 单元
///
/// `nal` 含 NAL 头, `header_len` 为 1 (AVC) 或 2 (HEVC).
pub fn scan_sei(nal: &[u8], header_len: usize, policy: SeiBoundaryPolicy) -> SeiScan {
    let rbsp = remove_emulation_prevention(nal.get(header_len..).unwrap_or_default());
    let mut scan = SeiScan::default();
    let mut pos = 0usize;

    let boundary = loop {
        if pos >= rbsp.len() {
            break None;
        }
        let Some(payload_type) = read_escaped(&rbsp, &mut pos) else {
            break Some(InspectError::truncated("SEI message header", 1, 0));
        };
        let Some(payload_size) = read_escaped(&rbsp, &mut pos) else {
            break Some(InspectError::truncated(
                format!("SEI message type {}", payload_type),
                1,
                0,
            ));
        };
        let remaining = rbsp.len() - pos;
        if payload_size as usize > remaining {
            break Some(InspectError::truncated(
                format!("SEI message type {}", payload_type),
                u64::from(payload_size),
                remaining as u64,
            ));
        }
        pos += payload_size as usize;
        scan.consumed = pos;
        scan.messages.push(SeiMessageDescriptor {
            payload_type,
            payload_size,
        });
        if rbsp.get(pos) == Some(&TRAILING_MARKER) {
            break None;
        }
    };

    if policy == SeiBoundaryPolicy::Report {
        scan.error = boundary;
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_escaped(out: &mut Vec<u8>, mut value: u32) {
        while value >= 255 {
            out.push(0xFF);
            value -= 255;
        }
        out.push(value as u8);
    }

    fn sei_nal(header: &[u8], messages: &[(u32, u32)]) -> (Vec<u8>, usize) {
        let mut out = header.to_vec();
        for &(t, size) in messages {
            write_escaped(&mut out, t);
            write_escaped(&mut out, size);
            out.extend(std::iter::repeat_n(0x11, size as usize));
        }
        let body = out.len() - header.len();
        out.push(TRAILING_MARKER);
        (out, body)
    }

    #[test]
    fn test_scan_escaped_sizes() {
        let (nal, body) = sei_nal(&[0x06], &[(5, 10), (4, 300), (300, 600)]);
        let scan = scan_sei(&nal, 1, SeiBoundaryPolicy::Report);
        let got: Vec<_> = scan.messages.iter().map(|m| (m.payload_type, m.payload_size)).collect();
        assert_eq!(got, [(5, 10), (4, 300), (300, 600)]);
        assert_eq!(scan.consumed, body, "消费的字节数应与编码长度一致");
        assert!(scan.error.is_none());
    }

    #[test]
    fn test_scan_hevc_header_skip() {
        let (nal, _) = sei_nal(&[0x4E, 0x01], &[(1, 3)]);
        let scan = scan_sei(&nal, 2, SeiBoundaryPolicy::Report);
        assert_eq!(scan.messages.len(), 1);
        assert_eq!(scan.to_units()[0].field("size").map(ToString::to_string), Some("3".into()));
    }

    #[test]
    fn test_scan_boundary_policies() {
        let (mut nal, _) = sei_nal(&[0x06], &[(5, 10), (6, 40)]);
        nal.truncate(nal.len() - 21);

        let scan = scan_sei(&nal, 1, SeiBoundaryPolicy::Report);
        assert_eq!(scan.messages.len(), 1, "越界之前的消息保留");
        let err = scan.error.expect("Report 策略应给出诊断");
        assert_eq!(err.shortfall(), Some(20));
        assert!(err.to_string().starts_with("SEI message type 6"));

        let scan = scan_sei(&nal, 1, SeiBoundaryPolicy::SilentStop);
        assert_eq!(scan.messages.len(), 1);
        assert!(scan.error.is_none(), "SilentStop 策略不产生诊断");
    }

    #[test]
    fn test_scan_without_trailing_marker() {
        let (mut nal, _) = sei_nal(&[0x06], &[(1, 2), (2, 2)]);
        nal.pop();
        let scan = scan_sei(&nal, 1, SeiBoundaryPolicy::Report);
        assert_eq!(scan.messages.len(), 2, "数据耗尽时正常结束");
        assert!(scan.error.is_none());
    }
}
