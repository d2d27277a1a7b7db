//! 访问单元与包级字段报告.

use std::fmt::Write as _;

use bitflags::bitflags;
use bytes::Bytes;
use tao_core::crc::crc32;

use crate::report::Fields;

bitflags! {
    /// 访问单元标志
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct PacketFlags: u8 {
        /// 帧起始
        const FRAME_START = 0x01;
        /// 帧结束
        const FRAME_END = 0x02;
        /// 仅用于定位, 不显示
        const SEEK = 0x04;
        /// 数据已损坏
        const CORRUPTED = 0x08;
    }
}

/// 时钟参考类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockType {
    /// 普通 PCR
    Pcr,
    /// 不连续的 PCR
    PcrDiscontinuity,
}

/// 访问单元在帧中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framing {
    /// 完整帧
    Complete,
    /// 帧起始
    Start,
    /// 帧结束
    End,
    /// 帧中间部分
    Continuation,
}

impl Framing {
    /// 报告标签
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Start => "start",
            Self::End => "end",
            Self::Continuation => "continuation",
        }
    }
}

/// 访问单元 (已解封装的一帧或帧的一部分)
///
/// 由调用方持有, 检查器只在一次调用内借用.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessUnit {
    /// 负载
    pub data: Bytes,
    /// 解码时间戳
    pub dts: Option<u64>,
    /// 合成时间戳
    pub cts: Option<u64>,
    /// 时长
    pub duration: u32,
    /// 随机访问点类型
    pub sap: u8,
    /// 标志
    pub flags: PacketFlags,
    /// 隔行类型
    pub interlace: u8,
    /// 恢复点距离
    pub roll: i16,
    /// 加密标志
    pub crypt: u8,
    /// 轮播版本
    pub carousel_version: u8,
    /// 依赖标志字节: is_leading(2) depends_on(2) depended_on(2) redundant(2)
    pub dependency_flags: u8,
    /// 源中的字节偏移
    pub byte_offset: Option<u64>,
    /// 时钟参考包类型, 普通访问单元为 None
    pub clock: Option<ClockType>,
}

impl AccessUnit {
    /// 创建完整帧访问单元
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            dts: None,
            cts: None,
            duration: 0,
            sap: 0,
            flags: PacketFlags::FRAME_START | PacketFlags::FRAME_END,
            interlace: 0,
            roll: 0,
            crypt: 0,
            carousel_version: 0,
            dependency_flags: 0,
            byte_offset: None,
            clock: None,
        }
    }

    /// 创建时钟参考包
    pub fn clock(clock: ClockType, cts: Option<u64>) -> Self {
        Self {
            cts,
            clock: Some(clock),
            ..Self::new(Bytes::new())
        }
    }

    /// 设置时间戳
    pub fn with_timestamps(mut self, dts: Option<u64>, cts: Option<u64>) -> Self {
        self.dts = dts;
        self.cts = cts;
        self
    }

    /// 帧位置
    pub fn framing(&self) -> Framing {
        let start = self.flags.contains(PacketFlags::FRAME_START);
        let end = self.flags.contains(PacketFlags::FRAME_END);
        match (start, end) {
            (true, true) => Framing::Complete,
            (true, false) => Framing::Start,
            (false, true) => Framing::End,
            (false, false) => Framing::Continuation,
        }
    }

    /// 时长检查使用的时间戳: DTS, 缺失时取 CTS
    pub fn timestamp(&self) -> Option<u64> {
        self.dts.or(self.cts)
    }
}

fn push_ts(fields: &mut Fields, name: &'static str, ts: Option<u64>) {
    match ts {
        Some(v) => fields.push(name, v),
        None => fields.push(name, "N/A"),
    }
}

/// 生成包级字段
///
/// 时钟参考包只报告 PCR (及不连续标记); `dump_data` 时以十六进制负载代替 CRC32.
pub(crate) fn packet_fields(au: &AccessUnit, dump_data: bool) -> Fields {
    let mut fields = Fields::default();
    if let Some(clock) = au.clock {
        push_ts(&mut fields, "PCR", au.cts);
        if clock == ClockType::PcrDiscontinuity {
            fields.push("discontinuity", true);
        }
        return fields;
    }

    fields.push("framing", au.framing().label());
    push_ts(&mut fields, "dts", au.dts);
    push_ts(&mut fields, "cts", au.cts);
    fields.push("dur", au.duration);
    fields.push("sap", au.sap);
    fields.push("ilace", au.interlace);
    fields.push("corr", au.flags.contains(PacketFlags::CORRUPTED));
    fields.push("seek", au.flags.contains(PacketFlags::SEEK));
    push_ts(&mut fields, "bo", au.byte_offset);
    fields.push("roll", au.roll);
    fields.push("crypt", au.crypt);
    fields.push("vers", au.carousel_version);
    fields.push("size", au.data.len());
    let f = au.dependency_flags;
    fields.push("lp", (f >> 6) & 0x3);
    fields.push("depo", (f >> 4) & 0x3);
    fields.push("depf", (f >> 2) & 0x3);
    fields.push("red", f & 0x3);

    if dump_data {
        let mut hex = String::with_capacity(au.data.len() * 2);
        for b in au.data.iter() {
            let _ = write!(hex, "{:02X}", b);
        }
        fields.push("data", hex);
    } else if !au.data.is_empty() {
        fields.push("CRC32", format!("0x{:08X}", crc32(&au.data)));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FieldValue;

    #[test]
    fn test_framing() {
        let mut au = AccessUnit::new(vec![1u8]);
        assert_eq!(au.framing(), Framing::Complete);
        au.flags = PacketFlags::FRAME_START;
        assert_eq!(au.framing(), Framing::Start);
        au.flags = PacketFlags::empty();
        assert_eq!(au.framing().label(), "continuation");
    }

    #[test]
    fn test_packet_fields_order() {
        let mut au = AccessUnit::new(vec![0xDE, 0xAD]).with_timestamps(None, Some(3000));
        au.dependency_flags = 0b01_10_11_00;
        au.byte_offset = Some(1024);
        let fields = packet_fields(&au, false);
        let names: Vec<_> = fields.iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            [
                "framing", "dts", "cts", "dur", "sap", "ilace", "corr", "seek", "bo", "roll", "crypt", "vers",
                "size", "lp", "depo", "depf", "red", "CRC32"
            ]
        );
        assert_eq!(fields.get("dts").map(ToString::to_string), Some("N/A".into()));
        assert_eq!(fields.get("cts"), Some(&FieldValue::UInt(3000)));
        assert_eq!(fields.get("lp"), Some(&FieldValue::UInt(1)));
        assert_eq!(fields.get("depo"), Some(&FieldValue::UInt(2)));
        assert_eq!(fields.get("depf"), Some(&FieldValue::UInt(3)));
        assert_eq!(fields.get("red"), Some(&FieldValue::UInt(0)));
        assert_eq!(au.timestamp(), Some(3000), "缺少 DTS 时使用 CTS");
    }

    #[test]
    fn test_dump_data_replaces_crc() {
        let au = AccessUnit::new(vec![0x0A, 0xFF]);
        let fields = packet_fields(&au, true);
        assert_eq!(fields.get("data").map(ToString::to_string), Some("0AFF".into()));
        assert!(!fields.contains("CRC32"));
    }

    #[test]
    fn test_clock_packet() {
        let fields = packet_fields(&AccessUnit::clock(ClockType::PcrDiscontinuity, Some(90000)), false);
        let names: Vec<_> = fields.iter().map(|f| f.name).collect();
        assert_eq!(names, ["PCR", "discontinuity"]);
        let fields = packet_fields(&AccessUnit::clock(ClockType::Pcr, None), false);
        assert_eq!(fields.get("PCR").map(ToString::to_string), Some("N/A".into()));
        assert_eq!(fields.len(), 1);
    }
}
