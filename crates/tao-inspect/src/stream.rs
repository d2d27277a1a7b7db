//! 流属性.
//!
//! 由调用方 (解封装层) 提供, 每次配置/重新配置时整体传入.

use bytes::Bytes;
use tao_core::Rational;

use crate::codec::CodecId;
use crate::timecode::{TimecodeFlags, TimecodeParams};

/// 内容保护方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Protection {
    /// 未加密
    #[default]
    None,
    /// Adobe 访问单元加密 (adkm): 每个访问单元首字节指示是否加密
    Adobe,
    /// 通用加密 (cenc/cens/cbc1/cbcs): 子样本加密, 跳过所有解析原语
    Cenc,
}

impl Protection {
    /// 从保护方案 4CC 推断
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme {
            "adkm" => Self::Adobe,
            "cenc" | "cens" | "cbc1" | "cbcs" => Self::Cenc,
            _ => Self::None,
        }
    }
}

/// 流属性
#[derive(Debug, Clone, PartialEq)]
pub struct StreamProperties {
    /// 编解码器
    pub codec_id: CodecId,
    /// 解码配置记录 (avcC / hvcC / av1C / DSI / 文本配置)
    pub decoder_config: Option<Bytes>,
    /// 增强层配置记录 (svcC / lhvC)
    pub decoder_config_enhancement: Option<Bytes>,
    /// 时间基 (每秒 tick 数)
    pub timescale: u32,
    /// `tmcd:flags`
    pub tmcd_flags: u32,
    /// `tmcd:framerate`
    pub tmcd_framerate: Rational,
    /// `tmcd:frames_per_tick`
    pub tmcd_frames_per_tick: u32,
    /// 保护方案 4CC
    pub protection_scheme: Option<String>,
}

impl StreamProperties {
    /// 创建仅含编解码器的属性, 时间基默认 1000
    pub fn new(codec_id: CodecId) -> Self {
        Self {
            codec_id,
            decoder_config: None,
            decoder_config_enhancement: None,
            timescale: 1000,
            tmcd_flags: 0,
            tmcd_framerate: Rational::UNDEFINED,
            tmcd_frames_per_tick: 0,
            protection_scheme: None,
        }
    }

    /// 设置解码配置记录
    pub fn with_decoder_config(mut self, data: impl Into<Bytes>) -> Self {
        self.decoder_config = Some(data.into());
        self
    }

    /// 设置增强层配置记录
    pub fn with_enhancement_config(mut self, data: impl Into<Bytes>) -> Self {
        self.decoder_config_enhancement = Some(data.into());
        self
    }

    /// 设置时间基
    pub fn with_timescale(mut self, timescale: u32) -> Self {
        self.timescale = timescale;
        self
    }

    /// 设置时间码参数
    pub fn with_timecode(mut self, framerate: Rational, flags: u32, frames_per_tick: u32) -> Self {
        self.tmcd_framerate = framerate;
        self.tmcd_flags = flags;
        self.tmcd_frames_per_tick = frames_per_tick;
        self
    }

    /// 设置保护方案
    pub fn with_protection(mut self, scheme: impl Into<String>) -> Self {
        self.protection_scheme = Some(scheme.into());
        self
    }

    /// 保护方式
    pub fn protection(&self) -> Protection {
        self.protection_scheme
            .as_deref()
            .map(Protection::from_scheme)
            .unwrap_or_default()
    }

    /// 时间码参数; 未知标志位被忽略
    pub fn timecode_params(&self) -> TimecodeParams {
        TimecodeParams {
            rate: self.tmcd_framerate,
            flags: TimecodeFlags::from_bits_truncate(self.tmcd_flags),
            frames_per_tick: self.tmcd_frames_per_tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_from_scheme() {
        assert_eq!(Protection::from_scheme("adkm"), Protection::Adobe);
        assert_eq!(Protection::from_scheme("cbcs"), Protection::Cenc);
        assert_eq!(Protection::from_scheme("piff"), Protection::None);
        let props = StreamProperties::new(CodecId::Avc).with_protection("cenc");
        assert_eq!(props.protection(), Protection::Cenc);
        assert_eq!(StreamProperties::new(CodecId::Avc).protection(), Protection::None);
    }

    #[test]
    fn test_timecode_params() {
        let props = StreamProperties::new(CodecId::Timecode).with_timecode(Rational::new(25, 1), 0x09 | 0x100, 1);
        let p = props.timecode_params();
        assert!(p.flags.contains(TimecodeFlags::COUNTER | TimecodeFlags::DROP_FRAME));
        assert_eq!(p.flags.bits(), 0x09, "未知标志位被丢弃");
        assert_eq!(p.frames_per_tick, 1);
    }
}
