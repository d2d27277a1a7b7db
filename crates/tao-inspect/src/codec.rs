//! 编解码器标识与分析族.

use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    // ========================
    // AVC 族
    // ========================
    /// H.264 / AVC
    Avc,
    /// 参数集随样本携带的 AVC (avc3)
    AvcParameterSets,
    /// SVC (H.264 Annex G)
    Svc,
    /// MVC (H.264 Annex H)
    Mvc,

    // ========================
    // HEVC 族
    // ========================
    /// H.265 / HEVC
    Hevc,
    /// HEVC tile 轨道
    HevcTiles,
    /// L-HEVC (分层 HEVC)
    Lhvc,

    // ========================
    // 其他视频
    // ========================
    /// AV1
    Av1,
    /// MPEG-1 Video
    Mpeg1Video,
    /// MPEG-2 Video (所有 profile)
    Mpeg2Video,
    /// MPEG-4 Part 2 Visual
    Mpeg4Part2,
    /// ProRes 422 Proxy (apco)
    ProRes422Proxy,
    /// ProRes 422 LT (apcs)
    ProRes422Lt,
    /// ProRes 422 (apcn)
    ProRes422,
    /// ProRes 422 HQ (apch)
    ProRes422Hq,
    /// ProRes 4444 (ap4h)
    ProRes4444,
    /// ProRes 4444 XQ (ap4x)
    ProRes4444Xq,
    /// VP9 (不支持码流分析)
    Vp9,

    // ========================
    // 音频
    // ========================
    /// MPEG-1 Audio
    MpegAudio,
    /// MPEG-2 Part 3 Audio
    Mpeg2Part3Audio,
    /// AAC (不支持码流分析)
    Aac,
    /// Opus (不支持码流分析)
    Opus,

    // ========================
    // 文本与时间码
    // ========================
    /// QuickTime 时间码 (tmcd)
    Timecode,
    /// 文本字幕
    SubsText,
    /// 文本元数据
    MetaText,
    /// XML 字幕
    SubsXml,
    /// XML 元数据
    MetaXml,
}

/// 分析族: 决定解析状态与负载分发路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecFamily {
    /// AVC/SVC/MVC, 长度前缀 NAL
    Avc,
    /// HEVC/L-HEVC, 长度前缀 NAL
    Hevc,
    /// AV1 OBU
    Av1,
    /// MPEG-1/2/4 起始码视频
    MpegVideo,
    /// MPEG 音频帧
    MpegAudio,
    /// 时间码样本
    Timecode,
    /// 纯文本
    Text,
    /// XML 文本
    Xml,
    /// ProRes 帧
    ProRes,
    /// 不支持码流分析
    Unsupported,
}

impl CodecId {
    /// 所属分析族
    pub const fn family(&self) -> CodecFamily {
        match self {
            Self::Avc | Self::AvcParameterSets | Self::Svc | Self::Mvc => CodecFamily::Avc,
            Self::Hevc | Self::HevcTiles | Self::Lhvc => CodecFamily::Hevc,
            Self::Av1 => CodecFamily::Av1,
            Self::Mpeg1Video | Self::Mpeg2Video | Self::Mpeg4Part2 => CodecFamily::MpegVideo,
            Self::MpegAudio | Self::Mpeg2Part3Audio => CodecFamily::MpegAudio,
            Self::Timecode => CodecFamily::Timecode,
            Self::SubsText | Self::MetaText => CodecFamily::Text,
            Self::SubsXml | Self::MetaXml => CodecFamily::Xml,
            Self::ProRes422Proxy
            | Self::ProRes422Lt
            | Self::ProRes422
            | Self::ProRes422Hq
            | Self::ProRes4444
            | Self::ProRes4444Xq => CodecFamily::ProRes,
            Self::Vp9 | Self::Aac | Self::Opus => CodecFamily::Unsupported,
        }
    }

    /// 仅有增强层配置时视为增强层流 (SVC/MVC/L-HEVC)
    pub const fn is_layered(&self) -> bool {
        matches!(self, Self::Svc | Self::Mvc | Self::Lhvc)
    }

    /// 获取编解码器名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Avc => "avc",
            Self::AvcParameterSets => "avc_ps",
            Self::Svc => "svc",
            Self::Mvc => "mvc",
            Self::Hevc => "hevc",
            Self::HevcTiles => "hevc_tiles",
            Self::Lhvc => "lhvc",
            Self::Av1 => "av1",
            Self::Mpeg1Video => "mpeg1video",
            Self::Mpeg2Video => "mpeg2video",
            Self::Mpeg4Part2 => "mpeg4part2",
            Self::ProRes422Proxy => "apco",
            Self::ProRes422Lt => "apcs",
            Self::ProRes422 => "apcn",
            Self::ProRes422Hq => "apch",
            Self::ProRes4444 => "ap4h",
            Self::ProRes4444Xq => "ap4x",
            Self::Vp9 => "vp9",
            Self::MpegAudio => "mpeg_audio",
            Self::Mpeg2Part3Audio => "mpeg2_part3_audio",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Timecode => "tmcd",
            Self::SubsText => "subs_text",
            Self::MetaText => "meta_text",
            Self::SubsXml => "subs_xml",
            Self::MetaXml => "meta_xml",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_family() {
        assert_eq!(CodecId::Svc.family(), CodecFamily::Avc);
        assert_eq!(CodecId::HevcTiles.family(), CodecFamily::Hevc);
        assert_eq!(CodecId::ProRes4444Xq.family(), CodecFamily::ProRes);
        assert_eq!(CodecId::Mpeg4Part2.family(), CodecFamily::MpegVideo);
        assert_eq!(CodecId::Opus.family(), CodecFamily::Unsupported);
        assert!(CodecId::Lhvc.is_layered());
        assert!(!CodecId::Hevc.is_layered());
    }

    #[test]
    fn test_codec_name() {
        assert_eq!(CodecId::ProRes422Hq.to_string(), "apch");
        assert_eq!(CodecId::Timecode.name(), "tmcd");
    }
}
