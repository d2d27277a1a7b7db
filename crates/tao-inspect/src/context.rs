//! 流级分析上下文.
//!
//! 每条流独占一个 [`StreamAnalysisContext`]: 编解码器、长度字段宽度、唯一的解析状态,
//! 以及时间码参数、保护方式与包计数. 不同流之间没有共享的可变状态.

use log::debug;
use tao_bitstream::av1::Av1State;
use tao_bitstream::h264::AvcState;
use tao_bitstream::h265::HevcState;
use tao_bitstream::mpeg12v::VideoDecSpecInfo;

use crate::codec::{CodecFamily, CodecId};
use crate::error::InspectError;
use crate::mpeg::{inspect_mpeg_audio, inspect_mpeg_video};
use crate::nal::{NalDumpContext, inspect_avc_nal, inspect_hevc_nal, inspect_nal_units};
use crate::obu::inspect_obus;
use crate::options::InspectOptions;
use crate::prores::inspect_prores_frame;
use crate::report::{UnitKind, UnitReport};
use crate::stream::Protection;
use crate::timecode::{TimecodeParams, decode_timecode};

/// 解析状态, 每条流至多一个
#[derive(Debug, Default)]
pub enum ParserState {
    /// 无状态
    #[default]
    None,
    /// AVC/SVC/MVC 参数集表与切片上下文
    Avc(Box<AvcState>),
    /// HEVC/L-HEVC 参数集表与切片上下文
    Hevc(Box<HevcState>),
    /// AV1 序列头与帧状态
    Av1(Box<Av1State>),
    /// MPEG-1/2/4 视频的序列级信息
    MpegVideo(Box<VideoDecSpecInfo>),
}

impl ParserState {
    /// 为分析族分配新状态; 无需状态的分析族返回 `None`
    pub fn for_family(family: CodecFamily) -> Self {
        match family {
            CodecFamily::Avc => Self::Avc(Box::new(AvcState::new())),
            CodecFamily::Hevc => Self::Hevc(Box::new(HevcState::new())),
            CodecFamily::Av1 => Self::Av1(Box::new(Av1State::new())),
            CodecFamily::MpegVideo => Self::MpegVideo(Box::default()),
            _ => Self::None,
        }
    }

    /// 状态所属的分析族
    pub fn family(&self) -> Option<CodecFamily> {
        match self {
            Self::None => None,
            Self::Avc(_) => Some(CodecFamily::Avc),
            Self::Hevc(_) => Some(CodecFamily::Hevc),
            Self::Av1(_) => Some(CodecFamily::Av1),
            Self::MpegVideo(_) => Some(CodecFamily::MpegVideo),
        }
    }

    /// AVC 状态
    pub fn avc(&self) -> Option<&AvcState> {
        match self {
            Self::Avc(s) => Some(s),
            _ => None,
        }
    }

    /// HEVC 状态
    pub fn hevc(&self) -> Option<&HevcState> {
        match self {
            Self::Hevc(s) => Some(s),
            _ => None,
        }
    }
}

/// 单条流的分析上下文
#[derive(Debug)]
pub struct StreamAnalysisContext {
    /// 流标识
    pub stream_id: u32,
    /// 当前编解码器, 首次配置前为 None
    pub codec: Option<CodecId>,
    /// 解析状态
    pub state: ParserState,
    /// NAL 长度字段宽度 (1-4)
    pub length_size: usize,
    /// 存在 SVC/MVC 增强层配置
    pub is_svc: bool,
    /// 已收到可用的配置; 为 false 时不分析负载
    pub configured: bool,
    /// 时间码参数
    pub timecode: TimecodeParams,
    /// 保护方式
    pub protection: Protection,
    /// 时间基
    pub timescale: u32,
    /// 已收到的包数
    pub packet_count: u64,
    /// 上次配置以来的包数
    pub packets_since_config: u64,
    /// 时长上限的起始时间戳
    pub first_ts: Option<u64>,
    /// 已达到时长上限, 后续包被丢弃
    pub stopped: bool,
    pub(crate) unsupported_warned: bool,
}

impl StreamAnalysisContext {
    /// 创建未配置的上下文
    pub fn new(stream_id: u32) -> Self {
        Self {
            stream_id,
            codec: None,
            state: ParserState::None,
            length_size: 4,
            is_svc: false,
            configured: false,
            timecode: TimecodeParams::default(),
            protection: Protection::None,
            timescale: 1000,
            packet_count: 0,
            packets_since_config: 0,
            first_ts: None,
            stopped: false,
            unsupported_warned: false,
        }
    }

    /// 当前分析族
    pub fn family(&self) -> Option<CodecFamily> {
        self.codec.map(|c| c.family())
    }

    /// 切换分析族: 分析族变化 (或尚无状态) 时丢弃旧状态并分配新状态, 否则保留
    pub(crate) fn ensure_state(&mut self, family: CodecFamily) {
        let wanted = ParserState::for_family(family);
        if self.state.family() != wanted.family() {
            if let Some(old) = self.state.family() {
                debug!("流 {} 解析状态重置: {:?} -> {:?}", self.stream_id, old, family);
            }
            self.state = wanted;
        }
    }

    fn nal_context(&self, opts: &InspectOptions) -> NalDumpContext {
        NalDumpContext {
            is_svc: self.is_svc,
            encrypted: self.protection == Protection::Cenc,
            ..NalDumpContext::new(opts, self.length_size)
        }
    }

    /// 分析一个访问单元的负载, 返回子单元报告与包级诊断
    pub fn analyze_payload(&mut self, data: &[u8], opts: &InspectOptions) -> (Vec<UnitReport>, Vec<InspectError>) {
        let Some(codec) = self.codec else {
            return (Vec::new(), Vec::new());
        };
        if !self.configured {
            return (Vec::new(), vec![InspectError::MissingConfiguration(codec.name().to_string())]);
        }

        let mut diagnostics = Vec::new();
        let mut units = Vec::new();
        let unconfigured = || InspectError::MissingConfiguration(codec.name().to_string());

        match codec.family() {
            CodecFamily::Avc | CodecFamily::Hevc => return self.analyze_nal_units(data, opts, codec),
            CodecFamily::Av1 => match &mut self.state {
                ParserState::Av1(state) => {
                    let (found, err) = inspect_obus(data, state, opts.dump_crc);
                    units = found;
                    diagnostics.extend(err);
                }
                _ => diagnostics.push(unconfigured()),
            },
            CodecFamily::MpegVideo => match &mut self.state {
                ParserState::MpegVideo(dsi) => {
                    let (found, err) = inspect_mpeg_video(data, dsi, codec == CodecId::Mpeg4Part2);
                    units = found;
                    diagnostics.extend(err);
                }
                _ => diagnostics.push(unconfigured()),
            },
            CodecFamily::MpegAudio => units = inspect_mpeg_audio(data),
            CodecFamily::Timecode => match decode_timecode(data, &self.timecode, opts.fftmcd) {
                Ok(Some(tc)) => units.push(tc.to_unit()),
                Ok(None) => {}
                Err(e) => diagnostics.push(e),
            },
            CodecFamily::Text => units.push(text_unit("Text", data)),
            CodecFamily::Xml => units.push(text_unit("XML", data)),
            CodecFamily::ProRes => units.push(inspect_prores_frame(data)),
            CodecFamily::Unsupported => {}
        }
        (units, diagnostics)
    }

    /// 长度前缀 NAL 负载: 先处理 Adobe 加密标记字节, 再逐个报告 NAL 单元
    fn analyze_nal_units(
        &mut self,
        data: &[u8],
        opts: &InspectOptions,
        codec: CodecId,
    ) -> (Vec<UnitReport>, Vec<InspectError>) {
        let mut payload = data;
        if self.protection == Protection::Adobe {
            match payload.split_first() {
                Some((&0, rest)) => payload = rest,
                Some(_) => {
                    let err = InspectError::Encrypted(
                        "Packet is an Adobe's protected frame and can not be dumped".into(),
                    );
                    return (Vec::new(), vec![err]);
                }
                None => return (Vec::new(), Vec::new()),
            }
        }
        let nal_ctx = self.nal_context(opts);
        let (units, err) = match &mut self.state {
            ParserState::Avc(state) => {
                inspect_nal_units(payload, nal_ctx.length_size, |nal| inspect_avc_nal(nal, state, &nal_ctx))
            }
            ParserState::Hevc(state) => {
                inspect_nal_units(payload, nal_ctx.length_size, |nal| inspect_hevc_nal(nal, state, &nal_ctx))
            }
            _ => (Vec::new(), Some(InspectError::MissingConfiguration(codec.name().to_string()))),
        };
        (units, err.into_iter().collect())
    }
}

/// 文本负载原样输出
pub(crate) fn text_unit(name: &'static str, data: &[u8]) -> UnitReport {
    let mut unit = UnitReport::new(UnitKind::Text)
        .with_name(name)
        .with_size(data.len() as u64);
    unit.push("content", String::from_utf8_lossy(data).into_owned());
    unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FieldValue;
    use crate::testutil::{avc_pps, avc_sps, prefixed};

    fn avc_context() -> StreamAnalysisContext {
        let mut ctx = StreamAnalysisContext::new(1);
        ctx.codec = Some(CodecId::Avc);
        ctx.ensure_state(CodecFamily::Avc);
        ctx.configured = true;
        ctx
    }

    #[test]
    fn test_state_retained_within_family() {
        let mut ctx = avc_context();
        let opts = InspectOptions::default();
        let (units, diags) = ctx.analyze_payload(&prefixed(&[avc_sps(false), avc_pps()], 4), &opts);
        assert!(diags.is_empty());
        assert_eq!(units.len(), 2);
        assert!(ctx.state.avc().and_then(|s| s.pps(0)).is_some());

        ctx.ensure_state(CodecFamily::Avc);
        assert!(ctx.state.avc().and_then(|s| s.pps(0)).is_some(), "同族重新配置保留参数集");
        ctx.ensure_state(CodecFamily::Hevc);
        assert!(ctx.state.avc().is_none());
        assert!(ctx.state.hevc().is_some());
        ctx.ensure_state(CodecFamily::Timecode);
        assert_eq!(ctx.state.family(), None);
    }

    #[test]
    fn test_unconfigured_stream_withholds_analysis() {
        let mut ctx = avc_context();
        ctx.configured = false;
        let (units, diags) = ctx.analyze_payload(&prefixed(&[avc_sps(false)], 4), &InspectOptions::default());
        assert!(units.is_empty());
        assert_eq!(diags[0].to_string(), "缺少解码配置: codec=avc");
        assert!(ctx.state.avc().and_then(|s| s.last_sps()).is_none(), "未配置时不调用解析原语");
    }

    #[test]
    fn test_adobe_protected_payload() {
        let mut ctx = avc_context();
        ctx.protection = Protection::Adobe;
        let opts = InspectOptions::default();

        let mut clear = vec![0u8];
        clear.extend(prefixed(&[vec![0x09, 0xF0]], 4));
        let (units, diags) = ctx.analyze_payload(&clear, &opts);
        assert!(diags.is_empty());
        assert_eq!(units[0].name.as_deref(), Some("AccessUnit delimiter"));

        let mut protected = vec![1u8];
        protected.extend(prefixed(&[vec![0x09, 0xF0]], 4));
        let (units, diags) = ctx.analyze_payload(&protected, &opts);
        assert!(units.is_empty());
        assert_eq!(diags[0].kind(), crate::error::ErrorKind::Encrypted);
    }

    #[test]
    fn test_text_payload_echoed() {
        let mut ctx = StreamAnalysisContext::new(3);
        ctx.codec = Some(CodecId::SubsText);
        ctx.configured = true;
        let (units, _) = ctx.analyze_payload(b"hello", &InspectOptions::default());
        assert_eq!(units[0].field("content"), Some(&FieldValue::Str("hello".into())));
    }
}
