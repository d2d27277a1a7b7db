//! 配置生命周期: 首次配置与重新配置.
//!
//! 每次配置事件先确定分析族并按需重置解析状态, 再用对应的配置记录读取原语解析
//! 配置记录, 把其中的参数集/OBU/对象逐个送入与负载相同的报告路径.

use log::{debug, warn};
use tao_bitstream::av1::parse_av1_config;
use tao_bitstream::h264::{AvcDecoderConfig, parse_avc_config};
use tao_bitstream::h265::{HevcDecoderConfig, parse_hevc_config};

use crate::codec::{CodecFamily, CodecId};
use crate::context::{ParserState, StreamAnalysisContext, text_unit};
use crate::error::InspectError;
use crate::mpeg::inspect_mpeg_video;
use crate::nal::{NalDumpContext, inspect_avc_nal, inspect_hevc_nal};
use crate::obu::inspect_obus;
use crate::options::InspectOptions;
use crate::report::{ConfigSection, StreamEvent, StreamReport};
use crate::stream::{Protection, StreamProperties};

const HEVC_NAL_VPS: u8 = 32;
const HEVC_NAL_SPS: u8 = 33;
const HEVC_NAL_PPS: u8 = 34;

impl StreamAnalysisContext {
    /// 处理配置事件, 返回流报告
    ///
    /// 分析族变化时丢弃旧解析状态; 同族重新配置保留参数集表. 缺少必需配置时附加
    /// `MissingConfiguration`, 之后的包在收到有效配置前不分析.
    pub fn configure(&mut self, props: &StreamProperties, opts: &InspectOptions) -> StreamReport {
        let event = if self.codec.is_some() {
            StreamEvent::Reconfigure
        } else {
            StreamEvent::Configure
        };
        let codec = props.codec_id;
        let mut report = StreamReport::new(self.stream_id, event, codec.name());
        if event == StreamEvent::Reconfigure && self.packets_since_config > 0 {
            report.fields.push("packetsSinceLastConfig", self.packets_since_config);
        }
        self.packets_since_config = 0;

        self.codec = Some(codec);
        self.timecode = props.timecode_params();
        self.protection = props.protection();
        self.timescale = props.timescale;
        self.is_svc = false;
        self.configured = true;
        if self.protection != Protection::None {
            report.fields.push("protection", format!("{:?}", self.protection));
        }

        let family = codec.family();
        self.ensure_state(family);
        if !opts.analyze {
            return report;
        }

        match family {
            CodecFamily::Avc => self.configure_avc(props, opts, &mut report),
            CodecFamily::Hevc => self.configure_hevc(props, opts, &mut report),
            CodecFamily::Av1 => {
                if let (Some(dsi), ParserState::Av1(state)) = (&props.decoder_config, &mut self.state) {
                    match parse_av1_config(dsi) {
                        Ok(cfg) => {
                            let mut section = ConfigSection::new("OBUConfig", None);
                            for obu in &cfg.obus {
                                let (units, err) = inspect_obus(obu, state, opts.dump_crc);
                                section.units.extend(units);
                                report.diagnostics.extend(err);
                            }
                            report.sections.push(section);
                        }
                        Err(e) => report.diagnostics.push(e.into()),
                    }
                }
            }
            CodecFamily::MpegVideo => {
                if let (Some(dsi), ParserState::MpegVideo(info)) = (&props.decoder_config, &mut self.state) {
                    let (units, err) = inspect_mpeg_video(dsi, info, codec == CodecId::Mpeg4Part2);
                    let mut section = ConfigSection::new("MPEGVideoConfig", None);
                    section.units = units;
                    report.sections.push(section);
                    report.diagnostics.extend(err);
                }
            }
            CodecFamily::Text | CodecFamily::Xml => {
                if let Some(dsi) = &props.decoder_config {
                    let (name, label) = if family == CodecFamily::Text {
                        ("TextConfig", "Text")
                    } else {
                        ("XMLTextConfig", "XML")
                    };
                    let mut section = ConfigSection::new(name, None);
                    section.units.push(text_unit(label, dsi));
                    report.sections.push(section);
                }
            }
            CodecFamily::MpegAudio | CodecFamily::Timecode | CodecFamily::ProRes => {}
            CodecFamily::Unsupported => {
                let err = InspectError::UnsupportedCodec(codec.name().to_string());
                if !self.unsupported_warned {
                    warn!("{}", err);
                    self.unsupported_warned = true;
                }
                report.diagnostics.push(err);
            }
        }
        debug!(
            "流 {} {:?}: codec={}, sections={}",
            self.stream_id,
            event,
            codec,
            report.sections.len()
        );
        report
    }

    fn missing_configuration(&mut self, codec: CodecId, report: &mut StreamReport) {
        self.configured = false;
        report.diagnostics.push(InspectError::MissingConfiguration(codec.name().to_string()));
    }

    fn configure_avc(&mut self, props: &StreamProperties, opts: &InspectOptions, report: &mut StreamReport) {
        let codec = props.codec_id;
        if props.decoder_config.is_none() && props.decoder_config_enhancement.is_none() {
            self.missing_configuration(codec, report);
            return;
        }

        let mut read = |data: &[u8], is_svc: bool| -> Option<AvcDecoderConfig> {
            parse_avc_config(data, is_svc)
                .map_err(|e| report.diagnostics.push(e.into()))
                .ok()
        };
        let avcc = props.decoder_config.as_deref().and_then(|d| read(d, false));
        let svcc = props.decoder_config_enhancement.as_deref().and_then(|d| read(d, true));
        if avcc.is_none() && svcc.is_none() {
            self.configured = false;
            return;
        }
        if let Some(cfg) = svcc.as_ref().or(avcc.as_ref()) {
            self.length_size = cfg.length_size;
        }
        self.is_svc = svcc.is_some();
        report.fields.push("nalu_size_length", self.length_size);

        let nal_ctx = NalDumpContext {
            is_svc: self.is_svc,
            ..NalDumpContext::new(opts, self.length_size)
        };
        let ParserState::Avc(state) = &mut self.state else {
            return;
        };
        let mut dump = |name: &'static str, location: &'static str, nalus: &[Vec<u8>]| {
            if nalus.is_empty() {
                return;
            }
            let mut section = ConfigSection::new(name, Some(location));
            section.units = nalus.iter().map(|n| inspect_avc_nal(n, state, &nal_ctx)).collect();
            report.sections.push(section);
        };
        if let Some(cfg) = &avcc {
            dump("AVCSPS", "decoderConfig", &cfg.sps_list);
            dump("AVCPPS", "decoderConfig", &cfg.pps_list);
            dump("AVCSPSEx", "decoderConfig", &cfg.sps_ext_list);
        }
        if let Some(cfg) = &svcc {
            let location = if props.decoder_config_enhancement.is_some() {
                "decoderConfigEnhancement"
            } else {
                "decoderConfig"
            };
            dump("SVCSPS", location, &cfg.sps_list);
            dump("SVCPPS", location, &cfg.pps_list);
        }
    }

    fn configure_hevc(&mut self, props: &StreamProperties, opts: &InspectOptions, report: &mut StreamReport) {
        let codec = props.codec_id;
        let (dsi, dsi_enh) = (&props.decoder_config, &props.decoder_config_enhancement);
        if dsi.is_none() && dsi_enh.is_none() {
            self.missing_configuration(codec, report);
            return;
        }

        let mut read = |data: &[u8], is_lhvc: bool| -> Option<HevcDecoderConfig> {
            parse_hevc_config(data, is_lhvc)
                .map_err(|e| report.diagnostics.push(e.into()))
                .ok()
        };
        // 仅有一个记录的 L-HEVC 流把它当作 lhcC
        let lhvc_only = codec.is_layered() && dsi_enh.is_none();
        let mut hvcc = None;
        let mut lhcc = None;
        if let Some(d) = dsi.as_deref() {
            if lhvc_only {
                lhcc = read(d, true);
            } else {
                hvcc = read(d, false);
            }
        }
        if lhcc.is_none() {
            lhcc = dsi_enh.as_deref().and_then(|d| read(d, true));
        }
        if hvcc.is_none() && lhcc.is_none() {
            self.configured = false;
            return;
        }
        if let Some(cfg) = lhcc.as_ref().or(hvcc.as_ref()) {
            self.length_size = cfg.length_size;
        }
        report.fields.push("nalu_size_length", self.length_size);

        let nal_ctx = NalDumpContext::new(opts, self.length_size);
        let ParserState::Hevc(state) = &mut self.state else {
            return;
        };
        for (cfg, location) in [(&hvcc, "hvcC"), (&lhcc, "lhcC")] {
            let Some(cfg) = cfg else {
                continue;
            };
            for array in cfg.arrays.iter().filter(|a| !a.nalus.is_empty()) {
                let name = match array.nal_type {
                    HEVC_NAL_VPS => "HEVCVPS",
                    HEVC_NAL_SPS => "HEVCSPS",
                    HEVC_NAL_PPS => "HEVCPPS",
                    _ => "HEVCUnknownPS",
                };
                let mut section = ConfigSection::new(name, Some(location));
                section.units = array
                    .nalus
                    .iter()
                    .map(|n| inspect_hevc_nal(n, state, &nal_ctx))
                    .collect();
                report.sections.push(section);
            }
        }
    }
}
