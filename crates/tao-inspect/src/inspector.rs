//! 检查器: 按流标识持有分析上下文, 把配置事件与访问单元转换为报告.

use std::collections::HashMap;

use log::debug;

use crate::context::StreamAnalysisContext;
use crate::error::{InspectError, InspectResult};
use crate::options::InspectOptions;
use crate::packet::{AccessUnit, packet_fields};
use crate::report::{PacketReport, ReportSink, StreamEvent, StreamReport};
use crate::stream::StreamProperties;

/// 码流检查器
///
/// 单线程同步处理: 每个访问单元在一次 [`Inspector::push_packet`] 调用内处理完毕.
/// 各流的解析状态互相独立.
pub struct Inspector<S: ReportSink> {
    options: InspectOptions,
    sink: S,
    streams: HashMap<u32, StreamAnalysisContext>,
}

impl<S: ReportSink> Inspector<S> {
    /// 创建检查器
    pub fn new(options: InspectOptions, sink: S) -> Self {
        Self {
            options,
            sink,
            streams: HashMap::new(),
        }
    }

    /// 检查选项
    pub fn options(&self) -> &InspectOptions {
        &self.options
    }

    /// 报告接收端
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 取回报告接收端
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// 流的分析上下文
    pub fn stream(&self, stream_id: u32) -> Option<&StreamAnalysisContext> {
        self.streams.get(&stream_id)
    }

    /// 流是否已因时长上限停止
    pub fn is_stopped(&self, stream_id: u32) -> bool {
        self.streams.get(&stream_id).is_some_and(|c| c.stopped)
    }

    /// 配置或重新配置流
    pub fn configure_stream(&mut self, stream_id: u32, props: &StreamProperties) -> InspectResult<()> {
        let ctx = self
            .streams
            .entry(stream_id)
            .or_insert_with(|| StreamAnalysisContext::new(stream_id));
        let report = ctx.configure(props, &self.options);
        self.sink.on_stream(report)
    }

    /// 移除流, 丢弃其解析状态
    pub fn remove_stream(&mut self, stream_id: u32) -> InspectResult<()> {
        let Some(ctx) = self.streams.remove(&stream_id) else {
            return Ok(());
        };
        let codec = ctx.codec.map(|c| c.name()).unwrap_or_default();
        self.sink
            .on_stream(StreamReport::new(stream_id, StreamEvent::Remove, codec))
    }

    /// 检查一个访问单元
    ///
    /// 已停止的流静默丢弃访问单元. 达到时长上限的访问单元仍然报告.
    pub fn push_packet(&mut self, stream_id: u32, au: &AccessUnit) -> InspectResult<()> {
        let ctx = self
            .streams
            .get_mut(&stream_id)
            .ok_or_else(|| InspectError::InvalidData(format!("流 {} 尚未配置", stream_id)))?;
        if ctx.stopped {
            return Ok(());
        }
        ctx.packet_count += 1;
        ctx.packets_since_config += 1;

        if let Some(report) = build_packet_report(ctx, au, &self.options) {
            self.sink.on_packet(report)?;
        }

        if self.options.has_duration_limit() {
            check_duration(ctx, au, &self.options);
        }
        Ok(())
    }
}

fn build_packet_report(
    ctx: &mut StreamAnalysisContext,
    au: &AccessUnit,
    opts: &InspectOptions,
) -> Option<PacketReport> {
    if !opts.deep && !opts.analyze {
        return None;
    }
    let mut report = PacketReport::new(ctx.stream_id, ctx.packet_count);

    if au.clock.is_some() {
        if !opts.pcr {
            return None;
        }
        report.fields = packet_fields(au, false);
        return Some(report);
    }
    if au.data.is_empty() {
        return None;
    }

    if opts.deep {
        report.fields = packet_fields(au, opts.dump_data);
    }
    if opts.analyze {
        let (units, diagnostics) = ctx.analyze_payload(&au.data, opts);
        report.units = units;
        report.diagnostics = diagnostics;
    }
    Some(report)
}

/// 时长上限: `dur.den * (ts - first_ts) >= dur.num * timescale` 时停止该流
fn check_duration(ctx: &mut StreamAnalysisContext, au: &AccessUnit, opts: &InspectOptions) {
    let Some(ts) = au.timestamp() else {
        return;
    };
    let Some(first) = ctx.first_ts else {
        ctx.first_ts = Some(ts);
        return;
    };
    let elapsed = u128::from(ts.saturating_sub(first)) * opts.duration.den.unsigned_abs() as u128;
    let limit = opts.duration.num.unsigned_abs() as u128 * u128::from(ctx.timescale);
    if elapsed >= limit {
        debug!("流 {} 达到时长上限, 停止检查 (ts={})", ctx.stream_id, ts);
        ctx.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecId;
    use crate::error::ErrorKind;
    use crate::packet::ClockType;
    use crate::report::{JsonLinesSink, MemorySink};
    use crate::testutil::{avc_idr_slice, avc_pps, avc_sps, hevc_pps, hevc_sps, hevc_vps, prefixed};
    use tao_bitstream::h264::build_avc_config;
    use tao_bitstream::h265::{ParamArray, build_hevc_config};
    use tao_core::Rational;

    fn avc_props() -> StreamProperties {
        StreamProperties::new(CodecId::Avc).with_decoder_config(build_avc_config(&[avc_sps(false)], &[avc_pps()], 4).unwrap())
    }

    fn hevc_props() -> StreamProperties {
        let arrays: Vec<_> = [(32, hevc_vps()), (33, hevc_sps()), (34, hevc_pps(None))]
            .into_iter()
            .map(|(nal_type, nal)| ParamArray {
                completeness: true,
                nal_type,
                nalus: vec![nal],
            })
            .collect();
        StreamProperties::new(CodecId::Hevc).with_decoder_config(build_hevc_config(&arrays, 4).unwrap())
    }

    fn idr_packet(ts: u64) -> AccessUnit {
        AccessUnit::new(prefixed(&[vec![0x09, 0xF0], avc_idr_slice()], 4)).with_timestamps(Some(ts), Some(ts))
    }

    #[test]
    fn test_packet_numbering_and_analysis() {
        let mut inspector = Inspector::new(InspectOptions::default(), MemorySink::new());
        inspector.configure_stream(1, &avc_props()).unwrap();
        inspector.push_packet(1, &idr_packet(0)).unwrap();
        inspector.push_packet(1, &idr_packet(40)).unwrap();

        let sink = inspector.into_sink();
        assert_eq!(sink.streams.len(), 1);
        assert_eq!(sink.packets.len(), 2);
        let pkt = &sink.packets[1];
        assert_eq!(pkt.number, 2);
        assert_eq!(pkt.field("dts").map(ToString::to_string), Some("40".into()));
        assert_eq!(pkt.units.len(), 2);
        assert_eq!(pkt.units[1].name.as_deref(), Some("IDR slice"));
        assert!(pkt.units[1].is_clean(), "{:?}", pkt.units[1].diagnostics);
    }

    #[test]
    fn test_avc_to_hevc_discards_state() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut inspector = Inspector::new(InspectOptions::default(), MemorySink::new());
        inspector.configure_stream(1, &avc_props()).unwrap();
        inspector.push_packet(1, &idr_packet(0)).unwrap();

        // 切换到 HEVC 但没有配置记录: AVC 状态被丢弃, 后续包不再分析
        inspector
            .configure_stream(1, &StreamProperties::new(CodecId::Hevc))
            .unwrap();
        assert!(inspector.stream(1).unwrap().state.avc().is_none());
        inspector.push_packet(1, &idr_packet(40)).unwrap();

        // 有效配置到达后恢复分析, 使用全新的 HEVC 状态
        inspector.configure_stream(1, &hevc_props()).unwrap();
        let state = inspector.stream(1).unwrap().state.hevc().unwrap();
        assert!(state.sps(0).is_some());

        let sink = inspector.into_sink();
        assert_eq!(sink.streams[1].event, StreamEvent::Reconfigure);
        assert_eq!(sink.streams[1].fields.get("packetsSinceLastConfig").map(ToString::to_string), Some("1".into()));
        let stray = &sink.packets[1];
        assert!(stray.units.is_empty(), "旧族的子单元不再用过期状态解析");
        assert_eq!(stray.diagnostics[0].kind(), ErrorKind::MissingConfiguration);
        assert_eq!(sink.streams[2].sections.len(), 3);
    }

    #[test]
    fn test_independent_contexts_identical_output() {
        let run = |stream_id: u32| {
            let mut inspector = Inspector::new(InspectOptions::default(), JsonLinesSink::new(Vec::new()));
            inspector.configure_stream(stream_id, &avc_props()).unwrap();
            inspector.push_packet(stream_id, &idr_packet(0)).unwrap();
            String::from_utf8(inspector.into_sink().into_inner()).unwrap()
        };
        assert_eq!(run(7), run(7), "相同输入产生逐字节相同的报告");

        let mut inspector = Inspector::new(InspectOptions::default(), MemorySink::new());
        inspector.configure_stream(1, &avc_props()).unwrap();
        inspector.configure_stream(2, &avc_props()).unwrap();
        inspector.push_packet(1, &idr_packet(0)).unwrap();
        inspector.push_packet(2, &idr_packet(0)).unwrap();
        let sink = inspector.into_sink();
        assert_eq!(sink.packets[0].units, sink.packets[1].units, "两条流互不影响");
    }

    #[test]
    fn test_duration_limit() {
        let opts = InspectOptions {
            duration: Rational::new(1, 1),
            ..Default::default()
        };
        let mut inspector = Inspector::new(opts, MemorySink::new());
        inspector.configure_stream(1, &avc_props().with_timescale(1000)).unwrap();
        for ts in [0, 500, 1000, 1500] {
            inspector.push_packet(1, &idr_packet(ts)).unwrap();
        }
        assert!(inspector.is_stopped(1));
        let sink = inspector.into_sink();
        assert_eq!(sink.packets.len(), 3, "达到上限的包仍然报告, 之后的包丢弃");
    }

    #[test]
    fn test_clock_packets_and_reporting_switches() {
        let opts = InspectOptions {
            pcr: true,
            analyze: false,
            ..Default::default()
        };
        let mut inspector = Inspector::new(opts, MemorySink::new());
        inspector.configure_stream(1, &avc_props()).unwrap();
        inspector
            .push_packet(1, &AccessUnit::clock(ClockType::Pcr, Some(27_000_000)))
            .unwrap();
        inspector.push_packet(1, &idr_packet(0)).unwrap();
        let sink = inspector.sink();
        assert_eq!(sink.packets[0].fields.len(), 1);
        assert!(sink.packets[1].units.is_empty(), "analyze 关闭时不解析负载");
        assert!(sink.packets[1].field("CRC32").is_some());

        let mut quiet = Inspector::new(InspectOptions::default(), MemorySink::new());
        quiet.configure_stream(1, &avc_props()).unwrap();
        quiet.push_packet(1, &AccessUnit::clock(ClockType::Pcr, Some(0))).unwrap();
        assert!(quiet.sink().packets.is_empty(), "未启用 pcr 时不报告时钟包");
    }

    #[test]
    fn test_unknown_stream_and_remove() {
        let mut inspector = Inspector::new(InspectOptions::default(), MemorySink::new());
        assert!(inspector.push_packet(9, &idr_packet(0)).is_err());
        inspector.configure_stream(9, &avc_props()).unwrap();
        inspector.remove_stream(9).unwrap();
        assert!(inspector.stream(9).is_none());
        let sink = inspector.into_sink();
        assert_eq!(sink.streams[1].event, StreamEvent::Remove);
        assert_eq!(sink.streams[1].codec, "avc");
    }
}
