//! # tao-inspect
//!
//! 码流诊断检查器.
//!
//! 接收已解封装的访问单元, 把每个访问单元拆分为编码子单元 (NAL 单元、OBU、起始码单元、
//! 音频帧、时间码), 逐个解析并输出结构化报告. 损坏或截断的数据只产生诊断, 不会中断检查.
//!
//! - [`inspector`]: 检查器入口, 管理各流的分析上下文
//! - [`lifecycle`]: 流配置/重新配置, 解码配置记录输出
//! - [`context`]: 流级解析状态与按分析族分发
//! - [`nal`] / [`obu`] / [`mpeg`] / [`prores`] / [`timecode`]: 各分析族的子单元报告
//! - [`report`]: 报告模型与输出

pub mod codec;
pub mod context;
pub mod error;
pub mod inspector;
pub mod layered;
pub mod lifecycle;
pub mod mpeg;
pub mod nal;
pub mod obu;
pub mod options;
pub mod packet;
pub mod prores;
pub mod report;
pub mod sei;
pub mod stream;
pub mod timecode;
pub mod unit_iter;

#[cfg(test)]
mod testutil;

pub use codec::{CodecFamily, CodecId};
pub use context::{ParserState, StreamAnalysisContext};
pub use error::{ErrorKind, InspectError, InspectResult};
pub use inspector::Inspector;
pub use options::{InspectOptions, SeiBoundaryPolicy};
pub use packet::{AccessUnit, ClockType, Framing, PacketFlags};
pub use report::{
    ConfigSection, FieldValue, Fields, JsonLinesSink, MemorySink, PacketReport, ReportSink, StreamEvent,
    StreamReport, UnitKind, UnitReport,
};
pub use stream::{Protection, StreamProperties};
