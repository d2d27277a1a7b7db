//! 结构化报告模型与报告接收端.
//!
//! 配置事件产生 [`StreamReport`], 每个访问单元产生 [`PacketReport`], 两者都由若干
//! [`UnitReport`] 组成. 报告通过调用方提供的 [`ReportSink`] 交付.

use std::fmt;
use std::io::Write;

use serde::Serialize;

use crate::error::{InspectError, InspectResult};

// ============================================================
// 字段
// ============================================================

/// 报告字段值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 有符号整数
    Int(i64),
    /// 无符号整数
    UInt(u64),
    /// 标志
    Bool(bool),
    /// 浮点数
    Float(f64),
    /// 文本
    Str(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", u8::from(*v)),
            Self::Float(v) => write!(f, "{:.6}", v),
            Self::Str(v) => f.write_str(v),
        }
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                Self::UInt(u64::from(v))
            }
        })*
    };
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                Self::Int(i64::from(v))
            }
        })*
    };
}

impl_from_unsigned!(u8, u16, u32, u64);
impl_from_signed!(i8, i16, i32, i64);

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        Self::UInt(v as u64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// 命名字段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// 字段名
    pub name: &'static str,
    /// 字段值
    pub value: FieldValue,
}

/// 按插入顺序保存的字段列表
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(Vec<Field>);

impl Fields {
    /// 追加字段
    pub fn push(&mut self, name: &'static str, value: impl Into<FieldValue>) {
        self.0.push(Field {
            name,
            value: value.into(),
        });
    }

    /// 查找第一个同名字段
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// 是否包含字段
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 字段迭代器
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.0.iter()
    }

    /// 字段数
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================
// 单元报告
// ============================================================

/// 单元类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// AVC/HEVC NAL 单元
    Nalu,
    /// SEI 消息
    SeiMessage,
    /// 提取器记录
    ExtractorRecord,
    /// AV1 OBU
    Obu,
    /// ProRes 帧
    ProResFrame,
    /// MPEG-4 Part 2 视觉对象
    Mpeg4P2VideoObj,
    /// MPEG-1/2 视频对象
    Mpeg12VideoObj,
    /// MPEG 音频帧
    MpegAudioFrame,
    /// 时间码
    TimeCode,
    /// 文本负载
    Text,
}

/// 单个单元的报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    /// 单元类别
    pub kind: UnitKind,
    /// 类型编号 (NAL 类型、OBU 类型、起始码等)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    /// 类型名称
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 单元字节数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// 报告字段
    pub fields: Fields,
    /// 子单元 (SEI 消息、提取器记录)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UnitReport>,
    /// 诊断
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<InspectError>,
}

impl UnitReport {
    /// 创建空报告
    pub fn new(kind: UnitKind) -> Self {
        Self {
            kind,
            code: None,
            name: None,
            size: None,
            fields: Fields::default(),
            children: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// 设置类型编号
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }

    /// 设置类型名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 设置单元字节数
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// 追加字段
    pub fn push(&mut self, name: &'static str, value: impl Into<FieldValue>) {
        self.fields.push(name, value);
    }

    /// 查找字段
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// 追加诊断
    pub fn diagnose(&mut self, err: InspectError) {
        self.diagnostics.push(err);
    }

    /// 是否没有诊断
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.children.iter().all(UnitReport::is_clean)
    }
}

// ============================================================
// 包与流报告
// ============================================================

/// 单个访问单元的报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketReport {
    /// 流标识
    pub stream_id: u32,
    /// 包序号 (从 1 开始)
    pub number: u64,
    /// 包级字段
    pub fields: Fields,
    /// 子单元报告
    pub units: Vec<UnitReport>,
    /// 包级诊断 (截断、缺少配置等)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<InspectError>,
}

impl PacketReport {
    /// 创建空报告
    pub fn new(stream_id: u32, number: u64) -> Self {
        Self {
            stream_id,
            number,
            fields: Fields::default(),
            units: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// 查找包级字段
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// 流配置事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    /// 首次配置
    Configure,
    /// 重新配置
    Reconfigure,
    /// 流移除
    Remove,
}

/// 配置记录中的一组单元 (参数集数组、OBU 配置等)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSection {
    /// 分组名称, 如 `AVCSPS`, `HEVCPPS`, `OBUConfig`
    pub name: &'static str,
    /// 来源记录, 如 `decoderConfig`, `hvcC`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<&'static str>,
    /// 单元报告
    pub units: Vec<UnitReport>,
}

impl ConfigSection {
    /// 创建空分组
    pub fn new(name: &'static str, location: Option<&'static str>) -> Self {
        Self {
            name,
            location,
            units: Vec::new(),
        }
    }
}

/// 流配置报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamReport {
    /// 流标识
    pub stream_id: u32,
    /// 事件类型
    pub event: StreamEvent,
    /// 编解码器名称
    pub codec: String,
    /// 流级字段 (长度字段宽度、保护模式等)
    pub fields: Fields,
    /// 配置记录分组
    pub sections: Vec<ConfigSection>,
    /// 流级诊断
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<InspectError>,
}

impl StreamReport {
    /// 创建空报告
    pub fn new(stream_id: u32, event: StreamEvent, codec: impl Into<String>) -> Self {
        Self {
            stream_id,
            event,
            codec: codec.into(),
            fields: Fields::default(),
            sections: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// 按名称与来源查找分组
    pub fn section(&self, name: &str, location: Option<&str>) -> Option<&ConfigSection> {
        self.sections
            .iter()
            .find(|s| s.name == name && (location.is_none() || s.location == location))
    }
}

// ============================================================
// 报告接收端
// ============================================================

/// 报告接收端
pub trait ReportSink {
    /// 接收流配置报告
    fn on_stream(&mut self, report: StreamReport) -> InspectResult<()>;

    /// 接收访问单元报告
    fn on_packet(&mut self, report: PacketReport) -> InspectResult<()>;
}

/// 内存收集器
#[derive(Debug, Default)]
pub struct MemorySink {
    /// 已收到的流报告
    pub streams: Vec<StreamReport>,
    /// 已收到的包报告
    pub packets: Vec<PacketReport>,
}

impl MemorySink {
    /// 创建空收集器
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemorySink {
    fn on_stream(&mut self, report: StreamReport) -> InspectResult<()> {
        self.streams.push(report);
        Ok(())
    }

    fn on_packet(&mut self, report: PacketReport) -> InspectResult<()> {
        self.packets.push(report);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Stream(&'a StreamReport),
    Packet(&'a PacketReport),
}

/// JSON Lines 输出: 每个报告一行 JSON, 以 `type` 字段区分流/包报告
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// 包装输出
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 取回输出
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &Record<'_>) -> InspectResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn on_stream(&mut self, report: StreamReport) -> InspectResult<()> {
        self.write_record(&Record::Stream(&report))
    }

    fn on_packet(&mut self, report: PacketReport) -> InspectResult<()> {
        self.write_record(&Record::Packet(&report))
    }
}
