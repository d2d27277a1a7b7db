//! # Tao Inspector
//!
//! 纯 Rust 实现的码流诊断检查工具.
//!
//! 把已解封装的访问单元拆分为编码子单元并逐个报告:
//! - **AVC/SVC/MVC 与 HEVC/L-HEVC**: NAL 单元、参数集、切片头、SEI、提取器与聚合器
//! - **AV1**: OBU、序列头、帧头、tile group
//! - **MPEG-1/2/4 视频与 MPEG 音频**: 起始码单元与音频帧头
//! - **ProRes**: 帧头与量化矩阵
//! - **时间码**: tmcd 样本解码
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tao_inspector::inspect::{AccessUnit, CodecId, InspectOptions, Inspector, JsonLinesSink, StreamProperties};
//!
//! let mut inspector = Inspector::new(InspectOptions::default(), JsonLinesSink::new(std::io::stdout()));
//! inspector.configure_stream(1, &StreamProperties::new(CodecId::MpegAudio))?;
//! inspector.push_packet(1, &AccessUnit::new(vec![0xFF, 0xFB, 0x90, 0x00]))?;
//! # Ok::<(), tao_inspector::inspect::InspectError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `tao-core` | 位读取器、CRC、有理数等基础工具 |
//! | `tao-bitstream` | 各编码族的语法解析原语与配置记录读取 |
//! | `tao-inspect` | 子单元遍历、分发、流级状态与报告 |

pub mod config;
pub mod logging;

/// 核心类型与工具
pub use tao_core as core;

/// 语法解析原语
pub use tao_bitstream as bitstream;

/// 码流检查器
pub use tao_inspect as inspect;

pub use config::InspectorConfig;
pub use logging::LoggingConfig;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
