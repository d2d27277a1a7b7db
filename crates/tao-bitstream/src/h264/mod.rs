//! H.264/AVC (含 SVC/MVC 扩展) 码流解析原语.
//!
//! - NAL 类型常量与头部字段
//! - SPS / 子集 SPS / PPS 解析
//! - 切片头 (POC 所需部分) 解析与 POC 推导
//! - AVCDecoderConfigurationRecord (avcC / svcC) 读取
//!
//! 解析状态由 [`AvcState`] 持有, 每个流独占一份.

pub mod config;
pub mod nal;
pub mod pps;
pub mod slice;
pub mod sps;
pub mod state;

pub use config::{AvcDecoderConfig, build_avc_config, parse_avc_config};
pub use nal::NalHeader;
pub use pps::{Pps, parse_pps};
pub use slice::{SliceHeader, SliceInfo, SliceType};
pub use sps::{Sps, Vui, parse_sps};
pub use state::{AvcState, SUBSET_SPS_ID_SHIFT};
