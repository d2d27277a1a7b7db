//! H.265/HEVC (含 L-HEVC 分层扩展) 码流解析原语.
//!
//! - NAL 头部与类型
//! - VPS / SPS / PPS 解析
//! - 切片段头与 POC 推导
//! - HEVCDecoderConfigurationRecord (hvcC / lhvC) 读取
//!
//! 解析状态由 [`HevcState`] 持有.

pub mod config;
pub mod nal;
pub mod pps;
pub mod slice;
pub mod sps;
pub mod state;
pub mod vps;

pub use config::{HevcDecoderConfig, ParamArray, build_hevc_config, parse_hevc_config};
pub use nal::{HevcNalUnitType, NalHeader};
pub use pps::{HevcPps, parse_pps};
pub use slice::{HevcSliceType, SliceSegmentHeader};
pub use sps::{HevcSps, HevcVui, ProfileTierLevel, parse_sps};
pub use state::{HevcSliceInfo, HevcState};
pub use vps::{Vps, parse_vps};
