//! AV1 OBU 语法: OBU 头、序列头、未压缩帧头、tile group 与 av1C.

pub mod config;
pub mod frame;
pub mod obu;
pub mod sequence;
pub mod state;

pub use config::{Av1Config, build_av1_config, parse_av1_config};
pub use frame::{FrameHeader, FrameType, TileInfo};
pub use obu::{ObuHeader, ObuType, build_obu, parse_obu_header};
pub use sequence::{ColorConfig, SequenceHeader, parse_sequence_header};
pub use state::{Av1FrameState, Av1State, ParsedObu};
