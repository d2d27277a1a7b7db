//! # tao-bitstream
//!
//! 码流语法解析原语.
//!
//! 每个编码族提供一个可变解析状态 (参数集表 + 当前切片/帧上下文), 以及解码配置记录读取:
//! - [`h264`]: AVC/SVC/MVC 参数集、切片头与 POC, avcC/svcC
//! - [`h265`]: HEVC/LHVC 参数集、切片段头与 POC, hvcC/lhvC
//! - [`av1`]: OBU 头、序列头、未压缩帧头、tile group, av1C
//! - [`prores`]: ProRes 帧头与量化矩阵
//! - [`mpeg12v`]: MPEG-1/2 与 MPEG-4 Part 2 视频对象头
//! - [`mpa`]: MPEG-1/2 音频帧头
//!
//! 所有解析函数只读取给定切片内的数据, 失败时返回错误且保持状态可查询.

pub mod av1;
pub mod h264;
pub mod h265;
pub mod mpa;
pub mod mpeg12v;
pub mod prores;
