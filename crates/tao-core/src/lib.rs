//! # tao-core
//!
//! 码流检查工具的核心库, 提供错误类型、位级读写、校验和以及有理数等基础设施.

pub mod bitreader;
pub mod bitwriter;
pub mod crc;
pub mod error;
pub mod fourcc;
pub mod rational;
pub mod rbsp;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{TaoError, TaoResult};
pub use rational::Rational;
