//! 四字符码 (FourCC) 辅助函数.
//!
//! 保护方案、编码标识等使用 32 位四字符码表示.

/// 由 4 个字节构造大端四字符码
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

/// 将四字符码格式化为字符串
///
/// 4 个字节均为可打印 ASCII 时返回对应字符, 否则返回 `0x%08X` 形式.
pub fn fourcc_to_string(code: u32) -> String {
    let bytes = code.to_be_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        bytes.iter().map(|&b| char::from(b)).collect()
    } else {
        format!("0x{:08X}", code)
    }
}
