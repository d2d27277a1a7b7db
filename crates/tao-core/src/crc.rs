//! CRC 校验和计算.
//!
//! 提供 CRC-32/MPEG-2 (多项式 0x04C11DB7, 初始值 0xFFFFFFFF, 不反转, 无结果异或),
//! 用于报告单元与数据包的校验值.

/// CRC-32 查找表 (多项式 0x04C11DB7, MSB first)
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

/// 计算 CRC-32/MPEG-2
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0xFFFF_FFFF, data)
}

/// 在已有 CRC 状态上追加数据
pub fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        let idx = ((crc >> 24) ^ u32::from(byte)) & 0xFF;
        crc = (crc << 8) ^ CRC32_TABLE[idx as usize];
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0x0376_E6E7);
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_crc32_incremental() {
        let whole = crc32(b"hello world");
        let part = crc32_update(crc32(b"hello "), b"world");
        assert_eq!(whole, part);
    }
}
