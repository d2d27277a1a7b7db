//! 比特流写入器.
//!
//! 按大端位序写入 (MSB first), 与 BitReader 对应.
//! 用于构造参数集、OBU 头部等测试码流以及基准数据.

/// 比特流写入器
///
/// # 示例
/// ```
/// use tao_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bits(0b0001, 4);
/// bw.write_bits(0b01010101, 8);
/// let data = bw.finish();
/// assert_eq!(data, vec![0b10110001, 0b01010101]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        self.current_byte = (self.current_byte << 1) | (bit & 1) as u8;
        self.bit_count += 1;
        if self.bit_count >= 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入 1 位标志
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bit(u32::from(flag));
    }

    /// 写入 N 个位 (最多 32 位)
    ///
    /// 值的低 N 位被写入, 高位在前 (大端).
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);

        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - self.bit_count as u32;
            let to_write = remaining.min(available);

            let shift = remaining - to_write;
            let mask = (1u32 << to_write) - 1;
            let bits = ((value >> shift) & mask) as u8;

            if to_write >= 8 {
                self.current_byte = bits;
            } else {
                self.current_byte = (self.current_byte << to_write) | bits;
            }
            self.bit_count += to_write as u8;

            if self.bit_count >= 8 {
                self.data.push(self.current_byte);
                self.current_byte = 0;
                self.bit_count = 0;
            }

            remaining -= to_write;
        }
    }

    /// 写入有符号整数 (二进制补码)
    pub fn write_bits_signed(&mut self, value: i32, n: u32) {
        let mask = ((1u64 << n) - 1) as u32;
        self.write_bits((value as u32) & mask, n);
    }

    /// 写入无符号 Exp-Golomb 编码值 ue(v)
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        for _ in 0..len - 1 {
            self.write_bit(0);
        }
        for i in (0..len).rev() {
            self.write_bit(((code >> i) & 1) as u32);
        }
    }

    /// 写入有符号 Exp-Golomb 编码值 se(v)
    pub fn write_se(&mut self, value: i32) {
        let code = if value > 0 {
            (value as u32) * 2 - 1
        } else {
            value.unsigned_abs() * 2
        };
        self.write_ue(code);
    }

    /// 写入 AV1 leb128 编码值
    pub fn write_leb128(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u32;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.write_bits(byte, 8);
            if value == 0 {
                break;
            }
        }
    }

    /// 写入 H.264/H.265 rbsp_trailing_bits
    pub fn write_trailing_bits(&mut self) {
        self.write_bit(1);
        self.align_to_byte();
    }

    /// 对齐到字节边界 (用 0 填充)
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            self.current_byte <<= pad;
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入完整字节
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_count == 0 {
            self.data.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }

    /// 完成写入, 返回字节数据
    ///
    /// 如果当前不在字节边界, 自动用 0 填充.
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_write_bits_cross_byte() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.write_bits(0b11001100, 8);
        bw.write_bits(0b11111, 5);
        assert_eq!(bw.bits_written(), 16);
        assert_eq!(bw.finish(), vec![0b10111001, 0b10011111]);
    }

    #[test]
    fn test_write_ue_known_codes() {
        let mut bw = BitWriter::new();
        bw.write_ue(0); // 1
        bw.write_ue(1); // 010
        bw.write_ue(2); // 011
        bw.write_ue(3); // 00100
        assert_eq!(bw.finish(), vec![0b10100110, 0b01000000]);
    }

    #[test]
    fn test_write_trailing_bits() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b11, 2);
        bw.write_trailing_bits();
        assert_eq!(bw.finish(), vec![0b11100000]);
    }

    #[test]
    fn test_leb128_roundtrip() {
        for value in [0u64, 1, 127, 128, 300, 624485, u64::from(u32::MAX)] {
            let mut bw = BitWriter::new();
            bw.write_leb128(value);
            let data = bw.finish();
            let mut br = BitReader::new(&data);
            assert_eq!(br.read_leb128().unwrap(), value, "leb128 往返失败: {}", value);
        }
    }

    #[test]
    fn test_read_write_roundtrip_signed() {
        let mut bw = BitWriter::new();
        bw.write_bits_signed(-1, 5);
        bw.write_bits_signed(10, 5);
        bw.write_bits_signed(-128, 8);
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits_signed(5).unwrap(), -1);
        assert_eq!(br.read_bits_signed(5).unwrap(), 10);
        assert_eq!(br.read_bits_signed(8).unwrap(), -128);
    }
}
