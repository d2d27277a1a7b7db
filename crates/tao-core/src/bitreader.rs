//! 比特流读取器.
//!
//! 提供从字节缓冲区中按位读取数据的能力, 是所有码流头部解析 (H.264, H.265, AV1, MPEG-4 等) 的基础设施.
//!
//! 按大端位序读取 (MSB first). 除定长字段外, 还提供码流语法中常见的变长编码:
//! - `ue(v)` / `se(v)`: Exp-Golomb 编码 (H.264/H.265)
//! - `leb128()`: AV1 OBU 长度字段
//! - `uvlc()` / `ns(n)`: AV1 头部语法

use crate::{TaoError, TaoResult};

/// 比特流读取器
///
/// 从字节缓冲区中按位读取数据, 使用大端位序 (MSB first).
/// 所有读取操作在越界时返回 [`TaoError::Eof`], 不会越过切片边界.
///
/// # 示例
/// ```
/// use tao_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 是否位于字节边界
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> TaoResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(TaoError::Eof);
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 1 位标志
    pub fn read_flag(&mut self) -> TaoResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效.
    pub fn read_bits(&mut self, n: u32) -> TaoResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(TaoError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(TaoError::Eof);
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        Ok(result)
    }

    /// 读取 N 个位 (最多 64 位)
    pub fn read_bits_u64(&mut self, n: u32) -> TaoResult<u64> {
        if n <= 32 {
            return self.read_bits(n).map(u64::from);
        }
        if n > 64 {
            return Err(TaoError::InvalidArgument(format!(
                "read_bits_u64: n={} 超过 64 位",
                n,
            )));
        }

        let high_bits = n - 32;
        let high = self.read_bits(high_bits)? as u64;
        let low = self.read_bits(32)? as u64;
        Ok((high << 32) | low)
    }

    /// 读取有符号整数 (二进制补码)
    ///
    /// 同时用于 AV1 的 `su(n)` 语法.
    pub fn read_bits_signed(&mut self, n: u32) -> TaoResult<i32> {
        let val = self.read_bits(n)?;
        if n == 0 {
            return Ok(0);
        }
        if n >= 32 {
            return Ok(val as i32);
        }
        // 符号扩展: 若最高有效位为 1, 则填充高位
        if (val >> (n - 1)) & 1 != 0 {
            Ok(val as i32 | !((1i32 << n) - 1))
        } else {
            Ok(val as i32)
        }
    }

    /// 读取无符号 Exp-Golomb 编码值 ue(v)
    pub fn read_ue(&mut self) -> TaoResult<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(TaoError::InvalidData("Exp-Golomb 前导零过多".into()));
            }
        }

        if leading_zeros == 0 {
            return Ok(0);
        }

        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// 读取有符号 Exp-Golomb 编码值 se(v)
    pub fn read_se(&mut self) -> TaoResult<i32> {
        let code = self.read_ue()?;
        // 映射: 0→0, 1→1, 2→-1, 3→2, 4→-2, ...
        let value = code.div_ceil(2) as i32;
        if code & 1 == 0 { Ok(-value) } else { Ok(value) }
    }

    /// 读取 ue(v) 并校验上限
    pub fn read_ue_max(&mut self, max: u32, name: &str) -> TaoResult<u32> {
        let value = self.read_ue()?;
        if value > max {
            return Err(TaoError::InvalidData(format!(
                "{} 超出范围, value={}, max={}",
                name, value, max
            )));
        }
        Ok(value)
    }

    /// 读取 AV1 leb128 编码值
    ///
    /// 最多 8 个字节, 结果必须可由 32 位表示.
    pub fn read_leb128(&mut self) -> TaoResult<u64> {
        let mut value = 0u64;
        for i in 0..8 {
            let byte = self.read_bits(8)?;
            value |= u64::from(byte & 0x7F) << (i * 7);
            if byte & 0x80 == 0 {
                if value > u64::from(u32::MAX) {
                    return Err(TaoError::InvalidData(format!(
                        "leb128 值超出 32 位, value={}",
                        value
                    )));
                }
                return Ok(value);
            }
        }
        Err(TaoError::InvalidData("leb128 超过 8 字节".into()))
    }

    /// 读取 AV1 uvlc() 编码值
    pub fn read_uvlc(&mut self) -> TaoResult<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
        }
        if leading_zeros >= 32 {
            return Ok(u32::MAX);
        }
        let value = self.read_bits(leading_zeros)?;
        Ok(value + ((1u64 << leading_zeros) - 1) as u32)
    }

    /// 读取 AV1 ns(n) 非对称编码值
    pub fn read_ns(&mut self, n: u32) -> TaoResult<u32> {
        if n <= 1 {
            return Ok(0);
        }
        let w = 32 - (n - 1).leading_zeros();
        let m = (1u32 << w) - n;
        let v = self.read_bits(w - 1)?;
        if v < m {
            return Ok(v);
        }
        let extra_bit = self.read_bit()?;
        Ok((v << 1) - m + extra_bit)
    }

    /// 窥视 N 个位 (不移动位置)
    pub fn peek_bits(&mut self, n: u32) -> TaoResult<u32> {
        let saved_byte = self.byte_pos;
        let saved_bit = self.bit_pos;
        let result = self.read_bits(n);
        self.byte_pos = saved_byte;
        self.bit_pos = saved_bit;
        result
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> TaoResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(TaoError::Eof);
        }

        let total_bits = self.bit_pos as u32 + n;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;

        Ok(())
    }

    /// 跳过 N 个字节 (不要求对齐)
    pub fn skip_bytes(&mut self, n: usize) -> TaoResult<()> {
        if n.saturating_mul(8) > self.bits_left() {
            return Err(TaoError::Eof);
        }
        self.byte_pos += n;
        Ok(())
    }

    /// 对齐到下一个字节边界
    ///
    /// 如果当前已在字节边界, 则不做任何事.
    pub fn align_to_byte(&mut self) {
        if self.bit_pos > 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// 获取当前字节位置
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }

    /// 从当前位置读取原始字节切片
    ///
    /// 仅在字节对齐时可用.
    pub fn read_bytes(&mut self, n: usize) -> TaoResult<&'a [u8]> {
        if self.bit_pos != 0 {
            return Err(TaoError::InvalidArgument("read_bytes 需要字节对齐".into()));
        }

        let end = self.byte_pos + n;
        if end > self.data.len() {
            return Err(TaoError::Eof);
        }

        let slice = &self.data[self.byte_pos..end];
        self.byte_pos = end;
        Ok(slice)
    }

    /// 获取底层数据的引用
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}
