//! 长度前缀子单元遍历.
//!
//! 缓冲区由若干 `length(W 字节, 大端) + payload` 组成, W 取 1-4.

use crate::error::{InspectError, InspectResult};

/// 子单元视图: 负载在访问单元中的偏移与数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubUnit<'a> {
    /// 负载 (不含长度前缀) 的起始偏移
    pub offset: usize,
    /// 负载
    pub data: &'a [u8],
}

impl SubUnit<'_> {
    /// 负载长度
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 读取 `width` 字节大端整数, 调用方保证长度足够
pub(crate) fn read_be(bytes: &[u8], width: usize) -> u64 {
    bytes
        .iter()
        .take(width)
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// 长度前缀子单元迭代器
///
/// 每个访问单元新建一个迭代器. 遇到截断时产生一次 `Err(Truncated)` 后结束.
#[derive(Debug, Clone)]
pub struct SizePrefixedUnitIterator<'a> {
    data: &'a [u8],
    width: usize,
    pos: usize,
    done: bool,
}

impl<'a> SizePrefixedUnitIterator<'a> {
    /// 创建迭代器, `width` 必须在 1-4 之间
    pub fn new(data: &'a [u8], width: usize) -> InspectResult<Self> {
        if !(1..=4).contains(&width) {
            return Err(InspectError::InvalidData(format!(
                "长度字段宽度超出范围, width={}",
                width
            )));
        }
        Ok(Self {
            data,
            width,
            pos: 0,
            done: false,
        })
    }

    /// 尚未遍历的字节数
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl<'a> Iterator for SizePrefixedUnitIterator<'a> {
    type Item = InspectResult<SubUnit<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        if rest.len() < self.width {
            self.done = true;
            return Some(Err(InspectError::truncated(
                "NALU length prefix",
                self.width as u64,
                rest.len() as u64,
            )));
        }
        let declared = read_be(rest, self.width);
        let available = (rest.len() - self.width) as u64;
        if declared > available {
            self.done = true;
            return Some(Err(InspectError::truncated("NALU", declared, available)));
        }
        let start = self.pos + self.width;
        let end = start + declared as usize;
        self.pos = end;
        Some(Ok(SubUnit {
            offset: start,
            data: &self.data[start..end],
        }))
    }
}
