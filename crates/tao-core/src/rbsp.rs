//! RBSP 辅助函数.
//!
//! H.264/H.265 在 NAL 载荷中插入 emulation prevention 字节 (0x03),
//! 防止与起始码混淆. 解析语法元素前需要先移除这些字节.

/// 移除 emulation prevention 字节 (0x00 0x00 0x03 → 0x00 0x00)
///
/// 只要命中 `00 00 03` 序列就移除其中的 0x03.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0usize;

    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        if byte == 0x00 {
            zeros += 1;
        } else {
            zeros = 0;
        }
        rbsp.push(byte);
    }

    rbsp
}

/// 统计 emulation prevention 字节数量
pub fn count_emulation_prevention(data: &[u8]) -> usize {
    data.len() - remove_emulation_prevention(data).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emulation_prevention_remove() {
        let data = [0x00, 0x00, 0x03, 0x01, 0x42];
        assert_eq!(remove_emulation_prevention(&data), vec![0x00, 0x00, 0x01, 0x42]);
    }

    #[test]
    fn test_emulation_prevention_consecutive() {
        let data = [0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00];
        assert_eq!(
            remove_emulation_prevention(&data),
            vec![0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(count_emulation_prevention(&data), 2);
    }

    #[test]
    fn test_emulation_prevention_untouched() {
        let data = [0x00, 0x03, 0x00, 0x01, 0x03];
        assert_eq!(remove_emulation_prevention(&data), data.to_vec());
    }
}
