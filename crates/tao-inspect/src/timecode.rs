//! 时间码 (tmcd) 样本解码.
//!
//! 两种编码:
//! - 紧凑计数器: 32 位帧计数, 按流的帧率换算为时:分:秒:帧, 可选丢帧修正;
//! - 结构化字段: `hours(8) negative(1) minutes(7) seconds(8) frames(8)`.

use std::fmt;

use bitflags::bitflags;
use tao_core::Rational;

use crate::error::{InspectError, InspectResult};
use crate::report::{UnitKind, UnitReport};

bitflags! {
    /// QuickTime 时间码标志
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct TimecodeFlags: u32 {
        /// 丢帧时间码
        const DROP_FRAME = 0x0001;
        /// 24 小时回绕
        const MAX_24_HOURS = 0x0002;
        /// 允许负时间
        const NEGATIVE_OK = 0x0004;
        /// 样本为帧计数器
        const COUNTER = 0x0008;
    }
}

/// 流级时间码参数 (`tmcd:framerate`, `tmcd:flags`, `tmcd:frames_per_tick`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimecodeParams {
    /// 帧率
    pub rate: Rational,
    /// 标志
    pub flags: TimecodeFlags,
    /// 每 tick 帧数, 0 表示未设置
    pub frames_per_tick: u32,
}

/// 解码后的时间码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimecodeValue {
    /// 负时间
    pub negative: bool,
    /// 时
    pub hours: u32,
    /// 分
    pub minutes: u32,
    /// 秒
    pub seconds: u32,
    /// 帧
    pub frames: u32,
    /// 紧凑计数器原值
    pub counter: Option<u32>,
}

impl fmt::Display for TimecodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:02}:{:02}:{:02}:{:02}",
            if self.negative { "-" } else { "" },
            self.hours,
            self.minutes,
            self.seconds,
            self.frames
        )
    }
}

impl TimecodeValue {
    /// 转换为单元报告
    pub fn to_unit(&self) -> UnitReport {
        let mut unit = UnitReport::new(UnitKind::TimeCode);
        if let Some(counter) = self.counter {
            unit.push("counter", counter);
        }
        unit.push("time", self.to_string());
        unit
    }
}

fn decode_counter(value: u32, params: &TimecodeParams, num: u128, den: u128, fftmcd: bool) -> TimecodeValue {
    // 帧率与每 tick 帧数均来自流属性, 以 u128 计算避免溢出
    let fpt = u128::from(params.frames_per_tick);
    let mut nb_frames = u128::from(value);
    if !fftmcd && fpt != 0 {
        nb_frames *= fpt;
    }

    let is_drop = if fftmcd {
        params.rate.has_remainder()
    } else {
        params.flags.contains(TimecodeFlags::DROP_FRAME)
    };
    if is_drop {
        // 每 100*num/den 帧扣除 3 帧
        let frame_base = 100 * num / den;
        if frame_base != 0 {
            let drop_frames = nb_frames / frame_base;
            nb_frames = nb_frames.saturating_sub(3 * drop_frames);
        }
    }

    let nb_secs = nb_frames * den / num;
    let total_hours = nb_secs / 3600;
    let mut minutes = (nb_secs / 60 - total_hours * 60) as u32;
    let mut seconds = (nb_secs % 60) as u32;
    let mut hours = u32::try_from(total_hours).unwrap_or(u32::MAX);
    let mut frames = u32::try_from(nb_frames.saturating_sub(nb_secs * num / den)).unwrap_or(u32::MAX);

    if fpt != 0 && u128::from(frames) == fpt {
        frames = 0;
        seconds += 1;
        if seconds == 60 {
            seconds = 0;
            minutes += 1;
            if minutes == 60 {
                minutes = 0;
                hours = hours.saturating_add(1);
            }
        }
    }

    TimecodeValue {
        negative: false,
        hours,
        minutes,
        seconds,
        frames,
        counter: Some(value),
    }
}

/// 解码一个时间码样本
///
/// 帧率分子或分母为 0 (或为负) 时不报告, 返回 `Ok(None)`.
pub fn decode_timecode(
    data: &[u8],
    params: &TimecodeParams,
    fftmcd: bool,
) -> InspectResult<Option<TimecodeValue>> {
    if params.rate.num <= 0 || params.rate.den <= 0 {
        return Ok(None);
    }
    let bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| InspectError::truncated("TimeCode sample", 4, data.len() as u64))?;

    let value = if fftmcd || params.flags.contains(TimecodeFlags::COUNTER) {
        let num = u128::from(params.rate.num.unsigned_abs());
        let den = u128::from(params.rate.den.unsigned_abs());
        decode_counter(u32::from_be_bytes(bytes), params, num, den, fftmcd)
    } else {
        TimecodeValue {
            negative: bytes[1] & 0x80 != 0,
            hours: u32::from(bytes[0]),
            minutes: u32::from(bytes[1] & 0x7F),
            seconds: u32::from(bytes[2]),
            frames: u32::from(bytes[3]),
            counter: None,
        }
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(num: i32, den: i32, flags: TimecodeFlags, fpt: u32) -> TimecodeParams {
        TimecodeParams {
            rate: Rational::new(num, den),
            flags,
            frames_per_tick: fpt,
        }
    }

    #[test]
    fn test_counter_non_drop_2997() {
        let p = params(30000, 1001, TimecodeFlags::COUNTER, 0);
        let tc = decode_timecode(&1800u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:01:00:02");
        assert_eq!(tc.counter, Some(1800));
    }

    #[test]
    fn test_counter_drop_frame() {
        let p = params(30000, 1001, TimecodeFlags::COUNTER | TimecodeFlags::DROP_FRAME, 0);
        // 1 分钟计数 1800: frame_base=2997, 不足一个块, 不扣除
        let tc = decode_timecode(&1800u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:01:00:02");
        // 6000 帧: 扣除 3*2 帧后为 5994 帧, 199 秒余 30 帧
        let tc = decode_timecode(&6000u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:03:19:30");
        // 30030 帧: 扣除 3*10 帧后为 30000 帧, 恰好 1001 秒
        let tc = decode_timecode(&30030u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:16:41:00", "丢帧后落在整秒");
    }

    #[test]
    fn test_fftmcd_infers_drop_frame() {
        let p = params(30000, 1001, TimecodeFlags::empty(), 0);
        let tc = decode_timecode(&6000u32.to_be_bytes(), &p, true).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:03:19:30", "非整数帧率按丢帧处理");

        let p = params(25, 1, TimecodeFlags::DROP_FRAME, 0);
        let tc = decode_timecode(&100u32.to_be_bytes(), &p, true).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:00:04:00", "整数帧率不丢帧, 忽略标志位");
    }

    #[test]
    fn test_frames_per_tick_rollover() {
        // 25 fps, fpt=25: 计数 3 -> 75 帧 = 3 秒
        let p = params(25, 1, TimecodeFlags::COUNTER, 25);
        let tc = decode_timecode(&3u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:00:03:00");

        // 帧数恰好等于 fpt 时进位到秒: 计数 31 -> 62 帧 = 2 秒余 2 帧
        let p = params(30, 1, TimecodeFlags::COUNTER, 2);
        let tc = decode_timecode(&31u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:00:03:00");

        // 余帧小于 fpt 时不进位: 计数 1799 -> 3598 帧 = 119 秒余 28 帧
        let tc = decode_timecode(&1799u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:01:59:28");

        // 59 秒进位到分钟
        let tc = decode_timecode(&886u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "00:01:00:00", "秒进位到分");

        // 59 分 59 秒进位到小时
        let tc = decode_timecode(&53986u32.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "01:00:00:00", "分进位到时");
    }

    #[test]
    fn test_counter_extreme_rates() {
        let max = i32::MAX;
        let p = params(max, max - 1, TimecodeFlags::COUNTER | TimecodeFlags::DROP_FRAME, 255);
        let tc = decode_timecode(&u32::MAX.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.to_string(), "295100044:25:24:01");

        // 小时数超出 u32 时饱和
        let p = params(1, max, TimecodeFlags::COUNTER, u32::MAX);
        let tc = decode_timecode(&u32::MAX.to_be_bytes(), &p, false).unwrap().unwrap();
        assert_eq!(tc.hours, u32::MAX);
        assert_eq!((tc.minutes, tc.seconds, tc.frames), (56, 15, 0));
    }

    #[test]
    fn test_structured_fields() {
        let p = params(25, 1, TimecodeFlags::empty(), 0);
        let tc = decode_timecode(&[1, 0x80 | 2, 3, 4], &p, false).unwrap().unwrap();
        assert!(tc.negative);
        assert_eq!(tc.to_string(), "-01:02:03:04");
        let unit = tc.to_unit();
        assert!(unit.field("counter").is_none(), "结构化字段不报告计数器");
    }

    #[test]
    fn test_zero_rate_and_short_sample() {
        let p = params(0, 1, TimecodeFlags::COUNTER, 0);
        assert_eq!(decode_timecode(&[0; 4], &p, false).unwrap(), None);
        let p = params(25, 0, TimecodeFlags::COUNTER, 0);
        assert_eq!(decode_timecode(&[0; 4], &p, false).unwrap(), None);
        let p = params(25, 1, TimecodeFlags::COUNTER, 0);
        assert!(decode_timecode(&[0; 3], &p, false).is_err());
    }
}
