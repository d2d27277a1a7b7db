//! 有理数类型, 用于帧率、时间码速率、宽高比和时长上限.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TaoError;

/// 有理数, 由分子和分母组成
///
/// 例如: 帧率 30000/1001 表示 29.97fps, 时长上限 5/1 表示 5 秒.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 零值
    pub const ZERO: Self = Self { num: 0, den: 1 };

    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 分子或分母为 0
    pub const fn is_degenerate(&self) -> bool {
        self.num == 0 || self.den == 0
    }

    /// 整数除法是否有余数 (num / den * den != num)
    ///
    /// 分母为 0 时返回 false.
    pub const fn has_remainder(&self) -> bool {
        if self.den == 0 {
            return false;
        }
        self.num / self.den * self.den != self.num
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 对有理数进行约分
    pub fn reduce(self) -> Self {
        if self.den == 0 {
            return self;
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if g == 0 {
            return self;
        }
        let g = g as i32;
        // 保证分母为正
        let sign = if self.den < 0 { -1 } else { 1 };
        Self {
            num: sign * self.num / g,
            den: sign * self.den / g,
        }
    }
}

/// 默认为未定义 (0/0)
impl Default for Rational {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = TaoError;

    /// 解析 "num/den" 或单个整数 "num"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|e| TaoError::InvalidArgument(format!("无法解析有理数 {:?}: {}", s, e)))
        };
        match s.split_once('/') {
            Some((num, den)) => Ok(Self::new(parse(num)?, parse(den)?)),
            None => Ok(Self::new(parse(s)?, 1)),
        }
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self { num, den }
    }
}

/// 求最大公约数 (欧几里得算法)
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
