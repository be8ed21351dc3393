//! interval — пять вложенных ярусов бэкапа.
//!
//! Фиксированный порядок: base < yearly < monthly < weekly < daily
//! (derive(Ord) по порядку объявления). Каждому ярусу соответствует
//! целочисленный level для архиватора (base=0 ... daily=4) и предшественник,
//! чьим snar-состоянием он засевается (у base предшественника нет).

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

/// Ярус бэкапа. Чем "короче" интервал, тем он больше в порядке Ord.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interval {
    Base,
    Yearly,
    Monthly,
    Weekly,
    Daily,
}

impl Interval {
    /// Все ярусы в порядке цепочки (base → daily).
    pub const ALL: [Interval; 5] = [
        Interval::Base,
        Interval::Yearly,
        Interval::Monthly,
        Interval::Weekly,
        Interval::Daily,
    ];

    /// Incremental level для архиватора: base=0, yearly=1, ..., daily=4.
    #[inline]
    pub fn level(self) -> u8 {
        match self {
            Interval::Base => 0,
            Interval::Yearly => 1,
            Interval::Monthly => 2,
            Interval::Weekly => 3,
            Interval::Daily => 4,
        }
    }

    /// Интервал, чьё состояние засевает данный (None для base).
    pub fn predecessor(self) -> Option<Interval> {
        match self {
            Interval::Base => None,
            Interval::Yearly => Some(Interval::Base),
            Interval::Monthly => Some(Interval::Yearly),
            Interval::Weekly => Some(Interval::Monthly),
            Interval::Daily => Some(Interval::Weekly),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Interval::Base => "base",
            Interval::Yearly => "yearly",
            Interval::Monthly => "monthly",
            Interval::Weekly => "weekly",
            Interval::Daily => "daily",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(Interval::Base),
            "yearly" => Ok(Interval::Yearly),
            "monthly" => Ok(Interval::Monthly),
            "weekly" => Ok(Interval::Weekly),
            "daily" => Ok(Interval::Daily),
            other => Err(anyhow!(
                "unknown interval {:?} (expected one of: base, yearly, monthly, weekly, daily)",
                other
            )),
        }
    }
}
