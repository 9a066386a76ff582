//! 时间相关工具：CSV 时间戳格式、活动月份窗口、可注入的时钟

use chrono::{Datelike, Local, NaiveDateTime, SubsecRound};

/// CSV 中所有时间戳使用的格式（秒级精度，服务器本地时间）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// serde adapter for `NaiveDateTime` fields stored as `%Y-%m-%d %H:%M:%S`.
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// Inclusive calendar-month range, evaluated against a single year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start_month: u32,
    pub end_month: u32,
}

impl EventWindow {
    pub fn new(start_month: u32, end_month: u32) -> Self {
        Self {
            start_month,
            end_month,
        }
    }

    pub fn contains_month(&self, month: u32) -> bool {
        self.start_month <= month && month <= self.end_month
    }

    /// `at` is in `year` and its month lies inside the window.
    pub fn covers(&self, at: &NaiveDateTime, year: i32) -> bool {
        at.year() == year && self.contains_month(at.month())
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// 服务器本地时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }
}

/// 固定时钟，用于测试
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
