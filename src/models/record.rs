//! CSV 行记录：订房流水（只读）、抽奖记录、中奖记录

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::utils::{EventWindow, parse_timestamp, timestamp_format};

pub const BOOKING_STATUS_COMPLETED: &str = "completed";

/// 订房流水中的一行，字段保持原始字符串，逐行容错解析
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingRow {
    pub username: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub booking_time: Option<String>,
}

impl BookingRow {
    /// Amount this row contributes to event spend, if it is a completed
    /// booking made inside the window of `year`.
    pub fn qualifying_amount(&self, window: &EventWindow, year: i32) -> Option<f64> {
        if self.status.as_deref().map(str::trim) != Some(BOOKING_STATUS_COMPLETED) {
            return None;
        }
        let booked_at = parse_timestamp(self.booking_time.as_deref()?)?;
        if !window.covers(&booked_at, year) {
            return None;
        }
        self.price.as_deref()?.trim().parse::<f64>().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinRecord {
    pub username: String,
    #[serde(with = "timestamp_format")]
    pub spin_date: NaiveDateTime,
    pub year: i32,
}

impl SpinRecord {
    pub const HEADER: [&'static str; 3] = ["username", "spin_date", "year"];

    pub fn new(username: &str, now: NaiveDateTime) -> Self {
        Self {
            username: username.to_string(),
            spin_date: now,
            year: now.year(),
        }
    }

    pub fn counts_in(&self, window: &EventWindow, year: i32) -> bool {
        self.year == year && window.contains_month(self.spin_date.month())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeRecord {
    pub username: String,
    pub prize_value: f64,
    pub prize_name: String,
    #[serde(with = "timestamp_format")]
    pub created_at: NaiveDateTime,
}

impl PrizeRecord {
    pub const HEADER: [&'static str; 4] = ["username", "prize_value", "prize_name", "created_at"];
}

/// 用户目录中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(with = "timestamp_format")]
    pub created_at: NaiveDateTime,
}

impl UserRecord {
    pub const HEADER: [&'static str; 4] = ["username", "password_hash", "email", "created_at"];
}
