use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PrizeRecord;

/// 不可参与抽奖的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    /// 订房记录中没有该用户
    NoBookings,
    /// 当前月份不在活动时间内
    EventEnded,
    /// 已用完所有抽奖次数（或尚未达到第一档消费）
    QuotaExhausted,
}

impl IneligibleReason {
    pub fn code(&self) -> &'static str {
        match self {
            IneligibleReason::NoBookings => "no_bookings",
            IneligibleReason::EventEnded => "event_ended",
            IneligibleReason::QuotaExhausted => "quota_exhausted",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            IneligibleReason::NoBookings => "Account has no bookings",
            IneligibleReason::EventEnded => "The event is not running",
            IneligibleReason::QuotaExhausted => "No spins remaining",
        }
    }
}

/// 奖品配置（静态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrizeDefinition {
    pub name: String,
    /// 奖品面值，0 表示未中奖
    pub value: f64,
    /// 相对权重，抽中概率 = weight / sum(weights)
    pub weight: u32,
}

impl PrizeDefinition {
    pub fn new(name: &str, value: f64, weight: u32) -> Self {
        Self {
            name: name.to_string(),
            value,
            weight,
        }
    }

    pub fn is_win(&self) -> bool {
        self.value > 0.0
    }
}

/// 用户抽奖资格汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EligibilitySummary {
    pub eligible: bool,
    pub spins_remaining: u32,
    /// 活动期间累计消费（含已中奖金额）
    pub total_spent: f64,
    pub used_spins: u32,
    pub max_spins: u32,
    pub has_bookings: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IneligibleReason>,
}

impl EligibilitySummary {
    pub fn no_bookings() -> Self {
        Self {
            eligible: false,
            spins_remaining: 0,
            total_spent: 0.0,
            used_spins: 0,
            max_spins: 0,
            has_bookings: false,
            reason: Some(IneligibleReason::NoBookings),
        }
    }
}

/// 抽中的奖品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WonPrize {
    /// 奖品在转盘上的扇区序号
    pub index: usize,
    pub name: String,
    pub value: f64,
}

/// 抽奖（Spin）响应
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpinResponse {
    pub prize: WonPrize,
    /// 前端转盘动画的最终角度
    pub final_angle: f64,
    pub eligibility: EligibilitySummary,
}

/// 转盘展示用的奖品信息
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrizeResponse {
    pub index: usize,
    pub name: String,
    pub value: f64,
    pub weight: u32,
    /// 抽中概率（百分比）
    pub probability_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventInfoResponse {
    pub start_month: u32,
    pub end_month: u32,
    pub year: i32,
    pub is_running: bool,
    pub spend_thresholds: Vec<f64>,
}

/// 中奖记录查询参数
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct WinRecordQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WinRecordResponse {
    pub prize_name: String,
    pub prize_value: f64,
    pub created_at: NaiveDateTime,
}

impl From<PrizeRecord> for WinRecordResponse {
    fn from(r: PrizeRecord) -> Self {
        Self {
            prize_name: r.prize_name,
            prize_value: r.prize_value,
            created_at: r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serializes_as_code() {
        for reason in [
            IneligibleReason::NoBookings,
            IneligibleReason::EventEnded,
            IneligibleReason::QuotaExhausted,
        ] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, reason.code());
        }
    }

    #[test]
    fn test_summary_omits_reason_when_eligible() {
        let summary = EligibilitySummary {
            eligible: true,
            spins_remaining: 1,
            total_spent: 600_000.0,
            used_spins: 0,
            max_spins: 1,
            has_bookings: true,
            reason: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("reason").is_none());
        assert_eq!(json["spins_remaining"], 1);
    }
}
