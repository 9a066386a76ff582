use chrono::{Datelike, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::EventConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    BookingRow, EligibilitySummary, EventInfoResponse, IneligibleReason, PrizeDefinition,
    PrizeRecord, PrizeResponse, SpinRecord, SpinResponse, WinRecordQuery, WinRecordResponse,
    WonPrize,
};
use crate::services::prize_table::{PrizeTable, max_spins_for};
use crate::storage::{EventStore, run_blocking};
use crate::utils::{Clock, PaginatedResponse, PaginationParams};

/// Derive a user's spin eligibility from their ledger rows and event logs.
///
/// Pure aggregation; `now` decides the current year and whether the event
/// window is open.
pub fn evaluate_eligibility(
    config: &EventConfig,
    now: NaiveDateTime,
    bookings: &[BookingRow],
    spins: &[SpinRecord],
    prizes: &[PrizeRecord],
) -> EligibilitySummary {
    // 没有任何订房记录：直接不可参与，不看时间和消费
    if bookings.is_empty() {
        return EligibilitySummary::no_bookings();
    }

    let window = config.window();
    let year = now.year();

    let booking_spend: f64 = bookings
        .iter()
        .filter_map(|b| b.qualifying_amount(&window, year))
        .sum();
    // 中奖金额同样计入消费
    let prize_spend: f64 = prizes
        .iter()
        .filter(|p| window.covers(&p.created_at, year))
        .map(|p| p.prize_value)
        .sum();
    let total_spent = booking_spend + prize_spend;

    let max_spins = max_spins_for(&config.spend_thresholds, total_spent);
    let used_spins = spins.iter().filter(|s| s.counts_in(&window, year)).count() as u32;

    let in_window = window.contains_month(now.month());
    let spins_remaining = if in_window {
        max_spins.saturating_sub(used_spins)
    } else {
        0
    };

    let reason = if !in_window {
        Some(IneligibleReason::EventEnded)
    } else if spins_remaining == 0 {
        Some(IneligibleReason::QuotaExhausted)
    } else {
        None
    };

    EligibilitySummary {
        eligible: spins_remaining > 0,
        spins_remaining,
        total_spent,
        used_spins,
        max_spins,
        has_bookings: true,
        reason,
    }
}

type UserLocks = Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// 幸运转盘活动服务
///
/// 同一用户的“检查资格 + 写入抽奖记录”在进程内串行执行，防止并发请求
/// 越过次数检查重复抽奖；不同用户互不阻塞。
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    config: Arc<EventConfig>,
    prize_table: Arc<PrizeTable>,
    clock: Arc<dyn Clock>,
    user_locks: UserLocks,
}

impl EventService {
    pub fn new(
        store: Arc<dyn EventStore>,
        config: EventConfig,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        config.validate()?;
        let prize_table = PrizeTable::new(config.prizes.clone())?;
        Ok(Self {
            store,
            config: Arc::new(config),
            prize_table: Arc::new(prize_table),
            clock,
            user_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// 获取用户抽奖资格（只读）
    pub async fn check_eligibility(&self, username: &str) -> AppResult<EligibilitySummary> {
        let username = require_user(username)?;
        self.evaluate_at(username, self.clock.now()).await
    }

    /// 记录一次抽奖（不抽奖品）。不满足条件时返回 `false` 且不写入。
    pub async fn record_spin(&self, username: &str) -> AppResult<bool> {
        let username = require_user(username)?;
        let lock = self.user_lock(username).await;
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let summary = self.evaluate_at(username, now).await?;
        if !summary.eligible {
            log::debug!("Spin rejected for {username}: {:?}", summary.reason);
            return Ok(false);
        }

        let spin = SpinRecord::new(username, now);
        run_blocking(self.store.clone(), move |s| s.append_spin(&spin)).await?;
        Ok(true)
    }

    /// 仅当奖品面值大于 0 时写入中奖记录
    pub async fn record_prize_if_won(
        &self,
        username: &str,
        prize: &PrizeDefinition,
    ) -> AppResult<bool> {
        let Some(record) = self.prize_record(username, prize, self.clock.now()) else {
            return Ok(false);
        };
        run_blocking(self.store.clone(), move |s| s.append_prize(&record)).await?;
        Ok(true)
    }

    pub fn draw_prize(&self) -> (usize, PrizeDefinition) {
        let mut rng = rand::thread_rng();
        let (index, prize) = self.prize_table.draw(&mut rng);
        (index, prize.clone())
    }

    /// 抽奖 (Spin)
    ///
    /// 1. 校验订房记录、活动时间和剩余次数
    /// 2. 按权重抽取奖品
    /// 3. 抽奖记录与中奖记录作为一个整体写入
    /// 4. 重新计算并返回剩余次数
    pub async fn spin(&self, username: &str) -> AppResult<SpinResponse> {
        let username = require_user(username)?;
        let lock = self.user_lock(username).await;
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let summary = self.evaluate_at(username, now).await?;
        if !summary.eligible {
            let reason = summary.reason.unwrap_or(IneligibleReason::QuotaExhausted);
            log::debug!("Spin rejected for {username}: {}", reason.code());
            return Err(AppError::NotEligible(reason));
        }

        let (index, prize, final_angle) = {
            let mut rng = rand::thread_rng();
            let (index, prize) = self.prize_table.draw(&mut rng);
            let angle = self.prize_table.wheel_angle(index, &mut rng);
            (index, prize.clone(), angle)
        };

        let spin = SpinRecord::new(username, now);
        let won = self.prize_record(username, &prize, now);
        run_blocking(self.store.clone(), move |s| s.commit_spin(&spin, won.as_ref())).await?;

        log::info!(
            "User {username} spun the wheel: prize #{index} \"{}\" ({})",
            prize.name,
            prize.value
        );

        let eligibility = self.evaluate_at(username, now).await?;
        Ok(SpinResponse {
            prize: WonPrize {
                index,
                name: prize.name,
                value: prize.value,
            },
            final_angle,
            eligibility,
        })
    }

    pub fn list_prizes(&self) -> Vec<PrizeResponse> {
        self.prize_table.to_responses()
    }

    pub fn event_info(&self) -> EventInfoResponse {
        let now = self.clock.now();
        EventInfoResponse {
            start_month: self.config.start_month,
            end_month: self.config.end_month,
            year: now.year(),
            is_running: self.config.window().contains_month(now.month()),
            spend_thresholds: self.config.spend_thresholds.clone(),
        }
    }

    /// 分页获取用户中奖记录（倒序）
    pub async fn list_wins(
        &self,
        username: &str,
        query: &WinRecordQuery,
    ) -> AppResult<PaginatedResponse<WinRecordResponse>> {
        let username = require_user(username)?.to_string();
        let mut wins = run_blocking(self.store.clone(), move |s| s.prizes_for(&username)).await?;
        wins.reverse();

        let params = PaginationParams::new(query.page, query.per_page);
        Ok(PaginatedResponse::from_all(wins, &params).map(WinRecordResponse::from))
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    async fn evaluate_at(&self, username: &str, now: NaiveDateTime) -> AppResult<EligibilitySummary> {
        let user = username.to_string();
        let (bookings, spins, prizes) = run_blocking(self.store.clone(), move |s| {
            Ok((s.bookings_for(&user)?, s.spins_for(&user)?, s.prizes_for(&user)?))
        })
        .await?;
        Ok(evaluate_eligibility(
            &self.config,
            now,
            &bookings,
            &spins,
            &prizes,
        ))
    }

    async fn user_lock(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.entry(username.to_string()).or_default().clone()
    }

    fn prize_record(
        &self,
        username: &str,
        prize: &PrizeDefinition,
        now: NaiveDateTime,
    ) -> Option<PrizeRecord> {
        prize.is_win().then(|| PrizeRecord {
            username: username.to_string(),
            prize_value: prize.value,
            prize_name: prize.name.clone(),
            created_at: now,
        })
    }
}

fn require_user(username: &str) -> AppResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::AuthError("Unauthenticated".to_string()));
    }
    Ok(username)
}
