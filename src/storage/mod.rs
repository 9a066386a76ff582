//! 持久化层
//!
//! 抽奖核心只依赖 [`EventStore`] / [`UserStore`] 两个 trait：
//! - 订房流水只读（由订房系统维护）
//! - 抽奖记录、中奖记录只追加，由本服务独占写入
//!
//! 生产环境使用 CSV 文件实现，测试可使用内存实现。

pub mod csv_store;
pub mod csv_table;
pub mod memory;

pub use csv_store::{CsvEventStore, CsvUserStore};
pub use csv_table::CsvTable;
pub use memory::{MemoryEventStore, MemoryUserStore};

use crate::error::{AppError, AppResult};
use crate::models::{BookingRow, PrizeRecord, SpinRecord, UserRecord};
use std::sync::Arc;

pub trait EventStore: Send + Sync + 'static {
    /// Every ledger row for `username`, any status or time.
    fn bookings_for(&self, username: &str) -> AppResult<Vec<BookingRow>>;

    fn spins_for(&self, username: &str) -> AppResult<Vec<SpinRecord>>;

    /// Prize log rows for `username` in file (chronological) order.
    fn prizes_for(&self, username: &str) -> AppResult<Vec<PrizeRecord>>;

    fn append_spin(&self, spin: &SpinRecord) -> AppResult<()>;

    fn append_prize(&self, prize: &PrizeRecord) -> AppResult<()>;

    /// 原子地写入一次抽奖及其中奖记录：要么都写入，要么都不写入
    fn commit_spin(&self, spin: &SpinRecord, prize: Option<&PrizeRecord>) -> AppResult<()>;
}

pub trait UserStore: Send + Sync + 'static {
    fn find(&self, username: &str) -> AppResult<Option<UserRecord>>;

    /// Fails with `Conflict` when the username is already taken.
    fn insert(&self, user: &UserRecord) -> AppResult<()>;
}

/// 在 tokio 阻塞线程池中执行同步存储操作
pub async fn run_blocking<S, T, F>(store: Arc<S>, f: F) -> AppResult<T>
where
    S: ?Sized + Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| AppError::InternalError(format!("blocking task failed: {e}")))?
}
