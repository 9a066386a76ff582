use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use super::{CsvTable, EventStore, UserStore};
use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use crate::models::{BookingRow, PrizeRecord, SpinRecord, UserRecord};

fn lock(mutex: &Mutex<()>) -> AppResult<MutexGuard<'_, ()>> {
    mutex
        .lock()
        .map_err(|_| AppError::InternalError("storage lock poisoned".to_string()))
}

/// CSV 实现：订房流水（只读）+ 抽奖记录 + 中奖记录
pub struct CsvEventStore {
    bookings: CsvTable,
    spins: CsvTable,
    prizes: CsvTable,
    // 保证多个用户同时写入时行不会交错
    write_lock: Mutex<()>,
}

impl CsvEventStore {
    pub fn new(bookings: PathBuf, spins: PathBuf, prizes: PathBuf) -> Self {
        Self {
            // 只读，表头只用于日志，不会写入
            bookings: CsvTable::new(bookings, &["username", "price", "status", "booking_time"]),
            spins: CsvTable::new(spins, &SpinRecord::HEADER),
            prizes: CsvTable::new(prizes, &PrizeRecord::HEADER),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            config.bookings_path(),
            config.spins_path(),
            config.prizes_path(),
        )
    }

    /// 启动时创建抽奖/中奖记录文件（订房流水不归本服务所有，不创建）
    pub fn init(&self) -> AppResult<()> {
        self.spins.ensure()?;
        self.prizes.ensure()?;
        if !self.bookings.path().exists() {
            log::warn!(
                "Booking ledger {} does not exist yet; every user will be treated as having no bookings",
                self.bookings.path().display()
            );
        }
        Ok(())
    }
}

impl EventStore for CsvEventStore {
    fn bookings_for(&self, username: &str) -> AppResult<Vec<BookingRow>> {
        self.bookings
            .read_where(|row: &BookingRow| row.username == username)
    }

    fn spins_for(&self, username: &str) -> AppResult<Vec<SpinRecord>> {
        self.spins
            .read_where(|row: &SpinRecord| row.username == username)
    }

    fn prizes_for(&self, username: &str) -> AppResult<Vec<PrizeRecord>> {
        self.prizes
            .read_where(|row: &PrizeRecord| row.username == username)
    }

    fn append_spin(&self, spin: &SpinRecord) -> AppResult<()> {
        let _guard = lock(&self.write_lock)?;
        self.spins.append(spin)?;
        Ok(())
    }

    fn append_prize(&self, prize: &PrizeRecord) -> AppResult<()> {
        let _guard = lock(&self.write_lock)?;
        self.prizes.append(prize)?;
        Ok(())
    }

    fn commit_spin(&self, spin: &SpinRecord, prize: Option<&PrizeRecord>) -> AppResult<()> {
        let _guard = lock(&self.write_lock)?;

        let spins_len = self.spins.append(spin)?;
        let Some(prize) = prize else {
            return Ok(());
        };

        if let Err(e) = self.prizes.append(prize) {
            // 撤销刚写入的抽奖记录，避免“扣了次数却没发奖”
            if let Err(undo) = self.spins.truncate(spins_len) {
                log::error!(
                    "Failed to roll back spin for {} after prize append failure: {undo}",
                    spin.username
                );
            }
            return Err(AppError::PersistenceError(format!(
                "failed to record prize for {}: {e}",
                spin.username
            )));
        }
        Ok(())
    }
}

/// CSV 实现的用户目录
pub struct CsvUserStore {
    users: CsvTable,
    write_lock: Mutex<()>,
}

impl CsvUserStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            users: CsvTable::new(path, &UserRecord::HEADER),
            write_lock: Mutex::new(()),
        }
    }

    pub fn init(&self) -> AppResult<()> {
        self.users.ensure()
    }
}

impl UserStore for CsvUserStore {
    fn find(&self, username: &str) -> AppResult<Option<UserRecord>> {
        Ok(self
            .users
            .read_where(|row: &UserRecord| row.username == username)?
            .into_iter()
            .next())
    }

    fn insert(&self, user: &UserRecord) -> AppResult<()> {
        let _guard = lock(&self.write_lock)?;
        if self.find(&user.username)?.is_some() {
            return Err(AppError::Conflict(format!(
                "username {} is already registered",
                user.username
            )));
        }
        self.users.append(user)?;
        Ok(())
    }
}
