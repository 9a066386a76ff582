use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{EventStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::{BookingRow, PrizeRecord, SpinRecord, UserRecord};

fn read<T>(lock: &RwLock<T>) -> AppResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| AppError::InternalError("memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> AppResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| AppError::InternalError("memory store lock poisoned".to_string()))
}

#[derive(Default)]
struct EventLogs {
    spins: Vec<SpinRecord>,
    prizes: Vec<PrizeRecord>,
}

/// 内存实现，主要用于测试；订房流水通过 `with_bookings` 预置
#[derive(Default)]
pub struct MemoryEventStore {
    bookings: RwLock<Vec<BookingRow>>,
    logs: RwLock<EventLogs>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bookings(bookings: Vec<BookingRow>) -> Self {
        Self {
            bookings: RwLock::new(bookings),
            logs: RwLock::default(),
        }
    }

    pub fn add_booking(&self, row: BookingRow) -> AppResult<()> {
        write(&self.bookings)?.push(row);
        Ok(())
    }

    pub fn spin_count(&self) -> AppResult<usize> {
        Ok(read(&self.logs)?.spins.len())
    }

    pub fn prize_count(&self) -> AppResult<usize> {
        Ok(read(&self.logs)?.prizes.len())
    }
}

impl EventStore for MemoryEventStore {
    fn bookings_for(&self, username: &str) -> AppResult<Vec<BookingRow>> {
        Ok(read(&self.bookings)?
            .iter()
            .filter(|r| r.username == username)
            .cloned()
            .collect())
    }

    fn spins_for(&self, username: &str) -> AppResult<Vec<SpinRecord>> {
        Ok(read(&self.logs)?
            .spins
            .iter()
            .filter(|r| r.username == username)
            .cloned()
            .collect())
    }

    fn prizes_for(&self, username: &str) -> AppResult<Vec<PrizeRecord>> {
        Ok(read(&self.logs)?
            .prizes
            .iter()
            .filter(|r| r.username == username)
            .cloned()
            .collect())
    }

    fn append_spin(&self, spin: &SpinRecord) -> AppResult<()> {
        write(&self.logs)?.spins.push(spin.clone());
        Ok(())
    }

    fn append_prize(&self, prize: &PrizeRecord) -> AppResult<()> {
        write(&self.logs)?.prizes.push(prize.clone());
        Ok(())
    }

    fn commit_spin(&self, spin: &SpinRecord, prize: Option<&PrizeRecord>) -> AppResult<()> {
        let mut logs = write(&self.logs)?;
        logs.spins.push(spin.clone());
        if let Some(prize) = prize {
            logs.prizes.push(prize.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    fn find(&self, username: &str) -> AppResult<Option<UserRecord>> {
        Ok(read(&self.users)?
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    fn insert(&self, user: &UserRecord) -> AppResult<()> {
        let mut users = write(&self.users)?;
        if users.iter().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "username {} is already registered",
                user.username
            )));
        }
        users.push(user.clone());
        Ok(())
    }
}
