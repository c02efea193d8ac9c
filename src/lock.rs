//! # 锁服务
//!
//! 按锁号互斥，不可重入。拿不到锁时返回 `Retry`，由客户端自己重试。
//! 可选租约：持有超过租约时长的锁会被下一次 `acquire` 抢走。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};

use crate::fs::config::{LOCK_LEASE, LOCK_RETRY_BACKOFF};

pub type LockId = u64;
pub type ClientId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Ok,
    Retry,
}

#[derive(Debug, Clone, Copy)]
struct Holder {
    client: ClientId,
    since: Instant,
}

#[derive(Debug, Default)]
struct LockState {
    holder: Option<Holder>,
    grants: u32, // 累计授予次数
}

#[derive(Debug, Default)]
pub struct LockServer {
    locks: Mutex<HashMap<LockId, LockState>>,
    lease: Option<Duration>,
}

impl LockServer {
    /// 不带租约：锁一直持有到显式释放
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lease(lease: Duration) -> Self {
        Self {
            locks: Mutex::default(),
            lease: Some(lease),
        }
    }

    /// 默认租约（10 秒）
    pub fn leased() -> Self {
        Self::with_lease(LOCK_LEASE)
    }

    pub fn acquire(&self, lid: LockId, client: ClientId) -> LockStatus {
        let mut locks = self.locks();
        let state = locks.entry(lid).or_default();

        if let Some(holder) = state.holder {
            let expired = self
                .lease
                .is_some_and(|lease| holder.since.elapsed() > lease);
            if !expired {
                return LockStatus::Retry;
            }
            log::warn!(
                "lock {}: lease of client {} expired, handing over to {}",
                lid,
                holder.client,
                client
            );
        }

        state.holder = Some(Holder {
            client,
            since: Instant::now(),
        });
        state.grants += 1;
        log::trace!("lock {} granted to {}", lid, client);
        LockStatus::Ok
    }

    /// 释放锁。释放没有持有的锁不算错误。
    pub fn release(&self, lid: LockId, client: ClientId) -> LockStatus {
        let mut locks = self.locks();
        if let Some(state) = locks.get_mut(&lid) {
            match state.holder {
                Some(holder) if holder.client == client => state.holder = None,
                Some(holder) => log::warn!(
                    "lock {}: client {} released a lock held by {}",
                    lid,
                    client,
                    holder.client
                ),
                None => {}
            }
        }
        LockStatus::Ok
    }

    /// 某个锁累计被授予的次数
    pub fn stat(&self, lid: LockId) -> u32 {
        self.locks().get(&lid).map_or(0, |state| state.grants)
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<LockId, LockState>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 锁客户端：拿不到就一直重试
#[derive(Debug, Clone)]
pub struct LockClient {
    server: Arc<LockServer>,
    id: ClientId,
}

impl LockClient {
    pub fn new(server: Arc<LockServer>, id: ClientId) -> Self {
        Self { server, id }
    }

    #[inline]
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn acquire(&self, lid: LockId) {
        while self.server.acquire(lid, self.id) == LockStatus::Retry {
            thread::sleep(LOCK_RETRY_BACKOFF);
        }
    }

    pub fn release(&self, lid: LockId) {
        self.server.release(lid, self.id);
    }

    pub fn guard(&self, lid: LockId) -> LockGuard<'_> {
        LockGuard::new(self, lid)
    }
}

/// 作用域锁：构造时加锁，离开作用域时释放
#[derive(Debug)]
pub struct LockGuard<'a> {
    client: &'a LockClient,
    lid: LockId,
}

impl<'a> LockGuard<'a> {
    pub fn new(client: &'a LockClient, lid: LockId) -> Self {
        client.acquire(lid);
        Self { client, lid }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.client.release(self.lid);
    }
}
