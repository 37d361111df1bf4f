//! API-key rotation under per-key rate limits
//!
//! Each vendor key may be used at most `max_requests` times per `window` and
//! by one request at a time. A key is marked in use under the lock before the
//! caller gets it, and released when its [`KeyLease`] is dropped.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{CoreError, CoreResult};

/// Per-key request allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateWindow {
    fn default() -> Self {
        Self {
            max_requests: 1,
            window: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
struct KeySlot {
    in_use: bool,
    window_start: Option<Instant>,
    used_in_window: u32,
    cooldown_until: Option<Instant>,
}

impl KeySlot {
    fn is_available(&mut self, now: Instant, limit: &RateWindow) -> bool {
        if self.in_use {
            return false;
        }
        if matches!(self.cooldown_until, Some(until) if until > now) {
            return false;
        }
        if let Some(start) = self.window_start {
            if now.duration_since(start) >= limit.window {
                self.window_start = None;
                self.used_in_window = 0;
            }
        }
        self.used_in_window < limit.max_requests
    }
}

#[derive(Debug)]
struct RotationState {
    slots: Vec<KeySlot>,
    cursor: usize,
}

#[derive(Debug)]
struct Inner<K> {
    name: String,
    keys: Vec<K>,
    limit: RateWindow,
    state: Mutex<RotationState>,
}

/// Pool of interchangeable API keys
#[derive(Debug)]
pub struct KeyRotation<K> {
    inner: Arc<Inner<K>>,
    poll_interval: Duration,
    acquire_timeout: Duration,
}

impl<K> Clone for KeyRotation<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            poll_interval: self.poll_interval,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

impl<K: Send + Sync + 'static> KeyRotation<K> {
    pub fn new(name: &str, keys: Vec<K>, limit: RateWindow) -> CoreResult<Self> {
        if keys.is_empty() {
            return Err(CoreError::NoKeys(name.to_string()));
        }

        let slots = keys.iter().map(|_| KeySlot::default()).collect();
        Ok(Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                keys,
                limit,
                state: Mutex::new(RotationState { slots, cursor: 0 }),
            }),
            poll_interval: Duration::from_millis(50),
            acquire_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn len(&self) -> usize {
        self.inner.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.keys.is_empty()
    }

    /// Take the next free key, round-robin, without waiting
    pub fn try_acquire(&self) -> Option<KeyLease<K>> {
        let now = Instant::now();
        let limit = self.inner.limit;
        let mut state = self.inner.state.lock();
        let count = state.slots.len();
        let start = state.cursor;

        for offset in 0..count {
            let index = (start + offset) % count;
            let slot = &mut state.slots[index];
            if !slot.is_available(now, &limit) {
                continue;
            }

            slot.in_use = true;
            slot.used_in_window += 1;
            slot.window_start.get_or_insert(now);
            state.cursor = (index + 1) % count;

            debug!("{} key #{} acquired", self.inner.name, index);
            return Some(KeyLease {
                inner: Arc::clone(&self.inner),
                index,
            });
        }
        None
    }

    /// Wait for a free key, polling until the acquire timeout
    pub async fn acquire(&self) -> CoreResult<KeyLease<K>> {
        let started = Instant::now();
        loop {
            if let Some(lease) = self.try_acquire() {
                return Ok(lease);
            }
            if started.elapsed() >= self.acquire_timeout {
                warn!("{}: no key became free within {:?}", self.inner.name, self.acquire_timeout);
                return Err(CoreError::KeyAcquireTimeout {
                    pool: self.inner.name.clone(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Keys that could be handed out right now
    pub fn available(&self) -> usize {
        let now = Instant::now();
        let limit = self.inner.limit;
        let mut state = self.inner.state.lock();
        state
            .slots
            .iter_mut()
            .map(|slot| slot.is_available(now, &limit))
            .filter(|free| *free)
            .count()
    }
}

/// Exclusive use of one key; released on drop
#[derive(Debug)]
pub struct KeyLease<K> {
    inner: Arc<Inner<K>>,
    index: usize,
}

impl<K> KeyLease<K> {
    pub fn key(&self) -> &K {
        &self.inner.keys[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Bench this key for one full window after the vendor rejected it
    pub fn mark_rate_limited(&self) {
        let until = Instant::now() + self.inner.limit.window;
        let mut state = self.inner.state.lock();
        if let Some(slot) = state.slots.get_mut(self.index) {
            slot.cooldown_until = Some(until);
        }
        warn!("{} key #{} rate limited, cooling down", self.inner.name, self.index);
    }
}

impl<K> Drop for KeyLease<K> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        if let Some(slot) = state.slots.get_mut(self.index) {
            slot.in_use = false;
        }
    }
}
