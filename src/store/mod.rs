//! Storage capabilities the generation flow depends on. The flow only sees
//! these traits; [`MemoryStore`] and [`sqlite::SqliteStore`] implement them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::wire::{BrandVoice, Creative, NewCreative, SubscriptionTier};

pub mod sqlite;

/// Result of a read-only quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCheck {
    pub allowed: bool,
    pub used: u32,
    pub limit: u32,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Tier of the user; `Free` when no profile exists.
    async fn subscription_tier(&self, user_id: &str) -> Result<SubscriptionTier, StoreError>;
}

#[async_trait]
pub trait BrandVoiceStore: Send + Sync {
    async fn brand_voice(&self, user_id: &str) -> Result<Option<BrandVoice>, StoreError>;
}

#[async_trait]
pub trait CreativeStore: Send + Sync {
    async fn create_creative(&self, record: NewCreative) -> Result<Creative, StoreError>;
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Credits consumed by `user_id` in the current period.
    async fn current_usage(&self, user_id: &str) -> Result<u32, StoreError>;

    async fn check(&self, user_id: &str, limit: u32) -> Result<UsageCheck, StoreError> {
        let used = self.current_usage(user_id).await?;
        Ok(UsageCheck { allowed: used < limit, used, limit })
    }

    /// Atomically add `amount` and return the new total. Fails with
    /// [`StoreError::LimitReached`] instead of pushing the total past `limit`.
    async fn commit_increment(&self, user_id: &str, amount: u32, limit: u32) -> Result<u32, StoreError>;
}

/// The storage capabilities used by a live generation flow.
#[derive(Clone)]
pub struct Stores {
    pub profiles: Arc<dyn ProfileStore>,
    pub brand_voices: Arc<dyn BrandVoiceStore>,
    pub creatives: Arc<dyn CreativeStore>,
    pub usage: Arc<dyn UsageStore>,
}

impl Stores {
    /// One backend serving every capability.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: ProfileStore + BrandVoiceStore + CreativeStore + UsageStore + 'static,
    {
        Self {
            profiles: backend.clone(),
            brand_voices: backend.clone(),
            creatives: backend.clone(),
            usage: backend,
        }
    }
}

/// First day of the current UTC month; usage resets when it changes.
pub fn current_period_start() -> NaiveDate {
    let today = Utc::now().date_naive();
    today.with_day(1).unwrap_or(today)
}

#[derive(Default)]
struct MemoryInner {
    tiers: HashMap<String, SubscriptionTier>,
    brand_voices: HashMap<String, BrandVoice>,
    creatives: Vec<Creative>,
    usage: HashMap<(String, NaiveDate), u32>,
}

/// Process-local store. Each operation holds the lock for its whole
/// read-modify-write, so increments are atomic within the process.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tier(&self, user_id: &str, tier: SubscriptionTier) {
        self.inner.lock().tiers.insert(user_id.to_string(), tier);
    }

    pub fn set_brand_voice(&self, user_id: &str, voice: BrandVoice) {
        self.inner.lock().brand_voices.insert(user_id.to_string(), voice);
    }

    pub fn set_usage(&self, user_id: &str, used: u32) {
        self.inner
            .lock()
            .usage
            .insert((user_id.to_string(), current_period_start()), used);
    }

    pub fn creatives_for(&self, user_id: &str) -> Vec<Creative> {
        self.inner
            .lock()
            .creatives
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn subscription_tier(&self, user_id: &str) -> Result<SubscriptionTier, StoreError> {
        Ok(self.inner.lock().tiers.get(user_id).copied().unwrap_or_default())
    }
}

#[async_trait]
impl BrandVoiceStore for MemoryStore {
    async fn brand_voice(&self, user_id: &str) -> Result<Option<BrandVoice>, StoreError> {
        Ok(self.inner.lock().brand_voices.get(user_id).cloned())
    }
}

#[async_trait]
impl CreativeStore for MemoryStore {
    async fn create_creative(&self, record: NewCreative) -> Result<Creative, StoreError> {
        let creative = Creative {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            kind: record.kind,
            platform: record.platform,
            name: record.name,
            content: record.content,
            input_params: record.input_params,
            is_favorite: record.is_favorite,
            created_at: Utc::now(),
        };
        self.inner.lock().creatives.push(creative.clone());
        Ok(creative)
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn current_usage(&self, user_id: &str) -> Result<u32, StoreError> {
        let key = (user_id.to_string(), current_period_start());
        Ok(self.inner.lock().usage.get(&key).copied().unwrap_or(0))
    }

    async fn commit_increment(&self, user_id: &str, amount: u32, limit: u32) -> Result<u32, StoreError> {
        let key = (user_id.to_string(), current_period_start());
        let mut inner = self.inner.lock();
        let used = inner.usage.entry(key).or_insert(0);
        let next = used.saturating_add(amount);
        if next > limit {
            return Err(StoreError::LimitReached { used: *used, limit });
        }
        *used = next;
        Ok(next)
    }
}
