use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{current_period_start, BrandVoiceStore, CreativeStore, ProfileStore, UsageStore};
use crate::errors::StoreError;
use crate::wire::{BrandVoice, Creative, CreativeKind, NewCreative, Platform, SubscriptionTier};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    user_id            TEXT PRIMARY KEY,
    subscription_tier  TEXT NOT NULL DEFAULT 'free'
);
CREATE TABLE IF NOT EXISTS brand_kits (
    user_id        TEXT PRIMARY KEY,
    tone_preset    TEXT,
    tone_of_voice  TEXT,
    sample_copy    TEXT
);
CREATE TABLE IF NOT EXISTS creatives (
    id            TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    kind          TEXT NOT NULL,
    platform      TEXT NOT NULL,
    name          TEXT NOT NULL,
    content       TEXT NOT NULL,
    input_params  TEXT NOT NULL,
    is_favorite   INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS creatives_user_idx ON creatives(user_id, created_at);
CREATE TABLE IF NOT EXISTS usage_records (
    user_id       TEXT NOT NULL,
    period_start  TEXT NOT NULL,
    credits_used  INTEGER NOT NULL DEFAULT 0,
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (user_id, period_start)
);
"#;

/// Single-statement capped upsert. Returns no row when the cap would be
/// crossed, so two concurrent generations cannot both slip past the limit.
const INCREMENT_SQL: &str = r#"
INSERT INTO usage_records (user_id, period_start, credits_used, updated_at)
VALUES (?1, ?2, ?3, ?5)
ON CONFLICT(user_id, period_start) DO UPDATE
    SET credits_used = usage_records.credits_used + excluded.credits_used,
        updated_at = excluded.updated_at
    WHERE usage_records.credits_used + excluded.credits_used <= ?4
RETURNING credits_used
"#;

/// rusqlite is blocking, so every call made from the async capability traits
/// runs on tokio's blocking pool rather than on a runtime worker.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent).map_err(|e| StoreError::Other(e.to_string()))?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| StoreError::Other(format!("database task failed: {e}")))?
    }

    pub fn upsert_profile(&self, user_id: &str, tier: SubscriptionTier) -> Result<(), StoreError> {
        let tier = serde_json::to_value(tier)?;
        self.conn.lock().execute(
            "INSERT INTO profiles (user_id, subscription_tier) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET subscription_tier = excluded.subscription_tier",
            params![user_id, tier.as_str().unwrap_or("free")],
        )?;
        Ok(())
    }

    pub fn upsert_brand_voice(&self, user_id: &str, voice: &BrandVoice) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO brand_kits (user_id, tone_preset, tone_of_voice, sample_copy) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                tone_preset = excluded.tone_preset,
                tone_of_voice = excluded.tone_of_voice,
                sample_copy = excluded.sample_copy",
            params![user_id, voice.tone_preset, voice.tone_of_voice, voice.sample_copy],
        )?;
        Ok(())
    }

    pub fn creatives_for(&self, user_id: &str) -> Result<Vec<Creative>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, kind, platform, name, content, input_params, is_favorite, created_at
             FROM creatives WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], raw_creative)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }
}

struct RawCreative {
    id: String,
    user_id: String,
    kind: String,
    platform: String,
    name: String,
    content: String,
    input_params: String,
    is_favorite: bool,
    created_at: String,
}

fn raw_creative(r: &Row<'_>) -> rusqlite::Result<RawCreative> {
    Ok(RawCreative {
        id: r.get(0)?,
        user_id: r.get(1)?,
        kind: r.get(2)?,
        platform: r.get(3)?,
        name: r.get(4)?,
        content: r.get(5)?,
        input_params: r.get(6)?,
        is_favorite: r.get(7)?,
        created_at: r.get(8)?,
    })
}

impl RawCreative {
    fn decode(self) -> Result<Creative, StoreError> {
        let id = Uuid::parse_str(&self.id).map_err(|e| StoreError::Other(format!("bad creative id: {e}")))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::Other(format!("bad timestamp: {e}")))?
            .with_timezone(&Utc);
        let kind: CreativeKind = serde_json::from_value(serde_json::Value::String(self.kind))?;
        let platform: Platform = serde_json::from_value(serde#[async_trait]
impl ProfileStore for SqliteStore {
    async fn subscription_tier(&self, user_id: &str) -> Result<SubscriptionTier, StoreError> {
        let user_id = user_id.to_string();
        self.blocking(move |conn| {
            let tier: Option<String> = conn
                .query_row(
                    "SELECT subscription_tier FROM profiles WHERE user_id = ?1",
                    params![user_id],
                    |r| r.get(0),
                )
                .optional()?;
            match tier {
                Some(t) => Ok(serde_json::from_value(serde_json::Value::String(t))?),
                None => Ok(SubscriptionTier::Free),
            }
        })
        .await
    }
}

#[async_trait]
impl BrandVoiceStore for SqliteStore {
    async fn brand_voice(&self, user_id: &str) -> Result<Option<BrandVoice>, StoreError> {
        let user_id = user_id.to_string();
        self.blocking(move |conn| {
            let voice = conn
                .query_row(
                    "SELECT tone_preset, tone_of_voice, sample_copy FROM brand_kits WHERE user_id = ?1",
                    params![user_id],
                    |r| {
                        Ok(BrandVoice {
                            tone_preset: r.get(0)?,
                            tone_of_voice: r.get(1)?,
                            sample_copy: r.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(voice)
        })
        .await
    }
}

#[async_trait]
impl CreativeStore for SqliteStore {
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
        let row = creative.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO creatives (id, user_id, kind, platform, name, content, input_params, is_favorite, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.id.to_string(),
                    row.user_id,
                    "copy",
                    row.platform.as_str(),
                    row.name,
                    serde_json::to_string(&row.content)?,
                    serde_json::to_string(&row.input_params)?,
                    row.is_favorite,
                    row.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(creative)
    }
}

#[async_trait]
impl UsageStore for SqliteStore {
    async fn current_usage(&self, user_id: &str) -> Result<u32, StoreError> {
        let user_id = user_id.to_string();
        self.blocking(move |conn| {
            let used: Option<u32> = conn
                .query_row(
                    "SELECT credits_used FROM usage_records WHERE user_id = ?1 AND period_start = ?2",
                    params![user_id, current_period_start().to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(used.unwrap_or(0))
        })
        .await
    }

    async fn commit_increment(&self, user_id: &str, amount: u32, limit: u32) -> Result<u32, StoreError> {
        if amount > limit {
            return Err(StoreError::LimitReached { used: 0, limit });
        }
        let user_id = user_id.to_string();
        self.blocking(move |conn| {
            let period = current_period_start().to_string();
            let total: Option<u32> = conn
                .query_row(
                    INCREMENT_SQL,
                    params![user_id, period, amount, limit, Utc::now().to_rfc3339()],
                    |r| r.get(0),
                )
                .optional()?;
            match total {
                Some(t) => Ok(t),
                None => {
                    let used: u32 = conn.query_row(
                        "SELECT credits_used FROM usage_records WHERE user_id = ?1 AND period_start = ?2",
                        params![user_id, period],
                        |r| r.get(0),
                    )?;
                    Err(StoreError::LimitReached { used, limit })
                }
            }
        })
        .await
    }
}

          Some(t) => Ok(t),
            None => {
                let used: u32 = conn.query_row(
                    "SELECT credits_used FROM usage_records WHERE user_id = ?1 AND period_start = ?2",
                    params![user_id, period],
                    |r| r.get(0),
                )?;
                Err(StoreError::LimitReached { used, limit })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UsageCheck;
    use crate::wire::{CopyVariation, GenerationInput, StyleGroup};
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn usage_increments_atomically_up_to_cap() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.current_usage("u").await.unwrap(), 0);
        for expected in 1..=3 {
            assert_eq!(store.commit_increment("u", 1, 3).await.unwrap(), expected);
        }
        assert_matches!(
            store.commit_increment("u", 1, 3).await,
            Err(StoreError::LimitReached { used: 3, limit: 3 })
        );
        assert_eq!(store.check("u", 3).await.unwrap(), UsageCheck { allowed: false, used: 3, limit: 3 });
    }

    #[tokio::test]
    async fn profile_and_brand_voice_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.subscription_tier("u").await.unwrap(), SubscriptionTier::Free);
        assert!(store.brand_voice("u").await.unwrap().is_none());

        store.upsert_profile("u", SubscriptionTier::Pro).unwrap();
        let voice = BrandVoice {
            tone_preset: Some("professional".into()),
            tone_of_voice: Some("Clear and confident".into()),
            sample_copy: None,
        };
        store.upsert_brand_voice("u", &voice).unwrap();

        assert_eq!(store.subscription_tier("u").await.unwrap(), SubscriptionTier::Pro);
        assert_eq!(store.brand_voice("u").await.unwrap(), Some(voice));
    }

    #[tokio::test]
    async fn creatives_persist_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("adgenius.db");
        let store = SqliteStore::open(&path).unwrap();

        let variation = CopyVariation {
            id: "1".into(),
            style_group: StyleGroup::Urgency,
            headline: "Last chance".into(),
            primary_text: "Only today.".into(),
            description: String::new(),
            cta: "Shop Now".into(),
        };
        let saved = store
            .create_creative(NewCreative {
                user_id: "u".into(),
                kind: CreativeKind::Copy,
                platform: Platform::Tiktok,
                name: "EcoBottle Pro".into(),
                content: vec![variation.clone()],
                input_params: GenerationInput::default(),
                is_favorite: false,
            })
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        let all = reopened.creatives_for("u").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, saved.id);
        assert_eq!(all[0].platform, Platform::Tiktok);
        assert_eq!(all[0].content, vec![variation]);
        assert!(!all[0].is_favorite);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_commits_stop_at_the_cap() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut handles = Vec::new();
        for _ in 0..12 {
            let s = Arc::clone(&store);
            handles.push(tokio::spawn(async move { s.commit_increment("racer", 1, 5).await.is_ok() }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap() {
                ok += 1;
            }
        }
        assert_eq!(ok, 5);
        assert_eq!(store.current_usage("racer").await.unwrap(), 5);
    }
}
