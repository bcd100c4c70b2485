//! Draft snapshots of open sessions.
//!
//! Every edit fires a snapshot save without waiting for it. Saves may land
//! out of order, so stores keep the snapshot with the newest `last_saved`
//! per session and ignore older ones (last write wins by timestamp).
//! A failed save is reported through `DraftStatus` and never touches the
//! in-memory session.
//!
//! Publishing retires the draft with `clear_up_to`: a draft newer than the
//! published snapshot is kept, otherwise it is replaced by a tombstone
//! carrying the publish time, so late saves from before the publish are
//! superseded instead of bringing the draft back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::ids::SessionId;
use crate::models::session::CourseSession;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub session_id: SessionId,
    pub session: CourseSession,
    pub last_saved: DateTime<Utc>,
}

impl DraftSnapshot {
    pub fn capture(session: &CourseSession) -> Self {
        Self {
            session_id: session.id,
            session: session.clone(),
            last_saved: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DraftStatus {
    Unsaved,
    Saved { at: DateTime<Utc> },
    Failed { at: DateTime<Utc>, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Stored,
    /// A newer snapshot was already stored; this one was dropped.
    Superseded,
}

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("draft serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("draft store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<SaveOutcome, DraftError>;
    async fn load(&self, session_id: SessionId) -> Result<Option<DraftSnapshot>, DraftError>;
    /// Retires the draft if it is not newer than `up_to`. Returns whether
    /// it was retired.
    async fn clear_up_to(&self, session_id: SessionId, up_to: DateTime<Utc>) -> Result<bool, DraftError>;
}

// ────────────────────────────────────────────────────────────────────────────
// RedisDraftStore
// ────────────────────────────────────────────────────────────────────────────

/// Writes the snapshot only if no newer one is stored. Returns 1 when stored.
const SAVE_IF_NEWER: &str = r#"
local current = redis.call('HGET', KEYS[1], 'ts')
if current and tonumber(current) > tonumber(ARGV[1]) then
  return 0
end
redis.call('HSET', KEYS[1], 'ts', ARGV[1], 'body', ARGV[2])
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
"#;

/// Drops the body if the stored snapshot is not newer than ARGV[1] and keeps
/// ARGV[1] as the tombstone timestamp. Returns 1 when retired.
const CLEAR_IF_NOT_NEWER: &str = r#"
local current = redis.call('HGET', KEYS[1], 'ts')
if current and tonumber(current) > tonumber(ARGV[1]) then
  return 0
end
redis.call('HDEL', KEYS[1], 'body')
redis.call('HSET', KEYS[1], 'ts', ARGV[1])
redis.call('EXPIRE', KEYS[1], ARGV[2])
return 1
"#;

static SAVE_SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| redis::Script::new(SAVE_IF_NEWER));
static CLEAR_SCRIPT: LazyLock<redis::Script> =
    LazyLock::new(|| redis::Script::new(CLEAR_IF_NOT_NEWER));

pub struct RedisDraftStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisDraftStore {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    fn key(session_id: SessionId) -> String {
        format!("coursebuilder:draft:{session_id}")
    }
}

#[async_trait]
impl DraftStore for RedisDraftStore {
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<SaveOutcome, DraftError> {
        let body = serde_json::to_string(snapshot)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stored: i32 = SAVE_SCRIPT
            .key(Self::key(snapshot.session_id))
            .arg(snapshot.last_saved.timestamp_millis())
            .arg(body)
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        Ok(if stored == 1 {
            SaveOutcome::Stored
        } else {
            SaveOutcome::Superseded
        })
    }

    async fn load(&self, session_id: SessionId) -> Result<Option<DraftSnapshot>, DraftError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let body: Option<String> = conn.hget(Self::key(session_id), "body").await?;
        body.map(|b| serde_json::from_str(&b))
            .transpose()
            .map_err(DraftError::from)
    }

    async fn clear_up_to(&self, session_id: SessionId, up_to: DateTime<Utc>) -> Result<bool, DraftError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let retired: i32 = CLEAR_SCRIPT
            .key(Self::key(session_id))
            .arg(up_to.timestamp_millis())
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        Ok(retired == 1)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MemoryDraftStore
// ────────────────────────────────────────────────────────────────────────────

/// Stored timestamp plus the snapshot; `None` marks a retired draft.
struct StoredDraft {
    ts: DateTime<Utc>,
    snapshot: Option<DraftSnapshot>,
}

/// In-process store for tests and local runs without Redis.
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<SessionId, StoredDraft>>,
    offline: AtomicBool,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail, to exercise the failure paths.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), DraftError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DraftError::Unavailable("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, snapshot: &DraftSnapshot) -> Result<SaveOutcome, DraftError> {
        self.check_online()?;
        let mut drafts = self.drafts.lock().await;
        if let Some(current) = drafts.get(&snapshot.session_id) {
            if current.ts > snapshot.last_saved {
                debug!(session_id = %snapshot.session_id, "dropping out-of-order draft snapshot");
                return Ok(SaveOutcome::Superseded);
            }
        }
        drafts.insert(
            snapshot.session_id,
            StoredDraft {
                ts: snapshot.last_saved,
                snapshot: Some(snapshot.clone()),
            },
        );
        Ok(SaveOutcome::Stored)
    }

    async fn load(&self, session_id: SessionId) -> Result<Option<DraftSnapshot>, DraftError> {
        self.check_online()?;
        Ok(self
            .drafts
            .lock()
            .await
            .get(&session_id)
            .and_then(|stored| stored.snapshot.clone()))
    }

    async fn clear_up_to(&self, session_id: SessionId, up_to: DateTime<Utc>) -> Result<bool, DraftError> {
        self.check_online()?;
        let mut drafts = self.drafts.lock().await;
        if drafts.get(&session_id).is_some_and(|stored| stored.ts > up_to) {
            return Ok(false);
        }
        drafts.insert(
            session_id,
            StoredDraft {
                ts: up_to,
                snapshot: None,
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::templates::TemplateType;
    use crate::models::ids::CourseId;

    fn snapshot_at(session: &CourseSession, millis: i64) -> DraftSnapshot {
        DraftSnapshot {
            session_id: session.id,
            session: session.clone(),
            last_saved: DateTime::from_timestamp_millis(millis).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_last_write_wins_by_timestamp() {
        let store = MemoryDraftStore::new();
        let mut session = CourseSession::new(CourseId::new(), "v1", TemplateType::Lesson);
        let older = snapshot_at(&session, 1_000);
        session.title = "v2".into();
        let newer = snapshot_at(&session, 2_000);

        // The newer save lands first; the older one arrives late.
        assert_eq!(store.save(&newer).await.unwrap(), SaveOutcome::Stored);
        assert_eq!(store.save(&older).await.unwrap(), SaveOutcome::Superseded);

        let loaded = store.load(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.session.title, "v2");
    }

    #[tokio::test]
    async fn test_clear_retires_draft_and_rejects_older_saves() {
        let store = MemoryDraftStore::new();
        let session = CourseSession::new(CourseId::new(), "x", TemplateType::Quiz);
        store.save(&snapshot_at(&session, 1_000)).await.unwrap();

        let published_at = DateTime::from_timestamp_millis(2_000).unwrap();
        assert!(store.clear_up_to(session.id, published_at).await.unwrap());
        assert!(store.load(session.id).await.unwrap().is_none());

        // A save issued before the publish lands late and stays retired.
        assert_eq!(
            store.save(&snapshot_at(&session, 1_500)).await.unwrap(),
            SaveOutcome::Superseded
        );
        assert!(store.load(session.id).await.unwrap().is_none());

        // Edits after the publish create a fresh draft.
        assert_eq!(
            store.save(&snapshot_at(&session, 2_500)).await.unwrap(),
            SaveOutcome::Stored
        );
        assert!(store.load(session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_keeps_draft_newer_than_publish() {
        let store = MemoryDraftStore::new();
        let mut session = CourseSession::new(CourseId::new(), "x", TemplateType::Lesson);
        session.title = "edited mid-publish".into();
        store.save(&snapshot_at(&session, 3_000)).await.unwrap();

        let published_at = DateTime::from_timestamp_millis(2_000).unwrap();
        assert!(!store.clear_up_to(session.id, published_at).await.unwrap());
        let loaded = store.load(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.session.title, "edited mid-publish");
    }

    #[tokio::test]
    async fn test_offline_store_fails_without_losing_previous_draft() {
        let store = MemoryDraftStore::new();
        let session = CourseSession::new(CourseId::new(), "x", TemplateType::Lesson);
        store.save(&snapshot_at(&session, 10)).await.unwrap();

        store.set_offline(true);
        let err = store.save(&snapshot_at(&session, 20)).await.unwrap_err();
        assert!(matches!(err, DraftError::Unavailable(_)));

        store.set_offline(false);
        let loaded = store.load(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_saved.timestamp_millis(), 10);
    }

    #[test]
    fn test_redis_key_layout() {
        let id = SessionId::new();
        assert_eq!(RedisDraftStore::key(id), format!("coursebuilder:draft:{id}"));
    }

    #[test]
    fn test_status_wire_shape() {
        let json = serde_json::to_value(DraftStatus::Unsaved).unwrap();
        assert_eq!(json["state"], "unsaved");
    }
}
