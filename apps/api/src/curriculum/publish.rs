//! Publish workflow.
//!
//! ```text
//! Editing ──publish──▶ Validating ──issues──────▶ Editing  (422, issue list)
//!                          │──store error─────▶ Editing  (503, retryable)
//!                          └──stored──────────▶ Published
//! Published ──any edit──▶ Editing
//! ```
//!
//! Publishing writes the normalized rows in one transaction, so a failure
//! leaves no partial publish behind, then archives the JSON snapshot to S3.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::curriculum::templates::{resolve_enabled_blocks, PageFlow, TemplateDefinition};
use crate::layout::blocks::BlockKind;
use crate::models::ids::SessionId;
use crate::models::rows::{
    CanvasRow, CardRow, ObjectiveRow, PublishedSessionRow, SessionRows, TaskRow, TopicRow,
};
use crate::models::session::CourseSession;
use crate::text::normalize::{normalize_str, PlaceholderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Editing,
    Validating,
    Published,
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingRequiredBlock,
    EmptyTitle,
    NoTopics,
    EmptyLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockKind>,
    /// Topic, objective or task the issue points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            block: None,
            entity_id: None,
        }
    }

    fn for_block(mut self, block: BlockKind) -> Self {
        self.block = Some(block);
        self
    }

    fn for_entity(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }
}

fn empty_label(what: &str, id: Uuid) -> ValidationIssue {
    ValidationIssue::new(IssueKind::EmptyLabel, format!("A {what} has no title")).for_entity(id)
}

/// Everything that blocks publishing. Empty means the session may publish.
///
/// Labels are checked after normalization, so a label still reading
/// "Objective 2" counts as empty.
pub fn validate_for_publish(
    session: &CourseSession,
    definition: &TemplateDefinition,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let enabled = resolve_enabled_blocks(definition, &session.block_visibility);
    for required in definition.required_blocks() {
        if !enabled.contains(&required) {
            issues.push(
                ValidationIssue::new(
                    IssueKind::MissingRequiredBlock,
                    format!("Required block '{}' is hidden", block_name(required)),
                )
                .for_block(required),
            );
        }
    }

    if normalize_str(&session.title, PlaceholderKind::Title).is_empty() {
        issues.push(ValidationIssue::new(
            IssueKind::EmptyTitle,
            "Session title is empty",
        ));
    }

    if definition.flow == PageFlow::Reflow && session.topics.is_empty() {
        issues.push(ValidationIssue::new(
            IssueKind::NoTopics,
            "Add at least one topic before publishing",
        ));
    }

    for topic in &session.topics {
        if normalize_str(&topic.label, PlaceholderKind::Topic).is_empty() {
            issues.push(empty_label("topic", topic.id.0));
        }
        for objective in &topic.objectives {
            if normalize_str(&objective.label, PlaceholderKind::Objective).is_empty() {
                issues.push(empty_label("objective", objective.id.0));
            }
            for task in &objective.tasks {
                if normalize_str(&task.label, PlaceholderKind::Task).is_empty() {
                    issues.push(empty_label("task", task.id.0));
                }
            }
        }
    }

    issues
}

fn block_name(kind: BlockKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

// ────────────────────────────────────────────────────────────────────────────
// Stores
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishReceipt {
    pub session_id: SessionId,
    pub version: i32,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("session has {} validation issue(s)", .0.len())]
    Rejected(Vec<ValidationIssue>),
    #[error("a publish is already in progress for this session")]
    AlreadyValidating,
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("publish store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PublishStore: Send + Sync {
    /// Stores the session as the next published version. All or nothing.
    async fn publish(&self, session: &CourseSession) -> Result<PublishReceipt, PublishError>;
    async fn load_published(
        &self,
        session_id: SessionId,
    ) -> Result<Option<CourseSession>, PublishError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PgPublishStore
// ────────────────────────────────────────────────────────────────────────────

pub struct PgPublishStore {
    db: PgPool,
    s3: aws_sdk_s3::Client,
    bucket: String,
}

impl PgPublishStore {
    pub fn new(db: PgPool, s3: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            db,
            s3,
            bucket: bucket.into(),
        }
    }

    pub fn archive_key(session_id: SessionId, version: i32) -> String {
        format!("sessions/{session_id}/v{version}.json")
    }

    async fn write_rows(
        &self,
        session: &CourseSession,
        published_at: DateTime<Utc>,
    ) -> Result<i32, PublishError> {
        let rows = SessionRows::from_session(session)?;
        let mut tx = self.db.begin().await?;

        let current: Option<i32> =
            sqlx::query_scalar("SELECT version FROM published_sessions WHERE id = $1 FOR UPDATE")
                .bind(session.id.0)
                .fetch_optional(&mut *tx)
                .await?;
        let version = current.unwrap_or(0) + 1;
        let head = PublishedSessionRow::from_session(session, version, published_at)?;

        // Children cascade from the session row.
        sqlx::query("DELETE FROM published_sessions WHERE id = $1")
            .bind(session.id.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO published_sessions
                (id, course_id, session_order, title, template_type, duration_minutes,
                 metadata, field_visibility, block_visibility, version, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(head.id)
        .bind(head.course_id)
        .bind(head.session_order)
        .bind(&head.title)
        .bind(&head.template_type)
        .bind(head.duration_minutes)
        .bind(&head.metadata)
        .bind(&head.field_visibility)
        .bind(&head.block_visibility)
        .bind(head.version)
        .bind(head.published_at)
        .execute(&mut *tx)
        .await?;

        for TopicRow {
            id,
            session_id,
            label,
            position,
        } in &rows.topics
        {
            sqlx::query(
                "INSERT INTO session_topics (id, session_id, label, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(session_id)
            .bind(label)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        for ObjectiveRow {
            id,
            topic_id,
            label,
            position,
        } in &rows.objectives
        {
            sqlx::query(
                "INSERT INTO session_objectives (id, topic_id, label, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(topic_id)
            .bind(label)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        for TaskRow {
            id,
            objective_id,
            label,
            position,
        } in &rows.tasks
        {
            sqlx::query(
                "INSERT INTO session_tasks (id, objective_id, label, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(objective_id)
            .bind(label)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        for card in &rows.cards {
            let CardRow {
                id,
                task_id,
                media_card_id,
                card_type,
                area,
                x,
                y,
                width,
                height,
                content,
                position,
            } = card;
            sqlx::query(
                r#"
                INSERT INTO session_cards
                    (id, task_id, media_card_id, card_type, area, x, y, width, height, content, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(id)
            .bind(task_id)
            .bind(media_card_id)
            .bind(card_type)
            .bind(area)
            .bind(x)
            .bind(y)
            .bind(width)
            .bind(height)
            .bind(content)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        for CanvasRow {
            id,
            session_id,
            page_number,
            block_keys,
        } in &rows.canvases
        {
            sqlx::query(
                "INSERT INTO session_canvases (id, session_id, page_number, block_keys) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(session_id)
            .bind(page_number)
            .bind(block_keys)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(version)
    }

    /// Uploads the JSON snapshot and records it. The published rows are
    /// already committed, so a failure here is logged and not returned.
    async fn archive(&self, session: &CourseSession, version: i32) -> Option<String> {
        let key = Self::archive_key(session.id, version);
        let body = match serde_json::to_vec(session) {
            Ok(body) => body,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "failed to serialize publish archive");
                return None;
            }
        };

        let uploaded = self
            .s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await;
        if let Err(e) = uploaded {
            warn!(session_id = %session.id, version, error = %e, "S3 archive upload failed");
            return None;
        }

        let recorded = sqlx::query(
            "INSERT INTO session_archives (id, session_id, version, s3_key) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(session.id.0)
        .bind(version)
        .bind(&key)
        .execute(&self.db)
        .await;
        if let Err(e) = recorded {
            warn!(session_id = %session.id, version, error = %e, "failed to record publish archive");
        }

        info!("Archived session snapshot to s3://{}/{}", self.bucket, key);
        Some(key)
    }
}

#[async_trait]
impl PublishStore for PgPublishStore {
    async fn publish(&self, session: &CourseSession) -> Result<PublishReceipt, PublishError> {
        let published_at = Utc::now();
        let version = self.write_rows(session, published_at).await?;
        info!(session_id = %session.id, version, "session published");
        let archive_key = self.archive(session, version).await;
        Ok(PublishReceipt {
            session_id: session.id,
            version,
            published_at,
            archive_key,
        })
    }

    async fn load_published(
        &self,
        session_id: SessionId,
    ) -> Result<Option<CourseSession>, PublishError> {
        let head = sqlx::query_as::<_, PublishedSessionRow>(
            "SELECT * FROM published_sessions WHERE id = $1",
        )
        .bind(session_id.0)
        .fetch_optional(&self.db)
        .await?;
        let Some(head) = head else {
            return Ok(None);
        };

        let topics = sqlx::query_as::<_, TopicRow>(
            "SELECT id, session_id, label, position FROM session_topics WHERE session_id = $1",
        )
        .bind(session_id.0)
        .fetch_all(&self.db)
        .await?;
        let objectives = sqlx::query_as::<_, ObjectiveRow>(
            r#"
            SELECT o.id, o.topic_id, o.label, o.position
            FROM session_objectives o
            JOIN session_topics t ON t.id = o.topic_id
            WHERE t.session_id = $1
            "#,
        )
        .bind(session_id.0)
        .fetch_all(&self.db)
        .await?;
        let tasks = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT k.id, k.objective_id, k.label, k.position
            FROM session_tasks k
            JOIN session_objectives o ON o.id = k.objective_id
            JOIN session_topics t ON t.id = o.topic_id
            WHERE t.session_id = $1
            "#,
        )
        .bind(session_id.0)
        .fetch_all(&self.db)
        .await?;
        let cards = sqlx::query_as::<_, CardRow>(
            r#"
            SELECT c.id, c.task_id, c.media_card_id, c.card_type, c.area,
                   c.x, c.y, c.width, c.height, c.content, c.position
            FROM session_cards c
            JOIN session_tasks k ON k.id = c.task_id
            JOIN session_objectives o ON o.id = k.objective_id
            JOIN session_topics t ON t.id = o.topic_id
            WHERE t.session_id = $1
            "#,
        )
        .bind(session_id.0)
        .fetch_all(&self.db)
        .await?;
        let canvases = sqlx::query_as::<_, CanvasRow>(
            "SELECT id, session_id, page_number, block_keys FROM session_canvases WHERE session_id = $1",
        )
        .bind(session_id.0)
        .fetch_all(&self.db)
        .await?;

        let rows = SessionRows {
            topics,
            objectives,
            tasks,
            cards,
            canvases,
        };
        Ok(Some(rows.assemble(head)?))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MemoryPublishStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryPublishStore {
    published: Mutex<HashMap<SessionId, (i32, CourseSession)>>,
    offline: AtomicBool,
}

impl MemoryPublishStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl PublishStore for MemoryPublishStore {
    async fn publish(&self, session: &CourseSession) -> Result<PublishReceipt, PublishError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable("memory store is offline".into()));
        }
        let mut published = self.published.lock().await;
        let version = published.get(&session.id).map_or(1, |(v, _)| v + 1);
        published.insert(session.id, (version, session.clone()));
        Ok(PublishReceipt {
            session_id: session.id,
            version,
            published_at: Utc::now(),
            archive_key: None,
        })
    }

    async fn load_published(
        &self,
        session_id: SessionId,
    ) -> Result<Option<CourseSession>, PublishError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable("memory store is offline".into()));
        }
        Ok(self
            .published
            .lock()
            .await
            .get(&session_id)
            .map(|(_, s)| s.clone()))
    }
}
