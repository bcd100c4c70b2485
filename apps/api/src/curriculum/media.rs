//! Media library collaborator: turns the media-library card a dropped card
//! points at into something the renderer can load.
//!
//! `AppState` holds an `Arc<dyn MediaLibrary>`. Production uses
//! `S3MediaLibrary` (short-lived presigned GET URLs); tests use
//! `StaticMediaLibrary`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;
use crate::models::ids::{CardId, MediaCardId};
use crate::models::session::{CardType, CourseSession};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Card types backed by a binary object in the media library. Everything
/// else is rendered from the card's inline `content`.
pub fn has_media_object(card_type: CardType) -> bool {
    matches!(
        card_type,
        CardType::Image | CardType::Video | CardType::Audio | CardType::Document
    )
}

fn mime_family(card_type: CardType) -> Option<&'static str> {
    match card_type {
        CardType::Image => Some("image/*"),
        CardType::Video => Some("video/*"),
        CardType::Audio => Some("audio/*"),
        CardType::Document => Some("application/pdf"),
        _ => None,
    }
}

#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// `Ok(None)` when the library has nothing to serve for this card.
    async fn resolve(
        &self,
        card_id: &MediaCardId,
        card_type: CardType,
    ) -> Result<Option<ResolvedMedia>, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// S3MediaLibrary
// ────────────────────────────────────────────────────────────────────────────

pub struct S3MediaLibrary {
    s3: aws_sdk_s3::Client,
    bucket: String,
    url_ttl: Duration,
}

impl S3MediaLibrary {
    pub fn new(s3: aws_sdk_s3::Client, bucket: impl Into<String>, url_ttl: Duration) -> Self {
        Self {
            s3,
            bucket: bucket.into(),
            url_ttl,
        }
    }

    pub fn object_key(card_id: &MediaCardId) -> String {
        format!("media/{}", card_id.0)
    }
}

#[async_trait]
impl MediaLibrary for S3MediaLibrary {
    async fn resolve(
        &self,
        card_id: &MediaCardId,
        card_type: CardType,
    ) -> Result<Option<ResolvedMedia>, AppError> {
        if !has_media_object(card_type) {
            return Ok(None);
        }

        let presigning = PresigningConfig::expires_in(self.url_ttl)
            .map_err(|e| AppError::S3(format!("invalid presigning config: {e}")))?;
        let request = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(Self::object_key(card_id))
            .presigned(presigning)
            .await
            .map_err(|e| AppError::S3(format!("presign failed for {}: {e}", card_id.0)))?;

        let expires_at = chrono::Duration::from_std(self.url_ttl)
            .ok()
            .map(|ttl| Utc::now() + ttl);

        Ok(Some(ResolvedMedia {
            url: request.uri().to_string(),
            mime_type: mime_family(card_type).map(str::to_string),
            expires_at,
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StaticMediaLibrary
// ────────────────────────────────────────────────────────────────────────────

/// Serves URLs under a fixed base. Used by tests and local development.
pub struct StaticMediaLibrary {
    base_url: String,
}

impl StaticMediaLibrary {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MediaLibrary for StaticMediaLibrary {
    async fn resolve(
        &self,
        card_id: &MediaCardId,
        card_type: CardType,
    ) -> Result<Option<ResolvedMedia>, AppError> {
        if !has_media_object(card_type) {
            return Ok(None);
        }
        Ok(Some(ResolvedMedia {
            url: format!("{}/{}", self.base_url.trim_end_matches('/'), card_id.0),
            mime_type: mime_family(card_type).map(str::to_string),
            expires_at: None,
        }))
    }
}

/// Resolves every media-backed card in the session, keyed by dropped-card id.
///
/// Each library card is resolved once even when dropped several times. A
/// failed lookup is logged and the card renders without media.
pub async fn resolve_session_media(
    library: &dyn MediaLibrary,
    session: &CourseSession,
) -> HashMap<CardId, ResolvedMedia> {
    let cards: Vec<_> = session
        .topics
        .iter()
        .flat_map(|t| &t.objectives)
        .flat_map(|o| &o.tasks)
        .flat_map(|t| &t.cards)
        .filter(|c| has_media_object(c.card_type))
        .collect();

    let mut by_library_id: HashMap<&MediaCardId, Option<ResolvedMedia>> = HashMap::new();
    for card in &cards {
        if by_library_id.contains_key(&card.card_id) {
            continue;
        }
        let resolved = match library.resolve(&card.card_id, card.card_type).await {
            Ok(media) => media,
            Err(e) => {
                warn!(card_id = %card.card_id.0, error = %e, "media lookup failed");
                None
            }
        };
        by_library_id.insert(&card.card_id, resolved);
    }

    cards
        .iter()
        .filter_map(|card| {
            by_library_id
                .get(&card.card_id)
                .cloned()
                .flatten()
                .map(|media| (card.id, media))
        })
        .collect()
}
