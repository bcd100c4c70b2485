//! In-memory course session tree: session → topics → objectives → tasks → cards,
//! plus the canvas pages the layout engine derives from it.
//!
//! Sibling lists are ordered by their explicit `order` / `page_number` field;
//! `curriculum::tree` keeps those dense after every structural edit.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::curriculum::templates::{TemplateField, TemplateType};
use crate::layout::blocks::BlockKind;
use crate::models::ids::{
    CardId, CourseId, MediaCardId, ObjectiveId, PageId, SessionId, TaskId, TopicId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSession {
    pub id: SessionId,
    pub course_id: CourseId,
    /// Position of this session within its course.
    pub order: u32,
    pub title: String,
    pub template_type: TemplateType,
    #[serde(default)]
    pub canvases: Vec<CanvasPage>,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub metadata: SessionMetadata,
    /// Per-field overrides of the template's header/footer field defaults.
    #[serde(default)]
    pub field_visibility: BTreeMap<TemplateField, bool>,
    /// Per-block overrides of the template's default-visible flags.
    #[serde(default)]
    pub block_visibility: BTreeMap<BlockKind, bool>,
}

impl CourseSession {
    pub fn new(course_id: CourseId, title: impl Into<String>, template_type: TemplateType) -> Self {
        Self {
            id: SessionId::new(),
            course_id,
            order: 0,
            title: title.into(),
            template_type,
            canvases: Vec::new(),
            topics: Vec::new(),
            duration_minutes: None,
            metadata: SessionMetadata::default(),
            field_visibility: BTreeMap::new(),
            block_visibility: BTreeMap::new(),
        }
    }

    pub fn task_count(&self) -> usize {
        self.topics
            .iter()
            .flat_map(|t| &t.objectives)
            .map(|o| o.tasks.len())
            .sum()
    }
}

/// Denormalized display values shown in page headers and footers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub course_title: Option<String>,
    pub institution: Option<String>,
    pub module: Option<String>,
    pub pedagogy: Option<String>,
    pub date: Option<NaiveDate>,
    pub teacher_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub session_id: SessionId,
    pub label: String,
    pub order: u32,
    #[serde(default)]
    pub objectives: Vec<Objective>,
}

impl Topic {
    pub fn new(session_id: SessionId, label: impl Into<String>) -> Self {
        Self {
            id: TopicId::new(),
            session_id,
            label: label.into(),
            order: 0,
            objectives: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: ObjectiveId,
    pub topic_id: TopicId,
    pub label: String,
    pub order: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Objective {
    pub fn new(topic_id: TopicId, label: impl Into<String>) -> Self {
        Self {
            id: ObjectiveId::new(),
            topic_id,
            label: label.into(),
            order: 0,
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub objective_id: ObjectiveId,
    pub label: String,
    pub order: u32,
    #[serde(default)]
    pub cards: Vec<DroppedCard>,
}

impl Task {
    pub fn new(objective_id: ObjectiveId, label: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            objective_id,
            label: label.into(),
            order: 0,
            cards: Vec::new(),
        }
    }
}

/// Which area of a task a card was dropped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskArea {
    Instruction,
    Student,
    Teacher,
}

/// Media-library card types that can be dropped into a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Text,
    Image,
    Video,
    Audio,
    Link,
    Document,
    Quiz,
    Table,
    Code,
    Chart,
    Diagram,
    Map,
    Whiteboard,
}

/// Where the browser draws a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderTarget {
    Dom,
    Graphics,
}

impl CardType {
    /// Charts, diagrams, maps and whiteboards need the graphics canvas;
    /// everything else is plain DOM.
    pub fn render_target(self) -> RenderTarget {
        match self {
            CardType::Chart | CardType::Diagram | CardType::Map | CardType::Whiteboard => {
                RenderTarget::Graphics
            }
            CardType::Text
            | CardType::Image
            | CardType::Video
            | CardType::Audio
            | CardType::Link
            | CardType::Document
            | CardType::Quiz
            | CardType::Table
            | CardType::Code => RenderTarget::Dom,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedCard {
    pub id: CardId,
    pub card_id: MediaCardId,
    pub card_type: CardType,
    pub task_id: TaskId,
    pub area: TaskArea,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub dimensions: Size,
    #[serde(default)]
    pub content: Value,
    pub order: u32,
}

/// A fixed-size page of the rendered lesson document.
///
/// The measured content height is deliberately not a field here; it lives in
/// `layout::measurement::MeasurementTable`, keyed by `id`, and is never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasPage {
    pub id: PageId,
    pub session_id: SessionId,
    pub page_number: u32,
    /// Explicit blocks to render. `None` means every enabled template block,
    /// in template order, with the body reflowed by the pagination engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_keys: Option<Vec<BlockKind>>,
}

impl CanvasPage {
    pub fn flow(session_id: SessionId, page_number: u32) -> Self {
        Self {
            id: PageId::new(),
            session_id,
            page_number,
            block_keys: None,
        }
    }

    pub fn fixed(session_id: SessionId, page_number: u32, block_keys: Vec<BlockKind>) -> Self {
        Self {
            id: PageId::new(),
            session_id,
            page_number,
            block_keys: Some(block_keys),
        }
    }

    /// Fixed pages are exempt from engine-driven reflow.
    pub fn is_fixed(&self) -> bool {
        self.block_keys.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphics_card_types() {
        assert_eq!(CardType::Chart.render_target(), RenderTarget::Graphics);
        assert_eq!(CardType::Whiteboard.render_target(), RenderTarget::Graphics);
        assert_eq!(CardType::Text.render_target(), RenderTarget::Dom);
        assert_eq!(CardType::Video.render_target(), RenderTarget::Dom);
    }

    #[test]
    fn test_flow_page_omits_block_keys_on_the_wire() {
        let page = CanvasPage::flow(SessionId::new(), 1);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("block_keys").is_none());
        assert!(!page.is_fixed());
    }

    #[test]
    fn test_fixed_page_keeps_block_keys() {
        let page = CanvasPage::fixed(
            SessionId::new(),
            1,
            vec![BlockKind::Header, BlockKind::Content],
        );
        assert!(page.is_fixed());
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["block_keys"], serde_json::json!(["header", "content"]));
    }

    #[test]
    fn test_session_deserializes_with_missing_optional_collections() {
        let json = serde_json::json!({
            "id": SessionId::new(),
            "course_id": CourseId::new(),
            "order": 2,
            "title": "Cells",
            "template_type": "lesson",
        });
        let session: CourseSession = serde_json::from_value(json).unwrap();
        assert!(session.topics.is_empty());
        assert!(session.canvases.is_empty());
        assert_eq!(session.task_count(), 0);
    }
}
