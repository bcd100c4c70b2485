//! Postgres row shapes for published sessions.
//!
//! A published session is stored normalized, one table per tree level, with a
//! `position` column carrying the sibling order. Enum columns are stored as
//! their snake_case wire names.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::curriculum::tree::normalize_order;
use crate::models::ids::MediaCardId;
use crate::models::session::{
    CanvasPage, CourseSession, DroppedCard, Objective, Position, Size, Task, Topic,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PublishedSessionRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub session_order: i32,
    pub title: String,
    pub template_type: String,
    pub duration_minutes: Option<i32>,
    pub metadata: Value,
    pub field_visibility: Value,
    pub block_visibility: Value,
    pub version: i32,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TopicRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub label: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ObjectiveRow {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub label: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub objective_id: Uuid,
    pub label: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CardRow {
    pub id: Uuid,
    pub task_id: Uuid,
    pub media_card_id: String,
    pub card_type: String,
    pub area: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub content: Value,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CanvasRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub page_number: i32,
    pub block_keys: Option<Value>,
}

/// Every row of one published session.
#[derive(Debug, Clone, Default)]
pub struct SessionRows {
    pub topics: Vec<TopicRow>,
    pub objectives: Vec<ObjectiveRow>,
    pub tasks: Vec<TaskRow>,
    pub cards: Vec<CardRow>,
    pub canvases: Vec<CanvasRow>,
}

fn wire_name<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

fn from_wire_name<T: DeserializeOwned>(name: &str) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::String(name.to_string()))
}

impl PublishedSessionRow {
    pub fn from_session(
        session: &CourseSession,
        version: i32,
        published_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: session.id.0,
            course_id: session.course_id.0,
            session_order: session.order as i32,
            title: session.title.clone(),
            template_type: wire_name(&session.template_type)?,
            duration_minutes: session.duration_minutes.map(|m| m as i32),
            metadata: serde_json::to_value(&session.metadata)?,
            field_visibility: serde_json::to_value(&session.field_visibility)?,
            block_visibility: serde_json::to_value(&session.block_visibility)?,
            version,
            published_at,
        })
    }
}

impl SessionRows {
    pub fn from_session(session: &CourseSession) -> Result<Self, serde_json::Error> {
        let mut rows = SessionRows::default();
        for topic in &session.topics {
            rows.topics.push(TopicRow {
                id: topic.id.0,
                session_id: session.id.0,
                label: topic.label.clone(),
                position: topic.order as i32,
            });
            for objective in &topic.objectives {
                rows.objectives.push(ObjectiveRow {
                    id: objective.id.0,
                    topic_id: topic.id.0,
                    label: objective.label.clone(),
                    position: objective.order as i32,
                });
                for task in &objective.tasks {
                    rows.tasks.push(TaskRow {
                        id: task.id.0,
                        objective_id: objective.id.0,
                        label: task.label.clone(),
                        position: task.order as i32,
                    });
                    for card in &task.cards {
                        rows.cards.push(CardRow {
                            id: card.id.0,
                            task_id: task.id.0,
                            media_card_id: card.card_id.0.clone(),
                            card_type: wire_name(&card.card_type)?,
                            area: wire_name(&card.area)?,
                            x: card.position.x,
                            y: card.position.y,
                            width: card.dimensions.width,
                            height: card.dimensions.height,
                            content: card.content.clone(),
                            position: card.order as i32,
                        });
                    }
                }
            }
        }
        for page in &session.canvases {
            rows.canvases.push(CanvasRow {
                id: page.id.0,
                session_id: session.id.0,
                page_number: page.page_number as i32,
                block_keys: page
                    .block_keys
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
            });
        }
        Ok(rows)
    }

    /// Rebuilds the session tree. Rows whose parent is missing are dropped.
    pub fn assemble(self, head: PublishedSessionRow) -> Result<CourseSession, serde_json::Error> {
        let mut session = CourseSession {
            id: head.id.into(),
            course_id: head.course_id.into(),
            order: head.session_order.max(0) as u32,
            title: head.title,
            template_type: from_wire_name(&head.template_type)?,
            canvases: Vec::new(),
            topics: Vec::new(),
            duration_minutes: head.duration_minutes.map(|m| m.max(0) as u32),
            metadata: serde_json::from_value(head.metadata)?,
            field_visibility: serde_json::from_value(head.field_visibility)?,
            block_visibility: serde_json::from_value(head.block_visibility)?,
        };

        let mut cards_by_task: HashMap<Uuid, Vec<DroppedCard>> = HashMap::new();
        for row in self.cards {
            cards_by_task.entry(row.task_id).or_default().push(DroppedCard {
                id: row.id.into(),
                card_id: MediaCardId(row.media_card_id),
                card_type: from_wire_name(&row.card_type)?,
                task_id: row.task_id.into(),
                area: from_wire_name(&row.area)?,
                position: Position { x: row.x, y: row.y },
                dimensions: Size {
                    width: row.width,
                    height: row.height,
                },
                content: row.content,
                order: row.position.max(0) as u32,
            });
        }

        let mut tasks_by_objective: HashMap<Uuid, Vec<Task>> = HashMap::new();
        for row in self.tasks {
            tasks_by_objective.entry(row.objective_id).or_default().push(Task {
                id: row.id.into(),
                objective_id: row.objective_id.into(),
                label: row.label,
                order: row.position.max(0) as u32,
                cards: cards_by_task.remove(&row.id).unwrap_or_default(),
            });
        }

        let mut objectives_by_topic: HashMap<Uuid, Vec<Objective>> = HashMap::new();
        for row in self.objectives {
            objectives_by_topic.entry(row.topic_id).or_default().push(Objective {
                id: row.id.into(),
                topic_id: row.topic_id.into(),
                label: row.label,
                order: row.position.max(0) as u32,
                tasks: tasks_by_objective.remove(&row.id).unwrap_or_default(),
            });
        }

        session.topics = self
            .topics
            .into_iter()
            .filter(|row| row.session_id == head.id)
            .map(|row| Topic {
                id: row.id.into(),
                session_id: row.session_id.into(),
                label: row.label,
                order: row.position.max(0) as u32,
                objectives: objectives_by_topic.remove(&row.id).unwrap_or_default(),
            })
            .collect();

        session.canvases = self
            .canvases
            .into_iter()
            .map(|row| {
                Ok(CanvasPage {
                    id: row.id.into(),
                    session_id: row.session_id.into(),
                    page_number: row.page_number.max(0) as u32,
                    block_keys: row.block_keys.map(serde_json::from_value).transpose()?,
                })
            })
            .collect::<Result<_, serde_json::Error>>()?;

        normalize_order(&mut session);
        Ok(session)
    }
}
