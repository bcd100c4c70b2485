//! Structural edits on the session tree.
//!
//! Every edit leaves sibling lists dense: topics, objectives, tasks and cards
//! are renumbered 0..n by list position, canvas pages 1..n. Callers bump the
//! session revision and invalidate the measurements named in `EditEffect`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::curriculum::templates::TemplateField;
use crate::layout::blocks::BlockKind;
use crate::layout::measurement::LayoutUnit;
use crate::models::ids::{CardId, MediaCardId, ObjectiveId, PageId, TaskId, TopicId};
use crate::models::session::{
    CanvasPage, CardType, CourseSession, DroppedCard, Objective, Position, SessionMetadata, Size,
    Task, TaskArea, Topic,
};

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("topic {0} not found")]
    TopicNotFound(TopicId),
    #[error("objective {0} not found")]
    ObjectiveNotFound(ObjectiveId),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("card {0} not found")]
    CardNotFound(CardId),
    #[error("page {0} not found")]
    PageNotFound(PageId),
    #[error("page {0} is laid out by pagination and cannot be removed")]
    PageNotFixed(PageId),
    #[error("a fixed page needs at least one block")]
    EmptyBlockKeys,
}

impl EditError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EditError::TopicNotFound(_)
                | EditError::ObjectiveNotFound(_)
                | EditError::TaskNotFound(_)
                | EditError::CardNotFound(_)
                | EditError::PageNotFound(_)
        )
    }
}

/// A card as dropped from the media library, before it gets an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCard {
    pub card_id: MediaCardId,
    pub card_type: CardType,
    pub area: TaskArea,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub dimensions: Size,
    #[serde(default)]
    pub content: Value,
}

/// One user edit. `at`/`to` are list positions; out-of-range values clamp to
/// the end of the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    AddTopic {
        label: String,
        #[serde(default)]
        at: Option<usize>,
    },
    RenameTopic {
        topic_id: TopicId,
        label: String,
    },
    RemoveTopic {
        topic_id: TopicId,
    },
    MoveTopic {
        topic_id: TopicId,
        to: usize,
    },
    AddObjective {
        topic_id: TopicId,
        label: String,
        #[serde(default)]
        at: Option<usize>,
    },
    RenameObjective {
        objective_id: ObjectiveId,
        label: String,
    },
    RemoveObjective {
        objective_id: ObjectiveId,
    },
    MoveObjective {
        objective_id: ObjectiveId,
        topic_id: TopicId,
        to: usize,
    },
    AddTask {
        objective_id: ObjectiveId,
        label: String,
        #[serde(default)]
        at: Option<usize>,
    },
    RenameTask {
        task_id: TaskId,
        label: String,
    },
    RemoveTask {
        task_id: TaskId,
    },
    MoveTask {
        task_id: TaskId,
        objective_id: ObjectiveId,
        to: usize,
    },
    AddCard {
        task_id: TaskId,
        card: NewCard,
        #[serde(default)]
        at: Option<usize>,
    },
    UpdateCard {
        card_id: CardId,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        dimensions: Option<Size>,
    },
    MoveCard {
        card_id: CardId,
        task_id: TaskId,
        area: TaskArea,
        to: usize,
    },
    RemoveCard {
        card_id: CardId,
    },
    SetTitle {
        title: String,
    },
    SetDuration {
        minutes: Option<u32>,
    },
    UpdateMetadata {
        metadata: SessionMetadata,
    },
    SetFieldVisibility {
        field: TemplateField,
        enabled: bool,
    },
    SetBlockVisibility {
        block: BlockKind,
        visible: bool,
    },
    AddFixedPage {
        block_keys: Vec<BlockKind>,
        #[serde(default)]
        at: Option<usize>,
    },
    RemovePage {
        page_id: PageId,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditEffect {
    /// Units whose measured height is no longer valid.
    pub touched: Vec<LayoutUnit>,
    /// Id of the entity an `Add*` edit created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<Uuid>,
    /// The body content changed and pages must be reflowed.
    pub reflow: bool,
}

impl EditEffect {
    fn body(touched: Vec<LayoutUnit>) -> Self {
        Self {
            touched,
            created: None,
            reflow: true,
        }
    }

    fn chrome() -> Self {
        Self::default()
    }

    fn with_created(mut self, id: Uuid) -> Self {
        self.created = Some(id);
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ordering
// ────────────────────────────────────────────────────────────────────────────

fn renumber<T>(items: &mut [T], mut set: impl FnMut(&mut T, u32)) {
    for (i, item) in items.iter_mut().enumerate() {
        set(item, i as u32);
    }
}

fn insert_clamped<T>(items: &mut Vec<T>, at: Option<usize>, item: T) {
    let at = at.unwrap_or(items.len()).min(items.len());
    items.insert(at, item);
}

fn renumber_tasks(tasks: &mut [Task]) {
    renumber(tasks, |t, i| t.order = i);
}

fn renumber_objectives(objectives: &mut [Objective]) {
    renumber(objectives, |o, i| o.order = i);
}

fn renumber_cards(cards: &mut [DroppedCard]) {
    renumber(cards, |c, i| c.order = i);
}

fn renumber_pages(pages: &mut [CanvasPage]) {
    renumber(pages, |p, i| p.page_number = i + 1);
}

/// Sorts every sibling list by its order field and renumbers it densely.
/// Applied to sessions loaded from storage, whose order columns may have gaps.
pub fn normalize_order(session: &mut CourseSession) {
    session.topics.sort_by_key(|t| t.order);
    renumber(&mut session.topics, |t, i| t.order = i);
    for topic in &mut session.topics {
        topic.objectives.sort_by_key(|o| o.order);
        renumber_objectives(&mut topic.objectives);
        for objective in &mut topic.objectives {
            objective.tasks.sort_by_key(|t| t.order);
            renumber_tasks(&mut objective.tasks);
            for task in &mut objective.tasks {
                task.cards.sort_by_key(|c| c.order);
                renumber_cards(&mut task.cards);
            }
        }
    }
    session.canvases.sort_by_key(|p| p.page_number);
    renumber_pages(&mut session.canvases);
}

// ────────────────────────────────────────────────────────────────────────────
// Lookup
// ────────────────────────────────────────────────────────────────────────────

fn topic_index(session: &CourseSession, id: TopicId) -> Result<usize, EditError> {
    session
        .topics
        .iter()
        .position(|t| t.id == id)
        .ok_or(EditError::TopicNotFound(id))
}

fn find_topic_mut(session: &mut CourseSession, id: TopicId) -> Result<&mut Topic, EditError> {
    session
        .topics
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(EditError::TopicNotFound(id))
}

fn find_objective_mut(
    session: &mut CourseSession,
    id: ObjectiveId,
) -> Result<&mut Objective, EditError> {
    session
        .topics
        .iter_mut()
        .flat_map(|t| t.objectives.iter_mut())
        .find(|o| o.id == id)
        .ok_or(EditError::ObjectiveNotFound(id))
}

fn find_task_mut(session: &mut CourseSession, id: TaskId) -> Result<&mut Task, EditError> {
    session
        .topics
        .iter_mut()
        .flat_map(|t| t.objectives.iter_mut())
        .flat_map(|o| o.tasks.iter_mut())
        .find(|t| t.id == id)
        .ok_or(EditError::TaskNotFound(id))
}

fn find_card_mut(session: &mut CourseSession, id: CardId) -> Result<&mut DroppedCard, EditError> {
    session
        .topics
        .iter_mut()
        .flat_map(|t| t.objectives.iter_mut())
        .flat_map(|o| o.tasks.iter_mut())
        .flat_map(|t| t.cards.iter_mut())
        .find(|c| c.id == id)
        .ok_or(EditError::CardNotFound(id))
}

fn topic_units(topic: &Topic) -> Vec<LayoutUnit> {
    std::iter::once(LayoutUnit::TopicHeader(topic.id))
        .chain(topic.objectives.iter().flat_map(objective_units))
        .collect()
}

fn objective_units(objective: &Objective) -> Vec<LayoutUnit> {
    std::iter::once(LayoutUnit::ObjectiveHeader(objective.id))
        .chain(objective.tasks.iter().map(|t| LayoutUnit::Task(t.id)))
        .collect()
}

/// Detaches an objective from whichever topic holds it.
fn take_objective(session: &mut CourseSession, id: ObjectiveId) -> Result<Objective, EditError> {
    for topic in &mut session.topics {
        if let Some(pos) = topic.objectives.iter().position(|o| o.id == id) {
            let objective = topic.objectives.remove(pos);
            renumber_objectives(&mut topic.objectives);
            return Ok(objective);
        }
    }
    Err(EditError::ObjectiveNotFound(id))
}

fn take_task(session: &mut CourseSession, id: TaskId) -> Result<Task, EditError> {
    for objective in session.topics.iter_mut().flat_map(|t| t.objectives.iter_mut()) {
        if let Some(pos) = objective.tasks.iter().position(|t| t.id == id) {
            let task = objective.tasks.remove(pos);
            renumber_tasks(&mut objective.tasks);
            return Ok(task);
        }
    }
    Err(EditError::TaskNotFound(id))
}

/// Returns the removed card and the task it was in.
fn take_card(session: &mut CourseSession, id: CardId) -> Result<(DroppedCard, TaskId), EditError> {
    for task in session
        .topics
        .iter_mut()
        .flat_map(|t| t.objectives.iter_mut())
        .flat_map(|o| o.tasks.iter_mut())
    {
        if let Some(pos) = task.cards.iter().position(|c| c.id == id) {
            let card = task.cards.remove(pos);
            renumber_cards(&mut task.cards);
            return Ok((card, task.id));
        }
    }
    Err(EditError::CardNotFound(id))
}

// ────────────────────────────────────────────────────────────────────────────
// Apply
// ────────────────────────────────────────────────────────────────────────────

/// Applies one edit. On error the session is left unchanged.
pub fn apply_edit(session: &mut CourseSession, edit: Edit) -> Result<EditEffect, EditError> {
    match edit {
        Edit::AddTopic { label, at } => {
            let topic = Topic::new(session.id, label);
            let id = topic.id;
            insert_clamped(&mut session.topics, at, topic);
            renumber(&mut session.topics, |t, i| t.order = i);
            Ok(EditEffect::body(vec![LayoutUnit::TopicHeader(id)]).with_created(id.0))
        }
        Edit::RenameTopic { topic_id, label } => {
            find_topic_mut(session, topic_id)?.label = label;
            Ok(EditEffect::body(vec![LayoutUnit::TopicHeader(topic_id)]))
        }
        Edit::RemoveTopic { topic_id } => {
            let pos = topic_index(session, topic_id)?;
            let topic = session.topics.remove(pos);
            renumber(&mut session.topics, |t, i| t.order = i);
            Ok(EditEffect::body(topic_units(&topic)))
        }
        Edit::MoveTopic { topic_id, to } => {
            let pos = topic_index(session, topic_id)?;
            let topic = session.topics.remove(pos);
            insert_clamped(&mut session.topics, Some(to), topic);
            renumber(&mut session.topics, |t, i| t.order = i);
            Ok(EditEffect::body(Vec::new()))
        }

        Edit::AddObjective { topic_id, label, at } => {
            let topic = find_topic_mut(session, topic_id)?;
            let objective = Objective::new(topic_id, label);
            let id = objective.id;
            insert_clamped(&mut topic.objectives, at, objective);
            renumber_objectives(&mut topic.objectives);
            Ok(EditEffect::body(vec![LayoutUnit::ObjectiveHeader(id)]).with_created(id.0))
        }
        Edit::RenameObjective { objective_id, label } => {
            find_objective_mut(session, objective_id)?.label = label;
            Ok(EditEffect::body(vec![LayoutUnit::ObjectiveHeader(objective_id)]))
        }
        Edit::RemoveObjective { objective_id } => {
            let objective = take_objective(session, objective_id)?;
            Ok(EditEffect::body(objective_units(&objective)))
        }
        Edit::MoveObjective {
            objective_id,
            topic_id,
            to,
        } => {
            // Validate the target first so a failed move changes nothing.
            topic_index(session, topic_id)?;
            let mut objective = take_objective(session, objective_id)?;
            objective.topic_id = topic_id;
            let topic = find_topic_mut(session, topic_id)?;
            insert_clamped(&mut topic.objectives, Some(to), objective);
            renumber_objectives(&mut topic.objectives);
            Ok(EditEffect::body(Vec::new()))
        }

        Edit::AddTask {
            objective_id,
            label,
            at,
        } => {
            let objective = find_objective_mut(session, objective_id)?;
            let task = Task::new(objective_id, label);
            let id = task.id;
            insert_clamped(&mut objective.tasks, at, task);
            renumber_tasks(&mut objective.tasks);
            Ok(EditEffect::body(vec![LayoutUnit::Task(id)]).with_created(id.0))
        }
        Edit::RenameTask { task_id, label } => {
            find_task_mut(session, task_id)?.label = label;
            Ok(EditEffect::body(vec![LayoutUnit::Task(task_id)]))
        }
        Edit::RemoveTask { task_id } => {
            take_task(session, task_id)?;
            Ok(EditEffect::body(vec![LayoutUnit::Task(task_id)]))
        }
        Edit::MoveTask {
            task_id,
            objective_id,
            to,
        } => {
            find_objective_mut(session, objective_id)?;
            let mut task = take_task(session, task_id)?;
            task.objective_id = objective_id;
            let objective = find_objective_mut(session, objective_id)?;
            insert_clamped(&mut objective.tasks, Some(to), task);
            renumber_tasks(&mut objective.tasks);
            Ok(EditEffect::body(Vec::new()))
        }

        Edit::AddCard { task_id, card, at } => {
            let task = find_task_mut(session, task_id)?;
            let dropped = DroppedCard {
                id: CardId::new(),
                card_id: card.card_id,
                card_type: card.card_type,
                task_id,
                area: card.area,
                position: card.position,
                dimensions: card.dimensions,
                content: card.content,
                order: 0,
            };
            let id = dropped.id;
            insert_clamped(&mut task.cards, at, dropped);
            renumber_cards(&mut task.cards);
            Ok(EditEffect::body(vec![LayoutUnit::Task(task_id)]).with_created(id.0))
        }
        Edit::UpdateCard {
            card_id,
            content,
            position,
            dimensions,
        } => {
            let card = find_card_mut(session, card_id)?;
            if let Some(content) = content {
                card.content = content;
            }
            if let Some(position) = position {
                card.position = position;
            }
            if let Some(dimensions) = dimensions {
                card.dimensions = dimensions;
            }
            let task_id = card.task_id;
            Ok(EditEffect::body(vec![LayoutUnit::Task(task_id)]))
        }
        Edit::MoveCard {
            card_id,
            task_id,
            area,
            to,
        } => {
            find_task_mut(session, task_id)?;
            let (mut card, from_task) = take_card(session, card_id)?;
            card.task_id = task_id;
            card.area = area;
            let task = find_task_mut(session, task_id)?;
            insert_clamped(&mut task.cards, Some(to), card);
            renumber_cards(&mut task.cards);
            let mut touched = vec![LayoutUnit::Task(task_id)];
            if from_task != task_id {
                touched.push(LayoutUnit::Task(from_task));
            }
            Ok(EditEffect::body(touched))
        }
        Edit::RemoveCard { card_id } => {
            let (_, task_id) = take_card(session, card_id)?;
            Ok(EditEffect::body(vec![LayoutUnit::Task(task_id)]))
        }

        Edit::SetTitle { title } => {
            session.title = title;
            Ok(EditEffect::chrome())
        }
        Edit::SetDuration { minutes } => {
            session.duration_minutes = minutes;
            Ok(EditEffect::chrome())
        }
        Edit::UpdateMetadata { metadata } => {
            session.metadata = metadata;
            Ok(EditEffect::chrome())
        }
        Edit::SetFieldVisibility { field, enabled } => {
            session.field_visibility.insert(field, enabled);
            Ok(EditEffect::chrome())
        }
        Edit::SetBlockVisibility { block, visible } => {
            session.block_visibility.insert(block, visible);
            Ok(EditEffect::chrome())
        }

        Edit::AddFixedPage { block_keys, at } => {
            if block_keys.is_empty() {
                return Err(EditError::EmptyBlockKeys);
            }
            session.canvases.sort_by_key(|p| p.page_number);
            let page = CanvasPage::fixed(session.id, 0, block_keys);
            let id = page.id;
            insert_clamped(&mut session.canvases, at, page);
            renumber_pages(&mut session.canvases);
            Ok(EditEffect::chrome().with_created(id.0))
        }
        Edit::RemovePage { page_id } => {
            let pos = session
                .canvases
                .iter()
                .position(|p| p.id == page_id)
                .ok_or(EditError::PageNotFound(page_id))?;
            if !session.canvases[pos].is_fixed() {
                return Err(EditError::PageNotFixed(page_id));
            }
            session.canvases.remove(pos);
            session.canvases.sort_by_key(|p| p.page_number);
            renumber_pages(&mut session.canvases);
            Ok(EditEffect::chrome())
        }
    }
}
