//! Block registry: the finite set of page regions and their renderers.
//!
//! Dispatch is an exhaustive `match` on `BlockKind`, so adding a block kind
//! fails to compile until it has a renderer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::curriculum::media::ResolvedMedia;
use crate::curriculum::templates::{FieldPlacement, FieldState, TemplateDefinition, TemplateField};
use crate::layout::measurement::LayoutUnit;
use crate::layout::projection::ContentIndex;
use crate::models::ids::{CardId, MediaCardId, ObjectiveId, TaskId, TopicId};
use crate::models::session::{
    CardType, CourseSession, DroppedCard, Position, RenderTarget, Size, TaskArea,
};
use crate::text::normalize::{normalize_str, PlaceholderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Header,
    Footer,
    Program,
    Resources,
    Content,
    Assignment,
    Scoring,
    Project,
}

impl BlockKind {
    /// Blocks drawn inside the body area next to the content. Header and
    /// footer sit in the margins; content and project carry the units.
    pub fn reserves_body_space(self) -> bool {
        matches!(
            self,
            BlockKind::Program | BlockKind::Resources | BlockKind::Assignment | BlockKind::Scoring
        )
    }

    /// Overview blocks shown once, on the first reflowed page.
    pub fn is_first_page_only(self) -> bool {
        matches!(self, BlockKind::Program | BlockKind::Resources)
    }
}

/// Everything a block renderer may read for one page.
pub struct BlockContext<'a> {
    pub session: &'a CourseSession,
    pub definition: &'a TemplateDefinition,
    pub index: &'a ContentIndex<'a>,
    pub fields: &'a [FieldState],
    /// Body units placed on this page, in document order.
    pub units: &'a [LayoutUnit],
    pub page_number: u32,
    pub page_count: u32,
    pub media: &'a HashMap<CardId, ResolvedMedia>,
}

// ────────────────────────────────────────────────────────────────────────────
// Rendered payloads
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldView {
    pub field: TemplateField,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    pub id: CardId,
    pub card_id: MediaCardId,
    pub card_type: CardType,
    pub area: TaskArea,
    pub render_target: RenderTarget,
    pub position: Position,
    pub dimensions: Size,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<ResolvedMedia>,
}

impl CardView {
    fn new(card: &DroppedCard, media: &HashMap<CardId, ResolvedMedia>) -> Self {
        Self {
            id: card.id,
            card_id: card.card_id.clone(),
            card_type: card.card_type,
            area: card.area,
            render_target: card.card_type.render_target(),
            position: card.position,
            dimensions: card.dimensions,
            content: card.content.clone(),
            media: media.get(&card.id).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyUnit {
    TopicHeader {
        topic_id: TopicId,
        title: String,
    },
    ObjectiveHeader {
        objective_id: ObjectiveId,
        title: String,
    },
    Task {
        task_id: TaskId,
        title: String,
        cards: Vec<CardView>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramTopic {
    pub topic_id: TopicId,
    pub title: String,
    pub objectives: Vec<String>,
    pub task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentTask {
    pub task_id: TaskId,
    pub title: String,
    pub cards: Vec<CardView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRow {
    pub objective_id: ObjectiveId,
    pub title: String,
    pub max_points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMilestone {
    pub topic_id: TopicId,
    pub title: String,
    pub task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum RenderedBlock {
    Header {
        fields: Vec<FieldView>,
    },
    Footer {
        fields: Vec<FieldView>,
    },
    Program {
        topics: Vec<ProgramTopic>,
    },
    Resources {
        cards: Vec<CardView>,
    },
    Content {
        units: Vec<BodyUnit>,
    },
    Assignment {
        tasks: Vec<AssignmentTask>,
    },
    Scoring {
        rows: Vec<ScoringRow>,
        total_points: u32,
    },
    Project {
        title: String,
        milestones: Vec<ProjectMilestone>,
    },
}

impl RenderedBlock {
    pub fn kind(&self) -> BlockKind {
        match self {
            RenderedBlock::Header { .. } => BlockKind::Header,
            RenderedBlock::Footer { .. } => BlockKind::Footer,
            RenderedBlock::Program { .. } => BlockKind::Program,
            RenderedBlock::Resources { .. } => BlockKind::Resources,
            RenderedBlock::Content { .. } => BlockKind::Content,
            RenderedBlock::Assignment { .. } => BlockKind::Assignment,
            RenderedBlock::Scoring { .. } => BlockKind::Scoring,
            RenderedBlock::Project { .. } => BlockKind::Project,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dispatch
// ────────────────────────────────────────────────────────────────────────────

pub fn render_block(kind: BlockKind, ctx: &BlockContext<'_>) -> RenderedBlock {
    match kind {
        BlockKind::Header => RenderedBlock::Header {
            fields: placed_fields(ctx, FieldPlacement::Header),
        },
        BlockKind::Footer => RenderedBlock::Footer {
            fields: placed_fields(ctx, FieldPlacement::Footer),
        },
        BlockKind::Program => render_program(ctx),
        BlockKind::Resources => render_resources(ctx),
        BlockKind::Content => render_content(ctx),
        BlockKind::Assignment => render_assignment(ctx),
        BlockKind::Scoring => render_scoring(ctx),
        BlockKind::Project => render_project(ctx),
    }
}

fn placed_fields(ctx: &BlockContext<'_>, placement: FieldPlacement) -> Vec<FieldView> {
    ctx.fields
        .iter()
        .filter(|f| f.enabled && f.placement == placement)
        .map(|f| FieldView {
            field: f.field,
            value: if f.field == TemplateField::PageNumber {
                format!("{} / {}", ctx.page_number, ctx.page_count)
            } else {
                f.value.clone()
            },
        })
        .collect()
}

fn render_program(ctx: &BlockContext<'_>) -> RenderedBlock {
    let topics = ctx
        .session
        .topics
        .iter()
        .map(|topic| ProgramTopic {
            topic_id: topic.id,
            title: normalize_str(&topic.label, PlaceholderKind::Topic),
            objectives: topic
                .objectives
                .iter()
                .map(|o| normalize_str(&o.label, PlaceholderKind::Objective))
                .filter(|s| !s.is_empty())
                .collect(),
            task_count: topic.objectives.iter().map(|o| o.tasks.len()).sum(),
        })
        .collect();
    RenderedBlock::Program { topics }
}

/// Every distinct media card used anywhere in the session, first use first.
fn render_resources(ctx: &BlockContext<'_>) -> RenderedBlock {
    let mut seen: Vec<&MediaCardId> = Vec::new();
    let mut cards = Vec::new();
    for card in ctx
        .session
        .topics
        .iter()
        .flat_map(|t| &t.objectives)
        .flat_map(|o| &o.tasks)
        .flat_map(|t| &t.cards)
    {
        if !seen.contains(&&card.card_id) {
            seen.push(&card.card_id);
            cards.push(CardView::new(card, ctx.media));
        }
    }
    RenderedBlock::Resources { cards }
}

fn render_content(ctx: &BlockContext<'_>) -> RenderedBlock {
    let units = ctx
        .units
        .iter()
        .filter_map(|unit| match *unit {
            LayoutUnit::TopicHeader(id) => ctx.index.topic(id).map(|t| BodyUnit::TopicHeader {
                topic_id: id,
                title: normalize_str(&t.label, PlaceholderKind::Topic),
            }),
            LayoutUnit::ObjectiveHeader(id) => {
                ctx.index.objective(id).map(|o| BodyUnit::ObjectiveHeader {
                    objective_id: id,
                    title: normalize_str(&o.label, PlaceholderKind::Objective),
                })
            }
            LayoutUnit::Task(id) => ctx.index.task(id).map(|t| BodyUnit::Task {
                task_id: id,
                title: normalize_str(&t.label, PlaceholderKind::Task),
                cards: t.cards.iter().map(|c| CardView::new(c, ctx.media)).collect(),
            }),
        })
        .collect();
    RenderedBlock::Content { units }
}

fn render_assignment(ctx: &BlockContext<'_>) -> RenderedBlock {
    let tasks = ctx
        .units
        .iter()
        .filter_map(|unit| match *unit {
            LayoutUnit::Task(id) => ctx.index.task(id),
            _ => None,
        })
        .map(|task| AssignmentTask {
            task_id: task.id,
            title: normalize_str(&task.label, PlaceholderKind::Task),
            cards: task
                .cards
                .iter()
                .filter(|c| c.area == TaskArea::Student)
                .map(|c| CardView::new(c, ctx.media))
                .collect(),
        })
        .collect();
    RenderedBlock::Assignment { tasks }
}

fn render_scoring(ctx: &BlockContext<'_>) -> RenderedBlock {
    let points = ctx
        .definition
        .block(BlockKind::Scoring)
        .and_then(|b| b.config.as_ref())
        .and_then(|c| c.get("points_per_objective"))
        .and_then(Value::as_u64)
        .map_or(1, |p| p as u32);

    let mut objective_ids: Vec<ObjectiveId> = Vec::new();
    for unit in ctx.units {
        if let Some(id) = ctx.index.objective_of(unit) {
            if !objective_ids.contains(&id) {
                objective_ids.push(id);
            }
        }
    }

    let rows: Vec<ScoringRow> = objective_ids
        .into_iter()
        .filter_map(|id| ctx.index.objective(id))
        .map(|o| ScoringRow {
            objective_id: o.id,
            title: normalize_str(&o.label, PlaceholderKind::Objective),
            max_points: points,
        })
        .collect();
    let total_points = rows.iter().map(|r| r.max_points).sum();
    RenderedBlock::Scoring { rows, total_points }
}

fn render_project(ctx: &BlockContext<'_>) -> RenderedBlock {
    let mut topic_ids: Vec<TopicId> = Vec::new();
    for unit in ctx.units {
        if let Some(id) = ctx.index.topic_of(unit) {
            if !topic_ids.contains(&id) {
                topic_ids.push(id);
            }
        }
    }
    let milestones = topic_ids
        .into_iter()
        .filter_map(|id| ctx.index.topic(id))
        .map(|t| ProjectMilestone {
            topic_id: t.id,
            title: normalize_str(&t.label, PlaceholderKind::Topic),
            task_count: t.objectives.iter().map(|o| o.tasks.len()).sum(),
        })
        .collect();
    RenderedBlock::Project {
        title: normalize_str(&ctx.session.title, PlaceholderKind::Title),
        milestones,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::templates::{resolve_field_state, template_definition, TemplateType};
    use crate::models::ids::CourseId;
    use crate::models::session::{Objective, Task, Topic};
    use serde_json::json;

    fn card(task_id: TaskId, media: &str, area: TaskArea) -> DroppedCard {
        DroppedCard {
            id: CardId::new(),
            card_id: MediaCardId(media.to_string()),
            card_type: CardType::Image,
            task_id,
            area,
            position: Position::default(),
            dimensions: Size {
                width: 200.0,
                height: 120.0,
            },
            content: json!({}),
            order: 0,
        }
    }

    fn session() -> CourseSession {
        let mut s = CourseSession::new(CourseId::new(), "Plants", TemplateType::Exam);
        let mut topic = Topic::new(s.id, "Photosynthesis");
        let mut o1 = Objective::new(topic.id, "Explain light reactions");
        let mut o2 = Objective::new(topic.id, "Objective 2");
        let mut t1 = Task::new(o1.id, "Label the chloroplast");
        t1.cards.push(card(t1.id, "img-1", TaskArea::Instruction));
        t1.cards.push(card(t1.id, "img-2", TaskArea::Student));
        let mut t2 = Task::new(o2.id, "Task");
        t2.cards.push(card(t2.id, "img-1", TaskArea::Student));
        o1.tasks.push(t1);
        o2.tasks.push(t2);
        topic.objectives.push(o1);
        topic.objectives.push(o2);
        s.topics.push(topic);
        s
    }

    fn with_ctx<R>(s: &CourseSession, units: &[LayoutUnit], f: impl FnOnce(&BlockContext<'_>) -> R) -> R {
        let definition = template_definition(s.template_type);
        let index = ContentIndex::build(s);
        let fields = resolve_field_state(s);
        let media = HashMap::new();
        let ctx = BlockContext {
            session: s,
            definition: &definition,
            index: &index,
            fields: &fields,
            units,
            page_number: 2,
            page_count: 3,
            media: &media,
        };
        f(&ctx)
    }

    fn all_units(s: &CourseSession) -> Vec<LayoutUnit> {
        let topic = &s.topics[0];
        vec![
            LayoutUnit::TopicHeader(topic.id),
            LayoutUnit::ObjectiveHeader(topic.objectives[0].id),
            LayoutUnit::Task(topic.objectives[0].tasks[0].id),
            LayoutUnit::ObjectiveHeader(topic.objectives[1].id),
            LayoutUnit::Task(topic.objectives[1].tasks[0].id),
        ]
    }

    #[test]
    fn test_render_kind_matches_requested_kind() {
        let s = session();
        let units = all_units(&s);
        for kind in [
            BlockKind::Header,
            BlockKind::Footer,
            BlockKind::Program,
            BlockKind::Resources,
            BlockKind::Content,
            BlockKind::Assignment,
            BlockKind::Scoring,
            BlockKind::Project,
        ] {
            let block = with_ctx(&s, &units, |ctx| render_block(kind, ctx));
            assert_eq!(block.kind(), kind);
        }
    }

    #[test]
    fn test_content_titles_are_normalized() {
        let s = session();
        let units = all_units(&s);
        let block = with_ctx(&s, &units, |ctx| render_block(BlockKind::Content, ctx));
        let RenderedBlock::Content { units } = block else {
            panic!("expected content block");
        };
        assert_eq!(units.len(), 5);
        match &units[3] {
            BodyUnit::ObjectiveHeader { title, .. } => assert_eq!(title, ""),
            other => panic!("unexpected unit {other:?}"),
        }
        match &units[2] {
            BodyUnit::Task { title, cards, .. } => {
                assert_eq!(title, "Label the chloroplast");
                assert_eq!(cards.len(), 2);
            }
            other => panic!("unexpected unit {other:?}"),
        }
    }

    #[test]
    fn test_footer_page_number_is_filled_per_page() {
        let s = session();
        let block = with_ctx(&s, &[], |ctx| render_block(BlockKind::Footer, ctx));
        let RenderedBlock::Footer { fields } = block else {
            panic!("expected footer");
        };
        let page = fields
            .iter()
            .find(|f| f.field == TemplateField::PageNumber)
            .unwrap();
        assert_eq!(page.value, "2 / 3");
    }

    #[test]
    fn test_resources_deduplicate_media_cards() {
        let s = session();
        let block = with_ctx(&s, &[], |ctx| render_block(BlockKind::Resources, ctx));
        let RenderedBlock::Resources { cards } = block else {
            panic!("expected resources");
        };
        let ids: Vec<_> = cards.iter().map(|c| c.card_id.0.as_str()).collect();
        assert_eq!(ids, vec!["img-1", "img-2"]);
    }

    #[test]
    fn test_assignment_only_lists_student_cards() {
        let s = session();
        let units = all_units(&s);
        let block = with_ctx(&s, &units, |ctx| render_block(BlockKind::Assignment, ctx));
        let RenderedBlock::Assignment { tasks } = block else {
            panic!("expected assignment");
        };
        assert_eq!(tasks.len(), 2);
        assert!(tasks
            .iter()
            .flat_map(|t| &t.cards)
            .all(|c| c.area == TaskArea::Student));
    }

    #[test]
    fn test_scoring_uses_template_points_and_page_objectives() {
        let s = session();
        // Only the second objective's task is on this page.
        let units = vec![LayoutUnit::Task(s.topics[0].objectives[1].tasks[0].id)];
        let block = with_ctx(&s, &units, |ctx| render_block(BlockKind::Scoring, ctx));
        let RenderedBlock::Scoring { rows, total_points } = block else {
            panic!("expected scoring");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].objective_id, s.topics[0].objectives[1].id);
        assert_eq!(rows[0].max_points, 5);
        assert_eq!(total_points, 5);
    }

    #[test]
    fn test_block_kind_classification() {
        assert!(BlockKind::Program.reserves_body_space());
        assert!(BlockKind::Scoring.reserves_body_space());
        assert!(!BlockKind::Content.reserves_body_space());
        assert!(!BlockKind::Header.reserves_body_space());
        assert!(BlockKind::Program.is_first_page_only());
        assert!(!BlockKind::Footer.is_first_page_only());
    }
}
