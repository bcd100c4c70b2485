//! Projects the canvas list of a session into a render plan: per page, the
//! concrete block keys, rendered field values, and the body units assigned
//! to it by the last pagination pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::curriculum::media::ResolvedMedia;
use crate::curriculum::templates::{
    resolve_enabled_blocks, resolve_field_state, TemplateDefinition,
};
use crate::layout::blocks::{render_block, BlockContext, BlockKind, RenderedBlock};
use crate::layout::measurement::LayoutUnit;
use crate::layout::pagination::{document_units, PageAssignment};
use crate::models::ids::{CardId, ObjectiveId, PageId, TaskId, TopicId};
use crate::models::session::{CourseSession, Objective, Task, Topic};

/// Id lookups into one session tree.
pub struct ContentIndex<'a> {
    topics: HashMap<TopicId, &'a Topic>,
    objectives: HashMap<ObjectiveId, &'a Objective>,
    tasks: HashMap<TaskId, &'a Task>,
}

impl<'a> ContentIndex<'a> {
    pub fn build(session: &'a CourseSession) -> Self {
        let mut topics = HashMap::new();
        let mut objectives = HashMap::new();
        let mut tasks = HashMap::new();
        for topic in &session.topics {
            topics.insert(topic.id, topic);
            for objective in &topic.objectives {
                objectives.insert(objective.id, objective);
                for task in &objective.tasks {
                    tasks.insert(task.id, task);
                }
            }
        }
        Self {
            topics,
            objectives,
            tasks,
        }
    }

    pub fn topic(&self, id: TopicId) -> Option<&'a Topic> {
        self.topics.get(&id).copied()
    }

    pub fn objective(&self, id: ObjectiveId) -> Option<&'a Objective> {
        self.objectives.get(&id).copied()
    }

    pub fn task(&self, id: TaskId) -> Option<&'a Task> {
        self.tasks.get(&id).copied()
    }

    /// The objective a unit belongs to. Topic headings have none.
    pub fn objective_of(&self, unit: &LayoutUnit) -> Option<ObjectiveId> {
        match *unit {
            LayoutUnit::TopicHeader(_) => None,
            LayoutUnit::ObjectiveHeader(id) => self.objective(id).map(|o| o.id),
            LayoutUnit::Task(id) => self.task(id).map(|t| t.objective_id),
        }
    }

    pub fn topic_of(&self, unit: &LayoutUnit) -> Option<TopicId> {
        match *unit {
            LayoutUnit::TopicHeader(id) => self.topic(id).map(|t| t.id),
            LayoutUnit::ObjectiveHeader(_) | LayoutUnit::Task(_) => self
                .objective_of(unit)
                .and_then(|id| self.objective(id))
                .map(|o| o.topic_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub page_id: PageId,
    pub page_number: u32,
    pub fixed: bool,
    pub block_keys: Vec<BlockKind>,
    /// Units the renderer should measure on this page.
    pub units: Vec<LayoutUnit>,
    pub blocks: Vec<RenderedBlock>,
}

/// Builds the render plan for every canvas page, in page order.
///
/// Fixed pages render exactly their explicit block keys and show the whole
/// session body. Flow pages render the enabled template blocks in template
/// order; program and resources appear on the first flow page only.
pub fn project_pages(
    session: &CourseSession,
    definition: &TemplateDefinition,
    assignment: &PageAssignment,
    media: &HashMap<CardId, ResolvedMedia>,
) -> Vec<RenderedPage> {
    let index = ContentIndex::build(session);
    let fields = resolve_field_state(session);
    let enabled = resolve_enabled_blocks(definition, &session.block_visibility);
    let all_units = document_units(&session.topics);

    let mut canvases: Vec<_> = session.canvases.iter().collect();
    canvases.sort_by_key(|p| p.page_number);
    let page_count = canvases.len() as u32;
    let first_flow = canvases.iter().find(|p| !p.is_fixed()).map(|p| p.id);

    canvases
        .into_iter()
        .map(|page| {
            let (block_keys, units): (Vec<BlockKind>, &[LayoutUnit]) = match &page.block_keys {
                Some(keys) => (keys.clone(), all_units.as_slice()),
                None => {
                    let first = Some(page.id) == first_flow;
                    let keys = enabled
                        .iter()
                        .copied()
                        .filter(|k| first || !k.is_first_page_only())
                        .collect();
                    let units = assignment.get(&page.id).map_or(&[][..], Vec::as_slice);
                    (keys, units)
                }
            };

            let ctx = BlockContext {
                session,
                definition,
                index: &index,
                fields: &fields,
                units,
                page_number: page.page_number,
                page_count,
                media,
            };
            let blocks = block_keys.iter().map(|k| render_block(*k, &ctx)).collect();

            RenderedPage {
                page_id: page.id,
                page_number: page.page_number,
                fixed: page.is_fixed(),
                block_keys,
                units: units.to_vec(),
                blocks,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::templates::{template_definition, TemplateType};
    use crate::layout::pagination::{paginate, reflow_canvases, PageBudget};
    use crate::models::ids::CourseId;
    use crate::models::session::CanvasPage;

    fn lesson(tasks: usize) -> CourseSession {
        let mut s = CourseSession::new(CourseId::new(), "Fractions", TemplateType::Lesson);
        let mut topic = Topic::new(s.id, "Adding fractions");
        let mut objective = Objective::new(topic.id, "Find a common denominator");
        for i in 0..tasks {
            let mut task = Task::new(objective.id, format!("Exercise {}", i + 1));
            task.order = i as u32;
            objective.tasks.push(task);
        }
        topic.objectives.push(objective);
        s.topics.push(topic);
        s
    }

    fn laid_out(mut s: CourseSession) -> (CourseSession, PageAssignment) {
        let heights = |u: &LayoutUnit| if u.is_header() { 0.0 } else { 400.0 };
        let plan = paginate(&s.topics, &heights, &PageBudget::uniform(1000.0));
        let reflow = reflow_canvases(&s, &plan);
        s.canvases = reflow.canvases;
        (s, reflow.assignment)
    }

    #[test]
    fn test_index_parent_lookups() {
        let s = lesson(1);
        let index = ContentIndex::build(&s);
        let topic = &s.topics[0];
        let objective = &topic.objectives[0];
        let task = LayoutUnit::Task(objective.tasks[0].id);

        assert_eq!(index.objective_of(&task), Some(objective.id));
        assert_eq!(index.topic_of(&task), Some(topic.id));
        assert_eq!(index.objective_of(&LayoutUnit::TopicHeader(topic.id)), None);
        assert_eq!(index.task(TaskId::new()).map(|t| t.id), None);
    }

    #[test]
    fn test_program_and_resources_only_on_first_flow_page() {
        let (s, assignment) = laid_out(lesson(4));
        let definition = template_definition(TemplateType::Lesson);
        let pages = project_pages(&s, &definition, &assignment, &HashMap::new());

        assert_eq!(pages.len(), 2);
        assert_eq!(
            pages[0].block_keys,
            vec![
                BlockKind::Header,
                BlockKind::Program,
                BlockKind::Resources,
                BlockKind::Content,
                BlockKind::Footer
            ]
        );
        assert_eq!(
            pages[1].block_keys,
            vec![BlockKind::Header, BlockKind::Content, BlockKind::Footer]
        );
        assert_eq!(pages[1].units.len(), 2);
    }

    #[test]
    fn test_explicit_block_keys_render_exactly_those_blocks() {
        let (mut s, assignment) = laid_out(lesson(1));
        s.canvases.insert(
            0,
            CanvasPage::fixed(s.id, 0, vec![BlockKind::Header, BlockKind::Content]),
        );
        for (i, page) in s.canvases.iter_mut().enumerate() {
            page.page_number = i as u32 + 1;
        }
        let definition = template_definition(TemplateType::Lesson);
        let pages = project_pages(&s, &definition, &assignment, &HashMap::new());

        let cover = &pages[0];
        assert!(cover.fixed);
        let kinds: Vec<BlockKind> = cover.blocks.iter().map(RenderedBlock::kind).collect();
        assert_eq!(kinds, vec![BlockKind::Header, BlockKind::Content]);
        // The flow page after the cover is still the first flow page.
        assert!(pages[1].block_keys.contains(&BlockKind::Program));
    }

    #[test]
    fn test_hidden_block_override_is_respected() {
        let (mut s, assignment) = laid_out(lesson(1));
        s.block_visibility.insert(BlockKind::Program, false);
        s.block_visibility.insert(BlockKind::Assignment, true);
        let definition = template_definition(TemplateType::Lesson);
        let pages = project_pages(&s, &definition, &assignment, &HashMap::new());
        assert!(!pages[0].block_keys.contains(&BlockKind::Program));
        assert!(pages[0].block_keys.contains(&BlockKind::Assignment));
    }

    #[test]
    fn test_unpaginated_flow_page_renders_empty_body() {
        let mut s = lesson(2);
        s.canvases.push(CanvasPage::flow(s.id, 1));
        let definition = template_definition(TemplateType::Lesson);
        let pages = project_pages(&s, &definition, &PageAssignment::new(), &HashMap::new());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].units.is_empty());
    }
}
