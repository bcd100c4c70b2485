//! Pagination/overflow engine: assigns lesson content to fixed-height pages.
//!
//! # Rules
//! - Units are walked in document order: topic heading, its objectives'
//!   headings, each objective's tasks (all by their `order` field).
//! - Each page has a content budget: the body height minus the blocks drawn
//!   beside the content on that page (program and resources on the first
//!   page, assignment and scoring on every page). See [`PageBudget`].
//! - A running height is kept per page. When the next block would push it past
//!   the budget and the page already holds something, the page is closed.
//! - Headings are kept with the task that follows them. A heading with no
//!   children is a block of its own. If headings plus task overflow even an
//!   empty page but the task alone fits, the headings keep the page and the
//!   task starts the next one.
//! - Tasks are never split. A task taller than the whole budget is placed
//!   alone on its own page and the next block starts a fresh page. That is
//!   the only page allowed past its budget.
//! - Pages with explicit `block_keys` are fixed and never reflowed.
//!
//! `paginate` is a pure function of (content, heights, budget), so re-running
//! it on unchanged input always yields the same plan.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::curriculum::templates::{
    resolve_enabled_blocks, template_definition, PageFlow, TemplateDefinition,
};
use crate::layout::blocks::BlockKind;
use crate::layout::measurement::{LayoutUnit, MeasurementTable};
use crate::layout::projection::ContentIndex;
use crate::models::ids::PageId;
use crate::models::session::{CanvasPage, CourseSession, Topic};

// ────────────────────────────────────────────────────────────────────────────
// Heights
// ────────────────────────────────────────────────────────────────────────────

/// Supplies the height of a unit. Implementations must be deterministic.
pub trait HeightSource {
    fn height(&self, unit: &LayoutUnit) -> f32;
}

impl<F> HeightSource for F
where
    F: Fn(&LayoutUnit) -> f32,
{
    fn height(&self, unit: &LayoutUnit) -> f32 {
        self(unit)
    }
}

/// Fallback heights used until the renderer has measured a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitEstimates {
    pub topic_header: f32,
    pub objective_header: f32,
    /// Task title row plus padding, before any cards.
    pub task_base: f32,
    /// Used for cards dropped without explicit dimensions.
    pub default_card_height: f32,
    pub card_gap: f32,
    /// Program or resources overview, first reflowed page only.
    pub overview_block: f32,
    /// Assignment or scoring summary, every reflowed page.
    pub summary_block: f32,
}

impl UnitEstimates {
    /// Estimated height of a block drawn beside the content.
    pub fn block_height(&self, kind: BlockKind) -> f32 {
        match kind {
            BlockKind::Program | BlockKind::Resources => self.overview_block,
            BlockKind::Assignment | BlockKind::Scoring => self.summary_block,
            _ => 0.0,
        }
    }
}

impl Default for UnitEstimates {
    fn default() -> Self {
        Self {
            topic_header: 56.0,
            objective_header: 40.0,
            task_base: 72.0,
            default_card_height: 120.0,
            card_gap: 16.0,
            overview_block: 96.0,
            summary_block: 64.0,
        }
    }
}

/// Measured heights where available, estimates otherwise.
pub struct MeasuredHeights<'a> {
    pub measurements: &'a MeasurementTable,
    pub estimates: &'a UnitEstimates,
    pub index: &'a ContentIndex<'a>,
}

impl HeightSource for MeasuredHeights<'_> {
    fn height(&self, unit: &LayoutUnit) -> f32 {
        if let Some(h) = self.measurements.unit_height(unit).value() {
            return h;
        }
        match *unit {
            LayoutUnit::TopicHeader(_) => self.estimates.topic_header,
            LayoutUnit::ObjectiveHeader(_) => self.estimates.objective_header,
            LayoutUnit::Task(id) => {
                let cards: f32 = self
                    .index
                    .task(id)
                    .map(|task| {
                        task.cards
                            .iter()
                            .map(|c| {
                                let h = c.dimensions.height;
                                let h = if h.is_finite() && h > 0.0 {
                                    h
                                } else {
                                    self.estimates.default_card_height
                                };
                                h + self.estimates.card_gap
                            })
                            .sum()
                    })
                    .unwrap_or(0.0);
                self.estimates.task_base + cards
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Budget
// ────────────────────────────────────────────────────────────────────────────

/// Height available to content on each reflowed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBudget {
    pub body_height: f32,
    /// Height taken by the blocks beside the content, by reflowed-page position.
    pub reserved: Vec<f32>,
    /// Reserve for positions past the end of `reserved`.
    pub reserved_default: f32,
}

impl PageBudget {
    pub fn uniform(body_height: f32) -> Self {
        Self {
            body_height,
            reserved: Vec::new(),
            reserved_default: 0.0,
        }
    }

    /// Content budget of the reflowed page at `index` (0-based).
    pub fn capacity(&self, index: usize) -> f32 {
        let reserved = self
            .reserved
            .get(index)
            .copied()
            .unwrap_or(self.reserved_default);
        (self.body_height - reserved).max(0.0)
    }
}

/// Budgets for a session's reflowed pages. A page's measured reserved height
/// wins; pages the renderer has not reported use the block estimates.
pub fn page_budget(
    session: &CourseSession,
    definition: &TemplateDefinition,
    measurements: &MeasurementTable,
    estimates: &UnitEstimates,
) -> PageBudget {
    let enabled = resolve_enabled_blocks(definition, &session.block_visibility);
    let estimated = |first: bool| -> f32 {
        enabled
            .iter()
            .copied()
            .filter(|k| k.reserves_body_space() && (first || !k.is_first_page_only()))
            .map(|k| estimates.block_height(k))
            .sum()
    };

    let flow_ids: Vec<PageId> = by_order(&session.canvases, |p| p.page_number)
        .into_iter()
        .filter(|p| !p.is_fixed())
        .map(|p| p.id)
        .collect();
    let reserved = (0..flow_ids.len().max(1))
        .map(|i| {
            flow_ids
                .get(i)
                .and_then(|id| measurements.page_height(*id).value())
                .unwrap_or_else(|| estimated(i == 0))
        })
        .collect();

    PageBudget {
        body_height: definition.dimensions.body_height(),
        reserved,
        reserved_default: estimated(false),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Plan
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPage {
    /// 1-based among the reflowed pages.
    pub page_number: u32,
    pub units: Vec<LayoutUnit>,
    pub used_height: f32,
    /// Content budget of this page.
    pub budget: f32,
    /// Holds a single task whose own height exceeds the budget.
    pub oversized: bool,
}

impl PlannedPage {
    fn new(page_number: u32, budget: f32) -> Self {
        Self {
            page_number,
            units: Vec::new(),
            used_height: 0.0,
            budget,
            oversized: false,
        }
    }

    pub fn task_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| !u.is_header())
            .count()
    }

    pub fn fill_ratio(&self) -> f32 {
        if self.budget > 0.0 {
            self.used_height / self.budget
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationPlan {
    pub body_height: f32,
    pub pages: Vec<PlannedPage>,
}

/// A page whose content exceeds the body height without being a lone
/// oversized task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetViolation {
    pub page_number: u32,
    pub used_height: f32,
    pub budget: f32,
}

impl PaginationPlan {
    pub fn empty(body_height: f32) -> Self {
        Self {
            body_height,
            pages: Vec::new(),
        }
    }

    pub fn check_budget(&self) -> Vec<BudgetViolation> {
        self.pages
            .iter()
            .filter(|p| p.used_height > p.budget)
            .filter(|p| !(p.oversized && p.task_count() == 1))
            .map(|p| BudgetViolation {
                page_number: p.page_number,
                used_height: p.used_height,
                budget: p.budget,
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

fn by_order<T>(items: &[T], order: impl Fn(&T) -> u32) -> Vec<&T> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by_key(|item| order(item));
    sorted
}

/// All layout units of the session in document order.
pub fn document_units(topics: &[Topic]) -> Vec<LayoutUnit> {
    let mut units = Vec::new();
    for topic in by_order(topics, |t| t.order) {
        units.push(LayoutUnit::TopicHeader(topic.id));
        for objective in by_order(&topic.objectives, |o| o.order) {
            units.push(LayoutUnit::ObjectiveHeader(objective.id));
            for task in by_order(&objective.tasks, |t| t.order) {
                units.push(LayoutUnit::Task(task.id));
            }
        }
    }
    units
}

struct PageBuilder<'b> {
    budget: &'b PageBudget,
    pages: Vec<PlannedPage>,
    current: PlannedPage,
}

impl<'b> PageBuilder<'b> {
    fn new(budget: &'b PageBudget) -> Self {
        Self {
            budget,
            pages: Vec::new(),
            current: PlannedPage::new(1, budget.capacity(0)),
        }
    }

    fn close_page(&mut self) {
        let number = self.current.page_number;
        let next = PlannedPage::new(number + 1, self.budget.capacity(number as usize));
        let done = std::mem::replace(&mut self.current, next);
        self.pages.push(done);
    }

    fn fits(&self, height: f32) -> bool {
        self.current.used_height + height <= self.current.budget
    }

    fn push(&mut self, block: &mut Vec<(LayoutUnit, f32)>) {
        for (unit, height) in block.drain(..) {
            self.current.units.push(unit);
            self.current.used_height += height;
        }
    }

    /// Places a block that should stay together on one page: lead-in
    /// headings followed by at most one task.
    fn place(&mut self, block: &mut Vec<(LayoutUnit, f32)>) {
        if block.is_empty() {
            return;
        }
        let height: f32 = block.iter().map(|(_, h)| h).sum();

        if !self.current.units.is_empty() && !self.fits(height) {
            self.close_page();
        }
        if self.fits(height) {
            self.push(block);
            return;
        }

        // Alone on an empty page and still too tall.
        let task_height = match block.last() {
            Some((LayoutUnit::Task(_), h)) => Some(*h),
            _ => None,
        };
        if let Some(task_height) = task_height {
            if block.len() > 1 && task_height <= self.current.budget {
                let mut task = block.split_off(block.len() - 1);
                self.push(block);
                self.close_page();
                self.place(&mut task);
                return;
            }
        }
        let budget = self.current.budget;
        self.current.oversized = task_height.is_some_and(|h| h > budget);
        self.push(block);
        self.close_page();
    }

    fn finish(mut self) -> Vec<PlannedPage> {
        if !self.current.units.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// Assigns topics/objectives/tasks to pages within `budget`.
///
/// Always returns at least one page, even for an empty session.
pub fn paginate(topics: &[Topic], heights: &impl HeightSource, budget: &PageBudget) -> PaginationPlan {
    let mut builder = PageBuilder::new(budget);
    let mut lead: Vec<(LayoutUnit, f32)> = Vec::new();

    for unit in document_units(topics) {
        let height = heights.height(&unit).max(0.0);
        match unit {
            LayoutUnit::TopicHeader(_) => {
                // Whatever is still waiting belongs to a previous, childless heading.
                builder.place(&mut lead);
                lead.push((unit, height));
            }
            LayoutUnit::ObjectiveHeader(_) => {
                if lead
                    .iter()
                    .any(|(u, _)| matches!(u, LayoutUnit::ObjectiveHeader(_)))
                {
                    builder.place(&mut lead);
                }
                lead.push((unit, height));
            }
            LayoutUnit::Task(_) => {
                lead.push((unit, height));
                builder.place(&mut lead);
            }
        }
    }
    builder.place(&mut lead);

    PaginationPlan {
        body_height: budget.body_height,
        pages: builder.finish(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Canvas reflow
// ────────────────────────────────────────────────────────────────────────────

/// Body units per reflowed page. Fixed pages are absent.
pub type PageAssignment = HashMap<PageId, Vec<LayoutUnit>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Reflow {
    pub canvases: Vec<CanvasPage>,
    pub assignment: PageAssignment,
}

/// Rebuilds the canvas list from a plan.
///
/// Fixed pages are kept verbatim in their relative order. Reflowed pages are
/// replaced by the plan, reusing the ids of the existing reflowed pages by
/// position so page-keyed state survives an unchanged reflow. Page numbers
/// are renumbered 1..n across the whole document.
pub fn reflow_canvases(session: &CourseSession, plan: &PaginationPlan) -> Reflow {
    let existing = by_order(&session.canvases, |p| p.page_number);
    let flow_ids: Vec<PageId> = existing
        .iter()
        .filter(|p| !p.is_fixed())
        .map(|p| p.id)
        .collect();

    let mut assignment = PageAssignment::new();
    let mut new_flow: Vec<CanvasPage> = plan
        .pages
        .iter()
        .enumerate()
        .map(|(i, planned)| {
            let id = flow_ids.get(i).copied().unwrap_or_else(PageId::new);
            assignment.insert(id, planned.units.clone());
            CanvasPage {
                id,
                session_id: session.id,
                page_number: 0,
                block_keys: None,
            }
        })
        .collect();

    let mut canvases = Vec::with_capacity(existing.len() + new_flow.len());
    match existing.iter().position(|p| !p.is_fixed()) {
        Some(first_flow) => {
            for (i, page) in existing.iter().enumerate() {
                if i == first_flow {
                    canvases.append(&mut new_flow);
                }
                if page.is_fixed() {
                    canvases.push((*page).clone());
                }
            }
        }
        None => {
            canvases.extend(existing.iter().map(|p| (*p).clone()));
            canvases.append(&mut new_flow);
        }
    }

    for (i, page) in canvases.iter_mut().enumerate() {
        page.page_number = i as u32 + 1;
    }

    Reflow {
        canvases,
        assignment,
    }
}

/// Runs one full layout pass for a session: pick heights, paginate according
/// to the template's flow, and rebuild the canvas list.
pub fn compute_layout(
    session: &CourseSession,
    measurements: &MeasurementTable,
    estimates: &UnitEstimates,
) -> (PaginationPlan, Reflow) {
    let definition = template_definition(session.template_type);
    let body_height = definition.dimensions.body_height();

    let plan = match definition.flow {
        PageFlow::Reflow => {
            let index = ContentIndex::build(session);
            let heights = MeasuredHeights {
                measurements,
                estimates,
                index: &index,
            };
            let budget = page_budget(session, &definition, measurements, estimates);
            paginate(&session.topics, &heights, &budget)
        }
        PageFlow::Fixed => PaginationPlan::empty(body_height),
    };

    let mut reflow = reflow_canvases(session, &plan);
    if definition.flow == PageFlow::Fixed && reflow.canvases.is_empty() {
        let blocks = resolve_enabled_blocks(&definition, &session.block_visibility);
        reflow
            .canvases
            .push(CanvasPage::fixed(session.id, 1, blocks));
    }
    (plan, reflow)
}
