//! Content height measurement side-table.
//!
//! The renderer mounts each page, measures the rendered blocks, and reports
//! the heights back tagged with the content revision it rendered. Heights are
//! runtime state only: they are kept here, keyed by page id and by layout
//! unit, and never written into the persisted `CanvasPage`.
//!
//! Per unit the renderer reports the unit's own height. Per page it reports
//! the reserved height: everything in the body area that is not content
//! (program, resources, assignment, scoring). Pagination subtracts the
//! reserved height from that page's budget.
//!
//! A missing, zero, or non-finite height is "pending"; pagination then uses the
//! configured estimate and the next measurement pass corrects it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::ids::{ObjectiveId, PageId, TaskId, TopicId};

/// One paginated item of lesson content, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LayoutUnit {
    TopicHeader(TopicId),
    ObjectiveHeader(ObjectiveId),
    Task(TaskId),
}

impl LayoutUnit {
    pub fn is_header(&self) -> bool {
        !matches!(self, LayoutUnit::Task(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "height", rename_all = "snake_case")]
pub enum Measurement {
    Pending,
    Measured(f32),
}

impl Measurement {
    /// Zero, negative and non-finite readings mean the block was not mounted yet.
    pub fn from_reading(height: f32) -> Self {
        if height.is_finite() && height > 0.0 {
            Measurement::Measured(height)
        } else {
            Measurement::Pending
        }
    }

    pub fn value(self) -> Option<f32> {
        match self {
            Measurement::Measured(h) => Some(h),
            Measurement::Pending => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitMeasurement {
    pub unit: LayoutUnit,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeasurement {
    pub page_id: PageId,
    /// Height of the non-content blocks drawn in this page's body area.
    #[serde(default)]
    pub reserved_height: Option<f32>,
    #[serde(default)]
    pub units: Vec<UnitMeasurement>,
}

/// What the renderer posts after a render pass settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementReport {
    /// Content revision the renderer drew.
    pub revision: u64,
    pub pages: Vec<PageMeasurement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReportOutcome {
    /// The report describes an older revision and was dropped.
    Stale,
    Applied {
        measured: usize,
        pending: usize,
        /// True when any stored height changed, i.e. a reflow may be needed.
        changed: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MeasurementTable {
    pages: HashMap<PageId, f32>,
    units: HashMap<LayoutUnit, f32>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a report if it matches `current_revision`.
    pub fn record_report(&mut self, report: &MeasurementReport, current_revision: u64) -> ReportOutcome {
        if report.revision != current_revision {
            debug!(
                report_revision = report.revision,
                current_revision, "dropping stale measurement report"
            );
            return ReportOutcome::Stale;
        }

        let mut measured = 0;
        let mut pending = 0;
        let mut changed = false;

        for page in &report.pages {
            match page.reserved_height.map(Measurement::from_reading) {
                Some(Measurement::Measured(h)) => {
                    measured += 1;
                    // Reserved heights only grow until the next edit, so the
                    // measure/reflow loop cannot cycle between two layouts.
                    let held = self.pages.get(&page.page_id).copied();
                    if held.map_or(true, |old| h > old) {
                        self.pages.insert(page.page_id, h);
                        changed = true;
                    }
                }
                Some(Measurement::Pending) => pending += 1,
                None => {}
            }
            for unit in &page.units {
                match Measurement::from_reading(unit.height) {
                    Measurement::Measured(h) => {
                        measured += 1;
                        changed |= self.units.insert(unit.unit, h) != Some(h);
                    }
                    Measurement::Pending => pending += 1,
                }
            }
        }

        ReportOutcome::Applied {
            measured,
            pending,
            changed,
        }
    }

    pub fn page_height(&self, page_id: PageId) -> Measurement {
        self.pages
            .get(&page_id)
            .copied()
            .map_or(Measurement::Pending, Measurement::Measured)
    }

    pub fn unit_height(&self, unit: &LayoutUnit) -> Measurement {
        self.units
            .get(unit)
            .copied()
            .map_or(Measurement::Pending, Measurement::Measured)
    }

    /// Drops the heights of units whose content was edited.
    pub fn invalidate_units(&mut self, units: &[LayoutUnit]) {
        for unit in units {
            self.units.remove(unit);
        }
    }

    /// Reserved heights follow the content; any edit makes them stale.
    pub fn clear_pages(&mut self) {
        self.pages.clear();
    }

    /// Drops readings for pages that no longer exist after a reflow.
    pub fn retain_pages(&mut self, live: &[PageId]) {
        self.pages.retain(|id, _| live.contains(id));
    }

    pub fn measured_unit_count(&self) -> usize {
        self.units.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(revision: u64, page_id: PageId, units: Vec<(LayoutUnit, f32)>) -> MeasurementReport {
        MeasurementReport {
            revision,
            pages: vec![PageMeasurement {
                page_id,
                reserved_height: Some(640.0),
                units: units
                    .into_iter()
                    .map(|(unit, height)| UnitMeasurement { unit, height })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_reading_classification() {
        assert_eq!(Measurement::from_reading(12.5), Measurement::Measured(12.5));
        assert_eq!(Measurement::from_reading(0.0), Measurement::Pending);
        assert_eq!(Measurement::from_reading(-3.0), Measurement::Pending);
        assert_eq!(Measurement::from_reading(f32::NAN), Measurement::Pending);
        assert_eq!(Measurement::from_reading(f32::INFINITY), Measurement::Pending);
    }

    #[test]
    fn test_stale_report_is_dropped() {
        let mut table = MeasurementTable::new();
        let page = PageId::new();
        let task = LayoutUnit::Task(TaskId::new());
        let outcome = table.record_report(&report(3, page, vec![(task, 200.0)]), 4);
        assert_eq!(outcome, ReportOutcome::Stale);
        assert_eq!(table.unit_height(&task), Measurement::Pending);
        assert_eq!(table.page_height(page), Measurement::Pending);
    }

    #[test]
    fn test_current_report_is_applied_and_zero_is_pending() {
        let mut table = MeasurementTable::new();
        let page = PageId::new();
        let a = LayoutUnit::Task(TaskId::new());
        let b = LayoutUnit::TopicHeader(TopicId::new());
        let outcome = table.record_report(&report(7, page, vec![(a, 180.0), (b, 0.0)]), 7);
        assert_eq!(
            outcome,
            ReportOutcome::Applied {
                measured: 2,
                pending: 1,
                changed: true
            }
        );
        assert_eq!(table.unit_height(&a), Measurement::Measured(180.0));
        assert_eq!(table.unit_height(&b), Measurement::Pending);
        assert_eq!(table.page_height(page), Measurement::Measured(640.0));
    }

    #[test]
    fn test_repeated_report_reports_no_change() {
        let mut table = MeasurementTable::new();
        let page = PageId::new();
        let a = LayoutUnit::Task(TaskId::new());
        table.record_report(&report(1, page, vec![(a, 180.0)]), 1);
        let outcome = table.record_report(&report(1, page, vec![(a, 180.0)]), 1);
        assert!(matches!(outcome, ReportOutcome::Applied { changed: false, .. }));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut table = MeasurementTable::new();
        let page = PageId::new();
        let a = LayoutUnit::Task(TaskId::new());
        let b = LayoutUnit::ObjectiveHeader(ObjectiveId::new());
        table.record_report(&report(1, page, vec![(a, 100.0), (b, 30.0)]), 1);

        table.invalidate_units(&[a]);
        assert_eq!(table.unit_height(&a), Measurement::Pending);
        assert_eq!(table.unit_height(&b), Measurement::Measured(30.0));
        assert_eq!(table.measured_unit_count(), 1);

        table.clear_pages();
        assert_eq!(table.page_height(page), Measurement::Pending);
    }

    #[test]
    fn test_reserved_height_is_held_at_its_maximum() {
        let mut table = MeasurementTable::new();
        let page = PageId::new();
        let reading = |h: f32| MeasurementReport {
            revision: 2,
            pages: vec![PageMeasurement {
                page_id: page,
                reserved_height: Some(h),
                units: Vec::new(),
            }],
        };

        table.record_report(&reading(120.0), 2);
        let lower = table.record_report(&reading(90.0), 2);
        assert!(matches!(lower, ReportOutcome::Applied { changed: false, .. }));
        assert_eq!(table.page_height(page), Measurement::Measured(120.0));

        let higher = table.record_report(&reading(150.0), 2);
        assert!(matches!(higher, ReportOutcome::Applied { changed: true, .. }));
        assert_eq!(table.page_height(page), Measurement::Measured(150.0));

        table.clear_pages();
        table.record_report(&reading(90.0), 2);
        assert_eq!(table.page_height(page), Measurement::Measured(90.0));
    }

    #[test]
    fn test_retain_pages_drops_removed_pages() {
        let mut table = MeasurementTable::new();
        let kept = PageId::new();
        let gone = PageId::new();
        table.record_report(&report(1, kept, vec![]), 1);
        table.record_report(&report(1, gone, vec![]), 1);

        table.retain_pages(&[kept]);
        assert_eq!(table.page_height(kept), Measurement::Measured(640.0));
        assert_eq!(table.page_height(gone), Measurement::Pending);
    }

    #[test]
    fn test_layout_unit_wire_shape() {
        let id = TaskId::new();
        let json = serde_json::to_value(LayoutUnit::Task(id)).unwrap();
        assert_eq!(json["kind"], "task");
        assert_eq!(json["id"], serde_json::json!(id));
    }
}
