//! Template catalog and header/footer field visibility.
//!
//! A template decides which blocks a page is made of, which of them are
//! mandatory for publishing, the page geometry, and whether the body is
//! reflowed across pages or laid out on fixed pages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::layout::blocks::BlockKind;
use crate::layout::geometry::PageDimensions;
use crate::models::session::CourseSession;
use crate::text::normalize::{normalize_str, PlaceholderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Lesson,
    Quiz,
    Exam,
    Assessment,
    Project,
    Certificate,
}

impl TemplateType {
    pub const ALL: [TemplateType; 6] = [
        TemplateType::Lesson,
        TemplateType::Quiz,
        TemplateType::Exam,
        TemplateType::Assessment,
        TemplateType::Project,
        TemplateType::Certificate,
    ];
}

/// How a template's body is spread over pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFlow {
    /// Body units are paginated by the layout engine.
    Reflow,
    /// One page with an explicit block list; never reflowed.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub key: BlockKind,
    pub required: bool,
    pub default_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl BlockDefinition {
    fn new(key: BlockKind, required: bool, default_visible: bool) -> Self {
        Self {
            key,
            required,
            default_visible,
            config: None,
        }
    }

    fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub template_type: TemplateType,
    pub label: String,
    pub blocks: Vec<BlockDefinition>,
    pub dimensions: PageDimensions,
    pub flow: PageFlow,
}

impl TemplateDefinition {
    pub fn block(&self, key: BlockKind) -> Option<&BlockDefinition> {
        self.blocks.iter().find(|b| b.key == key)
    }

    pub fn required_blocks(&self) -> impl Iterator<Item = BlockKind> + '_ {
        self.blocks.iter().filter(|b| b.required).map(|b| b.key)
    }
}

/// Returns the catalog entry for a template type.
pub fn template_definition(template_type: TemplateType) -> TemplateDefinition {
    use BlockKind::*;

    let (label, flow, dimensions, blocks) = match template_type {
        TemplateType::Lesson => (
            "Lesson",
            PageFlow::Reflow,
            PageDimensions::a4(),
            vec![
                BlockDefinition::new(Header, true, true),
                BlockDefinition::new(Program, false, true),
                BlockDefinition::new(Resources, false, true),
                BlockDefinition::new(Content, true, true),
                BlockDefinition::new(Assignment, false, false),
                BlockDefinition::new(Footer, true, true),
            ],
        ),
        TemplateType::Quiz => (
            "Quiz",
            PageFlow::Reflow,
            PageDimensions::a4(),
            vec![
                BlockDefinition::new(Header, true, true),
                BlockDefinition::new(Content, true, true),
                BlockDefinition::new(Scoring, true, true)
                    .with_config(json!({ "points_per_objective": 1 })),
                BlockDefinition::new(Footer, false, true),
            ],
        ),
        TemplateType::Exam => (
            "Exam",
            PageFlow::Reflow,
            PageDimensions::a4(),
            vec![
                BlockDefinition::new(Header, true, true),
                BlockDefinition::new(Content, true, true),
                BlockDefinition::new(Scoring, true, true)
                    .with_config(json!({ "points_per_objective": 5 })),
                BlockDefinition::new(Footer, true, true),
            ],
        ),
        TemplateType::Assessment => (
            "Assessment",
            PageFlow::Reflow,
            PageDimensions::a4(),
            vec![
                BlockDefinition::new(Header, true, true),
                BlockDefinition::new(Program, false, true),
                BlockDefinition::new(Content, true, true),
                BlockDefinition::new(Assignment, false, true),
                BlockDefinition::new(Scoring, true, true)
                    .with_config(json!({ "points_per_objective": 3 })),
                BlockDefinition::new(Footer, false, true),
            ],
        ),
        TemplateType::Project => (
            "Project",
            PageFlow::Reflow,
            PageDimensions::a4(),
            vec![
                BlockDefinition::new(Header, true, true),
                BlockDefinition::new(Program, false, true),
                BlockDefinition::new(Project, true, true),
                BlockDefinition::new(Resources, false, true),
                BlockDefinition::new(Scoring, false, false),
                BlockDefinition::new(Footer, false, true),
            ],
        ),
        TemplateType::Certificate => (
            "Certificate",
            PageFlow::Fixed,
            PageDimensions::a4_landscape(),
            vec![
                BlockDefinition::new(Header, true, true),
                BlockDefinition::new(Content, true, true),
                BlockDefinition::new(Footer, false, true),
            ],
        ),
    };

    TemplateDefinition {
        template_type,
        label: label.to_string(),
        blocks,
        dimensions,
        flow,
    }
}

/// Blocks that render for a session, in template order.
///
/// A session override wins over the template's `default_visible` flag.
pub fn resolve_enabled_blocks(
    definition: &TemplateDefinition,
    overrides: &BTreeMap<BlockKind, bool>,
) -> Vec<BlockKind> {
    definition
        .blocks
        .iter()
        .filter(|b| overrides.get(&b.key).copied().unwrap_or(b.default_visible))
        .map(|b| b.key)
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Header / footer fields
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateField {
    LessonTitle,
    CourseTitle,
    Module,
    Pedagogy,
    Date,
    Duration,
    Teacher,
    Institution,
    PageNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPlacement {
    Header,
    Footer,
}

impl TemplateField {
    pub const ALL: [TemplateField; 9] = [
        TemplateField::LessonTitle,
        TemplateField::CourseTitle,
        TemplateField::Module,
        TemplateField::Pedagogy,
        TemplateField::Date,
        TemplateField::Duration,
        TemplateField::Teacher,
        TemplateField::Institution,
        TemplateField::PageNumber,
    ];

    pub fn placement(self) -> FieldPlacement {
        match self {
            TemplateField::Institution | TemplateField::PageNumber => FieldPlacement::Footer,
            _ => FieldPlacement::Header,
        }
    }

    fn placeholder_kind(self) -> PlaceholderKind {
        match self {
            TemplateField::LessonTitle => PlaceholderKind::Title,
            TemplateField::CourseTitle => PlaceholderKind::Course,
            TemplateField::Module => PlaceholderKind::Module,
            TemplateField::Teacher => PlaceholderKind::Teacher,
            TemplateField::Institution => PlaceholderKind::Institution,
            TemplateField::Pedagogy => PlaceholderKind::Method,
            TemplateField::Date | TemplateField::Duration | TemplateField::PageNumber => {
                PlaceholderKind::Generic
            }
        }
    }
}

fn default_fields(template_type: TemplateType) -> &'static [TemplateField] {
    use TemplateField::*;
    match template_type {
        TemplateType::Lesson | TemplateType::Project => &[
            LessonTitle,
            CourseTitle,
            Module,
            Date,
            Duration,
            Teacher,
            Institution,
            PageNumber,
        ],
        TemplateType::Assessment => &[
            LessonTitle,
            CourseTitle,
            Module,
            Pedagogy,
            Date,
            Teacher,
            PageNumber,
        ],
        TemplateType::Quiz | TemplateType::Exam => {
            &[LessonTitle, CourseTitle, Date, Duration, Teacher, PageNumber]
        }
        TemplateType::Certificate => &[LessonTitle, CourseTitle, Date, Teacher, Institution],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub field: TemplateField,
    pub placement: FieldPlacement,
    pub enabled: bool,
    /// Normalized display value; empty while unfilled or still a placeholder.
    pub value: String,
}

/// Resolves which header/footer fields are enabled for a session and their
/// display values.
///
/// The page number value is left empty here; the footer block fills it per page.
pub fn resolve_field_state(session: &CourseSession) -> Vec<FieldState> {
    let defaults = default_fields(session.template_type);
    TemplateField::ALL
        .iter()
        .map(|&field| {
            let enabled = session
                .field_visibility
                .get(&field)
                .copied()
                .unwrap_or_else(|| defaults.contains(&field));
            FieldState {
                field,
                placement: field.placement(),
                enabled,
                value: field_value(session, field),
            }
        })
        .collect()
}

fn field_value(session: &CourseSession, field: TemplateField) -> String {
    let meta = &session.metadata;
    let raw = match field {
        TemplateField::LessonTitle => Some(session.title.clone()),
        TemplateField::CourseTitle => meta.course_title.clone(),
        TemplateField::Module => meta.module.clone(),
        TemplateField::Pedagogy => meta.pedagogy.clone(),
        TemplateField::Date => meta.date.map(|d| d.format("%Y-%m-%d").to_string()),
        TemplateField::Duration => session.duration_minutes.map(|m| format!("{m} min")),
        TemplateField::Teacher => meta.teacher_name.clone(),
        TemplateField::Institution => meta.institution.clone(),
        TemplateField::PageNumber => None,
    };
    raw.map(|r| normalize_str(&r, field.placeholder_kind()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::CourseId;
    use chrono::NaiveDate;

    #[test]
    fn test_every_template_has_a_required_header() {
        for t in TemplateType::ALL {
            let def = template_definition(t);
            assert_eq!(def.template_type, t);
            assert!(
                def.required_blocks().any(|b| b == BlockKind::Header),
                "{t:?} must require a header"
            );
        }
    }

    #[test]
    fn test_only_certificate_is_fixed() {
        for t in TemplateType::ALL {
            let expected = if t == TemplateType::Certificate {
                PageFlow::Fixed
            } else {
                PageFlow::Reflow
            };
            assert_eq!(template_definition(t).flow, expected, "{t:?}");
        }
    }

    #[test]
    fn test_enabled_blocks_follow_defaults_in_template_order() {
        let def = template_definition(TemplateType::Lesson);
        let enabled = resolve_enabled_blocks(&def, &BTreeMap::new());
        assert_eq!(
            enabled,
            vec![
                BlockKind::Header,
                BlockKind::Program,
                BlockKind::Resources,
                BlockKind::Content,
                BlockKind::Footer
            ]
        );
    }

    #[test]
    fn test_overrides_win_over_defaults() {
        let def = template_definition(TemplateType::Lesson);
        let overrides = BTreeMap::from([(BlockKind::Assignment, true), (BlockKind::Header, false)]);
        let enabled = resolve_enabled_blocks(&def, &overrides);
        assert!(enabled.contains(&BlockKind::Assignment));
        assert!(!enabled.contains(&BlockKind::Header));
        // Assignment keeps its template position, after Content.
        let content = enabled.iter().position(|b| *b == BlockKind::Content).unwrap();
        let assignment = enabled.iter().position(|b| *b == BlockKind::Assignment).unwrap();
        assert!(assignment > content);
    }

    #[test]
    fn test_override_for_block_not_in_template_is_ignored() {
        let def = template_definition(TemplateType::Quiz);
        let overrides = BTreeMap::from([(BlockKind::Project, true)]);
        assert!(!resolve_enabled_blocks(&def, &overrides).contains(&BlockKind::Project));
    }

    #[test]
    fn test_field_state_defaults_and_values() {
        let mut session = CourseSession::new(CourseId::new(), "Photosynthesis", TemplateType::Lesson);
        session.metadata.teacher_name = Some("  <b>R. Okafor</b> ".to_string());
        session.metadata.module = Some("Module".to_string());
        session.metadata.date = NaiveDate::from_ymd_opt(2026, 3, 2);
        session.duration_minutes = Some(45);

        let fields = resolve_field_state(&session);
        let get = |f: TemplateField| fields.iter().find(|s| s.field == f).unwrap();

        assert!(get(TemplateField::LessonTitle).enabled);
        assert_eq!(get(TemplateField::LessonTitle).value, "Photosynthesis");
        assert_eq!(get(TemplateField::Teacher).value, "R. Okafor");
        assert_eq!(get(TemplateField::Module).value, "", "placeholder module label");
        assert_eq!(get(TemplateField::Date).value, "2026-03-02");
        assert_eq!(get(TemplateField::Duration).value, "45 min");
        assert!(!get(TemplateField::Pedagogy).enabled);
        assert_eq!(get(TemplateField::PageNumber).placement, FieldPlacement::Footer);
    }

    #[test]
    fn test_field_override_disables_default_field() {
        let mut session = CourseSession::new(CourseId::new(), "Quiz 1", TemplateType::Quiz);
        session.field_visibility.insert(TemplateField::Teacher, false);
        session.field_visibility.insert(TemplateField::Institution, true);
        let fields = resolve_field_state(&session);
        let enabled = |f: TemplateField| fields.iter().find(|s| s.field == f).unwrap().enabled;
        assert!(!enabled(TemplateField::Teacher));
        assert!(enabled(TemplateField::Institution));
    }
}
