//! Placeholder/text normalization for every field shown on a canvas page.
//!
//! Raw field values arrive from the builder UI in many shapes (plain strings
//! with leftover markup, numbers, arrays of tags, `{ name: .. }` objects).
//! Everything is reduced to one clean display string. Generic placeholder
//! labels ("Topic", "Objective 2", "Method") count as "not filled in" and
//! normalize to the empty string.
//!
//! Normalization never fails: unsupported shapes degrade to `""`.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The field a value belongs to, which decides which placeholder labels apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKind {
    Topic,
    Objective,
    Task,
    Method,
    SocialForm,
    Competence,
    Title,
    Module,
    Course,
    Institution,
    Teacher,
    /// Free text with no placeholder label.
    Generic,
}

impl PlaceholderKind {
    const ALL: [PlaceholderKind; 12] = [
        PlaceholderKind::Topic,
        PlaceholderKind::Objective,
        PlaceholderKind::Task,
        PlaceholderKind::Method,
        PlaceholderKind::SocialForm,
        PlaceholderKind::Competence,
        PlaceholderKind::Title,
        PlaceholderKind::Module,
        PlaceholderKind::Course,
        PlaceholderKind::Institution,
        PlaceholderKind::Teacher,
        PlaceholderKind::Generic,
    ];

    /// Labels the builder pre-fills for a freshly created field of this kind.
    fn labels(self) -> &'static [&'static str] {
        match self {
            PlaceholderKind::Topic => &["topic", "new topic", "untitled topic"],
            PlaceholderKind::Objective => &["objective", "new objective", "learning objective"],
            PlaceholderKind::Task => &["task", "new task"],
            PlaceholderKind::Method => &["method", "teaching method"],
            PlaceholderKind::SocialForm => &["social form"],
            PlaceholderKind::Competence => &["competence", "competency"],
            PlaceholderKind::Title => &[
                "title",
                "lesson title",
                "session title",
                "untitled",
                "untitled session",
            ],
            PlaceholderKind::Module => &["module", "module title"],
            PlaceholderKind::Course => &["course", "course title", "course name"],
            PlaceholderKind::Institution => &["institution", "school"],
            PlaceholderKind::Teacher => &["teacher", "teacher name", "instructor"],
            PlaceholderKind::Generic => &[],
        }
    }
}

/// A template block's editable content, as stored by the builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateBlockContent {
    #[serde(default)]
    pub content: Value,
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}").expect("valid marker regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(amp|lt|gt|quot|#39|apos|nbsp);").expect("valid entity regex")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// One anchored, case-insensitive pattern per kind that has labels.
/// A trailing ordinal is allowed: "Objective 2", "Task #3".
static PLACEHOLDER_PATTERNS: LazyLock<Vec<(PlaceholderKind, Regex)>> = LazyLock::new(|| {
    PlaceholderKind::ALL
        .iter()
        .filter(|kind| !kind.labels().is_empty())
        .map(|&kind| {
            let alternatives = kind
                .labels()
                .iter()
                .map(|label| regex::escape(label).replace(' ', r"\s+"))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)^(?:{alternatives})(?:\s*#?\s*\d+)?$");
            (kind, Regex::new(&pattern).expect("valid placeholder regex"))
        })
        .collect()
});

/// Cleans a raw string: decodes the fixed entity set, strips HTML tags and
/// `{{...}}` markers, collapses whitespace and trims.
///
/// Applied until nothing changes, so doubly escaped input (`&amp;lt;b&amp;gt;`)
/// is fully cleaned and `normalize_text(normalize_text(s)) == normalize_text(s)`.
pub fn normalize_text(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = clean_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn clean_once(s: &str) -> String {
    let decoded = ENTITY_RE.replace_all(s, |caps: &Captures| {
        match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "#39" | "apos" => "'",
            _ => " ",
        }
        .to_string()
    });
    let untagged = TAG_RE.replace_all(&decoded, "");
    let unmarked = MARKER_RE.replace_all(&untagged, "");
    WHITESPACE_RE
        .replace_all(&unmarked, " ")
        .trim()
        .to_string()
}

/// True when `text` (already normalized) is one of the kind's generic labels.
pub fn is_placeholder(text: &str, kind: PlaceholderKind) -> bool {
    PLACEHOLDER_PATTERNS
        .iter()
        .find(|(k, _)| *k == kind)
        .is_some_and(|(_, re)| re.is_match(text))
}

/// Normalizes a string field; placeholders come back empty.
pub fn normalize_str(raw: &str, kind: PlaceholderKind) -> String {
    let text = normalize_text(raw);
    if is_placeholder(&text, kind) {
        String::new()
    } else {
        text
    }
}

/// Normalizes any raw field value into a display string.
///
/// - strings are cleaned and placeholder-checked
/// - numbers and booleans are stringified
/// - arrays recurse and join their non-empty entries with ", "
/// - objects use the first non-empty of `name`, `title`, `label`, `value`
/// - anything else is `""`
pub fn normalize_field(value: &Value, kind: PlaceholderKind) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => normalize_str(s, kind),
        Value::Array(items) => items
            .iter()
            .map(|item| normalize_field(item, kind))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => ["name", "title", "label", "value"]
            .iter()
            .filter_map(|key| map.get(*key))
            .map(|v| normalize_field(v, kind))
            .find(|s| !s.is_empty())
            .unwrap_or_default(),
    }
}

/// Display title of a template block, or `""` while it still shows its placeholder.
pub fn format_block_title(block: &TemplateBlockContent, kind: PlaceholderKind) -> String {
    normalize_field(&block.content, kind)
}
