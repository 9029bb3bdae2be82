//! The transform pipeline: modifiers, filters and the sort comparator.
//!
//! A modifier is a pure transform from one record to another (or to
//! absence, which short-circuits the rest of the chain and the filters).
//! A filter is a predicate deciding inclusion. Both run in a fixed order
//! derived from the extraction options; the comparator is validated once
//! at build time against a two-record probe so sorting never fails later.

use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use time::format_description::{self, BorrowedFormatItem, OwnedFormatItem};
use time::macros::format_description;
use time::Date;
use tracing::{debug, warn};

use taskmill_core::note::normalize_tag;
use taskmill_core::record::{DateKind, LinkRef};
use taskmill_core::{ItemKey, PosKey, Priority, TaskRecord, TaskStatus};

use crate::options::ExtractOptions;

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Pure transform from one record to another, or to absence.
trait Modifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, record: TaskRecord) -> Option<TaskRecord>;
}

/// Predicate deciding whether a record stays in the result.
trait Gate: Send + Sync {
    fn keep(&self, record: &TaskRecord) -> bool;
}

/// Total-order comparator over task records.
pub type Comparator = Arc<dyn Fn(&TaskRecord, &TaskRecord) -> Ordering + Send + Sync>;

/// Executable pipeline derived from the extraction options.
pub struct TransformConfig {
    modifiers: Vec<Box<dyn Modifier>>,
    filters: Vec<Box<dyn Gate>>,
    comparator: Comparator,
}

impl TransformConfig {
    /// Build the pipeline for one refresh.
    ///
    /// `today` anchors the forward modifier and status derivation so a
    /// refresh observes one consistent date.
    #[must_use]
    pub fn build(options: &ExtractOptions, today: Date) -> Self {
        let mut modifiers: Vec<Box<dyn Modifier>> =
            vec![Box::new(EmojiFields), Box::new(BracketFields)];
        if let Some(source) = &options.daily_note_format {
            match format_description::parse_owned::<2>(source) {
                Ok(format) => modifiers.push(Box::new(DailyNoteDate { format })),
                Err(err) => warn!(
                    format = source.as_str(),
                    error = %err,
                    "invalid daily note date format, skipping daily note dates"
                ),
            }
        }
        modifiers.push(Box::new(ExtractTags));
        modifiers.push(Box::new(TidyText));
        modifiers.push(Box::new(AnnotateLinks));
        if options.forward_dates {
            modifiers.push(Box::new(ForwardDates { today }));
        }
        modifiers.push(Box::new(StatusOrder {
            order: status_order(&options.status_order),
            today,
        }));

        let mut filters: Vec<Box<dyn Gate>> = vec![Box::new(HiddenStatus {
            hidden: options.hide_status.iter().map(|s| s.trim().to_owned()).collect(),
        })];
        if options.include_tags_enabled {
            filters.push(Box::new(RequireTags {
                tags: normalize_tags(&options.include_tags),
            }));
        }
        if options.exclude_tags_enabled {
            filters.push(Box::new(ExcludeTags {
                tags: normalize_tags(&options.exclude_tags),
            }));
        }
        if options.filter_empty {
            filters.push(Box::new(NonEmpty));
        }

        Self {
            modifiers,
            filters,
            comparator: comparator_from_source(options.sort.as_deref()),
        }
    }

    /// Run one record through the modifier chain and the filter chain.
    ///
    /// The first modifier returning `None` drops the record and stops the
    /// chain; a kept record must pass every filter.
    #[must_use]
    pub fn run(&self, record: TaskRecord) -> Option<TaskRecord> {
        let mut record = record;
        for modifier in &self.modifiers {
            match modifier.apply(record) {
                Some(next) => record = next,
                None => {
                    debug!(modifier = modifier.name(), "record dropped by modifier");
                    return None;
                }
            }
        }
        self.filters
            .iter()
            .all(|filter| filter.keep(&record))
            .then_some(record)
    }

    /// The validated comparator installed for this configuration.
    #[must_use]
    pub fn comparator(&self) -> Comparator {
        Arc::clone(&self.comparator)
    }
}

fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter().filter_map(|tag| normalize_tag(tag)).collect()
}

fn status_order(tokens: &[String]) -> Vec<TaskStatus> {
    let mut order = Vec::with_capacity(tokens.len());
    for token in tokens {
        match TaskStatus::from_token(token) {
            Some(status) if !order.contains(&status) => order.push(status),
            Some(_) => {}
            None => warn!(token = token.as_str(), "unknown status in status order, skipping"),
        }
    }
    order
}

// --- modifiers -------------------------------------------------------------

static EMOJI_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<emoji>📅|⏳|⌛|🛫|✅|➕)\s*(?P<date>\d{4}-\d{2}-\d{2})")
        .unwrap_or_else(|err| unreachable!("emoji date pattern must compile: {err}"))
});

static EMOJI_PRIORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"🔺|⏫|🔼|🔽|⏬")
        .unwrap_or_else(|err| unreachable!("emoji priority pattern must compile: {err}"))
});

static EMOJI_RECURRENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"🔁\s*(?P<rule>[^📅⏳⌛🛫✅➕🔺⏫🔼🔽⏬🔁]*)")
        .unwrap_or_else(|err| unreachable!("emoji recurrence pattern must compile: {err}"))
});

/// Emoji field syntax: dates, priority and recurrence markers.
struct EmojiFields;

impl Modifier for EmojiFields {
    fn name(&self) -> &'static str {
        "emoji_fields"
    }

    fn apply(&self, mut record: TaskRecord) -> Option<TaskRecord> {
        let source = record.visual.clone();
        for captures in EMOJI_DATE.captures_iter(&source) {
            let kind = match captures.name("emoji").map(|m| m.as_str()) {
                Some("📅") => DateKind::Due,
                Some("⏳" | "⌛") => DateKind::Scheduled,
                Some("🛫") => DateKind::Start,
                Some("✅") => DateKind::Done,
                Some("➕") => DateKind::Created,
                _ => continue,
            };
            let Some(value) = captures.name("date") else {
                continue;
            };
            match Date::parse(value.as_str(), ISO_DATE) {
                Ok(date) => {
                    record.dates.insert(kind, date);
                }
                Err(err) => {
                    debug!(item = %record.key, error = %err, "unparseable emoji date");
                }
            }
        }
        if let Some(found) = EMOJI_PRIORITY.find(&source) {
            record.priority = Some(match found.as_str() {
                "🔺" => Priority::Highest,
                "⏫" => Priority::High,
                "🔽" => Priority::Low,
                "⏬" => Priority::Lowest,
                _ => Priority::Medium,
            });
        }
        if let Some(captures) = EMOJI_RECURRENCE.captures(&source) {
            let rule = captures.name("rule").map_or("", |m| m.as_str()).trim();
            if !rule.is_empty() {
                record.recurrence = Some(rule.to_owned());
            }
        }

        let stripped = EMOJI_DATE.replace_all(&source, "");
        let stripped = EMOJI_PRIORITY.replace_all(&stripped, "");
        let stripped = EMOJI_RECURRENCE.replace_all(&stripped, "");
        record.visual = stripped.trim().to_owned();
        Some(record)
    }
}

static BRACKET_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[(](?P<key>[A-Za-z][A-Za-z_-]*)::\s*(?P<value>[^\])]*)[\])]")
        .unwrap_or_else(|err| unreachable!("bracket field pattern must compile: {err}"))
});

/// Bracketed inline field syntax: `[due:: 2026-01-01]` and the paren form.
struct BracketFields;

impl BracketFields {
    fn date_kind(key: &str) -> Option<DateKind> {
        match key {
            "due" | "deadline" => Some(DateKind::Due),
            "scheduled" => Some(DateKind::Scheduled),
            "start" => Some(DateKind::Start),
            "completion" | "done" => Some(DateKind::Done),
            "created" => Some(DateKind::Created),
            _ => None,
        }
    }
}

impl Modifier for BracketFields {
    fn name(&self) -> &'static str {
        "bracket_fields"
    }

    fn apply(&self, mut record: TaskRecord) -> Option<TaskRecord> {
        let source = record.visual.clone();
        let mut consumed = Vec::new();
        for captures in BRACKET_FIELD.captures_iter(&source) {
            let key = captures
                .name("key")
                .map_or(String::new(), |m| m.as_str().to_ascii_lowercase());
            let value = captures.name("value").map_or("", |m| m.as_str()).trim();
            let known = if let Some(kind) = Self::date_kind(&key) {
                match Date::parse(value, ISO_DATE) {
                    Ok(date) => {
                        record.dates.insert(kind, date);
                    }
                    Err(err) => {
                        debug!(item = %record.key, error = %err, "unparseable field date");
                    }
                }
                true
            } else if key == "priority" {
                record.priority = Priority::from_token(value).or(record.priority);
                true
            } else if key == "repeat" || key == "recurrence" {
                if !value.is_empty() {
                    record.recurrence = Some(value.to_owned());
                }
                true
            } else {
                false
            };
            if known {
                if let Some(whole) = captures.get(0) {
                    consumed.push(whole.as_str().to_owned());
                }
            }
        }
        let mut visual = source;
        for token in consumed {
            visual = visual.replace(&token, "");
        }
        record.visual = visual.trim().to_owned();
        Some(record)
    }
}

/// Inherit the note date of a daily note as the task's due date.
struct DailyNoteDate {
    format: OwnedFormatItem,
}

impl Modifier for DailyNoteDate {
    fn name(&self) -> &'static str {
        "daily_note_date"
    }

    fn apply(&self, mut record: TaskRecord) -> Option<TaskRecord> {
        if record.has_planning_date() {
            return Some(record);
        }
        let name = record
            .key
            .path
            .rsplit('/')
            .next()
            .unwrap_or(record.key.path.as_str());
        let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
        if let Ok(date) = Date::parse(stem, &self.format) {
            record.dates.insert(DateKind::Due, date);
        }
        Some(record)
    }
}

static TAG_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#[A-Za-z][A-Za-z0-9_/-]*")
        .unwrap_or_else(|err| unreachable!("tag pattern must compile: {err}"))
});

/// Collect `#tag` tokens embedded in the task text.
struct ExtractTags;

impl Modifier for ExtractTags {
    fn name(&self) -> &'static str {
        "extract_tags"
    }

    fn apply(&self, mut record: TaskRecord) -> Option<TaskRecord> {
        let source = record.visual.clone();
        for found in TAG_TOKEN.find_iter(&source) {
            record.tags.insert(found.as_str().to_owned());
        }
        Some(record)
    }
}

/// Strip tag tokens from the visual text and collapse whitespace.
struct TidyText;

impl Modifier for TidyText {
    fn name(&self) -> &'static str {
        "tidy_text"
    }

    fn apply(&self, mut record: TaskRecord) -> Option<TaskRecord> {
        let stripped = TAG_TOKEN.replace_all(&record.visual, "");
        record.visual = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(record)
    }
}

static WIKI_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(?P<target>[^\]|]+?)(?:\|(?P<display>[^\]]+?))?\]\]")
        .unwrap_or_else(|err| unreachable!("wiki link pattern must compile: {err}"))
});

static MD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<display>[^\]]+)\]\((?P<target>[^)\s]+)\)")
        .unwrap_or_else(|err| unreachable!("markdown link pattern must compile: {err}"))
});

/// Replace link syntax with its display text and record missing targets.
struct AnnotateLinks;

impl Modifier for AnnotateLinks {
    fn name(&self) -> &'static str {
        "annotate_links"
    }

    fn apply(&self, mut record: TaskRecord) -> Option<TaskRecord> {
        let source = record.visual.clone();
        for captures in WIKI_LINK
            .captures_iter(&source)
            .chain(MD_LINK.captures_iter(&source))
        {
            let Some(target) = captures.name("target").map(|m| m.as_str()) else {
                continue;
            };
            if !record.links.iter().any(|link| link.target == target) {
                record.links.push(LinkRef {
                    target: target.to_owned(),
                    display: captures.name("display").map(|m| m.as_str().to_owned()),
                });
            }
        }
        let replaced = WIKI_LINK.replace_all(&source, |captures: &regex::Captures<'_>| {
            captures
                .name("display")
                .or_else(|| captures.name("target"))
                .map_or(String::new(), |m| m.as_str().to_owned())
        });
        let replaced = MD_LINK.replace_all(&replaced, |captures: &regex::Captures<'_>| {
            captures
                .name("display")
                .map_or(String::new(), |m| m.as_str().to_owned())
        });
        record.visual = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(record)
    }
}

/// Stamp synthetic dates so dateless and overdue tasks surface in a
/// current view instead of vanishing.
struct ForwardDates {
    today: Date,
}

impl Modifier for ForwardDates {
    fn name(&self) -> &'static str {
        "forward_dates"
    }

    fn apply(&self, mut record: TaskRecord) -> Option<TaskRecord> {
        if record.dates.is_empty() {
            if record.fully_completed {
                record.dates.insert(DateKind::Done, self.today);
            } else {
                record.dates.insert(DateKind::Unplanned, self.today);
            }
        }
        if !record.fully_completed {
            if let Some(due) = record.date(DateKind::Due) {
                if due < self.today {
                    record.dates.insert(DateKind::Overdue, self.today);
                }
            }
        }
        Some(record)
    }
}

/// Map the status to its numeric ordering key.
struct StatusOrder {
    order: Vec<TaskStatus>,
    today: Date,
}

impl Modifier for StatusOrder {
    fn name(&self) -> &'static str {
        "status_order"
    }

    fn apply(&self, mut record: TaskRecord) -> Option<TaskRecord> {
        record.status = record.derive_status(self.today);
        record.order = self
            .order
            .iter()
            .position(|status| *status == record.status)
            .and_then(|index| i64::try_from(index).ok())
            .unwrap_or_else(|| i64::try_from(self.order.len()).unwrap_or(i64::MAX));
        Some(record)
    }
}

// --- filters ---------------------------------------------------------------

/// Hide tasks whose marker or mapped status is in the hidden set.
struct HiddenStatus {
    hidden: BTreeSet<String>,
}

impl Gate for HiddenStatus {
    fn keep(&self, record: &TaskRecord) -> bool {
        !(self.hidden.contains(record.marker.to_string().as_str())
            || self.hidden.contains(record.status.as_str()))
    }
}

/// Keep only tasks carrying at least one of the required tags.
struct RequireTags {
    tags: BTreeSet<String>,
}

impl Gate for RequireTags {
    fn keep(&self, record: &TaskRecord) -> bool {
        self.tags.is_empty() || record.tags.iter().any(|tag| self.tags.contains(tag))
    }
}

/// Drop tasks carrying any of the excluded tags.
struct ExcludeTags {
    tags: BTreeSet<String>,
}

impl Gate for ExcludeTags {
    fn keep(&self, record: &TaskRecord) -> bool {
        !record.tags.iter().any(|tag| self.tags.contains(tag))
    }
}

/// Drop tasks whose visual text ended up blank.
struct NonEmpty;

impl Gate for NonEmpty {
    fn keep(&self, record: &TaskRecord) -> bool {
        !record.visual.trim().is_empty()
    }
}

// --- sorting ---------------------------------------------------------------

/// Fields a sort specification may order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// The numeric ordering key assigned from the status-priority list.
    Order,
    /// A named date.
    Date(DateKind),
    /// Task priority, most urgent first.
    Priority,
    /// Derived status.
    Status,
    /// Visual text, lexicographic.
    Text,
    /// Owning note path.
    Path,
    /// Source line.
    Line,
}

/// One parsed sort specification: field plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    /// Field to order by.
    pub field: SortField,
    /// Whether the direction is descending.
    pub descending: bool,
}

/// Errors raised while parsing a sort specification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SortSpecError {
    /// The specification was blank.
    #[error("empty sort specification")]
    Empty,
    /// The field token is not part of the closed field set.
    #[error("unknown sort field: {0}")]
    UnknownField(String),
    /// The direction token is neither `asc` nor `desc`.
    #[error("unknown sort direction: {0}")]
    UnknownDirection(String),
}

impl FromStr for SortSpec {
    type Err = SortSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let field = tokens.next().ok_or(SortSpecError::Empty)?;
        let field = match field.to_ascii_lowercase().as_str() {
            "order" => SortField::Order,
            "due" => SortField::Date(DateKind::Due),
            "scheduled" => SortField::Date(DateKind::Scheduled),
            "start" => SortField::Date(DateKind::Start),
            "done" => SortField::Date(DateKind::Done),
            "created" => SortField::Date(DateKind::Created),
            "priority" => SortField::Priority,
            "status" => SortField::Status,
            "text" => SortField::Text,
            "path" => SortField::Path,
            "line" => SortField::Line,
            other => return Err(SortSpecError::UnknownField(other.to_owned())),
        };
        let descending = match tokens.next() {
            None => false,
            Some(token) => match token.to_ascii_lowercase().as_str() {
                "asc" => false,
                "desc" => true,
                other => return Err(SortSpecError::UnknownDirection(other.to_owned())),
            },
        };
        Ok(Self { field, descending })
    }
}

/// Default order: ascending by ordering key, ties broken by identity.
#[must_use]
pub fn default_comparator() -> Comparator {
    build_comparator(SortSpec {
        field: SortField::Order,
        descending: false,
    })
}

/// Build the comparator for a parsed specification.
#[must_use]
pub fn build_comparator(spec: SortSpec) -> Comparator {
    Arc::new(move |a, b| {
        let ordering = compare_field(spec.field, a, b).then_with(|| a.key.cmp(&b.key));
        if spec.descending { ordering.reverse() } else { ordering }
    })
}

fn compare_field(field: SortField, a: &TaskRecord, b: &TaskRecord) -> Ordering {
    match field {
        SortField::Order => a.order.cmp(&b.order),
        SortField::Date(kind) => cmp_option(a.date(kind), b.date(kind)),
        SortField::Priority => cmp_option(a.priority, b.priority),
        SortField::Status => a.status.cmp(&b.status),
        SortField::Text => a.visual.cmp(&b.visual),
        SortField::Path => a.key.path.cmp(&b.key.path),
        SortField::Line => cmp_option(a.span.map(|s| s.line), b.span.map(|s| s.line)),
    }
}

/// Absent values sort last in ascending direction.
fn cmp_option<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Build and validate the comparator for a user-supplied source string.
///
/// A source that fails to parse, or whose comparator returns the wrong
/// sign on the canonical two-record probe, falls back to the default
/// comparator with a warning.
#[must_use]
pub fn comparator_from_source(source: Option<&str>) -> Comparator {
    let Some(source) = source else {
        return default_comparator();
    };
    match source.parse::<SortSpec>() {
        Ok(spec) => {
            let comparator = build_comparator(spec);
            if probe_accepts(&comparator, spec.descending) {
                comparator
            } else {
                warn!(sort = source, "sort comparator failed the probe, using default order");
                default_comparator()
            }
        }
        Err(err) => {
            warn!(sort = source, error = %err, "invalid sort specification, using default order");
            default_comparator()
        }
    }
}

/// Probe the comparator with two records of known relative order.
fn probe_accepts(comparator: &Comparator, descending: bool) -> bool {
    let (lesser, greater) = probe_records();
    let expected = if descending {
        Ordering::Greater
    } else {
        Ordering::Less
    };
    comparator(&lesser, &greater) == expected
}

/// Two synthetic records where the first precedes the second on every
/// sortable field in ascending direction.
fn probe_records() -> (TaskRecord, TaskRecord) {
    use taskmill_core::note::Span;
    use time::macros::date;

    let mut lesser = TaskRecord::new(ItemKey::new("a.md".into(), PosKey::Line(1)), "- [ ] alpha");
    lesser.visual = "alpha".into();
    lesser.order = 0;
    lesser.status = TaskStatus::Overdue;
    lesser.priority = Some(Priority::Highest);
    lesser.span = Some(Span::single(1));
    for kind in [
        DateKind::Due,
        DateKind::Scheduled,
        DateKind::Start,
        DateKind::Done,
        DateKind::Created,
    ] {
        lesser.dates.insert(kind, date!(2024 - 01 - 01));
    }

    let mut greater = TaskRecord::new(ItemKey::new("b.md".into(), PosKey::Line(2)), "- [ ] beta");
    greater.visual = "beta".into();
    greater.order = 1;
    greater.status = TaskStatus::Done;
    greater.priority = Some(Priority::Lowest);
    greater.span = Some(Span::single(2));
    for kind in [
        DateKind::Due,
        DateKind::Scheduled,
        DateKind::Start,
        DateKind::Done,
        DateKind::Created,
    ] {
        greater.dates.insert(kind, date!(2024 - 06 - 01));
    }

    (lesser, greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmill_core::note::{FrontMatter, Span};
    use taskmill_core::{LineContext, parse_line};
    use time::macros::date;

    /// Build a record the way the pipeline does: through the line parser.
    fn record(raw: &str) -> TaskRecord {
        let front_matter = FrontMatter::default();
        let ctx = LineContext {
            path: "a.md",
            span: Some(Span::single(0)),
            parent: None,
            section: None,
            front_matter: &front_matter,
            tags: &[],
            links: &[],
        };
        parse_line(raw, &ctx).expect("test line must parse")
    }

    fn today() -> Date {
        date!(2026 - 08 - 06)
    }

    fn run(options: &ExtractOptions, record: TaskRecord) -> Option<TaskRecord> {
        TransformConfig::build(options, today()).run(record)
    }

    #[test]
    fn emoji_fields_extract_dates_priority_and_recurrence() {
        let options = ExtractOptions::default();
        let rec = record("- [ ] ship 🛫 2026-08-01 📅 2026-08-10 ⏫ 🔁 every week");
        let out = run(&options, rec).expect("record kept");
        assert_eq!(out.date(DateKind::Start), Some(date!(2026 - 08 - 01)));
        assert_eq!(out.date(DateKind::Due), Some(date!(2026 - 08 - 10)));
        assert_eq!(out.priority, Some(Priority::High));
        assert_eq!(out.recurrence.as_deref(), Some("every week"));
        assert_eq!(out.visual, "ship");
    }

    #[test]
    fn bracket_fields_extract_and_strip_known_keys() {
        let options = ExtractOptions::default();
        let rec = record("- [ ] review [due:: 2026-09-01] (priority:: low) [owner:: sam]");
        let out = run(&options, rec).expect("record kept");
        assert_eq!(out.date(DateKind::Due), Some(date!(2026 - 09 - 01)));
        assert_eq!(out.priority, Some(Priority::Low));
        // Unknown fields stay in the text.
        assert_eq!(out.visual, "review [owner:: sam]");
    }

    #[test]
    fn daily_note_date_fills_only_unplanned_tasks() {
        let options = ExtractOptions {
            daily_note_format: Some("[year]-[month]-[day]".into()),
            ..ExtractOptions::default()
        };
        let config = TransformConfig::build(&options, today());

        let mut rec = record("- [ ] from daily note");
        rec.key = ItemKey::new("journal/2026-08-04.md".into(), PosKey::Line(0));
        let out = config.run(rec).expect("record kept");
        assert_eq!(out.date(DateKind::Due), Some(date!(2026 - 08 - 04)));

        // An explicit date wins over the note name.
        let mut rec = record("- [ ] planned 📅 2026-08-10");
        rec.key = ItemKey::new("journal/2026-08-04.md".into(), PosKey::Line(1));
        let out = config.run(rec).expect("record kept");
        assert_eq!(out.date(DateKind::Due), Some(date!(2026 - 08 - 10)));
    }

    #[test]
    fn invalid_daily_note_format_disables_the_modifier() {
        let options = ExtractOptions {
            daily_note_format: Some("[bogus".into()),
            ..ExtractOptions::default()
        };
        let config = TransformConfig::build(&options, today());
        let mut rec = record("- [ ] text");
        rec.key = ItemKey::new("2026-08-04.md".into(), PosKey::Line(0));
        let out = config.run(rec).expect("record kept");
        assert_eq!(out.date(DateKind::Due), None);
    }

    #[test]
    fn tags_are_extracted_then_stripped_from_visual() {
        let options = ExtractOptions::default();
        let out = run(&options, record("- [ ] buy milk #todo"))
            .expect("record kept");
        assert!(out.tags.contains("#todo"));
        assert_eq!(out.visual, "buy milk");
    }

    #[test]
    fn links_are_annotated_and_replaced_by_display_text() {
        let options = ExtractOptions::default();
        let out = run(
            &options,
            record("- [ ] read [[Roadmap|the roadmap]] and [docs](https://example.invalid)"),
        )
        .expect("record kept");
        assert_eq!(out.visual, "read the roadmap and docs");
        let targets: Vec<&str> = out.links.iter().map(|l| l.target.as_str()).collect();
        assert_eq!(targets, vec!["Roadmap", "https://example.invalid"]);
    }

    #[test]
    fn forward_stamps_dateless_and_overdue_tasks() {
        let options = ExtractOptions {
            forward_dates: true,
            ..ExtractOptions::default()
        };

        let open = run(&options, record("- [ ] someday")).expect("record kept");
        assert_eq!(open.date(DateKind::Unplanned), Some(today()));
        assert_eq!(open.date(DateKind::Done), None);

        let done = run(&options, record("- [x] archived")).expect("record kept");
        assert_eq!(done.date(DateKind::Done), Some(today()));
        assert_eq!(done.date(DateKind::Unplanned), None);

        let late = run(
            &options,
            record("- [ ] slipped 📅 2026-08-01"),
        )
        .expect("record kept");
        assert_eq!(late.date(DateKind::Overdue), Some(today()));

        // Completed tasks never receive the overdue stamp.
        let finished = run(
            &options,
            record("- [x] shipped 📅 2026-08-01"),
        )
        .expect("record kept");
        assert_eq!(finished.date(DateKind::Overdue), None);
    }

    #[test]
    fn status_order_assigns_keys_from_the_configured_list() {
        let options = ExtractOptions {
            status_order: vec!["done".into(), "unplanned".into()],
            ..ExtractOptions::default()
        };
        let done = run(&options, record("- [x] done")).expect("record kept");
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(done.order, 0);

        let open = run(&options, record("- [ ] open")).expect("record kept");
        assert_eq!(open.status, TaskStatus::Unplanned);
        assert_eq!(open.order, 1);

        // A status missing from the list sorts after every listed one.
        let cancelled = run(&options, record("- [-] gone")).expect("record kept");
        assert_eq!(cancelled.order, 2);
    }

    #[test]
    fn hidden_status_matches_marker_and_status_name() {
        let by_marker = ExtractOptions {
            hide_status: vec!["x".into()],
            ..ExtractOptions::default()
        };
        assert!(run(&by_marker, record("- [x] done")).is_none());
        assert!(run(&by_marker, record("- [ ] open")).is_some());

        let by_name = ExtractOptions {
            hide_status: vec!["cancelled".into()],
            ..ExtractOptions::default()
        };
        assert!(run(&by_name, record("- [-] gone")).is_none());
    }

    #[test]
    fn tag_filters_include_and_exclude() {
        let include = ExtractOptions {
            include_tags_enabled: true,
            include_tags: vec!["#work".into()],
            ..ExtractOptions::default()
        };
        assert!(run(&include, record("- [ ] a #work")).is_some());
        assert!(run(&include, record("- [ ] b #home")).is_none());

        let exclude = ExtractOptions {
            exclude_tags_enabled: true,
            // Normalization adds the missing '#'.
            exclude_tags: vec!["home".into()],
            ..ExtractOptions::default()
        };
        assert!(run(&exclude, record("- [ ] b #home")).is_none());
        assert!(run(&exclude, record("- [ ] a #work")).is_some());
    }

    #[test]
    fn empty_filter_drops_blank_visual_text() {
        let options = ExtractOptions {
            filter_empty: true,
            ..ExtractOptions::default()
        };
        assert!(run(&options, record("- [ ] #only-tags")).is_none());
        assert!(run(&options, record("- [ ] real text")).is_some());
    }

    #[test]
    fn filters_are_monotonic() {
        let records = || {
            vec![
                record("- [ ] a #work"),
                record("- [ ] b #home"),
                record("- [x] c #work"),
                record("- [ ] #tagonly"),
            ]
        };
        let count = |options: &ExtractOptions| {
            records()
                .into_iter()
                .filter(|rec| run(options, rec.clone()).is_some())
                .count()
        };

        let base = ExtractOptions::default();
        let baseline = count(&base);
        for tightened in [
            ExtractOptions {
                hide_status: vec!["x".into()],
                ..base.clone()
            },
            ExtractOptions {
                include_tags_enabled: true,
                include_tags: vec!["#work".into()],
                ..base.clone()
            },
            ExtractOptions {
                exclude_tags_enabled: true,
                exclude_tags: vec!["#home".into()],
                ..base.clone()
            },
            ExtractOptions {
                filter_empty: true,
                ..base.clone()
            },
        ] {
            assert!(count(&tightened) <= baseline);
        }
    }

    #[test]
    fn sort_spec_parses_field_and_direction() {
        assert_eq!(
            "due desc".parse::<SortSpec>(),
            Ok(SortSpec {
                field: SortField::Date(DateKind::Due),
                descending: true
            })
        );
        assert_eq!(
            "order".parse::<SortSpec>(),
            Ok(SortSpec {
                field: SortField::Order,
                descending: false
            })
        );
        assert_eq!(
            "bogus".parse::<SortSpec>(),
            Err(SortSpecError::UnknownField("bogus".into()))
        );
        assert_eq!(
            "due sideways".parse::<SortSpec>(),
            Err(SortSpecError::UnknownDirection("sideways".into()))
        );
    }

    #[test]
    fn probe_rejects_wrong_sign_comparators() {
        let inverted: Comparator = Arc::new(|_, _| Ordering::Greater);
        assert!(!probe_accepts(&inverted, false));

        let constant: Comparator = Arc::new(|_, _| Ordering::Equal);
        assert!(!probe_accepts(&constant, false));

        assert!(probe_accepts(&default_comparator(), false));
        let descending = build_comparator(SortSpec {
            field: SortField::Order,
            descending: true,
        });
        assert!(probe_accepts(&descending, true));
    }

    #[test]
    fn invalid_sort_source_falls_back_to_default_order() {
        let comparator = comparator_from_source(Some("not-a-field"));
        let (lesser, greater) = probe_records();
        assert_eq!(comparator(&lesser, &greater), Ordering::Less);
    }

    #[test]
    fn configured_sort_orders_records() {
        let options = ExtractOptions {
            sort: Some("text desc".into()),
            ..ExtractOptions::default()
        };
        let config = TransformConfig::build(&options, today());
        let comparator = config.comparator();
        let (lesser, greater) = probe_records();
        assert_eq!(comparator(&lesser, &greater), Ordering::Greater);
    }
}
