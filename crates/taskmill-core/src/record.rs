use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::Date;

use crate::key::ItemKey;
use crate::note::{FrontMatter, Span};
use crate::status::{Priority, TaskStatus};

/// Kind of a named date attached to a task.
///
/// The first five come from explicit syntax in the task line; `unplanned`
/// and the synthetic `overdue`/`done` stamps are written by the forward
/// modifier so dateless tasks still surface in dated views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateKind {
    /// Deadline of the task.
    Due,
    /// Date the task is scheduled for.
    Scheduled,
    /// Earliest date work can start.
    Start,
    /// Date the task was completed.
    Done,
    /// Date the task was created.
    Created,
    /// Synthetic stamp for tasks without any planning date.
    Unplanned,
    /// Synthetic stamp carrying an overdue task into the current view.
    Overdue,
}

impl DateKind {
    /// String representation used in configuration files and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Scheduled => "scheduled",
            Self::Start => "start",
            Self::Done => "done",
            Self::Created => "created",
            Self::Unplanned => "unplanned",
            Self::Overdue => "overdue",
        }
    }
}

/// One outgoing link carried by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    /// Link target (wiki page name or URL).
    pub target: String,
    /// Display text, when the link carries one.
    pub display: Option<String>,
}

/// Structured representation of one parsed task line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Stable identity: note path plus structural position.
    pub key: ItemKey,
    /// Raw line text as read from the note.
    pub raw: String,
    /// Markdown-stripped description, progressively cleaned by modifiers.
    pub visual: String,
    /// Status derived from marker and dates; `Unplanned` until the
    /// ordering modifier runs.
    pub status: TaskStatus,
    /// Status marker character taken verbatim from inside the brackets.
    pub marker: char,
    /// Tags attached to the task, each with a leading `#`.
    pub tags: BTreeSet<String>,
    /// Named dates, explicit and synthetic.
    pub dates: BTreeMap<DateKind, Date>,
    /// Priority, when any syntax declared one.
    pub priority: Option<Priority>,
    /// Recurrence rule text, when any syntax declared one.
    pub recurrence: Option<String>,
    /// Outgoing links on the task line.
    pub links: Vec<LinkRef>,
    /// Text of the heading the task sits under.
    pub section: Option<String>,
    /// Front matter of the owning note.
    pub front_matter: FrontMatter,
    /// Source span of the task line, when known.
    pub span: Option<Span>,
    /// Trailing block reference (`^id`), stripped from the visual text.
    pub block_id: Option<String>,
    /// Numeric ordering key assigned from the status-priority list.
    pub order: i64,
    /// Whether the line is a real task (always true for parser output).
    pub is_task: bool,
    /// Whether the body after the marker is non-empty.
    pub checked: bool,
    /// Whether the marker is `x` or `X`.
    pub completed: bool,
    /// Whether the marker is anything other than a plain space.
    pub fully_completed: bool,
}

impl TaskRecord {
    /// A minimal record with the given identity and raw text; every other
    /// field starts at its neutral value.
    #[must_use]
    pub fn new(key: ItemKey, raw: impl Into<String>) -> Self {
        Self {
            key,
            raw: raw.into(),
            visual: String::new(),
            status: TaskStatus::Unplanned,
            marker: ' ',
            tags: BTreeSet::new(),
            dates: BTreeMap::new(),
            priority: None,
            recurrence: None,
            links: Vec::new(),
            section: None,
            front_matter: FrontMatter::default(),
            span: None,
            block_id: None,
            order: 0,
            is_task: true,
            checked: false,
            completed: false,
            fully_completed: false,
        }
    }

    /// Look up a named date.
    #[must_use]
    pub fn date(&self, kind: DateKind) -> Option<Date> {
        self.dates.get(&kind).copied()
    }

    /// Whether the task carries an explicit planning date (due, scheduled
    /// or start). Synthetic stamps do not count.
    #[must_use]
    pub fn has_planning_date(&self) -> bool {
        [DateKind::Due, DateKind::Scheduled, DateKind::Start]
            .iter()
            .any(|kind| self.dates.contains_key(kind))
    }

    /// Derive the status from marker, dates and the current date.
    ///
    /// The marker wins for done/cancelled/in-progress; otherwise the due
    /// date classifies past/today/future, then scheduled and start dates,
    /// and a task with no signal at all is unplanned.
    #[must_use]
    pub fn derive_status(&self, today: Date) -> TaskStatus {
        match self.marker {
            'x' | 'X' => return TaskStatus::Done,
            '-' => return TaskStatus::Cancelled,
            '/' => return TaskStatus::InProgress,
            _ => {}
        }
        if let Some(due) = self.date(DateKind::Due) {
            return match due.cmp(&today) {
                std::cmp::Ordering::Less => TaskStatus::Overdue,
                std::cmp::Ordering::Equal => TaskStatus::Due,
                std::cmp::Ordering::Greater => TaskStatus::Scheduled,
            };
        }
        if self.dates.contains_key(&DateKind::Scheduled) {
            return TaskStatus::Scheduled;
        }
        if self.dates.contains_key(&DateKind::Start) {
            return TaskStatus::Start;
        }
        TaskStatus::Unplanned
    }
}
