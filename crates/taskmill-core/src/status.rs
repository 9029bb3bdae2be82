use serde::{Deserialize, Serialize};

/// Classification of a task after the marker and dates have been combined.
///
/// Declaration order doubles as the default sort order of the `status`
/// sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is overdue: its due date lies in the past.
    Overdue,
    /// Task is due today.
    Due,
    /// Task is scheduled for a future date.
    Scheduled,
    /// Task has a start date but nothing else planned.
    Start,
    /// Task is actively being worked on.
    InProgress,
    /// Task carries no planning information yet.
    Unplanned,
    /// Task is completed.
    Done,
    /// Task is cancelled.
    Cancelled,
}

impl TaskStatus {
    /// String representation used in configuration files and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Due => "due",
            Self::Scheduled => "scheduled",
            Self::Start => "start",
            Self::InProgress => "in_progress",
            Self::Unplanned => "unplanned",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// Map a user-facing token to a status, accepting the common aliases.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "overdue" => Some(Self::Overdue),
            "due" => Some(Self::Due),
            "scheduled" => Some(Self::Scheduled),
            "start" => Some(Self::Start),
            "in_progress" | "inprogress" | "process" => Some(Self::InProgress),
            "unplanned" | "todo" => Some(Self::Unplanned),
            "done" => Some(Self::Done),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Task priority, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Above everything else.
    Highest,
    /// High priority.
    High,
    /// Medium priority.
    Medium,
    /// Low priority.
    Low,
    /// Below everything else.
    Lowest,
}

impl Priority {
    /// String representation used in configuration files and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Highest => "highest",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Lowest => "lowest",
        }
    }

    /// Map a user-facing token to a priority.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "highest" => Some(Self::Highest),
            "high" => Some(Self::High),
            "medium" | "normal" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "lowest" => Some(Self::Lowest),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tokens_accept_aliases() {
        assert_eq!(TaskStatus::from_token("todo"), Some(TaskStatus::Unplanned));
        assert_eq!(TaskStatus::from_token("In-Progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::from_token("process"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::from_token("canceled"), Some(TaskStatus::Cancelled));
        assert_eq!(TaskStatus::from_token("bogus"), None);
    }

    #[test]
    fn priority_orders_most_urgent_first() {
        assert!(Priority::Highest < Priority::High);
        assert!(Priority::High < Priority::Low);
        assert_eq!(Priority::from_token("NORMAL"), Some(Priority::Medium));
    }
}
