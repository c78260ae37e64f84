use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unread thread in the inbox.
///
/// Items are never edited in place: every successful list fetch replaces
/// the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: String,
    pub repository: String,
    pub title: String,
    pub subject_type: SubjectType,
    pub reason: Reason,
    /// API URL of the subject; only used to derive a browser URL.
    pub subject_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationItem {
    pub fn is_release(&self) -> bool {
        self.subject_type == SubjectType::Release
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectType {
    PullRequest,
    Issue,
    Commit,
    Release,
    #[serde(other)]
    Other,
}

impl SubjectType {
    pub fn label(self) -> &'static str {
        match self {
            SubjectType::PullRequest => "Pull request",
            SubjectType::Issue => "Issue",
            SubjectType::Commit => "Commit",
            SubjectType::Release => "Release",
            SubjectType::Other => "Other",
        }
    }
}

/// Why the thread is in the inbox, as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Mention,
    #[serde(rename = "assign")]
    Assigned,
    ReviewRequested,
    Subscribed,
    Author,
    Comment,
    CiActivity,
    Invitation,
    Manual,
    SecurityAlert,
    StateChange,
    TeamMention,
    #[serde(other)]
    Other,
}

impl Reason {
    pub fn label(self) -> &'static str {
        match self {
            Reason::Mention => "mention",
            Reason::Assigned => "assigned",
            Reason::ReviewRequested => "review requested",
            Reason::Subscribed => "subscribed",
            Reason::Author => "author",
            Reason::Comment => "comment",
            Reason::CiActivity => "ci activity",
            Reason::Invitation => "invitation",
            Reason::Manual => "manual",
            Reason::SecurityAlert => "security alert",
            Reason::StateChange => "state change",
            Reason::TeamMention => "team mention",
            Reason::Other => "other",
        }
    }
}
