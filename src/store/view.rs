use std::sync::Arc;
use std::time::Duration;

use crate::config::GroupBy;
use crate::domain::NotificationItem;

/// Health of the last list fetch, as shown next to the count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InboxStatus {
    /// No fetch has completed yet.
    #[default]
    Unknown,
    Ok,
    /// The server rejected the token.
    AuthBroken,
    /// The last fetch failed for another reason.
    Failing,
}

/// Read-only snapshot published to consumers after every observable change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboxView {
    pub items: Arc<Vec<NotificationItem>>,
    pub status: InboxStatus,
    pub retry_count: u32,
    pub next_poll_in: Option<Duration>,
    pub group_by: GroupBy,
    pub last_action_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationGroup<'a> {
    pub label: String,
    pub items: Vec<&'a NotificationItem>,
}

impl InboxView {
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Text for the count indicator; `!` while the token is rejected.
    pub fn count_label(&self) -> String {
        match self.status {
            InboxStatus::AuthBroken => "!".to_string(),
            _ => self.count().to_string(),
        }
    }

    /// Items grouped per [`GroupBy`]. Groups appear in the order their first
    /// item appears; items keep API order inside a group.
    pub fn groups(&self) -> Vec<NotificationGroup<'_>> {
        let mut groups: Vec<NotificationGroup<'_>> = Vec::new();

        for item in self.items.iter() {
            let label = match self.group_by {
                GroupBy::None => String::new(),
                GroupBy::Repository => item.repository.clone(),
                GroupBy::Type => item.subject_type.label().to_string(),
                GroupBy::Reason => item.reason.label().to_string(),
            };

            match groups.iter_mut().find(|g| g.label == label) {
                Some(group) => group.items.push(item),
                None => groups.push(NotificationGroup {
                    label,
                    items: vec![item],
                }),
            }
        }

        groups
    }
}
