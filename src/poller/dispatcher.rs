//! User intents: mark read, mark all read, open.
//!
//! Actions run beside the poll cycle without touching it. A poll that lands
//! after a mark-read may briefly bring the item back; the next poll settles it.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::api::{ApiError, GitHubApi};
use crate::config::ConfigSnapshot;
use crate::domain::NotificationItem;
use crate::sink::UrlLauncher;
use crate::store::NotificationStore;

#[derive(Debug)]
pub enum ActionOutcome {
    MarkedOne {
        id: String,
        result: Result<(), ApiError>,
    },
    MarkedAll {
        result: Result<(), ApiError>,
    },
    Resolved {
        url: String,
    },
}

/// Finished action, tagged with the session it was started in.
#[derive(Debug)]
pub struct ActionCompletion {
    pub session: u64,
    pub outcome: ActionOutcome,
}

/// What applying a completion did.
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchEffect {
    StoreChanged,
    Failed(String),
    Launched,
    Discarded,
}

pub struct ActionDispatcher {
    api: GitHubApi,
    pending_marks: HashSet<String>,
    mark_all_pending: bool,
}

impl ActionDispatcher {
    pub fn new(api: GitHubApi) -> Self {
        Self {
            api,
            pending_marks: HashSet::new(),
            mark_all_pending: false,
        }
    }

    /// Start a mark-read for `id`, unless one is already running.
    pub fn mark_one(
        &mut self,
        session: u64,
        config: Arc<ConfigSnapshot>,
        id: String,
    ) -> Option<BoxFuture<'static, ActionCompletion>> {
        if !self.pending_marks.insert(id.clone()) {
            debug!("Mark-read for {} already in flight", id);
            return None;
        }

        let api = self.api.clone();
        Some(
            async move {
                let result = api.mark_one_read(&config, &id).await;
                ActionCompletion {
                    session,
                    outcome: ActionOutcome::MarkedOne { id, result },
                }
            }
            .boxed(),
        )
    }

    pub fn mark_all(
        &mut self,
        session: u64,
        config: Arc<ConfigSnapshot>,
    ) -> Option<BoxFuture<'static, ActionCompletion>> {
        if self.mark_all_pending {
            debug!("Mark-all-read already in flight");
            return None;
        }
        self.mark_all_pending = true;

        let api = self.api.clone();
        Some(
            async move {
                let result = api.mark_all_read(&config).await;
                ActionCompletion {
                    session,
                    outcome: ActionOutcome::MarkedAll { result },
                }
            }
            .boxed(),
        )
    }

    pub fn open(
        &self,
        session: u64,
        config: Arc<ConfigSnapshot>,
        item: NotificationItem,
    ) -> BoxFuture<'static, ActionCompletion> {
        let api = self.api.clone();
        async move {
            let url = api.resolve_open_url(&config, &item).await;
            ActionCompletion {
                session,
                outcome: ActionOutcome::Resolved { url },
            }
        }
        .boxed()
    }

    /// Apply a finished action. `live` is false when the session that
    /// started it has ended; such results only release bookkeeping.
    pub fn apply(
        &mut self,
        completion: ActionCompletion,
        live: bool,
        store: &mut NotificationStore,
        launcher: &dyn UrlLauncher,
    ) -> DispatchEffect {
        match completion.outcome {
            ActionOutcome::MarkedOne { id, result } => {
                self.pending_marks.remove(&id);
                if !live {
                    return DispatchEffect::Discarded;
                }
                match result {
                    Ok(()) => {
                        let count = store.remove_by_id(&id);
                        info!(remaining = count, "Marked {} as read", id);
                        DispatchEffect::StoreChanged
                    }
                    Err(e) => {
                        warn!("Failed to mark {} as read: {}", id, e);
                        DispatchEffect::Failed(format!("Could not mark {} as read: {}", id, e))
                    }
                }
            }
            ActionOutcome::MarkedAll { result } => {
                self.mark_all_pending = false;
                if !live {
                    return DispatchEffect::Discarded;
                }
                match result {
                    Ok(()) => {
                        store.clear();
                        info!("Marked all notifications as read");
                        DispatchEffect::StoreChanged
                    }
                    Err(e) => {
                        warn!("Failed to mark all as read: {}", e);
                        DispatchEffect::Failed(format!("Could not mark all as read: {}", e))
                    }
                }
            }
            ActionOutcome::Resolved { url } => {
                if !live {
                    return DispatchEffect::Discarded;
                }
                debug!("Opening {}", url);
                launcher.launch(&url);
                DispatchEffect::Launched
            }
        }
    }
}
