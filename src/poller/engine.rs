use std::future::pending;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::api::{ApiError, GitHubApi, ListPage};
use crate::app::{GhNotifyError, Result};
use crate::config::{Config, ConfigSnapshot};
use crate::poller::dispatcher::{ActionCompletion, ActionDispatcher, DispatchEffect};
use crate::poller::scheduler::{FetchTicket, PollScheduler};
use crate::sink::{AlertEvent, AlertSink, UrlLauncher};
use crate::store::{InboxStatus, InboxView, NotificationStore};

const COMMAND_BUFFER: usize = 32;

/// Messages accepted by the engine
#[derive(Debug)]
pub enum Command {
    Enable,
    Disable,
    Refresh,
    MarkRead(String),
    MarkAllRead,
    Open(String),
    ConfigChanged(Arc<ConfigSnapshot>),
    Shutdown,
}

enum Completion {
    List {
        ticket: FetchTicket,
        result: std::result::Result<ListPage, ApiError>,
    },
    Action(ActionCompletion),
}

/// Handle to send intents to a running engine and watch its state
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
    view: watch::Receiver<InboxView>,
}

impl EngineHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| GhNotifyError::EngineGone)
    }

    pub async fn enable(&self) -> Result<()> {
        self.send(Command::Enable).await
    }

    pub async fn disable(&self) -> Result<()> {
        self.send(Command::Disable).await
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(Command::Refresh).await
    }

    pub async fn mark_read(&self, id: impl Into<String>) -> Result<()> {
        self.send(Command::MarkRead(id.into())).await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.send(Command::MarkAllRead).await
    }

    pub async fn open(&self, id: impl Into<String>) -> Result<()> {
        self.send(Command::Open(id.into())).await
    }

    pub async fn config_changed(&self, config: Arc<ConfigSnapshot>) -> Result<()> {
        self.send(Command::ConfigChanged(config)).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    /// Latest published view.
    pub fn view(&self) -> InboxView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InboxView> {
        self.view.clone()
    }
}

/// Poll scheduler, store and dispatcher driven from a single task.
///
/// Network calls run as futures polled by this same task, so every store
/// mutation happens between two awaits and is never interleaved with
/// another.
pub struct Engine {
    scheduler: PollScheduler,
    store: NotificationStore,
    dispatcher: ActionDispatcher,
    api: GitHubApi,
    config: Arc<ConfigSnapshot>,
    status: InboxStatus,
    last_action_error: Option<String>,
    alerts: Box<dyn AlertSink + Send>,
    launcher: Box<dyn UrlLauncher + Send>,
    commands: mpsc::Receiver<Command>,
    view_tx: watch::Sender<InboxView>,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl Engine {
    /// Create an engine and the handle to talk to it
    pub fn new(
        api: GitHubApi,
        config: Arc<ConfigSnapshot>,
        alerts: Box<dyn AlertSink + Send>,
        launcher: Box<dyn UrlLauncher + Send>,
    ) -> (Self, EngineHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (view_tx, view) = watch::channel(InboxView {
            group_by: config.group_by,
            ..InboxView::default()
        });

        let engine = Self {
            scheduler: PollScheduler::new(),
            store: NotificationStore::new(),
            dispatcher: ActionDispatcher::new(api.clone()),
            api,
            config,
            status: InboxStatus::Unknown,
            last_action_error: None,
            alerts,
            launcher,
            commands,
            view_tx,
            in_flight: FuturesUnordered::new(),
        };

        (engine, EngineHandle { tx, view })
    }

    /// Run until [`Command::Shutdown`] or until every handle is dropped.
    pub async fn run(mut self) {
        info!("Notification engine started");

        loop {
            let deadline = self.scheduler.timer().map(|t| t.deadline);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.handle_completion(completion);
                }
                _ = wait_for_deadline(deadline), if deadline.is_some() => {
                    self.handle_timer();
                }
            }
        }

        self.scheduler.disable();
        info!("Notification engine stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Enable => {
                if let Some(ticket) = self.scheduler.enable() {
                    info!("Polling enabled");
                    self.start_fetch(ticket);
                    self.publish();
                }
            }
            Command::Disable => {
                if self.scheduler.is_enabled() {
                    self.scheduler.disable();
                    info!("Polling disabled");
                    self.publish();
                }
            }
            Command::Refresh => match self.scheduler.refresh_now() {
                Some(ticket) => {
                    self.start_fetch(ticket);
                    self.publish();
                }
                None => debug!("Refresh ignored ({:?})", self.scheduler.phase()),
            },
            Command::MarkRead(id) => {
                if !self.scheduler.is_enabled() {
                    warn!("Ignoring mark-read for {} while polling is disabled", id);
                    return;
                }
                let session = self.scheduler.session();
                if let Some(action) = self.dispatcher.mark_one(session, self.config.clone(), id) {
                    self.in_flight.push(action.map(Completion::Action).boxed());
                }
            }
            Command::MarkAllRead => {
                if !self.scheduler.is_enabled() {
                    warn!("Ignoring mark-all-read while polling is disabled");
                    return;
                }
                let session = self.scheduler.session();
                if let Some(action) = self.dispatcher.mark_all(session, self.config.clone()) {
                    self.in_flight.push(action.map(Completion::Action).boxed());
                }
            }
            Command::Open(id) => {
                if !self.scheduler.is_enabled() {
                    warn!("Ignoring open for {} while polling is disabled", id);
                    return;
                }
                let Some(item) = self.store.get(&id).cloned() else {
                    warn!("Cannot open {}: not in the inbox", id);
                    return;
                };
                let action = self
                    .dispatcher
                    .open(self.scheduler.session(), self.config.clone(), item);
                self.in_flight.push(action.map(Completion::Action).boxed());
            }
            Command::ConfigChanged(config) => self.apply_config(config),
            Command::Shutdown => {}
        }
    }

    fn apply_config(&mut self, config: Arc<ConfigSnapshot>) {
        let changed = Config::diff(&self.config, &config);
        self.config = config;
        if changed.is_empty() {
            return;
        }

        let names: Vec<&str> = changed.iter().map(|k| k.as_str()).collect();
        info!(keys = ?names, "Configuration changed");

        if changed.iter().any(|key| key.invalidates_fetch()) {
            if let Some(timer) = self.scheduler.config_changed(Instant::now()) {
                debug!(delay_secs = timer.delay.as_secs(), "Re-fetch scheduled after settings change");
            }
        }
        self.publish();
    }

    fn handle_timer(&mut self) {
        if let Some(ticket) = self.scheduler.on_timer(Instant::now()) {
            self.start_fetch(ticket);
            self.publish();
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::List { ticket, result } => {
                if !self.scheduler.is_current(ticket) {
                    debug!("Discarding result of superseded fetch");
                    return;
                }
                match result {
                    Ok(page) => self.reconcile(ticket, page),
                    Err(e) => self.record_failure(ticket, e),
                }
            }
            Completion::Action(action) => {
                let live = self.scheduler.is_enabled() && action.session == self.scheduler.session();
                match self
                    .dispatcher
                    .apply(action, live, &mut self.store, self.launcher.as_ref())
                {
                    DispatchEffect::StoreChanged => {
                        self.last_action_error = None;
                        self.publish();
                    }
                    DispatchEffect::Failed(message) => {
                        self.last_action_error = Some(message);
                        self.publish();
                    }
                    DispatchEffect::Launched | DispatchEffect::Discarded => {}
                }
            }
        }
    }

    /// Replace the store with a fetched list and alert when it grew.
    fn reconcile(&mut self, ticket: FetchTicket, page: ListPage) {
        let user_interval = self.config.refresh_interval_secs;
        let Some(timer) =
            self.scheduler
                .fetch_succeeded(ticket, page.poll_interval, user_interval, Instant::now())
        else {
            return;
        };

        let count = self.store.replace_all(page.items);
        let previous = self.store.previous_count();
        self.status = InboxStatus::Ok;

        info!(
            count,
            previous,
            next_poll_secs = timer.delay.as_secs(),
            "Fetched notifications"
        );

        if count > previous && self.config.show_alerts {
            self.alerts.alert(AlertEvent { count });
        }
        self.publish();
    }

    fn record_failure(&mut self, ticket: FetchTicket, error: ApiError) {
        let user_interval = self.config.refresh_interval_secs;
        let Some(timer) = self
            .scheduler
            .fetch_failed(ticket, user_interval, Instant::now())
        else {
            return;
        };

        // Only a successful fetch clears a rejected token.
        self.status = match error {
            ApiError::Unauthorized => InboxStatus::AuthBroken,
            _ if self.status == InboxStatus::AuthBroken => InboxStatus::AuthBroken,
            _ => InboxStatus::Failing,
        };

        warn!(
            retry = self.scheduler.retry_count(),
            delay_secs = timer.delay.as_secs(),
            "Fetching notifications failed: {}",
            error
        );
        self.publish();
    }

    fn start_fetch(&mut self, ticket: FetchTicket) {
        debug!("Fetching notifications");
        let api = self.api.clone();
        let config = self.config.clone();
        self.in_flight.push(
            async move {
                let result = api.list_notifications(&config).await;
                Completion::List { ticket, result }
            }
            .boxed(),
        );
    }

    fn publish(&self) {
        let view = InboxView {
            items: Arc::new(self.store.items().to_vec()),
            status: self.status,
            retry_count: self.scheduler.retry_count(),
            next_poll_in: self.scheduler.timer().map(|t| t.delay),
            group_by: self.config.group_by,
            last_action_error: self.last_action_error.clone(),
        };
        self.view_tx.send_replace(view);
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

/// Spawn the engine as a tokio task
pub fn spawn_engine(
    api: GitHubApi,
    config: Arc<ConfigSnapshot>,
    alerts: Box<dyn AlertSink + Send>,
    launcher: Box<dyn UrlLauncher + Send>,
) -> (EngineHandle, JoinHandle<()>) {
    let (engine, handle) = Engine::new(api, config, alerts, launcher);
    let task = tokio::spawn(engine.run());
    (handle, task)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::testing::{list_body, ScriptedHttp};
    use crate::config::{GroupBy, Secret};
    use crate::domain::SubjectType;
    use crate::http::{HttpResponse, Method};
    use crate::sink::testing::{RecordingAlerts, RecordingLauncher};

    struct Harness {
        http: Arc<ScriptedHttp>,
        alerts: RecordingAlerts,
        launcher: RecordingLauncher,
        handle: EngineHandle,
        view: watch::Receiver<InboxView>,
    }

    fn config() -> Arc<ConfigSnapshot> {
        Arc::new(ConfigSnapshot {
            token: Secret::new("tok"),
            ..ConfigSnapshot::default()
        })
    }

    fn start(config: Arc<ConfigSnapshot>) -> Harness {
        let http = Arc::new(ScriptedHttp::new());
        let alerts = RecordingAlerts::default();
        let launcher = RecordingLauncher::default();
        let (handle, _task) = spawn_engine(
            GitHubApi::new(http.clone()),
            config,
            Box::new(alerts.clone()),
            Box::new(launcher.clone()),
        );
        let view = handle.subscribe();
        Harness {
            http,
            alerts,
            launcher,
            handle,
            view,
        }
    }

    async fn wait_view(
        rx: &mut watch::Receiver<InboxView>,
        predicate: impl FnMut(&InboxView) -> bool,
    ) -> InboxView {
        tokio::time::timeout(Duration::from_secs(4 * 3600), rx.wait_for(predicate))
            .await
            .expect("view never matched")
            .expect("engine stopped")
            .clone()
    }

    async fn wait_requests(http: &ScriptedHttp, method: Method, count: usize) {
        while http.count(method) < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Let the engine drain its queue; paused time only advances once
    /// every task is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn ok_list(ids: &[&str]) -> std::result::Result<HttpResponse, crate::http::TransportError> {
        Ok(HttpResponse::new(200, list_body(ids)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_alerts_with_count() {
        let mut h = start(config());
        h.http.push_get(ok_list(&["1", "2"]));

        h.handle.enable().await.unwrap();
        let view = wait_view(&mut h.view, |v| v.status == InboxStatus::Ok).await;

        assert_eq!(view.count(), 2);
        assert_eq!(view.retry_count, 0);
        assert_eq!(view.next_poll_in, Some(Duration::from_secs(60)));
        assert_eq!(h.alerts.events(), vec![AlertEvent { count: 2 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_alert_when_count_does_not_grow() {
        let mut h = start(config());
        h.http.push_get(ok_list(&["1", "2"]));
        h.http.push_get(ok_list(&["2"]));

        h.handle.enable().await.unwrap();
        wait_view(&mut h.view, |v| v.count() == 2).await;
        let view = wait_view(&mut h.view, |v| v.count() == 1).await;

        assert_eq!(view.items[0].id, "2");
        assert_eq!(h.alerts.events(), vec![AlertEvent { count: 2 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alerts_disabled() {
        let mut h = start(Arc::new(ConfigSnapshot {
            show_alerts: false,
            ..(*config()).clone()
        }));
        h.http.push_get(ok_list(&["1"]));

        h.handle.enable().await.unwrap();
        wait_view(&mut h.view, |v| v.status == InboxStatus::Ok).await;
        assert!(h.alerts.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_marks_auth_broken_and_keeps_polling() {
        let mut h = start(config());
        h.http.push_get(Ok(HttpResponse::new(401, "")));
        h.http.push_get(ok_list(&["1"]));

        h.handle.enable().await.unwrap();
        let view = wait_view(&mut h.view, |v| v.status == InboxStatus::AuthBroken).await;
        assert_eq!(view.count(), 0);
        assert_eq!(view.retry_count, 1);
        assert_eq!(view.next_poll_in, Some(Duration::from_secs(60)));
        assert_eq!(view.count_label(), "!");

        let view = wait_view(&mut h.view, |v| v.status == InboxStatus::Ok).await;
        assert_eq!(view.count(), 1);
        assert_eq!(view.retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_broken_survives_later_failures() {
        let mut h = start(config());
        h.http.push_get(Ok(HttpResponse::new(401, "")));
        h.http
            .push_get(Err(crate::http::TransportError("connection reset".into())));
        h.http.push_get(Ok(HttpResponse::new(500, "")));
        h.http.push_get(ok_list(&["1"]));

        h.handle.enable().await.unwrap();
        for retry in 1..=3 {
            let view = wait_view(&mut h.view, |v| v.retry_count == retry).await;
            assert_eq!(view.status, InboxStatus::AuthBroken);
            assert_eq!(view.count_label(), "!");
        }

        let view = wait_view(&mut h.view, |v| v.status == InboxStatus::Ok).await;
        assert_eq!(view.count_label(), "1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_back_off() {
        let mut h = start(config());

        h.handle.enable().await.unwrap();
        let mut delays = Vec::new();
        for retry in 1..=3 {
            let view = wait_view(&mut h.view, |v| v.retry_count == retry).await;
            assert_eq!(view.status, InboxStatus::Failing);
            delays.push(view.next_poll_in.map(|d| d.as_secs()));
        }

        assert_eq!(delays, vec![Some(60), Some(120), Some(240)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_counts_as_failure() {
        let mut h = start(config());
        h.http.push_get(Ok(HttpResponse::new(200, r#"{"not":"a list"}"#)));

        h.handle.enable().await.unwrap();
        let view = wait_view(&mut h.view, |v| v.retry_count == 1).await;
        assert_eq!(view.status, InboxStatus::Failing);
        assert_eq!(view.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_teardown_is_dropped() {
        let h = start(config());
        let gate = h.http.push_gated_get();

        h.handle.enable().await.unwrap();
        wait_requests(&h.http, Method::Get, 1).await;
        h.handle.disable().await.unwrap();
        settle().await;

        gate.send(ok_list(&["1", "2"])).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;

        let view = h.handle.view();
        assert_eq!(view.count(), 0);
        assert_eq!(view.status, InboxStatus::Unknown);
        assert_eq!(view.next_poll_in, None);
        assert!(h.alerts.events().is_empty());
        assert_eq!(h.http.count(Method::Get), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_credentials_change_supersedes_in_flight_fetch() {
        let mut h = start(config());
        let gate = h.http.push_gated_get();
        h.http.push_get(ok_list(&["3"]));

        h.handle.enable().await.unwrap();
        wait_requests(&h.http, Method::Get, 1).await;

        let new_config = Arc::new(ConfigSnapshot {
            token: Secret::new("tok2"),
            ..(*config()).clone()
        });
        h.handle.config_changed(new_config).await.unwrap();
        settle().await;
        gate.send(ok_list(&["1", "2"])).unwrap();

        let view = wait_view(&mut h.view, |v| v.status == InboxStatus::Ok).await;
        let ids: Vec<&str> = view.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);

        let requests = h.http.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].header_value("authorization"), Some("Bearer tok2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_by_change_republishes_without_fetch() {
        let mut h = start(config());
        h.http.push_get(ok_list(&["1"]));

        h.handle.enable().await.unwrap();
        wait_view(&mut h.view, |v| v.status == InboxStatus::Ok).await;

        let new_config = Arc::new(ConfigSnapshot {
            group_by: GroupBy::Repository,
            ..(*config()).clone()
        });
        h.handle.config_changed(new_config).await.unwrap();
        let view = wait_view(&mut h.view, |v| v.group_by == GroupBy::Repository).await;

        assert_eq!(view.next_poll_in, Some(Duration::from_secs(60)));
        assert_eq!(h.http.count(Method::Get), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_fetches_immediately() {
        let mut h = start(config());
        h.http.push_get(ok_list(&["1"]));
        h.http.push_get(ok_list(&["1", "2"]));

        h.handle.enable().await.unwrap();
        wait_view(&mut h.view, |v| v.count() == 1).await;

        let before = Instant::now();
        h.handle.refresh().await.unwrap();
        wait_view(&mut h.view, |v| v.count() == 2).await;
        assert!(Instant::now() - before < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_read_removes_item() {
        let mut h = start(config());
        h.http.push_get(ok_list(&["x", "y"]));
        h.http.push_mutation(Ok(HttpResponse::new(205, "")));

        h.handle.enable().await.unwrap();
        wait_view(&mut h.view, |v| v.count() == 2).await;

        h.handle.mark_read("x").await.unwrap();
        let view = wait_view(&mut h.view, |v| v.count() == 1).await;
        assert!(view.items.iter().all(|i| i.id != "x"));
        assert_eq!(h.http.count(Method::Patch), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_all_read_clears() {
        let mut h = start(config());
        h.http.push_get(ok_list(&["a", "b", "c"]));
        h.http.push_mutation(Ok(HttpResponse::new(205, "")));

        h.handle.enable().await.unwrap();
        wait_view(&mut h.view, |v| v.count() == 3).await;

        h.handle.mark_all_read().await.unwrap();
        let view = wait_view(&mut h.view, |v| v.count() == 0).await;
        assert_eq!(view.status, InboxStatus::Ok);
        assert_eq!(view.last_action_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_action_reports_error_and_keeps_cycle() {
        let mut h = start(config());
        h.http.push_get(ok_list(&["x"]));
        h.http.push_mutation(Ok(HttpResponse::new(500, "")));

        h.handle.enable().await.unwrap();
        wait_view(&mut h.view, |v| v.count() == 1).await;

        h.handle.mark_read("x").await.unwrap();
        let view = wait_view(&mut h.view, |v| v.last_action_error.is_some()).await;
        assert_eq!(view.count(), 1);
        assert_eq!(view.next_poll_in, Some(Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_release_with_unresolved_tag() {
        let mut h = start(config());
        let body = r#"[{"id":"9","reason":"subscribed","updated_at":"2024-03-01T12:00:00Z","subject":{"title":"v2","url":"https://api.github.com/repos/acme/gears/releases/31337","type":"Release"},"repository":{"full_name":"acme/gears"}}]"#;
        h.http.push_get(Ok(HttpResponse::new(200, body)));
        h.http.push_get(Ok(HttpResponse::new(200, r#"{"id":31337}"#)));

        h.handle.enable().await.unwrap();
        let view = wait_view(&mut h.view, |v| v.count() == 1).await;
        assert_eq!(view.items[0].subject_type, SubjectType::Release);

        h.handle.open("9").await.unwrap();
        wait_requests(&h.http, Method::Get, 2).await;
        while h.launcher.urls().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(
            h.launcher.urls(),
            vec!["https://github.com/acme/gears/releases".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let http = Arc::new(ScriptedHttp::new());
        let (handle, task) = spawn_engine(
            GitHubApi::new(http),
            config(),
            Box::new(RecordingAlerts::default()),
            Box::new(RecordingLauncher::default()),
        );

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(handle.refresh().await, Err(GhNotifyError::EngineGone)));
    }
}
