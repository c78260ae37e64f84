//! Client for the notifications REST API.
//!
//! The client holds no state of its own; every call takes the current
//! [`ConfigSnapshot`] so a settings change applies to the next request.

pub mod browser_url;
pub mod endpoints;
pub mod payload;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::config::ConfigSnapshot;
use crate::domain::NotificationItem;
use crate::http::{HttpClient, TransportError};

pub use browser_url::{browser_url, open_url};
pub use endpoints::ApiHost;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthorized: the access token is invalid or revoked")]
    Unauthorized,

    #[error("Unexpected HTTP status {0}")]
    Http(u16),

    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Result of a successful list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<NotificationItem>,
    /// Minimum seconds the server wants between polls, when advertised.
    pub poll_interval: Option<u64>,
}

#[derive(Clone)]
pub struct GitHubApi {
    http: Arc<dyn HttpClient + Send + Sync>,
}

impl GitHubApi {
    pub fn new(http: Arc<dyn HttpClient + Send + Sync>) -> Self {
        Self { http }
    }

    pub async fn list_notifications(&self, config: &ConfigSnapshot) -> Result<ListPage, ApiError> {
        let response = self.http.request(endpoints::list_notifications(config)).await?;
        payload::interpret_list(&response)
    }

    pub async fn mark_one_read(&self, config: &ConfigSnapshot, thread_id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .request(endpoints::mark_one_read(config, thread_id))
            .await?;
        payload::interpret_mutation(&response)
    }

    pub async fn mark_all_read(&self, config: &ConfigSnapshot) -> Result<(), ApiError> {
        let response = self
            .http
            .request(endpoints::mark_all_read(config, Utc::now()))
            .await?;
        payload::interpret_mutation(&response)
    }

    /// Look up the browsable page of a release.
    ///
    /// A non-200 answer or an unreadable body yields `Ok(None)`; only a
    /// transport failure is an error.
    pub async fn resolve_release_url(
        &self,
        config: &ConfigSnapshot,
        subject_api_url: &str,
        repository: &str,
    ) -> Result<Option<String>, ApiError> {
        let response = self
            .http
            .request(endpoints::fetch_release(config, subject_api_url))
            .await?;
        let host = ApiHost::for_config(config);
        Ok(payload::interpret_release(&response, &host, repository))
    }

    /// Browser URL for `item`, consulting the release endpoint first for
    /// release subjects. Lookup failures are logged and fall back to the
    /// path transform.
    pub async fn resolve_open_url(&self, config: &ConfigSnapshot, item: &NotificationItem) -> String {
        let host = ApiHost::for_config(config);

        let resolved = match (&item.subject_url, item.is_release()) {
            (Some(subject), true) => {
                match self.resolve_release_url(config, subject, &item.repository).await {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::debug!("Release lookup for {} failed: {}", item.id, e);
                        None
                    }
                }
            }
            _ => None,
        };

        open_url(&host, item, resolved)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{list_body, ScriptedHttp};
    use super::*;
    use crate::config::Secret;
    use crate::domain::SubjectType;
    use crate::http::{HttpResponse, Method};

    fn config() -> ConfigSnapshot {
        ConfigSnapshot {
            token: Secret::new("tok"),
            ..ConfigSnapshot::default()
        }
    }

    #[tokio::test]
    async fn test_list_notifications_round_trip() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_get(Ok(HttpResponse::new(200, list_body(&["1", "2"])).with_header("X-Poll-Interval", "90")));
        let api = GitHubApi::new(http.clone());

        let page = api.list_notifications(&config()).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.poll_interval, Some(90));
        assert_eq!(http.requests()[0].url, "https://api.github.com/notifications");
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_get(Err(TransportError("connection reset".into())));
        let api = GitHubApi::new(http);

        let err = api.list_notifications(&config()).await.unwrap_err();
        assert_eq!(err, ApiError::Network(TransportError("connection reset".into())));
    }

    #[tokio::test]
    async fn test_mark_all_read_uses_put() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_mutation(Ok(HttpResponse::new(205, "")));
        let api = GitHubApi::new(http.clone());

        api.mark_all_read(&config()).await.unwrap();
        assert_eq!(http.count(Method::Put), 1);
    }

    #[tokio::test]
    async fn test_release_lookup_network_error_is_error() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_get(Err(TransportError("dns".into())));
        let api = GitHubApi::new(http);

        let result = api
            .resolve_release_url(&config(), "https://api.github.com/repos/a/b/releases/1", "a/b")
            .await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }

    #[tokio::test]
    async fn test_resolve_open_url_release_with_unresolved_tag() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_get(Ok(HttpResponse::new(200, r#"{"id": 77}"#)));
        let api = GitHubApi::new(http);

        let mut item = crate::domain::notification::fixtures::item("5");
        item.subject_type = SubjectType::Release;
        item.subject_url = Some("https://api.github.com/repos/acme/widgets/releases/77".into());

        let url = api.resolve_open_url(&config(), &item).await;
        assert_eq!(url, "https://github.com/acme/widgets/releases");
    }

    #[tokio::test]
    async fn test_resolve_open_url_release_lookup_fails() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_get(Ok(HttpResponse::new(404, "")));
        let api = GitHubApi::new(http);

        let mut item = crate::domain::notification::fixtures::item("5");
        item.subject_type = SubjectType::Release;
        item.subject_url = Some("https://api.github.com/repos/acme/widgets/releases/77".into());

        let url = api.resolve_open_url(&config(), &item).await;
        assert_eq!(url, "https://github.com/acme/widgets/releases");
    }

    #[tokio::test]
    async fn test_resolve_open_url_skips_lookup_for_issues() {
        let http = Arc::new(ScriptedHttp::new());
        let api = GitHubApi::new(http.clone());

        let item = crate::domain::notification::fixtures::item("5");
        let url = api.resolve_open_url(&config(), &item).await;
        assert_eq!(url, "https://github.com/acme/widgets/issues/5");
        assert!(http.requests().is_empty());
    }
}
