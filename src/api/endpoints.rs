//! Request builders for the notifications API.
//!
//! Builders are pure: they only turn a config snapshot and arguments into an
//! [`HttpRequest`]. Sending and interpreting happens in [`super::GitHubApi`].

use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;

use crate::config::ConfigSnapshot;
use crate::http::{HttpRequest, Method};

pub const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github+json";
pub const POLL_INTERVAL_HEADER: &str = "x-poll-interval";

/// API and browser base URLs for a configured domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiHost {
    pub api_base: String,
    pub web_base: String,
}

impl ApiHost {
    pub fn for_config(config: &ConfigSnapshot) -> Self {
        if config.is_enterprise() {
            Self {
                api_base: format!("https://{}/api/v3", config.domain),
                web_base: format!("https://{}", config.domain),
            }
        } else {
            Self {
                api_base: format!("https://api.{}", config.domain),
                web_base: format!("https://{}", config.domain),
            }
        }
    }

    pub fn notifications_url(&self, participating_only: bool) -> String {
        if participating_only {
            format!("{}/notifications?participating=true", self.api_base)
        } else {
            format!("{}/notifications", self.api_base)
        }
    }

    pub fn thread_url(&self, thread_id: &str) -> String {
        format!("{}/notifications/threads/{}", self.api_base, thread_id)
    }

    pub fn repository_page(&self, repository: &str) -> String {
        format!("{}/{}", self.web_base, repository)
    }

    pub fn releases_page(&self, repository: &str) -> String {
        format!("{}/{}/releases", self.web_base, repository)
    }

    /// Page of a release tag. The tag is percent-encoded as one path segment.
    pub fn release_tag_page(&self, repository: &str, tag: &str) -> String {
        let releases = self.releases_page(repository);
        let Ok(mut url) = Url::parse(&releases) else {
            return format!("{}/tag/{}", releases, tag);
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("tag").push(tag);
        }
        url.to_string()
    }
}

fn authorized(request: HttpRequest, config: &ConfigSnapshot) -> HttpRequest {
    request
        .header("Authorization", format!("Bearer {}", config.token.expose()))
        .header("Accept", ACCEPT_MEDIA_TYPE)
}

pub fn list_notifications(config: &ConfigSnapshot) -> HttpRequest {
    let host = ApiHost::for_config(config);
    authorized(
        HttpRequest::new(Method::Get, host.notifications_url(config.participating_only)),
        config,
    )
}

pub fn mark_one_read(config: &ConfigSnapshot, thread_id: &str) -> HttpRequest {
    let host = ApiHost::for_config(config);
    authorized(HttpRequest::new(Method::Patch, host.thread_url(thread_id)), config)
}

pub fn mark_all_read(config: &ConfigSnapshot, last_read_at: DateTime<Utc>) -> HttpRequest {
    let host = ApiHost::for_config(config);
    let body = serde_json::json!({
        "last_read_at": last_read_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    authorized(
        HttpRequest::new(Method::Put, host.notifications_url(false)),
        config,
    )
    .header("Content-Type", "application/json")
    .body(body.to_string().into_bytes())
}

pub fn fetch_release(config: &ConfigSnapshot, subject_api_url: &str) -> HttpRequest {
    authorized(HttpRequest::new(Method::Get, subject_api_url), config)
}
