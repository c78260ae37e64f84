//! Mapping of API subject URLs onto the pages a browser can open.

use url::Url;

use crate::api::endpoints::ApiHost;
use crate::domain::NotificationItem;

/// Rewrite an API subject URL (`.../repos/<owner>/<repo>/pulls/7`) into the
/// browsable page (`https://<domain>/<owner>/<repo>/pull/7`).
///
/// Returns `None` for URLs that do not point into `/repos/`.
pub fn browser_url(host: &ApiHost, subject_api_url: &str) -> Option<String> {
    let repo_path = strip_api_prefix(host, subject_api_url)?;

    let mut segments: Vec<&str> = repo_path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return None;
    }

    if let Some(kind) = segments.get_mut(2) {
        *kind = match *kind {
            "pulls" => "pull",
            "commits" => "commit",
            other => other,
        };
    }

    // Release ids in the API are numeric and have no browsable page.
    if segments.len() == 4
        && segments[2] == "releases"
        && segments[3].chars().all(|c| c.is_ascii_digit())
    {
        segments.truncate(3);
    }

    Some(format!("{}/{}", host.web_base, segments.join("/")))
}

fn strip_api_prefix<'a>(host: &ApiHost, subject_api_url: &'a str) -> Option<&'a str> {
    let expected = format!("{}/repos/", host.api_base);
    if let Some(rest) = subject_api_url.strip_prefix(expected.as_str()) {
        return Some(rest);
    }

    // Subject URLs from a different host spelling (e.g. an enterprise proxy)
    // still carry the same path layout.
    let parsed = Url::parse(subject_api_url).ok()?;
    let path = parsed.path();
    let offset = path.find("/repos/")?;
    let prefix = &path[..offset];
    if !(prefix.is_empty() || prefix == "/api/v3") {
        return None;
    }
    let start = subject_api_url.find(&path[offset..])? + "/repos/".len();
    subject_api_url.get(start..)
}

/// URL to hand to the launcher for `item`.
///
/// `resolved_release` is the outcome of the release lookup, if one was made;
/// it takes priority over the path transform.
pub fn open_url(host: &ApiHost, item: &NotificationItem, resolved_release: Option<String>) -> String {
    if let Some(url) = resolved_release {
        return url;
    }

    item.subject_url
        .as_deref()
        .and_then(|subject| browser_url(host, subject))
        .unwrap_or_else(|| {
            if item.is_release() {
                host.releases_page(&item.repository)
            } else {
                host.repository_page(&item.repository)
            }
        })
}
