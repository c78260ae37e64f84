//! Response interpretation.
//!
//! Every interpreter fails closed: a body that does not match the expected
//! shape becomes [`ApiError::MalformedResponse`], never a half-filled item.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::endpoints::{ApiHost, POLL_INTERVAL_HEADER};
use crate::api::{ApiError, ListPage};
use crate::domain::{NotificationItem, Reason, SubjectType};
use crate::http::HttpResponse;

const MUTATION_SUCCESS: [u16; 3] = [200, 204, 205];

#[derive(Debug, Deserialize)]
struct NotificationPayload {
    id: String,
    reason: Reason,
    updated_at: DateTime<Utc>,
    subject: SubjectPayload,
    repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
struct SubjectPayload {
    title: String,
    url: Option<String>,
    #[serde(rename = "type")]
    kind: SubjectType,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct ReleasePayload {
    tag_name: Option<String>,
}

impl From<NotificationPayload> for NotificationItem {
    fn from(payload: NotificationPayload) -> Self {
        NotificationItem {
            id: payload.id,
            repository: payload.repository.full_name,
            title: payload.subject.title,
            subject_type: payload.subject.kind,
            reason: payload.reason,
            subject_url: payload.subject.url,
            updated_at: payload.updated_at,
        }
    }
}

fn status_error(status: u16) -> ApiError {
    match status {
        401 => ApiError::Unauthorized,
        200..=399 => ApiError::MalformedResponse(format!("unexpected status {}", status)),
        _ => ApiError::Http(status),
    }
}

pub fn interpret_list(response: &HttpResponse) -> Result<ListPage, ApiError> {
    if response.status != 200 {
        return Err(status_error(response.status));
    }

    let payload: Vec<NotificationPayload> = serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

    let poll_interval = response
        .header(POLL_INTERVAL_HEADER)
        .and_then(|v| v.trim().parse::<u64>().ok());

    Ok(ListPage {
        items: payload.into_iter().map(NotificationItem::from).collect(),
        poll_interval,
    })
}

pub fn interpret_mutation(response: &HttpResponse) -> Result<(), ApiError> {
    if MUTATION_SUCCESS.contains(&response.status) {
        return Ok(());
    }
    match response.status {
        401 => Err(ApiError::Unauthorized),
        status => Err(ApiError::Http(status)),
    }
}

/// Browser URL for a release, or `None` when the lookup gave nothing usable.
pub fn interpret_release(
    response: &HttpResponse,
    host: &ApiHost,
    repository: &str,
) -> Option<String> {
    if response.status != 200 || response.body.is_empty() {
        return None;
    }

    let payload: ReleasePayload = match serde_json::from_slice(&response.body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!("Release payload for {} unreadable: {}", repository, e);
            return None;
        }
    };

    match payload.tag_name.as_deref().map(str::trim) {
        Some(tag) if !tag.is_empty() => Some(host.release_tag_page(repository, tag)),
        _ => Some(host.releases_page(repository)),
    }
}
