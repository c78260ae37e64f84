use std::fmt::Write;
use std::sync::Arc;

use crate::app::{AppContext, GhNotifyError, Result};
use crate::sink::UrlLauncher;
use crate::store::{InboxStatus, InboxView};

/// Fetch the inbox once, outside the polling engine.
pub async fn fetch_inbox(ctx: &AppContext) -> Result<InboxView> {
    ctx.config.require_token()?;
    let page = ctx.api.list_notifications(&ctx.config).await?;

    Ok(InboxView {
        items: Arc::new(page.items),
        status: InboxStatus::Ok,
        group_by: ctx.config.group_by,
        ..InboxView::default()
    })
}

pub async fn list_notifications(ctx: &AppContext) -> Result<()> {
    let view = fetch_inbox(ctx).await?;
    print!("{}", format_inbox(&view));
    Ok(())
}

pub async fn mark_read(ctx: &AppContext, id: &str) -> Result<()> {
    ctx.config.require_token()?;
    ctx.api.mark_one_read(&ctx.config, id).await?;
    println!("Marked {} as read", id);
    Ok(())
}

pub async fn mark_all_read(ctx: &AppContext) -> Result<()> {
    ctx.config.require_token()?;
    ctx.api.mark_all_read(&ctx.config).await?;
    println!("Marked all notifications as read");
    Ok(())
}

pub async fn open_notification(ctx: &AppContext, id: &str, launcher: &dyn UrlLauncher) -> Result<()> {
    let view = fetch_inbox(ctx).await?;
    let item = view
        .items
        .iter()
        .find(|item| item.id == id)
        .ok_or_else(|| GhNotifyError::NotificationNotFound(id.to_string()))?;

    let url = ctx.api.resolve_open_url(&ctx.config, item).await;
    launcher.launch(&url);
    Ok(())
}

pub fn show_config(ctx: &AppContext) {
    let config = &ctx.config;
    println!("Config file: {}", ctx.config_path.display());
    println!("  domain                = {}", config.domain);
    println!(
        "  token                 = {}",
        if config.token.is_empty() { "<not set>" } else { "<set>" }
    );
    println!("  refresh_interval_secs = {}", config.refresh_interval_secs);
    println!("  show_alerts           = {}", config.show_alerts);
    println!("  participating_only    = {}", config.participating_only);
    println!("  group_by              = {}", config.group_by.as_str());
}

/// Render a view as plain text, one line per item, grouped per its
/// `group_by`.
pub fn format_inbox(view: &InboxView) -> String {
    let mut out = String::new();

    match view.status {
        InboxStatus::AuthBroken => {
            let _ = writeln!(out, "[!] The access token was rejected");
        }
        InboxStatus::Failing => {
            let _ = writeln!(out, "[!] Last fetch failed (retry {})", view.retry_count);
        }
        InboxStatus::Unknown | InboxStatus::Ok => {}
    }

    if view.items.is_empty() {
        let _ = writeln!(out, "No unread notifications");
        return out;
    }

    let _ = writeln!(out, "{} unread", view.count_label());
    for group in view.groups() {
        let indent = if group.label.is_empty() {
            ""
        } else {
            let _ = writeln!(out, "{}", group.label);
            "  "
        };

        for item in group.items {
            let _ = writeln!(
                out,
                "{}{:>12}  {:<13} {}  ({}, {})",
                indent,
                item.id,
                item.subject_type.label(),
                item.title,
                item.repository,
                item.reason.label()
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::api::testing::{list_body, ScriptedHttp};
    use crate::api::GitHubApi;
    use crate::config::{ConfigSnapshot, GroupBy, Secret};
    use crate::domain::notification::fixtures::{item, item_in};
    use crate::domain::{Reason, SubjectType};
    use crate::http::{HttpResponse, Method};
    use crate::sink::testing::RecordingLauncher;

    fn context(http: Arc<ScriptedHttp>, token: &str) -> AppContext {
        let config = Arc::new(ConfigSnapshot {
            token: Secret::new(token),
            ..ConfigSnapshot::default()
        });
        AppContext::with_api(PathBuf::from("/tmp/config.toml"), config, GitHubApi::new(http))
    }

    #[test]
    fn test_format_empty_inbox() {
        let view = InboxView::default();
        assert_eq!(format_inbox(&view), "No unread notifications\n");
    }

    #[test]
    fn test_format_grouped_by_repository() {
        let view = InboxView {
            items: Arc::new(vec![
                item_in("1", "acme/a", SubjectType::Issue, Reason::Mention),
                item_in("2", "acme/b", SubjectType::PullRequest, Reason::Author),
                item_in("3", "acme/a", SubjectType::Commit, Reason::Subscribed),
            ]),
            status: InboxStatus::Ok,
            group_by: GroupBy::Repository,
            ..InboxView::default()
        };

        let text = format_inbox(&view);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "3 unread");
        assert_eq!(lines[1], "acme/a");
        assert!(lines[2].contains("Thread 1"));
        assert!(lines[3].contains("Thread 3"));
        assert_eq!(lines[4], "acme/b");
    }

    #[test]
    fn test_format_auth_broken() {
        let view = InboxView {
            items: Arc::new(vec![item("1")]),
            status: InboxStatus::AuthBroken,
            ..InboxView::default()
        };

        let text = format_inbox(&view);
        assert!(text.starts_with("[!] The access token was rejected\n! unread\n"));
    }

    #[tokio::test]
    async fn test_fetch_requires_token() {
        let http = Arc::new(ScriptedHttp::new());
        let ctx = context(http.clone(), "");

        let err = fetch_inbox(&ctx).await.unwrap_err();
        assert!(matches!(err, GhNotifyError::Config(_)));
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_open_unknown_id() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_get(Ok(HttpResponse::new(200, list_body(&["1"]))));
        let ctx = context(http, "tok");
        let launcher = RecordingLauncher::default();

        let err = open_notification(&ctx, "99", &launcher).await.unwrap_err();
        assert!(matches!(err, GhNotifyError::NotificationNotFound(ref id) if id == "99"));
        assert!(launcher.urls().is_empty());
    }

    #[tokio::test]
    async fn test_open_launches_browser_url() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_get(Ok(HttpResponse::new(200, list_body(&["1", "2"]))));
        let ctx = context(http, "tok");
        let launcher = RecordingLauncher::default();

        open_notification(&ctx, "2", &launcher).await.unwrap();
        assert_eq!(
            launcher.urls(),
            vec!["https://github.com/acme/widgets/issues/2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_mark_read_propagates_api_error() {
        let http = Arc::new(ScriptedHttp::new());
        http.push_mutation(Ok(HttpResponse::new(401, "")));
        let ctx = context(http.clone(), "tok");

        let err = mark_read(&ctx, "1").await.unwrap_err();
        assert!(matches!(err, GhNotifyError::Api(crate::api::ApiError::Unauthorized)));
        assert_eq!(http.count(Method::Patch), 1);
    }
}
