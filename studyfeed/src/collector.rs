//! Paginated feed collection: walk the portal's feed pages with the
//! authenticated HTTP client, extract posts, and filter by author
//! allow-list and recency cutoff.
//!
//! Extraction depends on the portal's markup; if a selector stops matching
//! the affected field simply comes back empty and the post is skipped with
//! an enumerated [`SkipReason`].

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::SessionCookie;
use crate::model::{Feed, SkipReason, NO_SUBJECT};

const USER_AGENT: &str = "studyfeed/0.1.0";

/// Post fields as found in the page, before validation. Empty strings mean
/// the selector matched nothing.
#[derive(Debug, Clone, Default)]
pub struct RawPost {
    pub author: String,
    pub subject: String,
    pub content: String,
    /// Raw timestamp text; may be empty or "Unknown"
    pub timestamp: String,
}

/// One parsed feed page: its posts plus whether a rel=next link exists.
#[derive(Debug)]
pub struct FeedPage {
    pub posts: Vec<RawPost>,
    pub has_next: bool,
}

/// Build a plain HTTP client carrying the cookies exported by the
/// authenticator. This is the only hand-off between the browser phase and
/// the pagination phase.
pub fn client_with_cookies(cookies: &[SessionCookie], base_url: &str) -> Result<Client> {
    let base = Url::parse(base_url).context("invalid feeds base URL")?;
    let jar = reqwest::cookie::Jar::default();
    for c in cookies {
        jar.add_cookie_str(&format!("{}={}", c.name, c.value), &base);
    }
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(30))
        .cookie_provider(Arc::new(jar))
        .build()
        .context("failed to build HTTP client")
}

/// Walk feed pages from 1 upward and return the retained feeds in page
/// order. Pagination stops at a non-200 response, a transport error, an
/// empty page, or a page without a next link; whatever was collected so far
/// is kept. No fetch is retried.
pub async fn collect_feeds(
    client: &Client,
    feeds_base: &str,
    allow_list: &[String],
    look_back_weeks: i64,
    max_pages: usize,
) -> Result<Vec<Feed>> {
    let weeks = if look_back_weeks >= 1 {
        look_back_weeks
    } else {
        warn!(look_back_weeks, "invalid look-back window, falling back to 1 week");
        1
    };
    let cutoff = Utc::now() - Duration::weeks(weeks);

    let mut feeds = Vec::new();
    for page in 1..=max_pages {
        let url = format!("{}?page={}", feeds_base, page);
        let response = match client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(page, error = %e, "page fetch failed, stopping pagination");
                break;
            }
        };

        let status = response.status();
        if !status.is_success() {
            // End of data, not an error
            info!(page, %status, "non-200 response, stopping pagination");
            break;
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(page, error = %e, "failed to read page body, stopping pagination");
                break;
            }
        };

        let parsed = parse_feed_page(&body);
        info!(page, posts = parsed.posts.len(), "parsed feed page");

        if parsed.posts.is_empty() {
            break;
        }

        for raw in parsed.posts {
            match validate_post(raw, allow_list, cutoff) {
                Ok(feed) => feeds.push(feed),
                Err(reason) => debug!(%reason, "skipping post"),
            }
        }

        if !parsed.has_next {
            break;
        }
    }

    info!(collected = feeds.len(), "feed collection finished");
    Ok(feeds)
}

/// Extract posts and the pagination marker from one page of HTML.
/// Runs synchronously so scraper's non-Send types never cross an await.
pub fn parse_feed_page(html: &str) -> FeedPage {
    // Selectors are fixed strings; parse failures would be programming errors
    let container = Selector::parse("div.feed-show.feed-main.feed-box").unwrap();
    let author_sel = Selector::parse("span.feed-author").unwrap();
    let subject_sel = Selector::parse("div.feed-title a.description-link span").unwrap();
    let expanded_sel = Selector::parse("div.expanded-text").unwrap();
    let collapsed_sel = Selector::parse("div.description").unwrap();
    let time_sel = Selector::parse("time.feed-timestamp").unwrap();
    let next_sel = Selector::parse("li.next a[rel=next]").unwrap();

    let document = Html::parse_document(html);

    let mut posts = Vec::new();
    for post in document.select(&container) {
        let author = post
            .select(&author_sel)
            .next()
            .map(|e| collapse_text(e.text()))
            .unwrap_or_default();
        let subject = post
            .select(&subject_sel)
            .next()
            .map(|e| collapse_text(e.text()))
            .unwrap_or_default();
        // Prefer the expanded body over the collapsed preview
        let content = post
            .select(&expanded_sel)
            .next()
            .or_else(|| post.select(&collapsed_sel).next())
            .map(|e| collapse_text(e.text()))
            .unwrap_or_default();
        let timestamp = post
            .select(&time_sel)
            .next()
            .and_then(|e| e.value().attr("datetime").map(str::to_string))
            .unwrap_or_default();

        posts.push(RawPost {
            author,
            subject,
            content,
            timestamp,
        });
    }

    let has_next = document.select(&next_sel).next().is_some();

    FeedPage { posts, has_next }
}

/// Validate one raw post against the allow-list and the recency cutoff.
///
/// Timestamp policy: a post whose timestamp is absent or unparsable is
/// retained (never filtered); only an explicitly present, strictly older
/// timestamp excludes it.
pub fn validate_post(
    raw: RawPost,
    allow_list: &[String],
    cutoff: DateTime<Utc>,
) -> Result<Feed, SkipReason> {
    if raw.author.trim().is_empty() {
        return Err(SkipReason::MissingAuthor);
    }
    if raw.content.trim().is_empty() {
        return Err(SkipReason::MissingContent);
    }
    if !author_allowed(&raw.author, allow_list) {
        return Err(SkipReason::AuthorNotAllowed);
    }

    let post_date = parse_timestamp(&raw.timestamp);
    if let Some(date) = post_date {
        if date.with_timezone(&Utc) < cutoff {
            return Err(SkipReason::OlderThanCutoff);
        }
    }

    let subject = if raw.subject.trim().is_empty() {
        NO_SUBJECT.to_string()
    } else {
        raw.subject.trim().to_string()
    };

    Ok(Feed {
        author: raw.author.trim().to_string(),
        subject,
        content: raw.content.trim().to_string(),
        post_date,
        note: None,
    })
}

/// Case-insensitive substring match against the allow-list; a "*" entry
/// admits every author.
fn author_allowed(author: &str, allow_list: &[String]) -> bool {
    if allow_list.iter().any(|a| a == "*") {
        return true;
    }
    let author = author.to_lowercase();
    allow_list
        .iter()
        .any(|allowed| author.contains(&allowed.to_lowercase()))
}

/// Parse the portal's timestamp attribute. "Unknown", empty, and malformed
/// values all map to `None`.
fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("unknown") {
        return None;
    }
    DateTime::parse_from_rfc3339(raw).ok()
}

fn collapse_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
