use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// One item from the syndicated feed, as routed through the pipeline.
///
/// Immutable once produced. `guid` is the dedup identity: the feed-supplied
/// entry id when present, otherwise a SHA-256 over link, title, and publish
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub guid: String,
    pub title: String,
    pub link: String,
    /// First category of the entry, empty when the feed supplies none.
    pub category: String,
    pub published: Option<DateTime<Utc>>,
}

pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(bytes)?;

    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published = entry.published.or(entry.updated);
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());
            // RSS puts the category name in `term`; Atom may carry a
            // human-readable `label` as well, but `term` is always set.
            let category = entry
                .categories
                .first()
                .map(|c| c.term.clone())
                .unwrap_or_default();

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let guid = generate_guid(existing_id, &link, &title, published);

            FeedEntry {
                guid,
                title,
                link,
                category,
                published,
            }
        })
        .collect();

    Ok(entries)
}

fn generate_guid(
    existing: Option<&str>,
    link: &str,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        link,
        title,
        published
            .map(|p| p.timestamp().to_string())
            .unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
