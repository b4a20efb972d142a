//! Defines the [`Post`] and [`LoadedPost`] types and the parsing of the post
//! manifest (`posts/index.json`) into memory.

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::OnceLock;

/// The metadata for a single post as listed in the manifest. Posts are created
/// once when the manifest is loaded and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// The post's unique identifier. It's used both in view URLs
    /// (`?post={slug}`) and to locate the Markdown source
    /// (`{posts_directory}/{slug}.md`).
    pub slug: String,

    /// The title of the post.
    pub title: String,

    /// The calendar date of the post.
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,

    /// The tags associated with the post, in manifest order.
    #[serde(default)]
    pub tags: Vec<String>,

    /// A hand-written summary of the post, if the manifest provides one.
    #[serde(default)]
    pub excerpt: Option<String>,
}

/// A [`Post`] whose Markdown body has been fetched and rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedPost {
    /// The manifest metadata for the post, unchanged.
    pub meta: Post,

    /// The rendered HTML body.
    pub content: String,
}

impl LoadedPost {
    /// Returns the manifest excerpt if there is one, otherwise a plain-text
    /// summary of the rendered content (see [`summarize`]).
    pub fn description(&self) -> String {
        match &self.meta.excerpt {
            Some(excerpt) => excerpt.clone(),
            None => summarize(&self.content, SUMMARY_LENGTH),
        }
    }
}

/// The default number of characters kept by [`summarize`].
pub const SUMMARY_LENGTH: usize = 200;

/// Strips HTML tags from `content`, decodes the character references HTML
/// escaping produces, and truncates the remaining plain text to `length`
/// characters, appending `...` when anything was cut.
pub fn summarize(content: &str, length: usize) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static ENTITIES: OnceLock<Regex> = OnceLock::new();
    // an unterminated tag at the end of the input is dropped too
    let tags = TAGS.get_or_init(|| Regex::new(r"</?[^>]+(>|$)").unwrap());
    let entities = ENTITIES
        .get_or_init(|| Regex::new(r"&(amp|lt|gt|quot|apos|#39|#x27);").unwrap());
    let text = tags.replace_all(content, "");
    let text = entities.replace_all(&text, |caps: &regex::Captures| {
        match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            _ => "'",
        }
    });
    match text.char_indices().nth(length) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.into_owned(),
    }
}

/// Parses the manifest, a JSON array of [`Post`] records. The result is in
/// manifest order; sorting happens when the index is built.
pub fn parse_manifest(input: &str) -> serde_json::Result<Vec<Post>> {
    serde_json::from_str(input)
}

/// Accepts either a bare ISO-8601 date (`2024-01-31`) or a full RFC 3339
/// timestamp, of which only the calendar date is kept.
fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .map_err(|e| D::Error::custom(format!("invalid date `{}`: {}", s, e)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_manifest() -> serde_json::Result<()> {
        let posts = parse_manifest(
            r#"[
                {"slug": "a", "title": "A", "date": "2024-01-01", "tags": ["x"]},
                {"slug": "b", "title": "B", "date": "2024-03-01T08:30:00Z",
                 "excerpt": "about b"}
            ]"#,
        )?;

        assert_eq!(
            vec![
                Post {
                    slug: "a".to_owned(),
                    title: "A".to_owned(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    tags: vec!["x".to_owned()],
                    excerpt: None,
                },
                Post {
                    slug: "b".to_owned(),
                    title: "B".to_owned(),
                    date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                    tags: Vec::new(),
                    excerpt: Some("about b".to_owned()),
                },
            ],
            posts
        );
        Ok(())
    }

    #[test]
    fn test_parse_manifest_invalid_date() {
        let err = parse_manifest(
            r#"[{"slug": "a", "title": "A", "date": "yesterday"}]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid date `yesterday`"));
    }

    #[test]
    fn test_parse_manifest_missing_slug() {
        assert!(
            parse_manifest(r#"[{"title": "A", "date": "2024-01-01"}]"#).is_err()
        );
    }

    #[test]
    fn test_summarize() {
        assert_eq!(
            "Hello world",
            summarize("<p>Hello <em>world</em></p>", SUMMARY_LENGTH)
        );
        assert_eq!("Hello...", summarize("<p>Hello world</p>", 5));
        assert_eq!("héllo...", summarize("héllo wörld", 5));
        assert_eq!("text", summarize("text<a href=", 10));
    }

    #[test]
    fn test_summarize_decodes_escapes() {
        assert_eq!(
            "if a < b & c \"quoted\"",
            summarize("<p>if a &lt; b &amp; c &quot;quoted&quot;</p>", SUMMARY_LENGTH)
        );
        // decoded once, so an escaped entity stays literal
        assert_eq!("&lt;", summarize("&amp;lt;", SUMMARY_LENGTH));
        assert_eq!("a <...", summarize("a &lt; b", 3));
    }

    #[test]
    fn test_description_prefers_excerpt() {
        let mut post = LoadedPost {
            meta: Post {
                slug: "a".to_owned(),
                title: "A".to_owned(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                tags: Vec::new(),
                excerpt: Some("short".to_owned()),
            },
            content: "<p>long body</p>".to_owned(),
        };
        assert_eq!("short", post.description());

        post.meta.excerpt = None;
        assert_eq!("long body", post.description());
    }
}
