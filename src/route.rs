//! Defines [`Route`], the view selected by the query string of the viewer's
//! URL, and its conversion to and from that query string.

use std::fmt;
use url::form_urlencoded;

/// A view of the blog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// The home feed. `page` is 1-based.
    Home { page: usize },

    /// All posts grouped by year and month.
    Archives,

    /// The tag cloud, optionally listing the posts of a selected tag.
    Tags { selected: Option<String> },

    /// A single post.
    Post { slug: String },
}

impl Default for Route {
    fn default() -> Self {
        Route::Home { page: 1 }
    }
}

impl Route {
    /// Parses a route from a URL query string with or without its leading
    /// `?` (a leading `/` is tolerated too, so both `/?page=tags` and
    /// `page=tags` work). `post` takes precedence over `tag`, which takes
    /// precedence over `page`. Unknown pages and anything else fall back to
    /// the first page of the home feed.
    pub fn parse(query: &str) -> Route {
        let query = query.trim_start_matches('/').trim_start_matches('?');
        let query = match query.find('#') {
            Some(i) => &query[..i],
            None => query,
        };

        let mut post = None;
        let mut tag = None;
        let mut page = None;
        let mut number = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "post" => &mut post,
                "tag" => &mut tag,
                "page" => &mut page,
                "p" => &mut number,
                _ => continue,
            };
            // the first occurrence of a key wins
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        if let Some(slug) = post {
            return Route::Post { slug };
        }
        if let Some(tag) = tag {
            return Route::Tags {
                selected: Some(tag),
            };
        }

        let page_number = number
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(1);
        match page.as_deref() {
            Some("archives") => Route::Archives,
            Some("tags") => Route::Tags { selected: None },
            None | Some("home") => Route::Home { page: page_number },
            Some(other) => {
                tracing::debug!(page = other, "unknown page, showing home");
                Route::default()
            }
        }
    }

    /// Returns the canonical link for the route.
    pub fn href(&self) -> String {
        fn query(key: &str, value: &str) -> String {
            form_urlencoded::Serializer::new(String::new())
                .append_pair(key, value)
                .finish()
        }

        match self {
            Route::Home { page } if *page <= 1 => String::from("/"),
            Route::Home { page } => format!("/?p={}", page),
            Route::Archives => String::from("/?page=archives"),
            Route::Tags { selected: None } => String::from("/?page=tags"),
            Route::Tags {
                selected: Some(tag),
            } => format!("?{}", query("tag", tag)),
            Route::Post { slug } => format!("?{}", query("post", slug)),
        }
    }

    /// The name of the navigation entry that should be marked active for the
    /// route. Single posts don't belong to any entry.
    pub fn nav(&self) -> Option<&'static str> {
        match self {
            Route::Home { .. } => Some("home"),
            Route::Archives => Some("archives"),
            Route::Tags { .. } => Some("tags"),
            Route::Post { .. } => None,
        }
    }
}

impl fmt::Display for Route {
    /// Displays a [`Route`] as its canonical link.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.href())
    }
}
