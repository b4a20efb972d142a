//! Defines [`Blog`], the state object owning the loaded post index, and the
//! two loaders that fill it: the manifest loader
//! ([`Blog::load_posts_index`]) and the single-post loader
//! ([`Blog::load_post`]).
//!
//! Neither loader fails outright. A failed manifest load leaves the blog
//! empty and a failed post load yields `None`; both log the underlying
//! [`IndexLoadError`] or [`PostLoadError`]. The `try_` variants return those
//! errors instead.

use crate::config::Config;
use crate::date::{DateFormat, FormatDate};
use crate::fetch::{Error as FetchError, Fetcher};
use crate::index::{DateIndex, PostIndex, TagCount};
use crate::markdown::{Error as MarkdownError, Markdown, RenderMarkdown};
use crate::post::{parse_manifest, LoadedPost, Post};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;

/// The site-relative path of the post manifest.
pub const MANIFEST_PATH: &str = "posts/index.json";

/// Whether a [`Blog`] holds posts. There is no "loading" state: loads are
/// awaited before the blog is queried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// No manifest has been loaded, or the last load failed.
    Empty,

    /// The last manifest load succeeded and the indices are populated.
    Loaded,
}

/// The blog: its settings, its capabilities (fetching, Markdown rendering,
/// date formatting), and the post index built from the manifest.
pub struct Blog<F, M = Markdown, D = DateFormat> {
    config: Config,
    fetcher: F,
    markdown: M,
    dates: D,
    index: PostIndex,
    state: State,
}

impl<F: Fetcher> Blog<F> {
    /// Creates an empty blog using the built-in Markdown renderer and date
    /// format, both configured from `config`.
    pub fn new(config: Config, fetcher: F) -> Blog<F> {
        let markdown = Markdown::from_config(&config);
        let dates = DateFormat::new(&config.date_format);
        Blog::with_capabilities(config, fetcher, markdown, dates)
    }
}

impl<F, M, D> Blog<F, M, D>
where
    F: Fetcher,
    M: RenderMarkdown,
    D: FormatDate,
{
    /// Creates an empty blog from explicit capabilities.
    pub fn with_capabilities(
        config: Config,
        fetcher: F,
        markdown: M,
        dates: D,
    ) -> Blog<F, M, D> {
        Blog {
            config,
            fetcher,
            markdown,
            dates,
            index: PostIndex::default(),
            state: State::Empty,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The posts, most recent first. Empty unless the blog is loaded.
    pub fn posts(&self) -> &[Post] {
        self.index.posts()
    }

    pub fn index(&self) -> &PostIndex {
        &self.index
    }

    /// Fetches and indexes the manifest, returning the posts. On failure the
    /// error is logged, the blog is left empty, and an empty slice is
    /// returned.
    pub async fn load_posts_index(&mut self) -> &[Post] {
        if let Err(err) = self.load_manifest().await {
            tracing::error!(path = MANIFEST_PATH, error = %err, "failed to load post index");
        }
        self.index.posts()
    }

    /// Like [`Blog::load_posts_index`] but returns the error.
    pub async fn try_load_posts_index(
        &mut self,
    ) -> Result<&[Post], IndexLoadError> {
        self.load_manifest().await?;
        Ok(self.index.posts())
    }

    async fn load_manifest(&mut self) -> Result<(), IndexLoadError> {
        // Any previous collection is dropped before the fetch so that a
        // failed reload leaves the blog empty.
        self.index = PostIndex::default();
        self.state = State::Empty;

        let manifest = self.fetcher.fetch(MANIFEST_PATH).await?;
        let posts = parse_manifest(&manifest)?;

        let mut slugs = HashSet::with_capacity(posts.len());
        for post in posts.iter() {
            if !slugs.insert(post.slug.as_str()) {
                return Err(IndexLoadError::DuplicateSlug(post.slug.clone()));
            }
        }

        self.index = PostIndex::new(posts);
        self.state = State::Loaded;
        tracing::info!(posts = self.index.posts().len(), "loaded post index");
        Ok(())
    }

    /// Fetches and renders the post identified by `slug`. Returns `None`,
    /// after logging the reason, if the slug isn't in the manifest or the
    /// source can't be fetched or rendered.
    pub async fn load_post(&self, slug: &str) -> Option<LoadedPost> {
        match self.try_load_post(slug).await {
            Ok(post) => Some(post),
            Err(err) => {
                tracing::error!(slug, error = %err, "failed to load post");
                None
            }
        }
    }

    /// Like [`Blog::load_post`] but returns the error. The manifest entry is
    /// checked first, so no fetch is made for unknown slugs.
    pub async fn try_load_post(
        &self,
        slug: &str,
    ) -> Result<LoadedPost, PostLoadError> {
        let meta = self
            .index
            .find(slug)
            .ok_or_else(|| PostLoadError::NotFound(slug.to_owned()))?;

        let markdown = self
            .fetcher
            .fetch(&self.config.post_path(slug))
            .await
            .map_err(|err| PostLoadError::Fetch {
                slug: slug.to_owned(),
                err,
            })?;

        let content = self.markdown.render(slug, &markdown).map_err(|err| {
            PostLoadError::Render {
                slug: slug.to_owned(),
                err,
            }
        })?;

        Ok(LoadedPost {
            meta: meta.clone(),
            content,
        })
    }

    /// The posts carrying `tag`, most recent first; empty for unknown tags.
    pub fn get_posts_by_tag(&self, tag: &str) -> Vec<&Post> {
        self.index.posts_by_tag(tag)
    }

    /// Every tag with its post count, most used first.
    pub fn get_all_tags(&self) -> Vec<TagCount<'_>> {
        self.index.tag_counts()
    }

    /// The posts grouped by year and month.
    pub fn get_posts_by_date(&self) -> DateIndex<'_> {
        self.index.posts_by_date()
    }

    /// Formats `date` with the configured date format.
    pub fn format_date(&self, date: NaiveDate) -> String {
        self.dates.format_date(date)
    }
}

/// Represents a failure to load the manifest.
#[derive(Debug)]
pub enum IndexLoadError {
    /// Returned when the manifest can't be fetched.
    Fetch(FetchError),

    /// Returned when the manifest isn't a valid JSON array of posts.
    Json(serde_json::Error),

    /// Returned when two manifest entries share a slug.
    DuplicateSlug(String),
}

impl fmt::Display for IndexLoadError {
    /// Displays an [`IndexLoadError`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IndexLoadError::Fetch(err) => err.fmt(f),
            IndexLoadError::Json(err) => {
                write!(f, "parsing `{}`: {}", MANIFEST_PATH, err)
            }
            IndexLoadError::DuplicateSlug(slug) => {
                write!(f, "duplicate post slug `{}`", slug)
            }
        }
    }
}

impl std::error::Error for IndexLoadError {
    /// Implements the [`std::error::Error`] trait for [`IndexLoadError`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IndexLoadError::Fetch(err) => Some(err),
            IndexLoadError::Json(err) => Some(err),
            IndexLoadError::DuplicateSlug(_) => None,
        }
    }
}

impl From<FetchError> for IndexLoadError {
    fn from(err: FetchError) -> IndexLoadError {
        IndexLoadError::Fetch(err)
    }
}

impl From<serde_json::Error> for IndexLoadError {
    fn from(err: serde_json::Error) -> IndexLoadError {
        IndexLoadError::Json(err)
    }
}

/// Represents a failure to load a single post.
#[derive(Debug)]
pub enum PostLoadError {
    /// Returned when no manifest entry has the requested slug.
    NotFound(String),

    /// Returned when the post source can't be fetched.
    Fetch { slug: String, err: FetchError },

    /// Returned when the post source can't be rendered.
    Render { slug: String, err: MarkdownError },
}

impl fmt::Display for PostLoadError {
    /// Displays a [`PostLoadError`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PostLoadError::NotFound(slug) => {
                write!(f, "no post with slug `{}`", slug)
            }
            PostLoadError::Fetch { slug, err } => {
                write!(f, "fetching post `{}`: {}", slug, err)
            }
            PostLoadError::Render { slug, err } => {
                write!(f, "rendering post `{}`: {}", slug, err)
            }
        }
    }
}

impl std::error::Error for PostLoadError {
    /// Implements the [`std::error::Error`] trait for [`PostLoadError`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PostLoadError::NotFound(_) => None,
            PostLoadError::Fetch { err, .. } => Some(err),
            PostLoadError::Render { err, .. } => Some(err),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::fetch::Result as FetchResult;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;

    /// Serves resources from memory and records every requested path.
    #[derive(Default)]
    pub(crate) struct MemoryFetcher {
        files: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        pub(crate) fn with(mut self, path: &str, body: &str) -> Self {
            self.files.insert(path.to_owned(), body.to_owned());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Fetcher for MemoryFetcher {
        fn fetch(
            &self,
            path: &str,
        ) -> impl Future<Output = FetchResult<String>> + Send {
            self.requests.lock().unwrap().push(path.to_owned());
            let result = match self.files.get(path) {
                Some(body) => Ok(body.clone()),
                None => Err(FetchError::Status {
                    path: path.to_owned(),
                    status: 404,
                }),
            };
            async move { result }
        }
    }

    pub(crate) const MANIFEST: &str = r#"[
        {"slug": "a", "title": "Post A", "date": "2024-01-01", "tags": ["x"]},
        {"slug": "b", "title": "Post B", "date": "2024-03-01", "tags": ["x", "y"],
         "excerpt": "All about b"}
    ]"#;

    pub(crate) fn fixture() -> MemoryFetcher {
        MemoryFetcher::default()
            .with(MANIFEST_PATH, MANIFEST)
            .with("posts/a.md", "# A\n\nSee [b](b.md).\n")
            .with("posts/b.md", "Body of *b*.\n")
            .with("posts/missing-slug.md", "orphan\n")
    }

    fn slugs(posts: &[&Post]) -> Vec<String> {
        posts.iter().map(|p| p.slug.clone()).collect()
    }

    #[tokio::test]
    async fn test_load_posts_index() {
        let mut blog = Blog::new(Config::default(), fixture());
        assert_eq!(State::Empty, blog.state());

        let order: Vec<String> = blog
            .load_posts_index()
            .await
            .iter()
            .map(|p| p.slug.clone())
            .collect();
        assert_eq!(vec!["b", "a"], order);
        assert_eq!(State::Loaded, blog.state());

        assert_eq!(vec!["b", "a"], slugs(&blog.get_posts_by_tag("x")));
        assert_eq!(vec!["b"], slugs(&blog.get_posts_by_tag("y")));
        assert!(blog.get_posts_by_tag("z").is_empty());

        let dates = blog.get_posts_by_date();
        assert_eq!(vec!["a"], slugs(&dates[&2024][&1]));
        assert_eq!(vec!["b"], slugs(&dates[&2024][&3]));

        let tags: Vec<(&str, usize)> = blog
            .get_all_tags()
            .iter()
            .map(|t| (t.name, t.count))
            .collect();
        assert_eq!(vec![("x", 2), ("y", 1)], tags);
    }

    #[tokio::test]
    async fn test_manifest_not_found() {
        let mut blog = Blog::new(Config::default(), MemoryFetcher::default());
        assert!(blog.load_posts_index().await.is_empty());
        assert_eq!(State::Empty, blog.state());
        assert!(blog.get_all_tags().is_empty());
        assert!(blog.get_posts_by_date().is_empty());

        match blog.try_load_posts_index().await {
            Err(IndexLoadError::Fetch(err)) => assert!(err.is_not_found()),
            other => panic!("wanted a fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_manifest() {
        let fetcher =
            MemoryFetcher::default().with(MANIFEST_PATH, r#"{"slug": "a"}"#);
        let mut blog = Blog::new(Config::default(), fetcher);
        assert!(matches!(
            blog.try_load_posts_index().await,
            Err(IndexLoadError::Json(_))
        ));
        assert_eq!(State::Empty, blog.state());
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let fetcher = MemoryFetcher::default().with(
            MANIFEST_PATH,
            r#"[
                {"slug": "a", "title": "One", "date": "2024-01-01"},
                {"slug": "a", "title": "Two", "date": "2024-02-01"}
            ]"#,
        );
        let mut blog = Blog::new(Config::default(), fetcher);
        match blog.try_load_posts_index().await {
            Err(IndexLoadError::DuplicateSlug(slug)) => assert_eq!("a", slug),
            other => panic!("wanted a duplicate slug error, got {:?}", other),
        }
        assert!(blog.posts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reload_empties_blog() {
        let mut blog = Blog::new(Config::default(), fixture());
        assert_eq!(2, blog.load_posts_index().await.len());

        blog.fetcher.files.remove(MANIFEST_PATH);
        assert!(blog.load_posts_index().await.is_empty());
        assert_eq!(State::Empty, blog.state());
        assert!(blog.get_posts_by_tag("x").is_empty());
    }

    #[tokio::test]
    async fn test_load_post() {
        let mut blog = Blog::new(Config::default(), fixture());
        blog.load_posts_index().await;

        let post = blog.load_post("a").await.expect("post `a` should load");
        assert_eq!(blog.index().find("a"), Some(&post.meta));
        assert_eq!(
            "<h1 id=\"a\">A</h1>\n<p>See <a href=\"?post=b\">b</a>.</p>\n",
            post.content
        );

        // the collection is untouched
        assert_eq!(2, blog.posts().len());
    }

    #[tokio::test]
    async fn test_load_post_metadata_round_trip() {
        let mut blog = Blog::new(Config::default(), fixture());
        blog.load_posts_index().await;
        let manifest = parse_manifest(MANIFEST).unwrap();
        for entry in manifest {
            let post = blog.load_post(&entry.slug).await.unwrap();
            assert_eq!(entry, post.meta);
        }
    }

    #[tokio::test]
    async fn test_load_post_missing_slug() {
        let mut blog = Blog::new(Config::default(), fixture());
        blog.load_posts_index().await;

        // the Markdown exists but the manifest doesn't list it
        assert!(blog.load_post("missing-slug").await.is_none());
        assert!(matches!(
            blog.try_load_post("missing-slug").await,
            Err(PostLoadError::NotFound(_))
        ));
        assert!(!blog
            .fetcher
            .requests()
            .contains(&"posts/missing-slug.md".to_owned()));
    }

    #[tokio::test]
    async fn test_load_post_fetch_failure() {
        let mut blog = Blog::new(Config::default(), fixture());
        blog.load_posts_index().await;
        blog.fetcher.files.remove("posts/b.md");

        assert!(blog.load_post("b").await.is_none());
        match blog.try_load_post("b").await {
            Err(PostLoadError::Fetch { slug, err }) => {
                assert_eq!("b", slug);
                assert!(err.is_not_found());
            }
            other => panic!("wanted a fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_post_with_unparseable_link() {
        let fetcher = MemoryFetcher::default()
            .with(MANIFEST_PATH, MANIFEST)
            .with("posts/a.md", "Hello [broken](http://[::1) world\n");
        let mut blog = Blog::new(Config::default(), fetcher);
        blog.load_posts_index().await;

        let post = blog.try_load_post("a").await.expect("post `a` should load");
        assert!(post.content.contains(">broken</a> world"), "{}", post.content);
    }

    #[tokio::test]
    async fn test_load_post_before_index() {
        let blog = Blog::new(Config::default(), fixture());
        assert!(blog.load_post("a").await.is_none());
    }

    #[tokio::test]
    async fn test_custom_posts_directory_and_date_format() {
        let mut config = Config::default();
        config.posts_directory = String::from("articles");
        config.date_format = String::from("MMMM D, YYYY");
        let fetcher = MemoryFetcher::default()
            .with(MANIFEST_PATH, MANIFEST)
            .with("articles/b.md", "b");
        let mut blog = Blog::new(config, fetcher);
        blog.load_posts_index().await;

        assert!(blog.load_post("b").await.is_some());
        assert_eq!(
            "March 1, 2024",
            blog.format_date(blog.posts()[0].date)
        );
    }
}
