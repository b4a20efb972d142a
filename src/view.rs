//! Renders a [`Route`] into a complete HTML document. Each view is rendered
//! by its own template into the `body` of the layout template.
//!
//! Every string handed to a template is HTML-escaped beforehand except for
//! already-rendered HTML (the post content and the body inside the layout).

use crate::blog::Blog;
use crate::date::FormatDate;
use crate::fetch::Fetcher;
use crate::markdown::RenderMarkdown;
use crate::post::Post;
use crate::route::Route;
use chrono::{Datelike, NaiveDate};
use gtmpl::{Context, Template};
use gtmpl_value::Value;
use pulldown_cmark::escape::escape_html;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

const NO_EXCERPT: &str = "No excerpt";

/// The navigation entries shown on every page: name and label.
const NAV: &[(&str, &str)] = &[("home", "Home"), ("archives", "Archives"), ("tags", "Tags")];

/// The parsed templates for every view.
pub struct Templates {
    layout: Template,
    home: Template,
    archives: Template,
    tags: Template,
    post: Template,
    error: Template,
}

impl Templates {
    /// The templates bundled with the crate.
    pub fn builtin() -> Result<Templates> {
        Templates::load(None)
    }

    /// Loads `{name}.html` for each view from `dir`, falling back to the
    /// bundled template for any file that doesn't exist.
    pub fn from_directory(dir: &Path) -> Result<Templates> {
        Templates::load(Some(dir))
    }

    fn load(dir: Option<&Path>) -> Result<Templates> {
        let parse = |name: &str, builtin: &str| -> Result<Template> {
            let contents = match dir.map(|dir| dir.join(format!("{}.html", name))) {
                Some(path) if path.exists() => read_template(&path)?,
                _ => builtin.to_owned(),
            };
            let mut template = Template::default();
            template
                .parse(&contents)
                .map_err(|err| Error::ParseTemplate {
                    name: name.to_owned(),
                    err,
                })?;
            Ok(template)
        };

        Ok(Templates {
            layout: parse("layout", include_str!("../templates/layout.html"))?,
            home: parse("home", include_str!("../templates/home.html"))?,
            archives: parse("archives", include_str!("../templates/archives.html"))?,
            tags: parse("tags", include_str!("../templates/tags.html"))?,
            post: parse("post", include_str!("../templates/post.html"))?,
            error: parse("error", include_str!("../templates/error.html"))?,
        })
    }
}

fn read_template(path: &Path) -> Result<String> {
    use std::io::Read;
    let mut contents = String::new();
    File::open(path)
        .and_then(|mut file| file.read_to_string(&mut contents))
        .map_err(|err| Error::OpenTemplateFile {
            path: path.to_owned(),
            err,
        })?;
    Ok(contents)
}

/// Renders the views of a loaded [`Blog`].
pub struct Renderer<'a, F, M, D> {
    pub blog: &'a Blog<F, M, D>,
    pub templates: &'a Templates,
}

impl<'a, F, M, D> Renderer<'a, F, M, D>
where
    F: Fetcher,
    M: RenderMarkdown,
    D: FormatDate,
{
    pub fn new(blog: &'a Blog<F, M, D>, templates: &'a Templates) -> Self {
        Renderer { blog, templates }
    }

    /// Renders the document for `route`. A post that fails to load renders
    /// the error view rather than failing.
    pub async fn render(&self, route: &Route) -> Result<String> {
        tracing::debug!(route = %route, "rendering");
        let (title, description, body) = match route {
            Route::Home { page } => (None, None, self.home(*page)?),
            Route::Archives => (Some("Archives".to_owned()), None, self.archives()?),
            Route::Tags { selected } => {
                let title = match selected {
                    Some(tag) => format!("Tag: {}", tag),
                    None => String::from("Tags"),
                };
                (Some(title), None, self.tags(selected.as_deref())?)
            }
            Route::Post { slug } => match self.blog.load_post(slug).await {
                Some(post) => (
                    Some(post.meta.title.clone()),
                    Some(post.description()),
                    self.post(&post.meta, &post.content)?,
                ),
                None => (
                    Some("Error".to_owned()),
                    None,
                    execute(
                        &self.templates.error,
                        object(vec![("message", text("Failed to load post"))]),
                    )?,
                ),
            },
        };
        self.layout(route, title, description, body)
    }

    fn layout(
        &self,
        route: &Route,
        title: Option<String>,
        description: Option<String>,
        body: String,
    ) -> Result<String> {
        let config = self.blog.config();
        let title = match title {
            Some(title) => format!("{} | {}", title, config.title),
            None => config.title.clone(),
        };
        let description = description.unwrap_or_else(|| config.description.clone());

        let nav = NAV
            .iter()
            .map(|&(name, label)| {
                let href = match name {
                    "archives" => Route::Archives,
                    "tags" => Route::Tags { selected: None },
                    _ => Route::default(),
                };
                object(vec![
                    ("name", text(name)),
                    ("label", text(label)),
                    ("href", text(&href.href())),
                    ("active", Value::Bool(route.nav() == Some(name))),
                ])
            })
            .collect();

        let social = config
            .social
            .iter()
            .map(|(name, url)| object(vec![("name", text(name)), ("url", text(url))]))
            .collect();

        let highlight_theme = match config.code_highlight.enabled {
            true => text(&config.code_highlight.theme),
            false => Value::Nil,
        };

        execute(
            &self.templates.layout,
            object(vec![
                ("title", text(&title)),
                ("description", text(&description)),
                ("site_title", text(&config.title)),
                ("site_description", text(&config.description)),
                ("nav", Value::Array(nav)),
                ("social", Value::Array(social)),
                ("highlight_theme", highlight_theme),
                ("year", text(&chrono::Utc::now().year().to_string())),
                ("body", Value::String(body)),
            ]),
        )
    }

    /// The home feed: page `page` (1-based, clamped to the last page) of the
    /// posts, `posts_per_page` at a time.
    fn home(&self, page: usize) -> Result<String> {
        let posts = self.blog.posts();
        let page_size = self.blog.config().posts_per_page.max(1);
        let total_pages = (posts.len() + page_size - 1) / page_size;
        let page = page.max(1).min(total_pages.max(1));

        let items = posts
            .chunks(page_size)
            .nth(page - 1)
            .unwrap_or(&[])
            .iter()
            .map(|post| self.summary(post, None))
            .collect();

        let prev = match page > 1 {
            true => text(&Route::Home { page: page - 1 }.href()),
            false => Value::Nil,
        };
        let next = match page < total_pages {
            true => text(&Route::Home { page: page + 1 }.href()),
            false => Value::Nil,
        };

        execute(
            &self.templates.home,
            object(vec![
                ("posts", Value::Array(items)),
                ("prev", prev),
                ("next", next),
            ]),
        )
    }

    /// The archive: years and months newest first.
    fn archives(&self) -> Result<String> {
        let years = self
            .blog
            .get_posts_by_date()
            .iter()
            .rev()
            .map(|(year, months)| {
                let months = months
                    .iter()
                    .rev()
                    .map(|(&month, posts)| {
                        let posts = posts
                            .iter()
                            .map(|post| {
                                object(vec![
                                    ("title", text(&post.title)),
                                    ("href", text(&post_href(post))),
                                    ("date", text(&self.blog.format_date(post.date))),
                                ])
                            })
                            .collect();
                        object(vec![
                            ("name", text(&month_name(*year, month))),
                            ("posts", Value::Array(posts)),
                        ])
                    })
                    .collect();
                object(vec![
                    ("year", text(&year.to_string())),
                    ("months", Value::Array(months)),
                ])
            })
            .collect();

        execute(
            &self.templates.archives,
            object(vec![("years", Value::Array(years))]),
        )
    }

    /// The tag cloud, and the posts of `selected` if there is one.
    fn tags(&self, selected: Option<&str>) -> Result<String> {
        let tags = self.blog.get_all_tags();
        let max = tags.iter().map(|t| t.count).max().unwrap_or(0);
        let min = tags.iter().map(|t| t.count).min().unwrap_or(0);

        let mut ids = AnchorIds::default();
        let cloud = tags
            .iter()
            .map(|tag| {
                object(vec![
                    ("name", text(tag.name)),
                    ("id", text(&ids.next(tag.name))),
                    ("count", text(&tag.count.to_string())),
                    ("size", text(&format!("{:.2}", font_size(tag.count, min, max)))),
                    (
                        "href",
                        text(
                            &Route::Tags {
                                selected: Some(tag.name.to_owned()),
                            }
                            .href(),
                        ),
                    ),
                    ("active", Value::Bool(selected == Some(tag.name))),
                ])
            })
            .collect();

        let selected = match selected {
            Some(name) => {
                let posts = self
                    .blog
                    .get_posts_by_tag(name)
                    .into_iter()
                    .map(|post| self.summary(post, Some(name)))
                    .collect();
                object(vec![("name", text(name)), ("posts", Value::Array(posts))])
            }
            None => Value::Nil,
        };

        execute(
            &self.templates.tags,
            object(vec![("tags", Value::Array(cloud)), ("selected", selected)]),
        )
    }

    fn post(&self, post: &Post, content: &str) -> Result<String> {
        execute(
            &self.templates.post,
            object(vec![
                ("title", text(&post.title)),
                ("date", text(&self.blog.format_date(post.date))),
                ("tags", Value::Array(tag_links(post, None))),
                ("content", Value::String(content.to_owned())),
            ]),
        )
    }

    /// A post as listed in the home feed and on tag pages.
    fn summary(&self, post: &Post, current_tag: Option<&str>) -> Value {
        object(vec![
            ("title", text(&post.title)),
            ("href", text(&post_href(post))),
            ("date", text(&self.blog.format_date(post.date))),
            ("tags", Value::Array(tag_links(post, current_tag))),
            (
                "excerpt",
                text(post.excerpt.as_deref().unwrap_or(NO_EXCERPT)),
            ),
        ])
    }
}

/// The tag-cloud font size in `em`: from 1 for the least used tag to 2 for
/// the most used one, or 1 for every tag if all counts are equal.
pub fn font_size(count: usize, min: usize, max: usize) -> f64 {
    match max > min {
        true => 1.0 + (count - min) as f64 / (max - min) as f64,
        false => 1.0,
    }
}

fn post_href(post: &Post) -> String {
    Route::Post {
        slug: post.slug.clone(),
    }
    .href()
}

fn tag_links(post: &Post, current_tag: Option<&str>) -> Vec<Value> {
    post.tags
        .iter()
        .map(|tag| {
            object(vec![
                ("name", text(tag)),
                (
                    "href",
                    text(
                        &Route::Tags {
                            selected: Some(tag.clone()),
                        }
                        .href(),
                    ),
                ),
                ("active", Value::Bool(current_tag == Some(tag.as_str()))),
            ])
        })
        .collect()
}

/// Hands out anchor ids slugified from names, suffixing `-1`, `-2`, etc. when
/// two names slugify to the same id.
#[derive(Default)]
struct AnchorIds {
    seen: HashMap<String, usize>,
}

impl AnchorIds {
    fn next(&mut self, name: &str) -> String {
        let id = slug::slugify(name);
        let seen = self.seen.entry(id.clone()).or_insert(0);
        let unique = match *seen {
            0 => id,
            n => format!("{}-{}", id, n),
        };
        *seen += 1;
        unique
    }
}

fn month_name(year: i32, month: u32) -> String {
    match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(date) => date.format("%B").to_string(),
        None => month.to_string(),
    }
}

/// An HTML-escaped string value.
fn text(s: &str) -> Value {
    let mut escaped = String::with_capacity(s.len());
    // writing into a `String` can't fail
    let _ = escape_html(&mut escaped, s);
    Value::String(escaped)
}

fn object(fields: Vec<(&str, Value)>) -> Value {
    let m: HashMap<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect();
    Value::Object(m)
}

fn execute(template: &Template, value: Value) -> Result<String> {
    let context = Context::from(value).map_err(|err| Error::Template(err.to_string()))?;
    let mut out: Vec<u8> = Vec::new();
    template.execute(&mut out, &context)?;
    String::from_utf8(out).map_err(|err| Error::Template(err.to_string()))
}

/// The result of a fallible rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading templates or rendering a view.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate { name: String, err: String },

    /// Returned for errors during templating.
    Template(String),
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate { name, err } => {
                write!(f, "Parsing template '{}': {}", name, err)
            }
            Error::Template(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { err, .. } => Some(err),
            Error::ParseTemplate { .. } => None,
            Error::Template(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blog::test::{fixture, MemoryFetcher, MANIFEST};
    use crate::blog::MANIFEST_PATH;
    use crate::config::Config;

    async fn render(
        config: Config,
        fetcher: MemoryFetcher,
        route: &Route,
    ) -> Result<String> {
        let mut blog = Blog::new(config, fetcher);
        blog.load_posts_index().await;
        let templates = Templates::builtin()?;
        Renderer::new(&blog, &templates).render(route).await
    }

    #[tokio::test]
    async fn test_home() -> Result<()> {
        let html = render(Config::default(), fixture(), &Route::default()).await?;
        let b = html.find("Post B").expect("post b is listed");
        let a = html.find("Post A").expect("post a is listed");
        assert!(b < a, "newest post first");
        assert!(html.contains("All about b"));
        assert!(html.contains(NO_EXCERPT));
        assert!(html.contains(r#"<a class="tag" href="?tag=y">y</a>"#));
        assert!(html.contains(r#"class="nav-link active" data-page="home""#));
        assert!(!html.contains(r#"class="next""#));
        Ok(())
    }

    #[tokio::test]
    async fn test_home_pagination() -> Result<()> {
        let mut config = Config::default();
        config.posts_per_page = 1;

        let first = render(config.clone(), fixture(), &Route::default()).await?;
        assert!(first.contains("Post B") && !first.contains("Post A"));
        assert!(first.contains(r#"<a class="next" href="/?p=2">"#));
        assert!(!first.contains(r#"class="prev""#));

        let second =
            render(config.clone(), fixture(), &Route::Home { page: 2 }).await?;
        assert!(second.contains("Post A") && !second.contains("Post B"));
        assert!(second.contains(r#"<a class="prev" href="/">"#));

        // past the end shows the last page
        let clamped = render(config, fixture(), &Route::Home { page: 9 }).await?;
        assert!(clamped.contains("Post A"));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_blog() -> Result<()> {
        let fetcher = MemoryFetcher::default();
        let home = render(Config::default(), fetcher, &Route::default()).await?;
        assert!(home.contains("No posts yet"));

        let archives =
            render(Config::default(), MemoryFetcher::default(), &Route::Archives)
                .await?;
        assert!(archives.contains("No posts yet"));

        let tags = render(
            Config::default(),
            MemoryFetcher::default(),
            &Route::Tags { selected: None },
        )
        .await?;
        assert!(tags.contains("No tags yet"));
        Ok(())
    }

    #[tokio::test]
    async fn test_archives() -> Result<()> {
        let html = render(Config::default(), fixture(), &Route::Archives).await?;
        let march = html.find("March").expect("march is listed");
        let january = html.find("January").expect("january is listed");
        assert!(march < january, "newest month first");
        assert!(html.contains(r#"<h3 class="archives-year">2024</h3>"#));
        assert!(html.contains(
            r#"<span class="archives-date">2024-01-01</span> <a href="?post=a">Post A</a>"#
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_tag_cloud() -> Result<()> {
        let html = render(
            Config::default(),
            fixture(),
            &Route::Tags {
                selected: Some("y".to_owned()),
            },
        )
        .await?;
        assert!(html.contains(r#"style="font-size: 2.00em">x (2)</a>"#));
        assert!(html.contains(
            r#"<a class="tag-item active" id="tag-y" href="?tag=y" style="font-size: 1.00em">y (1)</a>"#
        ));
        assert!(html.contains("<h3>Tag: y</h3>"));
        assert!(html.contains(r#"<a class="tag current" href="?tag=y">y</a>"#));
        assert!(html.contains(r#"<a class="tag" href="?tag=x">x</a>"#));
        assert!(!html.contains("Post A"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tag() -> Result<()> {
        let html = render(
            Config::default(),
            fixture(),
            &Route::Tags {
                selected: Some("nope".to_owned()),
            },
        )
        .await?;
        assert!(html.contains("<h3>Tag: nope</h3>"));
        assert!(html.contains("No posts yet"));
        Ok(())
    }

    #[tokio::test]
    async fn test_post() -> Result<()> {
        let html = render(
            Config::default(),
            fixture(),
            &Route::Post {
                slug: "a".to_owned(),
            },
        )
        .await?;
        assert!(html.contains("<title>Post A | Blog</title>"));
        assert!(html.contains(r#"<h1 class="post-title">Post A</h1>"#));
        assert!(html.contains(r#"<a href="?post=b">b</a>"#));
        assert!(html.contains(r#"<meta name="description" content="A"#));
        assert!(!html.contains("nav-link active"));
        Ok(())
    }

    #[tokio::test]
    async fn test_post_failure() -> Result<()> {
        let html = render(
            Config::default(),
            fixture(),
            &Route::Post {
                slug: "missing-slug".to_owned(),
            },
        )
        .await?;
        assert!(html.contains(r#"<div class="error">Failed to load post</div>"#));
        Ok(())
    }

    #[tokio::test]
    async fn test_escapes_manifest_text() -> Result<()> {
        let fetcher = MemoryFetcher::default().with(
            MANIFEST_PATH,
            r#"[{"slug": "x", "title": "<script>alert(1)</script>",
                 "date": "2024-01-01", "tags": ["a&b"]}]"#,
        );
        let html = render(Config::default(), fetcher, &Route::default()).await?;
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains(r#"href="?tag=a%26b">a&amp;b</a>"#));
        Ok(())
    }

    #[test]
    fn test_template_override() -> Result<()> {
        let dir = tempfile::tempdir().map_err(|err| Error::OpenTemplateFile {
            path: PathBuf::new(),
            err,
        })?;
        std::fs::write(dir.path().join("error.html"), "oops: {{.message}}").map_err(
            |err| Error::OpenTemplateFile {
                path: dir.path().join("error.html"),
                err,
            },
        )?;
        let templates = Templates::from_directory(dir.path())?;
        assert_eq!(
            "oops: gone",
            execute(&templates.error, object(vec![("message", text("gone"))]))?
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_tag_ids_are_unique() -> Result<()> {
        let fetcher = MemoryFetcher::default().with(
            MANIFEST_PATH,
            r#"[{"slug": "x", "title": "X", "date": "2024-01-01",
                 "tags": ["C++", "c"]}]"#,
        );
        let html =
            render(Config::default(), fetcher, &Route::Tags { selected: None })
                .await?;
        assert!(html.contains(r#"id="tag-c" href="?tag=C%2B%2B""#), "{}", html);
        assert!(html.contains(r#"id="tag-c-1" href="?tag=c""#), "{}", html);
        Ok(())
    }

    #[tokio::test]
    async fn test_post_description_escaped_once() -> Result<()> {
        let fetcher = MemoryFetcher::default()
            .with(MANIFEST_PATH, MANIFEST)
            .with("posts/a.md", "if a < b & c\n");
        let html = render(
            Config::default(),
            fetcher,
            &Route::Post {
                slug: "a".to_owned(),
            },
        )
        .await?;
        assert!(html.contains(r#"<meta name="description" content="if a &lt; b &amp; c"#));
        assert!(html.contains("<p>if a &lt; b &amp; c</p>"));
        Ok(())
    }

    #[test]
    fn test_anchor_ids() {
        let mut ids = AnchorIds::default();
        assert_eq!("rust", ids.next("Rust"));
        assert_eq!("rust-1", ids.next("rust"));
        assert_eq!("c", ids.next("C++"));
        assert_eq!("c-1", ids.next("c"));
    }

    #[test]
    fn test_font_size() {
        assert_eq!(1.0, font_size(3, 3, 3));
        assert_eq!(1.0, font_size(1, 1, 5));
        assert_eq!(1.5, font_size(3, 1, 5));
        assert_eq!(2.0, font_size(5, 1, 5));
    }
}
