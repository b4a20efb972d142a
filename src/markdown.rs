//! The Markdown capability: the [`RenderMarkdown`] trait and [`Markdown`], its
//! implementation on top of [`pulldown_cmark`].

use crate::config::Config;
use crate::htmlrenderer::{HtmlRenderer, RenderOptions};
use crate::url::Converter as LinkConverter;
use pulldown_cmark::*;
use std::fmt;
use std::io;
use url::ParseError as UrlParseError;

/// Converts the Markdown source of a post to HTML.
pub trait RenderMarkdown {
    /// Renders `markdown`, the source of the post identified by `slug`.
    fn render(&self, slug: &str, markdown: &str) -> Result<String, Error>;
}

/// Renders GitHub-flavored Markdown (tables, footnotes, strikethrough, and
/// task lists). Links to sibling posts are rewritten to viewer routes.
#[derive(Clone, Debug)]
pub struct Markdown {
    /// The site-relative directory holding post sources.
    posts_directory: String,

    options: RenderOptions,
}

impl Markdown {
    pub fn new(posts_directory: &str, options: RenderOptions) -> Markdown {
        Markdown {
            posts_directory: posts_directory.to_owned(),
            options,
        }
    }

    /// Creates a renderer from the `postsDirectory` and `codeHighlight`
    /// settings. Soft line breaks always render as `<br />`.
    pub fn from_config(config: &Config) -> Markdown {
        Markdown::new(
            &config.posts_directory,
            RenderOptions {
                line_breaks: true,
                highlight: config.code_highlight.enabled,
            },
        )
    }
}

impl RenderMarkdown for Markdown {
    fn render(&self, slug: &str, markdown: &str) -> Result<String, Error> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        let event_converter = EventConverter {
            link_converter: LinkConverter::new(&self.posts_directory, slug)?,
        };
        let mut html_renderer = HtmlRenderer::new(self.options);
        let mut html = String::with_capacity(markdown.len() * 3 / 2);
        for ev in Parser::new_ext(markdown, options) {
            let ev = event_converter.convert(ev);
            html_renderer.on_event(&mut html, ev)?;
        }
        Ok(html)
    }
}

struct EventConverter {
    link_converter: LinkConverter,
}

impl EventConverter {
    fn convert_tag<'b>(&self, tag: Tag<'b>) -> Tag<'b> {
        match tag {
            // Relative links and images are written relative to the post
            // source, but the viewer renders every post from the site root.
            // Links to other posts (`foo.md`) turn into `?post=foo`.
            Tag::Link(
                link @ (LinkType::Inline
                | LinkType::Reference
                | LinkType::ReferenceUnknown
                | LinkType::Shortcut
                | LinkType::ShortcutUnknown
                | LinkType::Collapsed
                | LinkType::CollapsedUnknown),
                url,
                title,
            ) => Tag::Link(link, self.convert_url(&url), title),
            Tag::Image(link, url, title) => {
                Tag::Image(link, self.convert_url(&url), title)
            }
            _ => tag,
        }
    }

    fn convert_url<'b>(&self, url: &str) -> CowStr<'b> {
        CowStr::Boxed(self.link_converter.convert(url).into_boxed_str())
    }

    fn convert<'b>(&self, ev: Event<'b>) -> Event<'b> {
        match ev {
            Event::Start(tag) => Event::Start(self.convert_tag(tag)),
            _ => ev,
        }
    }
}

/// Represents an error converting markdown to HTML.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O errors while writing HTML.
    Io(io::Error),

    /// Returned when there is a problem parsing URLs.
    UrlParse(UrlParseError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<UrlParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: UrlParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<io::Error> for Error {
    /// Converts a [`io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for IO operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
