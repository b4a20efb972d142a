//! Rewrites links found in post Markdown so they work from the viewer page,
//! which lives at the site root rather than next to the post source.

use crate::route::Route;
use url::{ParseError, Url};

const MARKDOWN_EXTENSION: &str = ".md";

/// A stand-in origin used to resolve relative links. Links that resolve to
/// any other origin are left alone.
const SITE_ROOT: &str = "http://site.invalid/";

pub struct Converter {
    /// `{SITE_ROOT}{posts_directory}/`
    posts_root: Url,

    /// The location of the post source the links were found in.
    base: Url,
}

impl Converter {
    /// Constructs a new `Converter`
    ///
    /// # Arguments
    ///
    /// * `posts_directory` - the site-relative directory holding the post
    ///   sources (e.g., `posts`).
    /// * `slug` - the slug of the post whose links will be converted.
    pub fn new(posts_directory: &str, slug: &str) -> Result<Converter> {
        let site = Url::parse(SITE_ROOT)?;
        let posts_directory = posts_directory.trim_matches('/');
        let posts_root = match posts_directory.is_empty() {
            true => site,
            false => site.join(&format!("{}/", posts_directory))?,
        };
        let base = posts_root.join(&format!("{}{}", slug, MARKDOWN_EXTENSION))?;
        Ok(Converter { posts_root, base })
    }

    /// Converts `link`:
    ///
    /// * links to sibling posts (`other.md`, `./other.md#part`) become
    ///   viewer routes (`?post=other`, `?post=other#part`);
    /// * other relative links are made relative to the site root (an image
    ///   `img.png` next to the post becomes `posts/img.png`);
    /// * absolute URLs, root-relative paths, and bare fragments are returned
    ///   unchanged.
    ///
    /// Links that can't be parsed are returned unchanged as well.
    pub fn convert(&self, link: &str) -> String {
        if link.is_empty() || link.starts_with('#') || link.starts_with('/') {
            return link.to_owned();
        }
        match Url::parse(link) {
            Ok(_) => link.to_owned(),
            Err(ParseError::RelativeUrlWithoutBase) => match self.base.join(link) {
                Ok(target) => self.convert_relative(link, &target),
                Err(err) => {
                    tracing::debug!(link, error = %err, "leaving unparseable link");
                    link.to_owned()
                }
            },
            Err(err) => {
                tracing::debug!(link, error = %err, "leaving unparseable link");
                link.to_owned()
            }
        }
    }

    fn convert_relative(&self, link: &str, target: &Url) -> String {
        if target.origin() != self.base.origin() {
            return link.to_owned();
        }

        let fragment = match target.fragment() {
            Some(fragment) => format!("#{}", fragment),
            None => String::new(),
        };

        if let Some(file_name) =
            target.path().strip_prefix(self.posts_root.path())
        {
            if let Some(slug) = file_name.strip_suffix(MARKDOWN_EXTENSION) {
                if !slug.is_empty() && !slug.contains('/') {
                    return format!(
                        "{}{}",
                        Route::Post {
                            slug: slug.to_owned()
                        }
                        .href(),
                        fragment
                    );
                }
            }
        }

        let query = match target.query() {
            Some(query) => format!("?{}", query),
            None => String::new(),
        };
        format!(
            "{}{}{}",
            target.path().trim_start_matches('/'),
            query,
            fragment
        )
    }
}

type Result<T> = std::result::Result<T, ParseError>;
