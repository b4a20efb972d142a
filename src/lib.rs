//! The library code for the `blogview` static blog viewer. A blog is a static
//! site holding a JSON manifest of posts (`posts/index.json`) and one Markdown
//! file per post. Viewing it can be broken down into three steps:
//!
//! 1. Loading the manifest and indexing its posts by date and tag
//!    ([`crate::blog`], [`crate::index`])
//! 2. Loading and rendering the Markdown source of a single post on demand
//!    ([`crate::markdown`])
//! 3. Rendering a view of the blog (the home feed, the archives, the tag
//!    cloud, or a post) into an HTML document ([`crate::view`])
//!
//! Everything the blog reads goes through the [`fetch::Fetcher`] trait, so
//! the same code serves a blog over HTTP, from disk, or from memory in tests.
//! A view is selected by a [`route::Route`], parsed from the same query
//! strings (`?post=hello`, `?tag=rust`, `?page=archives`) the site links use.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod blog;
pub mod config;
pub mod date;
pub mod fetch;
pub mod htmlrenderer;
pub mod index;
pub mod markdown;
pub mod post;
pub mod route;
pub mod url;
pub mod view;
