//! Defines the [`Fetcher`] trait through which the blog loads its manifest
//! and post sources, and [`Source`], the fetcher that reads them from a site
//! root over HTTP(S) or from the local file system.

use std::fmt;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Retrieves text resources by path relative to some site root.
pub trait Fetcher {
    /// Fetches the resource at `path` (e.g., `posts/index.json`) and returns
    /// its body as text.
    fn fetch(&self, path: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Fetches resources relative to a site root URL. `http` and `https` roots
/// are fetched with [`reqwest`]; `file` roots are read from disk.
#[derive(Clone, Debug)]
pub enum Source {
    Http { client: reqwest::Client, root: Url },
    File { root: PathBuf },
}

impl Source {
    /// Creates a [`Source`] for `root`. A root without a trailing slash is
    /// treated as a directory anyway, so `https://example.org/blog` and
    /// `https://example.org/blog/` behave the same.
    pub fn new(root: &Url) -> Result<Source> {
        match root.scheme() {
            "http" | "https" => {
                let mut root = root.clone();
                if !root.path().ends_with('/') {
                    let path = format!("{}/", root.path());
                    root.set_path(&path);
                }
                Ok(Source::Http {
                    client: reqwest::Client::new(),
                    root,
                })
            }
            "file" => match root.to_file_path() {
                Ok(root) => Ok(Source::File { root }),
                Err(()) => Err(Error::UnsupportedRoot(root.to_string())),
            },
            _ => Err(Error::UnsupportedRoot(root.to_string())),
        }
    }

    async fn fetch_http(
        client: &reqwest::Client,
        root: &Url,
        path: &str,
    ) -> Result<String> {
        let url = root.join(path)?;
        tracing::debug!(url = %url, "fetching");
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                path: path.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn fetch_file(root: &Path, path: &str) -> Result<String> {
        let full_path = root.join(path);
        tracing::debug!(path = %full_path.display(), "reading");
        tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|err| Error::Io {
                path: full_path,
                err,
            })
    }
}

impl Fetcher for Source {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<String>> + Send {
        let checked = check_path(path).map(str::to_owned);
        async move {
            let path = checked?;
            match self {
                Source::Http { client, root } => {
                    Source::fetch_http(client, root, &path).await
                }
                Source::File { root } => Source::fetch_file(root, &path).await,
            }
        }
    }
}

/// Rejects paths that could escape the site root: absolute paths and paths
/// with `..` components.
fn check_path(path: &str) -> Result<&str> {
    let escapes = Path::new(path).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    match escapes || path.contains('\\') {
        true => Err(Error::InvalidPath(path.to_owned())),
        false => Ok(path),
    }
}

/// The result of a fallible fetch.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error fetching a resource.
#[derive(Debug)]
pub enum Error {
    /// Returned when the server answers with a non-success status.
    Status { path: String, status: u16 },

    /// Returned for network and protocol errors.
    Http(reqwest::Error),

    /// Returned when reading a local resource fails (including when it
    /// doesn't exist).
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when the resource URL can't be built.
    UrlParse(url::ParseError),

    /// Returned for paths that would leave the site root.
    InvalidPath(String),

    /// Returned when the site root isn't an `http`, `https`, or `file` URL.
    UnsupportedRoot(String),
}

impl Error {
    /// Returns `true` if the resource doesn't exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Status { status, .. } => *status == 404,
            Error::Io { err, .. } => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Status { path, status } => {
                write!(f, "fetching `{}`: HTTP status {}", path, status)
            }
            Error::Http(err) => err.fmt(f),
            Error::Io { path, err } => {
                write!(f, "reading `{}`: {}", path.display(), err)
            }
            Error::UrlParse(err) => err.fmt(f),
            Error::InvalidPath(path) => {
                write!(f, "invalid resource path `{}`", path)
            }
            Error::UnsupportedRoot(root) => {
                write!(f, "unsupported site root `{}`", root)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Status { .. } => None,
            Error::Http(err) => Some(err),
            Error::Io { err, .. } => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::InvalidPath(_) => None,
            Error::UnsupportedRoot(_) => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    /// Converts a [`reqwest::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for HTTP requests.
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL joining.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}
