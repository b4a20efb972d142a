//! Loads the viewer settings from a `blogview.yaml` project file.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "blogview.yaml";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(5)
    }
}

fn default_title() -> String {
    String::from("Blog")
}

fn default_posts_directory() -> String {
    String::from("posts")
}

fn default_date_format() -> String {
    String::from("YYYY-MM-DD")
}

/// Settings for client-side syntax highlighting of code blocks.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CodeHighlight {
    #[serde(default = "CodeHighlight::default_enabled")]
    pub enabled: bool,

    /// The name of the highlighter stylesheet theme.
    #[serde(default = "CodeHighlight::default_theme")]
    pub theme: String,
}

impl CodeHighlight {
    fn default_enabled() -> bool {
        true
    }

    fn default_theme() -> String {
        String::from("tomorrow-night")
    }
}

impl Default for CodeHighlight {
    fn default() -> Self {
        CodeHighlight {
            enabled: CodeHighlight::default_enabled(),
            theme: CodeHighlight::default_theme(),
        }
    }
}

/// The project file as written on disk.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Project {
    #[serde(default = "default_title")]
    title: String,

    #[serde(default)]
    description: String,

    /// Either an absolute URL or a path relative to the project file.
    #[serde(default)]
    site_root: Option<String>,

    #[serde(default = "default_posts_directory")]
    posts_directory: String,

    #[serde(default)]
    posts_per_page: PageSize,

    #[serde(default)]
    code_highlight: CodeHighlight,

    #[serde(default = "default_date_format")]
    date_format: String,

    #[serde(default)]
    social: BTreeMap<String, String>,

    /// A directory of template overrides, relative to the project file.
    #[serde(default)]
    templates: Option<PathBuf>,
}

/// The viewer settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// The blog title, shown in the page header.
    pub title: String,

    /// A short description of the blog, shown under the title.
    pub description: String,

    /// The location of the static site. The manifest is fetched from
    /// `{site_root}/posts/index.json`.
    pub site_root: Url,

    /// The directory, relative to `site_root`, holding post sources.
    pub posts_directory: String,

    /// The number of posts per page of the home feed.
    pub posts_per_page: usize,

    pub code_highlight: CodeHighlight,

    /// The dayjs-style pattern used to display dates.
    pub date_format: String,

    /// Social network names and profile URLs, displayed in the footer.
    pub social: BTreeMap<String, String>,

    /// A directory of templates overriding the built-in ones.
    pub templates: Option<PathBuf>,
}

impl Default for Config {
    /// The default settings, with the site root at the current directory.
    fn default() -> Self {
        let site_root = std::env::current_dir()
            .ok()
            .and_then(|dir| Url::from_directory_path(dir).ok())
            .unwrap_or_else(|| {
                Url::parse("file:///").expect("`file:///` is a valid URL")
            });
        Config {
            title: default_title(),
            description: String::new(),
            site_root,
            posts_directory: default_posts_directory(),
            posts_per_page: PageSize::default().0,
            code_highlight: CodeHighlight::default(),
            date_format: default_date_format(),
            social: BTreeMap::new(),
            templates: None,
        }
    }
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a `blogview.yaml`
    /// file and loads the first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            match Config::from_project_file(&path) {
                Ok(config) => Ok(config),
                Err(e) => Err(anyhow!("Loading configuration: {:?}", e)),
            }
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    /// Loads the settings from the project file at `path`. Relative paths in
    /// the file are resolved against the file's directory.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = File::open(path).map_err(|e| {
            anyhow!("Opening project file `{}`: {}", path.display(), e)
        })?;
        let project: Project = serde_yaml::from_reader(file)?;
        let project_root = match path.parent() {
            Some(parent) => absolute(parent)?,
            None => {
                return Err(anyhow!(
                    "Can't get parent directory for provided project file path '{:?}'",
                    path
                ))
            }
        };
        let config = Config::from_project(project, &project_root)?;
        tracing::info!(
            path = %path.display(),
            site_root = %config.site_root,
            posts_directory = %config.posts_directory,
            posts_per_page = config.posts_per_page,
            "configuration loaded"
        );
        Ok(config)
    }

    fn from_project(project: Project, project_root: &Path) -> Result<Config> {
        if project.posts_per_page.0 == 0 {
            return Err(anyhow!("`postsPerPage` must be at least 1"));
        }

        let root_url = Url::from_directory_path(project_root).map_err(|()| {
            anyhow!("Project directory `{}` is not absolute", project_root.display())
        })?;
        let site_root = match project.site_root {
            None => root_url,
            Some(site_root) => {
                // a relative root (e.g. `public`) is a directory under the
                // project
                let site_root = match site_root.ends_with('/') {
                    true => site_root,
                    false => format!("{}/", site_root),
                };
                root_url.join(&site_root)?
            }
        };

        Ok(Config {
            title: project.title,
            description: project.description,
            site_root,
            posts_directory: project.posts_directory.trim_matches('/').to_owned(),
            posts_per_page: project.posts_per_page.0,
            code_highlight: project.code_highlight,
            date_format: project.date_format,
            social: project.social,
            templates: project
                .templates
                .map(|templates| project_root.join(templates)),
        })
    }

    /// The site-relative path of the Markdown source for `slug`.
    pub fn post_path(&self, slug: &str) -> String {
        match self.posts_directory.is_empty() {
            true => format!("{}.md", slug),
            false => format!("{}/{}.md", self.posts_directory, slug),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    match path.is_absolute() {
        true => Ok(path.to_owned()),
        false => Ok(std::env::current_dir()?.join(path)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn load(yaml: &str) -> Result<Config> {
        let project: Project = serde_yaml::from_str(yaml)?;
        Config::from_project(project, Path::new("/srv/blog"))
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = load("{}")?;
        assert_eq!("Blog", config.title);
        assert_eq!("file:///srv/blog/", config.site_root.as_str());
        assert_eq!("posts", config.posts_directory);
        assert_eq!(5, config.posts_per_page);
        assert_eq!(CodeHighlight::default(), config.code_highlight);
        assert_eq!("YYYY-MM-DD", config.date_format);
        assert!(config.social.is_empty());
        assert_eq!(None, config.templates);
        Ok(())
    }

    #[test]
    fn test_full_project() -> Result<()> {
        let config = load(
            r#"
title: GeekBlog
description: A geeky tech blog
siteRoot: https://example.org/blog
postsDirectory: /articles/
postsPerPage: 10
codeHighlight:
  enabled: false
dateFormat: MMMM D, YYYY
social:
  github: https://github.com/someone
templates: theme
"#,
        )?;
        assert_eq!("GeekBlog", config.title);
        assert_eq!("https://example.org/blog/", config.site_root.as_str());
        assert_eq!("articles", config.posts_directory);
        assert_eq!(10, config.posts_per_page);
        assert!(!config.code_highlight.enabled);
        assert_eq!("tomorrow-night", config.code_highlight.theme);
        assert_eq!("MMMM D, YYYY", config.date_format);
        assert_eq!(
            Some(&"https://github.com/someone".to_owned()),
            config.social.get("github")
        );
        assert_eq!(Some(PathBuf::from("/srv/blog/theme")), config.templates);
        Ok(())
    }

    #[test]
    fn test_relative_site_root() -> Result<()> {
        let config = load("siteRoot: public")?;
        assert_eq!("file:///srv/blog/public/", config.site_root.as_str());
        Ok(())
    }

    #[test]
    fn test_zero_page_size() {
        assert!(load("postsPerPage: 0").is_err());
    }

    #[test]
    fn test_post_path() {
        let mut config = Config::default();
        assert_eq!("posts/hello.md", config.post_path("hello"));
        config.posts_directory = String::new();
        assert_eq!("hello.md", config.post_path("hello"));
    }

    #[test]
    fn test_from_directory_searches_parents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(PROJECT_FILE), "title: Found\n")?;
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested)?;
        assert_eq!("Found", config.title);
        assert_eq!(
            Url::from_directory_path(dir.path()).unwrap(),
            config.site_root
        );
        Ok(())
    }
}
