use anyhow::{anyhow, Result};
use blogview::blog::Blog;
use blogview::config::Config;
use blogview::fetch::Source;
use blogview::route::Route;
use blogview::view::{Renderer, Templates};
use clap::{App, Arg, ArgMatches};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = App::new("blogview")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Renders a view of a static Markdown blog as HTML")
        .arg(
            Arg::with_name("ROUTE")
                .help("The query selecting the view, e.g. `?post=hello` or `page=archives`")
                .default_value("/"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("DIR")
                .help("The directory to start searching for `blogview.yaml`")
                .default_value("."),
        )
        .arg(
            Arg::with_name("root")
                .short("r")
                .long("root")
                .value_name("URL")
                .help("Overrides the site root (a URL or a local directory)"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .help("Writes the document to FILE instead of stdout"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Increases logging verbosity"),
        )
        .get_matches();

    init_logging(matches.occurrences_of("verbose"));

    let config = load_config(&matches)?;
    let source = Source::new(&config.site_root)?;
    let templates = match &config.templates {
        Some(dir) => Templates::from_directory(dir)?,
        None => Templates::builtin()?,
    };

    let mut blog = Blog::new(config, source);
    blog.load_posts_index().await;

    let route = Route::parse(matches.value_of("ROUTE").unwrap_or("/"));
    let html = Renderer::new(&blog, &templates).render(&route).await?;

    match matches.value_of("output") {
        Some(path) => std::fs::write(path, html)
            .map_err(|e| anyhow!("Writing `{}`: {}", path, e))?,
        None => print!("{}", html),
    }
    Ok(())
}

/// Loads `blogview.yaml` and applies the `--root` override. Without a project
/// file, the defaults are used as long as a root was given.
fn load_config(matches: &ArgMatches) -> Result<Config> {
    let dir = matches.value_of("config").unwrap_or(".");
    let dir = std::fs::canonicalize(dir)
        .map_err(|e| anyhow!("Opening config directory `{}`: {}", dir, e))?;
    let root = matches.value_of("root");

    let mut config = match Config::from_directory(&dir) {
        Ok(config) => config,
        Err(err) if root.is_some() => {
            tracing::warn!(error = %err, "using default configuration");
            Config::default()
        }
        Err(err) => return Err(err),
    };
    if let Some(root) = root {
        config.site_root = parse_root(root)?;
    }
    Ok(config)
}

/// Parses a site root given either as a URL or as a local directory.
fn parse_root(root: &str) -> Result<Url> {
    match Url::parse(root) {
        Ok(url) => Ok(url),
        Err(_) => {
            let path: PathBuf = std::env::current_dir()?.join(Path::new(root));
            Url::from_directory_path(&path)
                .map_err(|()| anyhow!("Invalid site root `{}`", root))
        }
    }
}

/// Initializes tracing from the number of `-v` flags: warn, info, debug, and
/// then trace. `RUST_LOG` overrides the flags if set.
fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("blogview={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
