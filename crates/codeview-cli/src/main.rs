use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use codeview_renderer::{
    LineAnnotations, PageConfig, RenderError, SourcePage, load_tags, write_page,
};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const TAGS_SUFFIX: &str = ".tags.json";

#[derive(Parser, Debug)]
#[command(version, about = "Codeview - render annotated source files as browsable HTML", long_about = None)]
struct Cli {
    /// Source files to render
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Output directory for the generated pages
    #[arg(short, long, env = "CODEVIEW_OUTPUT")]
    output: PathBuf,

    /// Pages are named after the source path relative to this directory
    #[arg(long, env = "CODEVIEW_ROOT")]
    root: Option<PathBuf>,

    /// Directory mirroring the source tree with `<file>.tags.json` files.
    /// Without it tags are read from next to each source.
    #[arg(long, env = "CODEVIEW_TAGS_DIR")]
    tags_dir: Option<PathBuf>,

    /// Directory holding the `.common` and `.coverage` sidecars
    #[arg(long, env = "CODEVIEW_ANNOTATIONS")]
    annotations: Option<PathBuf>,

    /// Location of the stylesheets and scripts
    #[arg(long, env = "CODEVIEW_DATA_PATH")]
    data_path: Option<String>,

    /// HTML placed in the page footer
    #[arg(long, env = "CODEVIEW_FOOTER")]
    footer: Option<String>,

    /// HTML shown above and below the code
    #[arg(long, env = "CODEVIEW_WARNING")]
    warning: Option<String>,

    #[arg(long, env = "CODEVIEW_SITE_NAME")]
    site_name: Option<String>,

    /// Other project the viewer can link into
    #[arg(long = "project", value_name = "NAME=URL", value_parser = parse_project)]
    projects: Vec<(String, String)>,

    /// Definition offered as an entry point on every page
    #[arg(long = "interesting", value_name = "NAME")]
    interesting: Vec<String>,

    /// Path to the config file [default: <config dir>/codeview/config.kdl]
    #[arg(long, env = "CODEVIEW_CONFIG")]
    config: Option<PathBuf>,
}

/// One file to render, resolved up front.
#[derive(Debug, Clone)]
struct RenderJob {
    source: PathBuf,
    filename: String,
    tags: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    init_tracing();

    let cli = Cli::parse();
    let config = Arc::new(build_config(&cli)?);
    let output = Arc::new(cli.output.clone());
    let root = canonical_or_given(cli.root.as_deref().unwrap_or(Path::new(".")));

    let jobs: Vec<RenderJob> = cli
        .sources
        .iter()
        .map(|source| {
            let filename = page_filename(source, &root);
            let tags = tags_path(source, &filename, cli.tags_dir.as_deref());
            RenderJob {
                source: source.clone(),
                filename,
                tags,
            }
        })
        .collect();
    let total = jobs.len();
    tracing::info!(files = total, output = %output.display(), "rendering");

    let mut renders = Vec::with_capacity(total);
    for job in jobs {
        let config = config.clone();
        let output = output.clone();
        renders.push(tokio::task::spawn_blocking(move || {
            let result = render_source(&job, &output, &config);
            (job, result)
        }));
    }

    let mut failed = 0;
    for joined in n0_future::join_all(renders).await {
        let (job, result) = joined.into_diagnostic()?;
        match result {
            Ok(path) => println!("{} -> {}", job.filename, path.display()),
            Err(err) => {
                failed += 1;
                tracing::error!(file = %job.source.display(), "render failed");
                eprintln!("{:?}", miette::Report::new(err));
            }
        }
    }

    if failed > 0 {
        return Err(miette::miette!("{failed} of {total} files failed to render"));
    }
    tracing::info!(files = total, "done");
    Ok(())
}

fn render_source(
    job: &RenderJob,
    output: &Path,
    config: &PageConfig,
) -> std::result::Result<PathBuf, RenderError> {
    let source = fs::read(&job.source).map_err(|source| RenderError::ReadSource {
        path: job.source.clone(),
        source,
    })?;

    let mut tags = load_tags(&job.tags)?;
    let stale = tags.retain_within(source.len());
    if stale > 0 {
        tracing::warn!(
            file = %job.filename,
            dropped = stale,
            "tags reach past the end of the source, is the tag file out of date?"
        );
    }

    let annotations = LineAnnotations::load_for(&config.annotations_dir, &job.filename);
    let page = SourcePage::new(&job.filename, &source, tags.as_slice(), &annotations);
    write_page(output, &page, config)
}

/// Defaults, then the config file, then environment and flags.
fn build_config(cli: &Cli) -> Result<PageConfig> {
    let mut config = PageConfig::default();

    let file = match &cli.config {
        Some(path) => Some(path.clone()),
        None => default_config_path().filter(|path| path.is_file()),
    };
    if let Some(path) = file {
        tracing::debug!(path = %path.display(), "loading config");
        config = config.merge_file(&path)?;
    }

    if let Some(name) = &cli.site_name {
        config = config.with_site_name(name.as_str());
    }
    if let Some(path) = &cli.data_path {
        config = config.with_data_path(path.as_str());
    }
    if let Some(footer) = &cli.footer {
        config = config.with_footer(footer.as_str());
    }
    if let Some(warning) = &cli.warning {
        config = config.with_warning(warning.as_str());
    }
    if let Some(dir) = &cli.annotations {
        config = config.with_annotations_dir(dir.as_path());
    }
    for (name, url) in &cli.projects {
        config = config.with_project(name.as_str(), url.as_str());
    }
    for name in &cli.interesting {
        config = config.with_interesting_definition(name.as_str());
    }
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("codeview").join("config.kdl"))
}

fn parse_project(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, url)) if !name.is_empty() && !url.is_empty() => {
            Ok((name.to_string(), url.to_string()))
        }
        _ => Err(format!("expected NAME=URL, got `{value}`")),
    }
}

fn canonical_or_given(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// The `/`-separated name of `source` relative to `root`. Sources outside
/// the root keep their full path, minus any root or `..` components.
fn page_filename(source: &Path, root: &Path) -> String {
    let source = canonical_or_given(source);
    let relative = source.strip_prefix(root).unwrap_or(&source);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn tags_path(source: &Path, filename: &str, tags_dir: Option<&Path>) -> PathBuf {
    match tags_dir {
        Some(dir) => dir.join(format!("{filename}{TAGS_SUFFIX}")),
        None => {
            let mut path = source.as_os_str().to_owned();
            path.push(TAGS_SUFFIX);
            PathBuf::from(path)
        }
    }
}

fn init_tracing() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(env_filter);

    tracing_subscriber::registry().with(console_layer).init();
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
