use anyhow::{Context, Result, bail};
use feature_catalogue::render::{MarkdownOptions, PlantUmlOptions, render_markdown_with, render_plantuml_with};
use feature_catalogue::{CatalogueIndex, CatalogueSource, atomic_write};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse()?;
    let index = CatalogueIndex::load(&args.input, args.source)?;
    let catalogue = index.catalogue();

    let (markdown, plantuml) = args.targets();
    if let Some(path) = &markdown {
        let text = render_markdown_with(catalogue, &MarkdownOptions::default());
        atomic_write(path, &text).with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &plantuml {
        let options = PlantUmlOptions {
            title: args.title.clone(),
            ..PlantUmlOptions::default()
        };
        let text = render_plantuml_with(catalogue, &options);
        atomic_write(path, &text).with_context(|| format!("writing {}", path.display()))?;
    }
    info!(
        input = %args.input.display(),
        source = args.source.as_str(),
        feature_types = catalogue.len(),
        "catalogue rendered"
    );
    Ok(())
}

struct CliArgs {
    input: PathBuf,
    source: CatalogueSource,
    markdown: Option<PathBuf>,
    plantuml: Option<PathBuf>,
    title: Option<String>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args_os().skip(1);
        let mut input: Option<PathBuf> = None;
        let mut source: Option<CatalogueSource> = None;
        let mut markdown = None;
        let mut plantuml = None;
        let mut title = None;

        while let Some(arg_os) = args.next() {
            let arg = arg_os
                .into_string()
                .map_err(|_| anyhow::anyhow!("argument is not valid UTF-8"))?;
            match arg.as_str() {
                "--input" => input = Some(PathBuf::from(next_value(&mut args, "--input")?)),
                "--source" => {
                    source = Some(CatalogueSource::parse(&next_value(&mut args, "--source")?)?);
                }
                "--markdown" => markdown = Some(PathBuf::from(next_value(&mut args, "--markdown")?)),
                "--plantuml" => plantuml = Some(PathBuf::from(next_value(&mut args, "--plantuml")?)),
                "--title" => title = Some(next_value(&mut args, "--title")?),
                "--help" | "-h" => {
                    print!("{}", usage());
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}\n{}", usage()),
            }
        }

        let Some(input) = input else {
            bail!("--input is required\n{}", usage());
        };
        let Some(source) = source else {
            bail!("--source is required\n{}", usage());
        };
        Ok(CliArgs {
            input,
            source,
            markdown,
            plantuml,
            title,
        })
    }

    /// Explicit outputs win; with neither given, both land next to the cache.
    fn targets(&self) -> (Option<PathBuf>, Option<PathBuf>) {
        if self.markdown.is_some() || self.plantuml.is_some() {
            return (self.markdown.clone(), self.plantuml.clone());
        }
        (
            Some(self.input.with_extension("md")),
            Some(self.input.with_extension("puml")),
        )
    }
}

fn next_value(args: &mut impl Iterator<Item = std::ffi::OsString>, flag: &str) -> Result<String> {
    args.next()
        .map(|os| {
            os.into_string()
                .map_err(|_| anyhow::anyhow!("value for {flag} is not valid UTF-8"))
        })
        .transpose()?
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn usage() -> &'static str {
    "Usage: catalogue-render --input CACHE.json --source ogc|xmi [--markdown PATH] [--plantuml PATH] [--title T]\n\
Re-renders Markdown and PlantUML from a JSON catalogue cache. Without --markdown/--plantuml both are written next to the cache.\n"
}
