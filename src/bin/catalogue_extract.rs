use anyhow::{Context, Result, bail};
use feature_catalogue::render::{MarkdownOptions, PlantUmlOptions};
use feature_catalogue::{
    CatalogueRepository, Diagnostics, Extraction, HttpFetcher, OgcExtractor, PipelineConfig,
    RenderOptions, XmiExtractor, XmiOptions, XmiSource, atomic_write, split_list, write_artefacts,
};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn run() -> Result<()> {
    let args = CliArgs::parse()?;
    let mut config = PipelineConfig::from_env();
    if let Some(username) = args.username.clone() {
        config.xmi_credentials.username = username;
    }
    if let Some(password) = args.password.clone() {
        config.xmi_credentials.password = password;
    }

    let fetcher = HttpFetcher::new(config.http_timeout).context("building HTTP client")?;
    let mut extractions = Vec::new();
    if let Some(url) = &args.ogc {
        extractions.push(
            OgcExtractor::new(&fetcher)
                .with_workers(config.ogc_workers)
                .extract(url),
        );
    }
    if let Some(location) = &args.xmi {
        extractions.push(
            XmiExtractor::new(&fetcher)
                .with_credentials(config.xmi_credentials.clone())
                .with_options(XmiOptions {
                    stereotypes: args.stereotypes.clone(),
                })
                .extract(&XmiSource::parse(location)),
        );
    }

    // One slot per source: the OGC and XMI catalogues are written separately.
    let mut repository = CatalogueRepository::new();
    let mut diagnostics = Diagnostics::new();
    for Extraction {
        catalogue,
        diagnostics: found,
    } in extractions
    {
        diagnostics.extend(found);
        repository.register(catalogue);
    }

    let options = RenderOptions {
        markdown: MarkdownOptions::default(),
        plantuml: PlantUmlOptions {
            title: args.title.clone(),
            ..PlantUmlOptions::default()
        },
    };
    for catalogue in repository.iter() {
        let stem = args
            .stem
            .clone()
            .unwrap_or_else(|| catalogue.source().artefact_suffix().to_string());
        let paths = write_artefacts(catalogue, &args.out_dir, &stem, &options)
            .with_context(|| format!("writing artefacts to {}", args.out_dir.display()))?;
        info!(
            source = catalogue.source().as_str(),
            json = %paths.json.display(),
            feature_types = catalogue.len(),
            associations = catalogue.associations().len(),
            "catalogue written"
        );
    }
    if !diagnostics.is_empty() {
        info!(diagnostics = diagnostics.len(), "extraction finished with diagnostics");
    }

    if let Some(path) = &args.diagnostics {
        let json = serde_json::to_string_pretty(&diagnostics)?;
        atomic_write(path, &format!("{json}\n"))
            .with_context(|| format!("writing diagnostics to {}", path.display()))?;
    }
    Ok(())
}

struct CliArgs {
    ogc: Option<String>,
    xmi: Option<String>,
    username: Option<String>,
    password: Option<String>,
    stereotypes: Vec<String>,
    out_dir: PathBuf,
    stem: Option<String>,
    title: Option<String>,
    diagnostics: Option<PathBuf>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args_os().skip(1);
        let mut ogc: Option<String> = None;
        let mut xmi: Option<String> = None;
        let mut username = None;
        let mut password = None;
        let mut stereotypes = Vec::new();
        let mut out_dir: Option<PathBuf> = None;
        let mut stem = None;
        let mut title = None;
        let mut diagnostics = None;

        while let Some(arg_os) = args.next() {
            let arg = arg_os
                .into_string()
                .map_err(|_| anyhow::anyhow!("argument is not valid UTF-8"))?;
            match arg.as_str() {
                "--ogc" => {
                    if ogc.is_some() {
                        bail!("--ogc may only be provided once");
                    }
                    ogc = Some(next_value(&mut args, "--ogc")?);
                }
                "--xmi" => {
                    if xmi.is_some() {
                        bail!("--xmi may only be provided once");
                    }
                    xmi = Some(next_value(&mut args, "--xmi")?);
                }
                "--username" => username = Some(next_value(&mut args, "--username")?),
                "--password" => password = Some(next_value(&mut args, "--password")?),
                "--stereotype" => {
                    stereotypes.extend(split_list(&next_value(&mut args, "--stereotype")?));
                }
                "--out-dir" => out_dir = Some(PathBuf::from(next_value(&mut args, "--out-dir")?)),
                "--stem" => {
                    let value = next_value(&mut args, "--stem")?;
                    if value.trim().is_empty() || value.contains(['/', '\\']) {
                        bail!("--stem must be a non-empty file name without separators");
                    }
                    stem = Some(value);
                }
                "--title" => title = Some(next_value(&mut args, "--title")?),
                "--diagnostics" => {
                    diagnostics = Some(PathBuf::from(next_value(&mut args, "--diagnostics")?));
                }
                "--help" | "-h" => {
                    print!("{}", usage());
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}\n{}", usage()),
            }
        }

        if ogc.is_none() && xmi.is_none() {
            bail!("at least one of --ogc or --xmi is required\n{}", usage());
        }
        let Some(out_dir) = out_dir else {
            bail!("--out-dir is required\n{}", usage());
        };
        if xmi.is_none() && (username.is_some() || password.is_some() || !stereotypes.is_empty()) {
            bail!("--username/--password/--stereotype only apply to --xmi");
        }
        if ogc.is_some() && xmi.is_some() && stem.is_some() {
            bail!("--stem needs a single source; with both --ogc and --xmi each side keeps its own stem");
        }

        Ok(CliArgs {
            ogc,
            xmi,
            username,
            password,
            stereotypes,
            out_dir,
            stem,
            title,
            diagnostics,
        })
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
    "Usage: catalogue-extract [--ogc URL] [--xmi PATH_OR_URL] --out-dir DIR [--username U] [--password P] [--stereotype S]... [--stem NAME] [--title T] [--diagnostics PATH]\n\
Extracts one catalogue per given source and writes <stem>.json, <stem>.md and <stem>.puml under DIR.\n\
The OGC and XMI catalogues are kept apart; --stem is only accepted with a single source.\n\
Per-source failures are reported as diagnostics; the run only fails when artefacts cannot be written.\n"
}
