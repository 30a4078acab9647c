use anyhow::{Context, Result, bail};
use feature_catalogue::{
    AssemblyPlan, Candidate, CatalogueArtefacts, CatalogueSource, PlaceholderSpec, assemble_to_path,
    parse_include,
};
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
    let mut plan = AssemblyPlan::new(args.output.clone());
    plan.bind_catalogue(CatalogueSource::Ogc, &args.ogc);
    plan.bind_catalogue(CatalogueSource::Xmi, &args.xmi);
    for (name, path) in &args.includes {
        plan.bind(PlaceholderSpec::required(
            name.clone(),
            vec![Candidate::TextFile(path.clone())],
        ));
    }
    for table in [&args.ogc.table, &args.xmi.table].into_iter().flatten() {
        let added = plan
            .discover_siblings(table)
            .with_context(|| format!("scanning siblings of {}", table.display()))?;
        if added > 0 {
            info!(table = %table.display(), added, "discovered sibling includes");
        }
    }

    let diagnostics = assemble_to_path(&args.template, &plan)
        .with_context(|| format!("assembling {}", args.output.display()))?;
    if !diagnostics.is_empty() {
        info!(diagnostics = diagnostics.len(), "assembled with skipped inputs or unbound placeholders");
    }
    Ok(())
}

struct CliArgs {
    template: PathBuf,
    output: PathBuf,
    ogc: CatalogueArtefacts,
    xmi: CatalogueArtefacts,
    includes: Vec<(String, PathBuf)>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args_os().skip(1);
        let mut template: Option<PathBuf> = None;
        let mut output: Option<PathBuf> = None;
        let mut ogc = CatalogueArtefacts::default();
        let mut xmi = CatalogueArtefacts::default();
        let mut includes: Vec<(String, PathBuf)> = Vec::new();

        while let Some(arg_os) = args.next() {
            let arg = arg_os
                .into_string()
                .map_err(|_| anyhow::anyhow!("argument is not valid UTF-8"))?;
            match arg.as_str() {
                "--template" => template = Some(PathBuf::from(next_value(&mut args, "--template")?)),
                "--output" => output = Some(PathBuf::from(next_value(&mut args, "--output")?)),
                "--table" => ogc.table = Some(PathBuf::from(next_value(&mut args, "--table")?)),
                "--uml" => ogc.plantuml = Some(PathBuf::from(next_value(&mut args, "--uml")?)),
                "--png" => ogc.png = Some(PathBuf::from(next_value(&mut args, "--png")?)),
                "--xmi-table" => xmi.table = Some(PathBuf::from(next_value(&mut args, "--xmi-table")?)),
                "--xmi-uml" => xmi.plantuml = Some(PathBuf::from(next_value(&mut args, "--xmi-uml")?)),
                "--xmi-png" => xmi.png = Some(PathBuf::from(next_value(&mut args, "--xmi-png")?)),
                "--include" => {
                    let (name, path) = parse_include(&next_value(&mut args, "--include")?)?;
                    if includes.iter().any(|(known, _)| *known == name) {
                        bail!("--include {name} given more than once");
                    }
                    includes.push((name, path));
                }
                "--help" | "-h" => {
                    print!("{}", usage());
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}\n{}", usage()),
            }
        }

        let Some(template) = template else {
            bail!("--template is required\n{}", usage());
        };
        let Some(output) = output else {
            bail!("--output is required\n{}", usage());
        };
        Ok(CliArgs {
            template,
            output,
            ogc,
            xmi,
            includes,
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
    "Usage: spec-assemble --template PATH --output PATH [--table PATH] [--uml PATH] [--png PATH] [--xmi-table PATH] [--xmi-uml PATH] [--xmi-png PATH] [--include NAME=PATH]...\n\
Fills the template's {{ placeholders }} and writes the document. Catalogue artefacts are optional; every --include is required.\n\
Other *.md files next to a table become optional incl_<stem> placeholders.\n"
}
