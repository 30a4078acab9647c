//! Assembly of the final specification document.
//!
//! A template carries `{{ name }}` placeholders. An [`AssemblyPlan`] binds
//! each name to an ordered list of [`Candidate`]s. A required placeholder
//! takes the first candidate whose input exists, even when it is blank; an
//! optional one keeps falling back until a candidate yields content. Every bound placeholder is resolved before anything
//! is written, so a missing required input never leaves a half-assembled
//! document behind. Placeholders the plan does not know are left verbatim.

use crate::catalogue::CatalogueSource;
use crate::diagnostics::{DiagnosticKind, Diagnostics, Severity};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const INCLUDE_PREFIX: &str = "incl_";

/// Placeholder names the catalogue artefacts are bound to.
pub fn reserved_placeholders() -> Vec<String> {
    [CatalogueSource::Ogc, CatalogueSource::Xmi]
        .iter()
        .flat_map(|source| [source.table_placeholder(), source.diagram_placeholder()])
        .collect()
}

/// One way of producing content for a placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Candidate {
    /// Trimmed file contents; only a missing file yields nothing.
    TextFile(PathBuf),
    /// Markdown image reference when the file exists.
    Image(PathBuf),
    /// File contents wrapped in a fenced code block.
    FencedSource { path: PathBuf, language: String },
    /// Literal text.
    Inline(String),
}

impl Candidate {
    pub fn plantuml(path: impl Into<PathBuf>) -> Self {
        Candidate::FencedSource {
            path: path.into(),
            language: "plantuml".to_string(),
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Candidate::TextFile(path) | Candidate::Image(path) => Some(path),
            Candidate::FencedSource { path, .. } => Some(path),
            Candidate::Inline(_) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Candidate::TextFile(path) => format!("text {}", path.display()),
            Candidate::Image(path) => format!("image {}", path.display()),
            Candidate::FencedSource { path, language } => format!("{language} source {}", path.display()),
            Candidate::Inline(_) => "inline text".to_string(),
        }
    }

    fn resolve(&self, output_dir: &Path) -> Result<Option<String>> {
        match self {
            Candidate::TextFile(path) => read_trimmed(path),
            Candidate::Image(path) => {
                if !path.is_file() {
                    return Ok(None);
                }
                Ok(Some(image_markdown(path, output_dir)))
            }
            Candidate::FencedSource { path, language } => Ok(read_trimmed(path)?.map(|text| {
                if text.is_empty() {
                    text
                } else {
                    format!("```{language}\n{text}\n```")
                }
            })),
            Candidate::Inline(text) => Ok(Some(text.clone())),
        }
    }
}

fn read_trimmed(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    Ok(Some(text.trim().to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceholderSpec {
    pub name: String,
    pub required: bool,
    pub candidates: Vec<Candidate>,
}

impl PlaceholderSpec {
    pub fn required(name: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            name: name.into(),
            required: true,
            candidates,
        }
    }

    pub fn optional(name: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            name: name.into(),
            required: false,
            candidates,
        }
    }
}

/// Rendered artefacts of one catalogue, as handed to assembly.
#[derive(Clone, Debug, Default)]
pub struct CatalogueArtefacts {
    pub table: Option<PathBuf>,
    pub plantuml: Option<PathBuf>,
    pub png: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct AssemblyPlan {
    output_path: PathBuf,
    placeholders: Vec<PlaceholderSpec>,
    diagnostics: Diagnostics,
}

/// Resolved placeholder values plus what was skipped on the way.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub values: BTreeMap<String, String>,
    pub diagnostics: Diagnostics,
}

#[derive(Clone, Debug)]
pub struct Assembly {
    pub text: String,
    pub diagnostics: Diagnostics,
}

impl AssemblyPlan {
    /// `output_path` is where the document will live; image references are
    /// made relative to its directory.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            placeholders: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn placeholders(&self) -> &[PlaceholderSpec] {
        &self.placeholders
    }

    /// Bind a placeholder, replacing an earlier binding of the same name.
    pub fn bind(&mut self, spec: PlaceholderSpec) -> &mut Self {
        match self.placeholders.iter_mut().find(|existing| existing.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.placeholders.push(spec),
        }
        self
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.placeholders.iter().any(|spec| spec.name == name)
    }

    /// Bind the table and diagram placeholders of one catalogue. The diagram
    /// falls back from PNG to PlantUML source to nothing.
    pub fn bind_catalogue(&mut self, source: CatalogueSource, artefacts: &CatalogueArtefacts) -> &mut Self {
        let table = artefacts.table.iter().cloned().map(Candidate::TextFile).collect();
        let mut diagram = Vec::new();
        if let Some(png) = &artefacts.png {
            diagram.push(Candidate::Image(png.clone()));
        }
        if let Some(plantuml) = &artefacts.plantuml {
            diagram.push(Candidate::plantuml(plantuml.clone()));
        }
        self.bind(PlaceholderSpec::optional(source.table_placeholder(), table));
        self.bind(PlaceholderSpec::optional(source.diagram_placeholder(), diagram));
        self
    }

    /// Expose every `*.md` file next to `table` as an optional `incl_<stem>`
    /// placeholder, in file-name order. Files already bound elsewhere and
    /// the output document itself are ignored; names that collide with a
    /// bound placeholder are skipped.
    pub fn discover_siblings(&mut self, table: &Path) -> Result<usize> {
        let Some(dir) = table.parent().map(|parent| {
            if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            }
        }) else {
            return Ok(0);
        };
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let bound_paths: BTreeSet<PathBuf> = self
            .placeholders
            .iter()
            .flat_map(|spec| spec.candidates.iter())
            .filter_map(Candidate::path)
            .map(normalize)
            .collect();
        let reserved = reserved_placeholders();
        let output = normalize(&self.output_path);

        let mut added = 0;
        for path in candidates {
            let normalized = normalize(&path);
            if normalized == output || bound_paths.contains(&normalized) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let name = format!("{INCLUDE_PREFIX}{stem}");
            if self.is_bound(&name) || reserved.contains(&name) {
                self.diagnostics.warn(
                    path.display().to_string(),
                    DiagnosticKind::SkippedInclude,
                    format!("placeholder '{name}' is already bound; file not included"),
                );
                continue;
            }
            debug!(placeholder = %name, path = %path.display(), "discovered include");
            self.bind(PlaceholderSpec::optional(name, vec![Candidate::TextFile(path)]));
            added += 1;
        }
        Ok(added)
    }

    /// Resolve every bound placeholder; the first required one whose inputs
    /// are all absent aborts.
    pub fn resolve(&self) -> Result<Resolution> {
        let output_dir = self.output_path.parent().unwrap_or_else(|| Path::new(""));
        let mut values = BTreeMap::new();
        for spec in &self.placeholders {
            let mut content = None;
            for candidate in &spec.candidates {
                let Some(found) = candidate.resolve(output_dir)? else {
                    continue;
                };
                if found.is_empty() && !spec.required {
                    continue;
                }
                debug!(placeholder = %spec.name, via = %candidate.describe(), "resolved");
                content = Some(found);
                break;
            }
            let value = match content {
                Some(value) => value,
                None if spec.required => {
                    let tried: Vec<String> = spec.candidates.iter().map(Candidate::describe).collect();
                    let detail = if tried.is_empty() {
                        "no input supplied".to_string()
                    } else {
                        format!("none of {} exists", tried.join(", "))
                    };
                    return Err(Error::MissingRequiredAssemblyInput {
                        placeholder: spec.name.clone(),
                        detail,
                    });
                }
                None => String::new(),
            };
            values.insert(spec.name.clone(), value);
        }
        Ok(Resolution {
            values,
            diagnostics: self.diagnostics.clone(),
        })
    }
}

/// Substitute known placeholders; anything else is copied through.
pub fn render_template(template: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = after_open[..end].trim();
        match values.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
        }
        rest = &after_open[end + CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

/// Placeholder names used by a template, in order of first appearance.
pub fn placeholders_in(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        let name = after_open[..end].trim();
        if is_placeholder_name(name) && !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
        rest = &after_open[end + CLOSE.len()..];
    }
    names
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

/// Read the template and resolve the plan without touching the output.
/// Template placeholders the plan does not bind stay verbatim and are
/// reported as `unbound_placeholder`.
pub fn assemble(template_path: &Path, plan: &AssemblyPlan) -> Result<Assembly> {
    let template = fs::read_to_string(template_path).map_err(|err| Error::Template {
        path: template_path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let mut resolution = plan.resolve()?;
    for name in placeholders_in(&template) {
        if !resolution.values.contains_key(&name) {
            resolution.diagnostics.record(
                template_path.display().to_string(),
                Severity::Info,
                DiagnosticKind::UnboundPlaceholder,
                format!("placeholder '{name}' has no input and is left as written"),
            );
        }
    }
    Ok(Assembly {
        text: render_template(&template, &resolution.values),
        diagnostics: resolution.diagnostics,
    })
}

/// Assemble and write the document to the plan's output path atomically.
pub fn assemble_to_path(template_path: &Path, plan: &AssemblyPlan) -> Result<Diagnostics> {
    let assembly = assemble(template_path, plan)?;
    let output = plan.output_path();
    crate::atomic_write(output, &assembly.text)?;
    info!(output = %output.display(), "assembled specification");
    Ok(assembly.diagnostics)
}

fn image_markdown(image: &Path, output_dir: &Path) -> String {
    let stem = image
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let alt = alt_text(&stem);
    let relative = relative_to(image, output_dir);
    let posix = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("![{alt}]({posix})")
}

/// `feature_catalogue-v2` becomes `Feature catalogue v2`.
fn alt_text(stem: &str) -> String {
    let spaced = stem.replace(['_', '-'], " ");
    let trimmed = spaced.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => stem.to_string(),
    }
}

/// Absolute form with `.` and `..` folded away lexically.
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other.as_os_str()),
        }
    }
    folded
}

/// `target` expressed relative to `base_dir`; unrelated roots keep the
/// target as given.
fn relative_to(target: &Path, base_dir: &Path) -> PathBuf {
    let target_abs = normalize(target);
    let base_abs = normalize(base_dir);
    let target_parts: Vec<Component<'_>> = target_abs.components().collect();
    let base_parts: Vec<Component<'_>> = base_abs.components().collect();
    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return target.to_path_buf();
    }
    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn unknown_placeholders_survive_substitution() {
        let rendered = render_template(
            "A {{incl_a}} B {{ incl_b }} C {{ title }} D {{ unclosed",
            &values(&[("incl_a", "1"), ("incl_b", "2")]),
        );
        assert_eq!(rendered, "A 1 B 2 C {{ title }} D {{ unclosed");
    }

    #[test]
    fn lists_template_placeholders_once() {
        let names = placeholders_in("{{a}} {{ b }} {{a}} {{ not valid! }}");
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn alt_text_mirrors_file_stem() {
        assert_eq!(alt_text("feature_catalogue-Diagram"), "Feature catalogue diagram");
        assert_eq!(alt_text("__"), "__");
    }

    #[test]
    fn image_paths_are_relative_to_output() {
        let relative = relative_to(Path::new("/work/out/img/fc.png"), Path::new("/work/out/docs"));
        assert_eq!(relative, PathBuf::from("../img/fc.png"));
    }

    #[test]
    fn parent_segments_fold_before_comparing() {
        let relative = relative_to(Path::new("/a/b/img.png"), Path::new("/a/b/../out"));
        assert_eq!(relative, PathBuf::from("../b/img.png"));
        let relative = relative_to(Path::new("/a/./c/../b/img.png"), Path::new("/a/b"));
        assert_eq!(relative, PathBuf::from("img.png"));
    }

    #[test]
    fn image_link_follows_dotted_output_path() {
        let dir = TempDir::new().unwrap();
        let img = dir.path().join("img");
        fs::create_dir_all(&img).unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        let png = img.join("feature_types-uml.png");
        fs::write(&png, b"png").unwrap();
        let output = dir.path().join("docs").join("..").join("out").join("spec.md");
        let mut plan = AssemblyPlan::new(output);
        plan.bind(PlaceholderSpec::optional("diagram", vec![Candidate::Image(png)]));
        let resolution = plan.resolve().unwrap();
        assert_eq!(
            resolution.values["diagram"],
            "![Feature types uml](../img/feature_types-uml.png)"
        );
    }

    #[test]
    fn optional_placeholder_falls_back_past_blank_input() {
        let dir = TempDir::new().unwrap();
        let blank = dir.path().join("blank.md");
        fs::write(&blank, "  \n").unwrap();
        let mut plan = AssemblyPlan::new(dir.path().join("out.md"));
        plan.bind(PlaceholderSpec::optional(
            "incl_x",
            vec![
                Candidate::TextFile(dir.path().join("missing.md")),
                Candidate::TextFile(blank),
                Candidate::Inline("fallback".to_string()),
            ],
        ));
        let resolution = plan.resolve().unwrap();
        assert_eq!(resolution.values["incl_x"], "fallback");
    }

    #[test]
    fn required_blank_file_resolves_empty() {
        let dir = TempDir::new().unwrap();
        let scope = dir.path().join("scope.md");
        fs::write(&scope, "").unwrap();
        let mut plan = AssemblyPlan::new(dir.path().join("out.md"));
        plan.bind(PlaceholderSpec::required(
            "incl_scope",
            vec![
                Candidate::TextFile(scope),
                Candidate::Inline("unused".to_string()),
            ],
        ));
        let resolution = plan.resolve().unwrap();
        assert_eq!(resolution.values["incl_scope"], "");
    }

    #[test]
    fn blank_plantuml_source_is_not_fenced() {
        let dir = TempDir::new().unwrap();
        let puml = dir.path().join("empty.puml");
        fs::write(&puml, "\n").unwrap();
        let mut plan = AssemblyPlan::new(dir.path().join("out.md"));
        plan.bind(PlaceholderSpec::optional("diagram", vec![Candidate::plantuml(puml)]));
        assert_eq!(plan.resolve().unwrap().values["diagram"], "");
    }

    #[test]
    fn discovery_skips_the_output_document() {
        let dir = TempDir::new().unwrap();
        let table = dir.path().join("feature_types.md");
        fs::write(&table, "| a |").unwrap();
        fs::write(dir.path().join("spec.md"), "assembled earlier").unwrap();
        fs::write(dir.path().join("scope.md"), "Scope").unwrap();
        let mut plan = AssemblyPlan::new(dir.path().join("spec.md"));
        plan.bind_catalogue(
            CatalogueSource::Ogc,
            &CatalogueArtefacts {
                table: Some(table.clone()),
                ..CatalogueArtefacts::default()
            },
        );
        assert_eq!(plan.discover_siblings(&table).unwrap(), 1);
        assert!(plan.is_bound("incl_scope"));
        assert!(!plan.is_bound("incl_spec"));
    }

    #[test]
    fn required_without_content_names_the_placeholder() {
        let dir = TempDir::new().unwrap();
        let mut plan = AssemblyPlan::new(dir.path().join("out.md"));
        plan.bind(PlaceholderSpec::required(
            "incl_scope",
            vec![Candidate::TextFile(dir.path().join("scope.md"))],
        ));
        match plan.resolve() {
            Err(Error::MissingRequiredAssemblyInput { placeholder, .. }) => {
                assert_eq!(placeholder, "incl_scope")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
