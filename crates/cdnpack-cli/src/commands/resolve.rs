//! `cdnpack resolve` command implementation.
//!
//! Runs one resolution pass over the given specifiers (or the project's
//! dependencies), then finalizes into the selected output.

use cdnpack_core::{
    AssetManifest, BuildMode, CdnError, CdnOptions, CdnPlugin, ChunkEmitter, EmittedChunk,
    Environment, HtmlScriptAssets, ModuleReplacement, OutputTarget, PassReport, PluginError,
    ResolverKind, SCHEMA_VERSION,
};
use futures::future::join_all;
use miette::{miette, IntoDiagnostic, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Error codes owned by the CLI.
mod codes {
    pub const CDN_RUNTIME_FAILED: &str = "CDN_RUNTIME_FAILED";
    pub const CDN_MANIFEST_WRITE_FAILED: &str = "CDN_MANIFEST_WRITE_FAILED";
}

/// Resolve command action.
#[derive(Debug, Clone)]
pub struct ResolveAction {
    pub cwd: PathBuf,
    /// Specifiers to resolve. Empty = `dependencies` of package.json.
    pub specifiers: Vec<String>,
    pub env: Option<Environment>,
    pub mode: Option<BuildMode>,
    pub exclude: Option<Vec<String>>,
    pub only: Option<Vec<String>>,
    pub resolver: Option<String>,
    pub output: Option<OutputTarget>,
    pub manifest_out: Option<PathBuf>,
    pub disable: bool,
    pub verbose: bool,
}

/// Resolve result for JSON output.
#[derive(Serialize, Default)]
struct ResolveResultJson {
    ok: bool,
    schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    env: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'static str>,
    decisions: Vec<DecisionJson>,
    assets: Vec<AssetJson>,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<Vec<EmittedChunk>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

#[derive(Serialize)]
struct DecisionJson {
    specifier: String,
    /// `external`, `bundle` or `defer`.
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    var: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Serialize)]
struct AssetJson {
    name: String,
    url: String,
}

#[derive(Serialize)]
struct ErrorJson {
    code: String,
    message: String,
}

/// A failure with a stable code.
struct CommandError {
    code: &'static str,
    message: String,
}

impl CommandError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<CdnError> for CommandError {
    fn from(err: CdnError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<PluginError> for CommandError {
    fn from(err: PluginError) -> Self {
        Self::new(err.code, err.message)
    }
}

/// Output-specific artifact of a finalized pass.
enum Artifact {
    Chunks(Vec<EmittedChunk>),
    Html(String),
    Manifest(BTreeMap<String, String>),
}

/// Run the resolve command.
///
/// When `json` is true, outputs a single JSON object to stdout.
pub fn run(action: ResolveAction, json: bool) -> Result<()> {
    match execute(&action) {
        Ok(result) => {
            if json {
                let out = serde_json::to_string_pretty(&result).into_diagnostic()?;
                println!("{out}");
            } else {
                print_human(&result);
            }
            Ok(())
        }
        Err(err) => {
            if json {
                let result = ResolveResultJson {
                    ok: false,
                    schema_version: SCHEMA_VERSION,
                    error: Some(ErrorJson {
                        code: err.code.to_string(),
                        message: err.message,
                    }),
                    ..ResolveResultJson::default()
                };
                let out = serde_json::to_string(&result).into_diagnostic()?;
                println!("{out}");
                std::process::exit(1);
            }
            Err(miette!(code = err.code, "{}", err.message))
        }
    }
}

fn execute(action: &ResolveAction) -> Result<ResolveResultJson, CommandError> {
    let options = build_options(action)?;
    let output = options.output;
    let plugin = CdnPlugin::new(options, &action.cwd)?;

    let specifiers = if action.specifiers.is_empty() {
        project_dependencies(&action.cwd)?
    } else {
        action.specifiers.clone()
    };
    debug!(
        count = specifiers.len(),
        env = %plugin.environment(),
        disabled = plugin.is_disabled(),
        "resolving"
    );

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CommandError::new(codes::CDN_RUNTIME_FAILED, e.to_string()))?;
    let results = runtime.block_on(join_all(
        specifiers
            .iter()
            .map(|specifier| plugin.resolve_module(&action.cwd, specifier)),
    ));
    let replacements = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    crate::logging::forward_diagnostics(&plugin.diagnostics());

    let environment = plugin.environment();
    let (report, artifact) = finalize(plugin, output);

    crate::logging::forward_warnings(&report.warnings);

    if let (Some(path), Artifact::Manifest(manifest)) = (&action.manifest_out, &artifact) {
        write_manifest(&action.cwd.join(path), manifest)?;
    }

    let urls: BTreeMap<&str, &str> = report
        .entries
        .iter()
        .map(|e| (e.specifier.as_str(), e.descriptor.url.as_str()))
        .collect();

    let decisions = specifiers
        .iter()
        .zip(replacements)
        .map(|(specifier, replacement)| {
            let url = match replacement {
                ModuleReplacement::UseDefault => None,
                ModuleReplacement::External(_) | ModuleReplacement::Skip => {
                    urls.get(specifier.as_str()).map(|u| (*u).to_string())
                }
            };
            DecisionJson {
                specifier: specifier.clone(),
                result: replacement.as_str(),
                var: match replacement {
                    ModuleReplacement::External(var) => Some(var),
                    ModuleReplacement::UseDefault | ModuleReplacement::Skip => None,
                },
                url,
            }
        })
        .collect();

    let assets = report
        .entries
        .iter()
        .map(|e| AssetJson {
            name: e.descriptor.name.clone(),
            url: e.descriptor.url.clone(),
        })
        .collect();

    let mut result = ResolveResultJson {
        ok: true,
        schema_version: SCHEMA_VERSION,
        env: Some(environment.as_str()),
        output: Some(output.as_str()),
        decisions,
        assets,
        warnings: report.warnings,
        ..ResolveResultJson::default()
    };
    match artifact {
        Artifact::Chunks(chunks) => result.chunks = Some(chunks),
        Artifact::Html(tags) => result.html = Some(tags),
        Artifact::Manifest(manifest) => result.manifest = Some(manifest),
    }

    Ok(result)
}

/// Options from `cdnpack.json`, overridden by flags.
fn build_options(action: &ResolveAction) -> Result<CdnOptions, CdnError> {
    let mut options = CdnOptions::load(&action.cwd)?.unwrap_or_default();

    if let Some(env) = action.env {
        options = options.with_env(env);
    }
    if let Some(mode) = action.mode {
        options = options.with_mode(mode);
    }

    // A list given on the command line replaces both lists from the file
    match (&action.exclude, &action.only) {
        (Some(exclude), None) => {
            options.only = None;
            options = options.with_exclude(exclude.iter().cloned());
        }
        (None, Some(only)) => {
            options.exclude = None;
            options = options.with_only(only.iter().cloned());
        }
        (Some(exclude), Some(only)) => {
            options = options
                .with_exclude(exclude.iter().cloned())
                .with_only(only.iter().cloned());
        }
        (None, None) => {}
    }

    if let Some(resolver) = &action.resolver {
        options = options.with_resolver(ResolverKind::Named(resolver.clone()));
    }
    if action.manifest_out.is_some() {
        options = options.with_output(OutputTarget::Manifest);
    } else if let Some(output) = action.output {
        options = options.with_output(output);
    }
    if action.disable {
        options = options.with_disable(true);
    }
    if action.verbose {
        options = options.with_verbose(true);
    }

    Ok(options)
}

/// Sorted `dependencies` of `<cwd>/package.json`; none without the file.
fn project_dependencies(cwd: &Path) -> Result<Vec<String>, CdnError> {
    let path = cwd.join("package.json");
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let content =
        std::fs::read_to_string(&path).map_err(|e| CdnError::metadata_invalid(&path, e.to_string()))?;
    let pkg: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| CdnError::metadata_invalid(&path, e.to_string()))?;

    let mut names: Vec<String> = pkg
        .get("dependencies")
        .and_then(serde_json::Value::as_object)
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default();
    names.sort();
    Ok(names)
}

fn finalize(plugin: CdnPlugin, output: OutputTarget) -> (PassReport, Artifact) {
    match output {
        OutputTarget::Chunks => {
            let mut out = ChunkEmitter::new();
            let report = plugin.finalize(&mut out);
            (report, Artifact::Chunks(out.chunks))
        }
        OutputTarget::Html => {
            let mut out = HtmlScriptAssets::default();
            let report = plugin.finalize(&mut out);
            (report, Artifact::Html(out.script_tags()))
        }
        OutputTarget::Manifest => {
            let mut out = AssetManifest::new();
            let report = plugin.finalize(&mut out);
            (report, Artifact::Manifest(out.assets))
        }
    }
}

fn write_manifest(path: &Path, manifest: &BTreeMap<String, String>) -> Result<(), CommandError> {
    let write_failed = |e: &dyn std::fmt::Display| {
        CommandError::new(
            codes::CDN_MANIFEST_WRITE_FAILED,
            format!("Failed to write manifest to {}: {e}", path.display()),
        )
    };

    let content = serde_json::to_string_pretty(manifest).map_err(|e| write_failed(&e))?;
    std::fs::write(path, content).map_err(|e| write_failed(&e))?;
    debug!(path = %path.display(), entries = manifest.len(), "wrote manifest");
    Ok(())
}

fn print_human(result: &ResolveResultJson) {
    let width = result
        .decisions
        .iter()
        .map(|d| d.specifier.len())
        .max()
        .unwrap_or(0);

    for decision in &result.decisions {
        let mut line = format!("{:<width$}  {:<8}", decision.specifier, decision.result);
        if let Some(var) = &decision.var {
            let _ = write!(line, "  {var}");
        }
        if let Some(url) = &decision.url {
            let _ = write!(line, "  {url}");
        }
        println!("{}", line.trim_end());
    }

    println!();
    println!(
        "env: {}  output: {}  assets: {}",
        result.env.unwrap_or("development"),
        result.output.unwrap_or("chunks"),
        result.assets.len()
    );

    if let Some(html) = &result.html {
        if !html.is_empty() {
            println!("{html}");
        }
    }

    for warning in &result.warnings {
        println!("warning: {warning}");
    }
}
