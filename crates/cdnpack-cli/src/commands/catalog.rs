//! `cdnpack catalog` command implementation.

use cdnpack_core::{Catalog, Environment, SCHEMA_VERSION};
use miette::{miette, IntoDiagnostic, Result};
use serde::Serialize;

#[derive(Serialize)]
struct CatalogJson {
    ok: bool,
    schema_version: u32,
    env: &'static str,
    modules: Vec<ModuleJson>,
}

#[derive(Serialize)]
struct ModuleJson {
    name: String,
    var: Option<String>,
    versions: Vec<RangeJson>,
}

#[derive(Serialize)]
struct RangeJson {
    range: String,
    url: String,
}

/// List the built-in catalogue with URL templates for `env`.
pub fn run(env: Option<Environment>, json: bool) -> Result<()> {
    let env = env.unwrap_or_default();
    let catalog = Catalog::builtin().map_err(|e| miette!(code = e.code(), "{e}"))?;

    let modules: Vec<ModuleJson> = catalog
        .entries()
        .map(|entry| ModuleJson {
            name: entry.name.clone(),
            var: entry.var.clone(),
            versions: entry
                .versions
                .iter()
                .map(|v| RangeJson {
                    range: v.range.clone(),
                    url: v.template(env).to_string(),
                })
                .collect(),
        })
        .collect();

    if json {
        let result = CatalogJson {
            ok: true,
            schema_version: SCHEMA_VERSION,
            env: env.as_str(),
            modules,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
        return Ok(());
    }

    for module in &modules {
        println!("{} ({})", module.name, module.var.as_deref().unwrap_or("no binding"));
        for version in &module.versions {
            println!("  {:<20} {}", version.range, version.url);
        }
    }
    println!();
    println!("{} modules ({env})", modules.len());

    Ok(())
}
