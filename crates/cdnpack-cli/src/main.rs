#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use cdnpack_core::{BuildMode, Environment, OutputTarget};
use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cdnpack")]
#[command(author, version, about = "Decide which dependencies a build loads from a CDN", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Decide, per module request, whether it is served from the CDN
    Resolve {
        /// Module specifiers (default: dependencies of package.json)
        specifiers: Vec<String>,

        /// Environment: development or production
        #[arg(long)]
        env: Option<Environment>,

        /// Build mode of the host: development, production or none
        #[arg(long)]
        mode: Option<BuildMode>,

        /// Packages never served from the CDN
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Only these packages may be served from the CDN
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// CDN lookup: module-to-cdn, jsdelivr, or a path to a .json catalogue
        #[arg(long)]
        resolver: Option<String>,

        /// Output: chunks, html or manifest
        #[arg(long)]
        output: Option<OutputTarget>,

        /// Write the asset manifest to this file (implies --output manifest)
        #[arg(long, value_name = "PATH")]
        manifest_out: Option<PathBuf>,

        /// Turn CDN substitution off
        #[arg(long)]
        disable: bool,

        /// Report one line per resolution outcome
        #[arg(long)]
        verbose_cdn: bool,
    },

    /// List the built-in CDN catalogue
    Catalog {
        /// Show URLs for this environment
        #[arg(long)]
        env: Option<Environment>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Resolve {
            specifiers,
            env,
            mode,
            exclude,
            only,
            resolver,
            output,
            manifest_out,
            disable,
            verbose_cdn,
        }) => commands::resolve::run(
            commands::resolve::ResolveAction {
                cwd,
                specifiers,
                env,
                mode,
                exclude: (!exclude.is_empty()).then_some(exclude),
                only: (!only.is_empty()).then_some(only),
                resolver,
                output,
                manifest_out,
                disable,
                verbose: verbose_cdn,
            },
            cli.json,
        ),
        Some(Commands::Catalog { env }) => commands::catalog::run(env, cli.json),
    }
}
