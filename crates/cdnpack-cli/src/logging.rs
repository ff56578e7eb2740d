//! Tracing setup and event forwarding for the CLI.
//!
//! `cdnpack-core` does not log. A resolution pass hands back its verbose
//! diagnostics and its warnings as data; [`forward_diagnostics`] and
//! [`forward_warnings`] turn them into `info` and `warn` events here.

use cdnpack_core::{Diagnostic, DiagnosticKind};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the subscriber. Events go to stderr; stdout carries results.
///
/// `verbosity` counts `-v` flags: none logs at INFO, one at DEBUG, more at
/// TRACE. `RUST_LOG` directives apply first and the flag overrides them.
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Ok(directive) = format!("cdnpack={level}").parse() {
        filter = filter.add_directive(directive);
    }
    let filter = filter.add_directive(level.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

/// Stable name of a diagnostic kind in structured output.
fn kind_name(kind: DiagnosticKind) -> &'static str {
    match kind {
        DiagnosticKind::Served => "served",
        DiagnosticKind::Missing => "missing",
        DiagnosticKind::Conflict => "conflict",
        DiagnosticKind::PeerFailure => "peer_failure",
        DiagnosticKind::Cycle => "cycle",
    }
}

/// One `info` event per verbose outcome line, in pass order.
pub fn forward_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        info!(
            kind = kind_name(diagnostic.kind),
            specifier = %diagnostic.specifier,
            "{}",
            diagnostic.message
        );
    }
}

/// One `warn` event per pass warning.
pub fn forward_warnings(warnings: &[String]) {
    for warning in warnings {
        warn!("{warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_json() {
        for kind in [
            DiagnosticKind::Served,
            DiagnosticKind::Missing,
            DiagnosticKind::Conflict,
            DiagnosticKind::PeerFailure,
            DiagnosticKind::Cycle,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind_name(kind)));
        }
    }
}
