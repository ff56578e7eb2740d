//! Module specifier classification.
//!
//! Only top-level package imports are eligible for CDN substitution:
//! - `react`, `@angular/core` are package requests
//! - `lodash/fp`, `@scope/pkg/sub` carry a sub-path and are not
//! - `./utils`, `../lib`, `/abs/path`, `C:\dir` are file requests

use std::sync::OnceLock;

use regex_lite::Regex;

/// Leading package name: optional `@scope/` followed by the name.
const PACKAGE_NAME_PATTERN: &str = r"^((?:@[a-z0-9][\w.-]*/)?[a-z0-9][\w.-]*)";

fn package_name_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(PACKAGE_NAME_PATTERN).ok()).as_ref()
}

/// A specifier that names a package, possibly with a sub-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest<'a> {
    /// Full package name (`name` or `@scope/name`).
    pub name: &'a str,
    /// Anything after the package name, without the leading `/`.
    pub subpath: Option<&'a str>,
}

impl<'a> PackageRequest<'a> {
    /// Parse a requested specifier.
    ///
    /// Returns `None` when the request does not start with a package name
    /// (relative, absolute, Windows paths, loader syntax).
    #[must_use]
    pub fn parse(specifier: &'a str) -> Option<Self> {
        if specifier.contains('\\') {
            return None;
        }

        let captures = package_name_regex()?.captures(specifier)?;
        let name = captures.get(1)?.as_str();
        let rest = &specifier[name.len()..];

        if rest.is_empty() {
            return Some(Self {
                name,
                subpath: None,
            });
        }

        // `name/sub` is a sub-module; `name!loader` or `name?query` is not a package
        let sub = rest.strip_prefix('/')?;
        Some(Self {
            name,
            subpath: Some(sub),
        })
    }

    /// Whether the request targets the package root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.subpath.is_none()
    }

    /// Scope without the `@` prefix, if scoped.
    #[must_use]
    pub fn scope(&self) -> Option<&'a str> {
        self.name
            .strip_prefix('@')
            .and_then(|rest| rest.split_once('/'))
            .map(|(scope, _)| scope)
    }
}

/// Return the package name when `specifier` is eligible for CDN substitution.
///
/// Eligible means a bare or scoped package name with no sub-path.
#[must_use]
pub fn eligible_package_name(specifier: &str) -> Option<&str> {
    PackageRequest::parse(specifier)
        .filter(PackageRequest::is_root)
        .map(|req| req.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_package() {
        let req = PackageRequest::parse("react").unwrap();
        assert_eq!(req.name, "react");
        assert!(req.is_root());
        assert_eq!(req.scope(), None);
    }

    #[test]
    fn test_scoped_package() {
        let req = PackageRequest::parse("@angular/core").unwrap();
        assert_eq!(req.name, "@angular/core");
        assert!(req.is_root());
        assert_eq!(req.scope(), Some("angular"));
    }

    #[test]
    fn test_subpath() {
        let req = PackageRequest::parse("lodash/fp/map").unwrap();
        assert_eq!(req.name, "lodash");
        assert_eq!(req.subpath, Some("fp/map"));

        let req = PackageRequest::parse("@scope/pkg/sub").unwrap();
        assert_eq!(req.name, "@scope/pkg");
        assert_eq!(req.subpath, Some("sub"));
    }

    #[test]
    fn test_file_requests_are_not_packages() {
        assert!(PackageRequest::parse("./foo").is_none());
        assert!(PackageRequest::parse("../bar").is_none());
        assert!(PackageRequest::parse("/abs/path").is_none());
        assert!(PackageRequest::parse("C:\\dir\\file").is_none());
        assert!(PackageRequest::parse("").is_none());
    }

    #[test]
    fn test_loader_syntax_is_not_a_package() {
        assert!(PackageRequest::parse("style-loader!./main.css").is_none());
    }

    #[test]
    fn test_names_with_dots_and_dashes() {
        assert_eq!(eligible_package_name("zone.js"), Some("zone.js"));
        assert_eq!(eligible_package_name("left-pad"), Some("left-pad"));
        assert_eq!(eligible_package_name("babel-polyfill"), Some("babel-polyfill"));
    }

    #[test]
    fn test_eligible_package_name() {
        assert_eq!(eligible_package_name("react"), Some("react"));
        assert_eq!(eligible_package_name("@angular/core"), Some("@angular/core"));
        assert_eq!(eligible_package_name("react/lib/ReactDOM"), None);
        assert_eq!(eligible_package_name("./single.js"), None);
        assert_eq!(eligible_package_name("@scope"), None);
    }
}
