use rustc_hash::FxHashSet as HashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::cdn::ResolverKind;
use crate::error::CdnError;

/// Name of the optional options file in the project root.
pub const CONFIG_FILE_NAME: &str = "cdnpack.json";

/// Environment variable consulted when neither `env` nor `mode` is set.
pub const NODE_ENV: &str = "NODE_ENV";

/// Which CDN build of a package to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Unminified builds.
    #[default]
    Development,
    /// Minified builds.
    Production,
}

impl Environment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Read the environment from `NODE_ENV`, if set.
    #[must_use]
    pub fn from_node_env() -> Option<Self> {
        let value = std::env::var(NODE_ENV).ok()?;
        Some(if value.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        })
    }
}

impl FromStr for Environment {
    type Err = CdnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(CdnError::config(format!(
                "Invalid env '{other}'. Use: development or production"
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ambient build mode of the host bundler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    Production,
    None,
}

impl BuildMode {
    #[must_use]
    pub fn environment(self) -> Environment {
        match self {
            Self::Production => Environment::Production,
            Self::Development | Self::None => Environment::Development,
        }
    }
}

impl FromStr for BuildMode {
    type Err = CdnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            "none" => Ok(Self::None),
            other => Err(CdnError::config(format!(
                "Invalid mode '{other}'. Use: development, production or none"
            ))),
        }
    }
}

/// Where the finalized CDN assets go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    /// One bundler chunk per CDN asset.
    #[default]
    Chunks,
    /// Script assets injected by the HTML add-on.
    Html,
    /// Entries in the asset manifest.
    Manifest,
}

impl OutputTarget {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chunks => "chunks",
            Self::Html => "html",
            Self::Manifest => "manifest",
        }
    }
}

impl FromStr for OutputTarget {
    type Err = CdnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chunks" => Ok(Self::Chunks),
            "html" => Ok(Self::Html),
            "manifest" => Ok(Self::Manifest),
            other => Err(CdnError::config(format!(
                "Invalid output '{other}'. Use: chunks, html or manifest"
            ))),
        }
    }
}

/// Plugin options, as given to the constructor or read from `cdnpack.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CdnOptions {
    /// Turn the plugin into a no-op.
    pub disable: bool,

    /// Explicit environment; wins over `mode` and `NODE_ENV`.
    pub env: Option<Environment>,

    /// Ambient build mode of the host.
    pub mode: Option<BuildMode>,

    /// Packages never served from the CDN.
    pub exclude: Option<Vec<String>>,

    /// Only these packages may be served from the CDN.
    pub only: Option<Vec<String>>,

    /// Record one diagnostic line per resolution outcome.
    pub verbose: bool,

    /// CDN lookup strategy.
    pub resolver: ResolverKind,

    pub output: OutputTarget,
}

impl CdnOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from `<root>/cdnpack.json`, if the file exists.
    pub fn load(root: &Path) -> Result<Option<Self>, CdnError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| CdnError::ConfigFile {
            path: path.clone(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CdnError::ConfigFile {
                path,
                message: e.to_string(),
            })
    }

    /// The environment a build with these options resolves for.
    ///
    /// Explicit `env`, then `mode`, then `NODE_ENV`, then development.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.env
            .or_else(|| self.mode.map(BuildMode::environment))
            .or_else(Environment::from_node_env)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn with_disable(mut self, disable: bool) -> Self {
        self.disable = disable;
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: ResolverKind) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }
}

/// Inclusion policy of one plugin instance.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    exclude: Option<HashSet<String>>,
    only: Option<HashSet<String>>,
    environment: Environment,
    verbose: bool,
}

impl PolicyConfig {
    /// Build a policy.
    ///
    /// # Errors
    /// Returns a config error if both `exclude` and `only` are given.
    pub fn new(
        exclude: Option<Vec<String>>,
        only: Option<Vec<String>>,
        environment: Environment,
        verbose: bool,
    ) -> Result<Self, CdnError> {
        if exclude.is_some() && only.is_some() {
            return Err(CdnError::config(
                "You can't use 'exclude' and 'only' at the same time",
            ));
        }

        Ok(Self {
            exclude: exclude.map(|names| names.into_iter().collect()),
            only: only.map(|names| names.into_iter().collect()),
            environment,
            verbose,
        })
    }

    pub fn from_options(options: &CdnOptions) -> Result<Self, CdnError> {
        Self::new(
            options.exclude.clone(),
            options.only.clone(),
            options.environment(),
            options.verbose,
        )
    }

    /// Whether `name` may be served from the CDN at all.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        if self.exclude.as_ref().is_some_and(|ex| ex.contains(name)) {
            return false;
        }
        self.only.as_ref().map_or(true, |only| only.contains(name))
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}
