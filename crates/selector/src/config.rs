//! Compilation settings.
//!
//! Settings can be constructed programmatically or loaded from environment variables.

use std::env;

/// Markup flavour a selector is compiled for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `class` attributes compare per whitespace-separated token for `=` and `!=`.
    #[default]
    Html,
    /// Every attribute, `class` included, compares as a plain string.
    Xml,
}

impl Dialect {
    /// Parse `html` or `xml`, ignoring ASCII case and surrounding whitespace.
    #[inline]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("html") {
            Some(Self::Html)
        } else if name.eq_ignore_ascii_case("xml") {
            Some(Self::Xml)
        } else {
            None
        }
    }
}

/// Options that change the meaning of a selector text. Part of the cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompileOptions {
    /// Whether element and attribute names compare case-sensitively.
    pub case_sensitive: bool,
    /// Markup flavour.
    pub dialect: Dialect,
}

impl CompileOptions {
    /// Case-insensitive names with `class` tokenization.
    pub const HTML: Self = Self::new(false, Dialect::Html);
    /// Case-sensitive names, no tokenization.
    pub const XML: Self = Self::new(true, Dialect::Xml);

    #[inline]
    #[must_use]
    pub const fn new(case_sensitive: bool, dialect: Dialect) -> Self {
        Self {
            case_sensitive,
            dialect,
        }
    }

    /// Whether `class` gets per-token equality.
    #[inline]
    pub(crate) fn tokenizes_class(self) -> bool {
        self.dialect == Dialect::Html
    }

    /// Normalize a name literal for run-time comparison.
    #[inline]
    pub(crate) fn normalize_name(self, name: &str) -> Box<str> {
        if self.case_sensitive {
            name.into()
        } else {
            name.to_ascii_lowercase().into_boxed_str()
        }
    }
}

impl Default for CompileOptions {
    #[inline]
    fn default() -> Self {
        Self::HTML
    }
}

/// Settings for a [`SelectorCompiler`](crate::SelectorCompiler).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Maximum number of compiled selectors kept per option set.
    pub cache_capacity: usize,
    /// Options used by `SelectorCompiler::compile`.
    pub options: CompileOptions,
}

impl CompilerConfig {
    /// Capacity used when nothing else is configured.
    pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

    /// Construct a `CompilerConfig` with explicit values.
    ///
    /// # Arguments
    ///
    /// * `cache_capacity` - Entries kept per option set; `0` disables memoization
    /// * `options` - Default compile options
    #[inline]
    #[must_use]
    pub const fn new(cache_capacity: usize, options: CompileOptions) -> Self {
        Self {
            cache_capacity,
            options,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `MARKUP_SELECTOR_CACHE_CAPACITY`: cache entries per option set (default: 1000)
    /// - `MARKUP_SELECTOR_DIALECT`: `html` or `xml` (default: `html`)
    /// - `MARKUP_SELECTOR_CASE_SENSITIVE`: `1`/`true` or `0`/`false`
    ///   (default: case-sensitive for `xml`, insensitive for `html`)
    ///
    /// Unparsable values fall back to the defaults.
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from `lookup`, which maps the `MARKUP_SELECTOR_*` names used by
    /// [`from_env`](Self::from_env) to their raw values.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_capacity = lookup("MARKUP_SELECTOR_CACHE_CAPACITY")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(Self::DEFAULT_CACHE_CAPACITY);
        let dialect = lookup("MARKUP_SELECTOR_DIALECT")
            .and_then(|val| Dialect::from_name(&val))
            .unwrap_or_default();
        let case_sensitive = lookup("MARKUP_SELECTOR_CASE_SENSITIVE")
            .and_then(|val| parse_flag(&val))
            .unwrap_or(dialect == Dialect::Xml);
        Self::new(cache_capacity, CompileOptions::new(case_sensitive, dialect))
    }
}

impl Default for CompilerConfig {
    #[inline]
    fn default() -> Self {
        Self::new(Self::DEFAULT_CACHE_CAPACITY, CompileOptions::HTML)
    }
}

/// Parse a boolean environment flag.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
