//! Bounded, thread-safe memoization of compiled selectors.

use crate::config::{CompileOptions, CompilerConfig, Dialect};
use crate::error::SelectorResult;
use crate::parser::compile_selector;
use crate::CompiledSelector;
use log::{debug, trace};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Maps a `%reference` used in a selector to the selector text it stands for.
///
/// Resolvers should be long-lived: a [`SelectorCompiler`] caches per resolver instance.
pub trait ReferenceResolver: Send + Sync {
    /// Selector text for `reference`, or `None` if it is unknown.
    fn resolve_reference(&self, reference: &str) -> Option<String>;
}

impl<F> ReferenceResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    #[inline]
    fn resolve_reference(&self, reference: &str) -> Option<String> {
        self(reference)
    }
}

/// One cache map per option set.
type Partition = RwLock<FxHashMap<Box<str>, Arc<CompiledSelector>>>;

/// Compiles selector texts and memoizes the results.
///
/// Lookups take a shared lock; misses take the exclusive lock, re-check, and
/// compile. Once a partition holds `cache_capacity` entries, further selectors
/// are still compiled but no longer stored.
pub struct SelectorCompiler {
    /// Settings, including the options used by [`Self::compile`].
    config: CompilerConfig,
    /// Optional `%reference` resolver shared by every compilation.
    resolver: Option<Arc<dyn ReferenceResolver>>,
    /// Cached selectors, one map per dialect and case-sensitivity combination.
    partitions: [Partition; 4],
}

impl SelectorCompiler {
    /// A compiler without a reference resolver.
    #[inline]
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            resolver: None,
            partitions: Default::default(),
        }
    }

    /// A compiler that resolves `%reference` modifiers through `resolver`.
    #[inline]
    #[must_use]
    pub fn with_resolver(config: CompilerConfig, resolver: Arc<dyn ReferenceResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            ..Self::new(config)
        }
    }

    #[inline]
    pub const fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile with the configured default options.
    ///
    /// # Errors
    /// Returns a syntax error for malformed selector text. Errors are never cached.
    #[inline]
    pub fn compile(&self, text: &str) -> SelectorResult<Arc<CompiledSelector>> {
        self.compile_with(text, self.config.options)
    }

    /// Compile with explicit options.
    ///
    /// # Errors
    /// Returns a syntax error for malformed selector text. Errors are never cached.
    pub fn compile_with(
        &self,
        text: &str,
        options: CompileOptions,
    ) -> SelectorResult<Arc<CompiledSelector>> {
        let partition = self.partition(options);
        if let Some(hit) = partition.read().get(text) {
            trace!("Selector cache hit for {text:?}");
            return Ok(Arc::clone(hit));
        }

        let mut entries = partition.write();
        if let Some(hit) = entries.get(text) {
            trace!("Selector cache hit for {text:?} after lock upgrade");
            return Ok(Arc::clone(hit));
        }
        let compiled = Arc::new(compile_selector(text, options, self.resolver.as_deref())?);
        if entries.len() < self.config.cache_capacity {
            entries.insert(text.into(), Arc::clone(&compiled));
            debug!("Cached selector {text:?} ({} entries)", entries.len());
        } else {
            debug!(
                "Selector cache full ({} entries), not storing {text:?}",
                self.config.cache_capacity
            );
        }
        Ok(compiled)
    }

    /// Number of cached selectors across all option sets.
    pub fn cached_len(&self) -> usize {
        self.partitions
            .iter()
            .map(|partition| partition.read().len())
            .sum()
    }

    /// Drop every cached selector. Selectors already handed out stay valid.
    pub fn clear(&self) {
        for partition in &self.partitions {
            partition.write().clear();
        }
    }

    #[inline]
    fn partition(&self, options: CompileOptions) -> &Partition {
        let [html, html_case_sensitive, xml_case_insensitive, xml] = &self.partitions;
        match (options.dialect, options.case_sensitive) {
            (Dialect::Html, false) => html,
            (Dialect::Html, true) => html_case_sensitive,
            (Dialect::Xml, false) => xml_case_insensitive,
            (Dialect::Xml, true) => xml,
        }
    }
}

impl Default for SelectorCompiler {
    #[inline]
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}
