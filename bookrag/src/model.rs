//! Model-name normalization.

use std::collections::HashMap;

/// Normalizes model identifiers before they are sent to a provider.
///
/// A resolver first adds its namespace prefix when the name lacks one, then
/// looks the prefixed name up in an alias table. Names without an alias pass
/// through unchanged.
///
/// ```
/// use bookrag::ModelResolver;
///
/// let resolver = ModelResolver::gemini_defaults();
/// assert_eq!(resolver.resolve("gemini-1.5-flash"), "models/gemini-2.0-flash");
/// assert_eq!(resolver.resolve("models/gemini-2.5-pro"), "models/gemini-2.5-pro");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResolver {
    prefix: Option<String>,
    aliases: HashMap<String, String>,
}

impl ModelResolver {
    /// Create a resolver with no prefix and no aliases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver for Gemini: `models/` prefix, retired 1.5 models mapped to
    /// `models/gemini-2.0-flash`.
    pub fn gemini_defaults() -> Self {
        Self::new()
            .with_prefix("models/")
            .with_alias("models/gemini-1.5-flash", "models/gemini-2.0-flash")
            .with_alias("models/gemini-1.5-pro", "models/gemini-2.0-flash")
    }

    /// Set the namespace prefix added to names that lack it.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Map the (prefixed) name `from` to `to`.
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.insert(from.into(), to.into());
        self
    }

    /// Resolve `name` to the identifier the provider should receive.
    pub fn resolve(&self, name: &str) -> String {
        let name = name.trim();
        let prefixed = match &self.prefix {
            Some(prefix) if !name.starts_with(prefix.as_str()) => format!("{prefix}{name}"),
            _ => name.to_string(),
        };
        self.aliases.get(&prefixed).cloned().unwrap_or(prefixed)
    }
}
