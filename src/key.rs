//! Cache key resolution
//!
//! Turns a key template (`"product:{product_id}"`) or a prefix plus a
//! deterministic hash of the call arguments into a concrete cache key.
//! A placeholder that no binding source supplies is a recoverable condition:
//! the caller logs it and executes uncached.

use crate::error::CacheError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Named values extracted from a call's arguments (or its result), used to
/// fill key-template placeholders and to derive argument hashes.
///
/// Insertion uses `ToString`, so numeric ids work directly:
///
/// ```rust
/// use cache_gate::Bindings;
///
/// let bindings = Bindings::new().with("product_id", 7).with("region", "eu");
/// assert_eq!(bindings.get("product_id"), Some("7"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named value (builder style)
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(name.into(), value.to_string());
        self
    }

    /// Add a named value in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.values.insert(name.into(), value.to_string());
    }

    /// Look up a bound value by placeholder name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deterministic hash of all bound values, truncated to 16 hex chars.
    ///
    /// Iteration order is the sorted key order of the underlying map, so two
    /// calls with the same arguments always hash identically.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.values {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            use std::fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}

/// How a wrapper derives its cache key
#[derive(Debug, Clone)]
pub enum KeySpec {
    /// Explicit template with `{name}` placeholders filled from bindings
    Template(String),
    /// Prefix combined with a deterministic hash of all bindings,
    /// producing `prefix:<16-hex digest>`
    Prefix(String),
}

impl KeySpec {
    /// Resolve this spec against one or more binding sources.
    ///
    /// For templates, the first source that binds a placeholder wins. An
    /// unbound placeholder yields [`CacheError::KeyResolution`].
    pub fn resolve(&self, sources: &[&Bindings]) -> Result<String, CacheError> {
        match self {
            Self::Template(template) => resolve_template(template, sources),
            Self::Prefix(prefix) => {
                let merged = sources.first().copied().cloned().unwrap_or_default();
                Ok(format!("{prefix}:{}", merged.digest()))
            }
        }
    }
}

/// Expand `{name}` placeholders in `template` from the given sources.
///
/// Literal text passes through unchanged; `{{` and `}}` are not special
/// (templates here come from wrap-time configuration, not user input).
pub fn resolve_template(template: &str, sources: &[&Bindings]) -> Result<String, CacheError> {
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let (literal, tail) = rest.split_at(open);
        resolved.push_str(literal);

        let Some(close) = tail.find('}') else {
            // Unterminated brace: treat the remainder as literal text
            resolved.push_str(tail);
            return Ok(resolved);
        };

        let name = tail.get(1..close).unwrap_or_default();
        let value = sources.iter().find_map(|source| source.get(name));

        match value {
            Some(value) => resolved.push_str(value),
            None => {
                return Err(CacheError::KeyResolution {
                    template: template.to_string(),
                    placeholder: name.to_string(),
                });
            }
        }

        rest = tail.get(close + 1..).unwrap_or_default();
    }

    resolved.push_str(rest);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_resolution() {
        let bindings = Bindings::new().with("product_id", 7);
        let spec = KeySpec::Template("product:{product_id}".to_string());
        let key = spec.resolve(&[&bindings]).unwrap();
        assert_eq!(key, "product:7");
    }

    #[test]
    fn test_template_multiple_placeholders() {
        let bindings = Bindings::new().with("user_id", 42).with("page", 3);
        let key = resolve_template("user:{user_id}:orders:{page}", &[&bindings]).unwrap();
        assert_eq!(key, "user:42:orders:3");
    }

    #[test]
    fn test_missing_placeholder_is_recoverable_error() {
        let bindings = Bindings::new().with("other", 1);
        let err = resolve_template("product:{product_id}", &[&bindings]).unwrap_err();
        match err {
            CacheError::KeyResolution { placeholder, .. } => {
                assert_eq!(placeholder, "product_id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_later_source_fills_gaps() {
        let args = Bindings::new().with("category", "books");
        let result = Bindings::new().with("id", 9);
        let key = resolve_template("cat:{category}:item:{id}", &[&args, &result]).unwrap();
        assert_eq!(key, "cat:books:item:9");
    }

    #[test]
    fn test_prefix_digest_is_deterministic() {
        let a = Bindings::new().with("id", 7).with("region", "eu");
        let b = Bindings::new().with("region", "eu").with("id", 7);
        let spec = KeySpec::Prefix("product".to_string());
        assert_eq!(
            spec.resolve(&[&a]).unwrap(),
            spec.resolve(&[&b]).unwrap(),
            "insertion order must not change the key"
        );
    }

    #[test]
    fn test_prefix_digest_differs_per_arguments() {
        let spec = KeySpec::Prefix("product".to_string());
        let a = spec.resolve(&[&Bindings::new().with("id", 1)]).unwrap();
        let b = spec.resolve(&[&Bindings::new().with("id", 2)]).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("product:"));
        assert_eq!(a.len(), "product:".len() + 16);
    }

    #[test]
    fn test_template_without_placeholders() {
        let key = resolve_template("static:key", &[&Bindings::new()]).unwrap();
        assert_eq!(key, "static:key");
    }
}
