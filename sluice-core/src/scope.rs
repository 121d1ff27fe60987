//! Scope identity generation
//!
//! Implicit isolation boundaries need names nobody else picked. The
//! generator hands out `{prefix}{n}` tokens from an atomic counter, so
//! tokens stay distinct even when components are isolated from several
//! threads at once.

use crate::channel::DEFAULT_SEPARATOR;
use crate::config::ConfigError;
use sluice_types::ScopeToken;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default prefix for generated scope tokens
pub const DEFAULT_SCOPE_PREFIX: &str = "sluice";

/// Check that tokens built from `prefix` parse to a single path segment
///
/// The default separator is always checked, along with every separator in
/// `separators`. A prefix containing one would let an implicit token
/// coincide with a nested explicit path.
pub fn check_prefix(
    prefix: &str,
    separators: impl IntoIterator<Item = char>,
) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Err(ConfigError::Invalid("scope prefix must not be empty".into()));
    }
    for separator in std::iter::once(DEFAULT_SEPARATOR).chain(separators) {
        if prefix.contains(separator) {
            return Err(ConfigError::Invalid(format!(
                "scope prefix {:?} contains channel separator {:?}",
                prefix, separator
            )));
        }
    }
    Ok(())
}

/// Produces pairwise distinct scope tokens
///
/// The generator is an ordinary value rather than process-global state;
/// share one through an `Arc` wherever tokens must not collide.
#[derive(Debug)]
pub struct ScopeGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl ScopeGenerator {
    /// Create a generator using the default prefix
    pub fn new() -> Self {
        Self::from_prefix(DEFAULT_SCOPE_PREFIX.to_string())
    }

    /// Create a generator with a custom token prefix
    ///
    /// Fails if the prefix is empty or contains the default separator.
    /// Channels with other separators are checked by `IsolationConfig`.
    pub fn with_prefix(prefix: impl Into<String>) -> Result<Self, ConfigError> {
        let prefix = prefix.into();
        check_prefix(&prefix, std::iter::empty())?;
        Ok(Self::from_prefix(prefix))
    }

    fn from_prefix(prefix: String) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(0),
        }
    }

    /// Draw the next token
    pub fn next_scope(&self) -> ScopeToken {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        ScopeToken::new(format!("{}{}", self.prefix, n))
    }

    /// Number of tokens handed out so far
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for ScopeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_tokens_are_sequential() {
        let generator = ScopeGenerator::new();
        assert_eq!(generator.next_scope().as_str(), "sluice1");
        assert_eq!(generator.next_scope().as_str(), "sluice2");
        assert_eq!(generator.issued(), 2);
    }

    #[test]
    fn test_custom_prefix() {
        let generator = ScopeGenerator::with_prefix("iso-").unwrap();
        assert_eq!(generator.next_scope().as_str(), "iso-1");
        assert_eq!(generator.prefix(), "iso-");
    }

    #[test]
    fn test_prefix_must_stay_one_segment() {
        let err = ScopeGenerator::with_prefix("a.b").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(ScopeGenerator::with_prefix("").is_err());

        assert!(check_prefix("a-b", ['/']).is_ok());
        assert!(check_prefix("a/b", ['/']).is_err());
    }

    #[test]
    fn test_independent_generators_restart() {
        let a = ScopeGenerator::new();
        let b = ScopeGenerator::new();
        a.next_scope();
        assert_eq!(b.next_scope().as_str(), "sluice1");
    }

    #[test]
    fn test_concurrent_uniqueness() {
        let generator = Arc::new(ScopeGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || {
                    (0..250).map(|_| generator.next_scope()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for token in handle.join().unwrap() {
                assert!(seen.insert(token), "duplicate scope token");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    proptest! {
        #[test]
        fn prop_tokens_pairwise_distinct(n in 1usize..500) {
            let generator = ScopeGenerator::new();
            let tokens: HashSet<_> = (0..n).map(|_| generator.next_scope()).collect();
            prop_assert_eq!(tokens.len(), n);
        }
    }
}
