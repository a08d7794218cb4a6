//! Minimal chromosome metadata: length lookup and alias resolution.
//!
//! `spec.md` treats this as an external collaborator specified only by the
//! interface it exposes. Grounded on `modtools/alias.py`
//! (`examples/original_source/`), whose `Alias` class resolves names like
//! `chr1`/`1`/`NC_000001` to one basic name; we keep the same two-map shape
//! (`basics`: alias -> canonical, `lengths`: canonical -> length) without the
//! file-loading machinery the spec calls out of scope.

use std::collections::HashMap;

/// Chromosome lengths plus alias resolution, keyed on a canonical name.
#[derive(Debug, Clone, Default)]
pub struct ChromRegistry {
    lengths: HashMap<String, i64>,
    basics: HashMap<String, String>,
}

impl ChromRegistry {
    pub fn new() -> Self {
        ChromRegistry::default()
    }

    /// Register a chromosome under its canonical name with a set of aliases
    /// (the canonical name is itself always a valid alias).
    pub fn register(&mut self, canonical: &str, length: i64, aliases: &[&str]) {
        self.lengths.insert(canonical.to_string(), length);
        self.basics.insert(canonical.to_string(), canonical.to_string());
        for alias in aliases {
            self.basics.insert((*alias).to_string(), canonical.to_string());
        }
    }

    /// Resolve any known alias to its canonical name; unknown names pass
    /// through unchanged, matching `Alias.getBasicName`'s `dict.get` fallback.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.basics.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn length(&self, name: &str) -> Option<i64> {
        self.lengths.get(self.canonical(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lengths.contains_key(self.canonical(name))
    }

    /// True when `a` and `b` name the same chromosome under any alias.
    pub fn same_chrom(&self, a: &str, b: &str) -> bool {
        self.canonical(a) == self.canonical(b)
    }
}
