//! String interner for identifier storage.
//!
//! Provides O(1) interning and lookup with thread-safe concurrent access.
//! Interned strings are leaked: identifiers live for the whole compilation,
//! so the arena-per-process tradeoff is the right one.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::Name;

struct InternerInner {
    /// Map from string content to index.
    map: FxHashMap<&'static str, u32>,
    /// Storage for string contents, indexed by `Name::raw()`.
    strings: Vec<&'static str>,
}

/// Thread-safe string interner.
///
/// Provides O(1) lookup and equality comparison for interned strings.
/// Can be wrapped in `Arc` for sharing across concurrently checked modules.
pub struct StringInterner {
    inner: RwLock<InternerInner>,
}

impl StringInterner {
    /// Create a new interner with the empty string pre-interned at index 0.
    pub fn new() -> Self {
        let mut inner = InternerInner {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(256),
        };
        inner.map.insert("", 0);
        inner.strings.push("");
        StringInterner {
            inner: RwLock::new(inner),
        }
    }

    /// Intern a string, returning its `Name`.
    ///
    /// Repeated interning of the same content returns the same `Name`.
    pub fn intern(&self, s: &str) -> Name {
        {
            let inner = self.inner.read();
            if let Some(&idx) = inner.map.get(s) {
                return Name::from_raw(idx);
            }
        }
        let mut inner = self.inner.write();
        // Re-check under the write lock: another thread may have interned
        // between lock transitions.
        if let Some(&idx) = inner.map.get(s) {
            return Name::from_raw(idx);
        }
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let idx = u32::try_from(inner.strings.len()).unwrap_or(u32::MAX);
        inner.strings.push(leaked);
        inner.map.insert(leaked, idx);
        Name::from_raw(idx)
    }

    /// Look up the string content for a `Name`.
    ///
    /// Returns the empty string for names not produced by this interner.
    pub fn resolve(&self, name: Name) -> &'static str {
        let inner = self.inner.read();
        inner
            .strings
            .get(name.raw() as usize)
            .copied()
            .unwrap_or("")
    }

    /// Number of interned strings (including the pre-interned empty string).
    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    /// Whether the interner holds only the pre-interned empty string.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringInterner")
            .field("len", &self.len())
            .finish()
    }
}
