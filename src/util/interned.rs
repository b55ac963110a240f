//! Process-wide interned strings.
//!
//! Entry names, compound keys and saved back-reference paths are drawn from a
//! small vocabulary, so every distinct string is stored once and handles
//! compare by pointer first.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

fn table() -> &'static Mutex<HashSet<Arc<str>>> {
    static TABLE: OnceLock<Mutex<HashSet<Arc<str>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Immutable string with a single shared allocation per distinct value.
#[derive(Clone)]
pub struct InternedString(Arc<str>);

impl InternedString {
    /// Intern `s`, reusing the existing allocation when present.
    pub fn new(s: &str) -> Self {
        let mut table = table().lock();
        if let Some(existing) = table.get(s) {
            return Self(existing.clone());
        }
        let value: Arc<str> = Arc::from(s);
        table.insert(value.clone());
        Self(value)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of distinct strings interned so far.
    pub fn num_unique_strings() -> usize {
        table().lock().len()
    }
}

impl Default for InternedString {
    fn default() -> Self {
        Self::new("")
    }
}

impl Deref for InternedString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for InternedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for InternedString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq for InternedString {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for InternedString {}

impl PartialEq<str> for InternedString {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for InternedString {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl PartialOrd for InternedString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InternedString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Hash for InternedString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl From<&str> for InternedString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InternedString {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&String> for InternedString {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_shares_allocation() {
        let a = InternedString::new("interned-test-value");
        let b = InternedString::from(String::from("interned-test-value"));
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering_by_value() {
        let mut v: Vec<InternedString> = ["b", "c", "a"].into_iter().map(InternedString::from).collect();
        v.sort();
        let names: Vec<&str> = v.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_unique_count_grows() {
        let before = InternedString::num_unique_strings();
        let a = InternedString::new("interned-count-value");
        let after = InternedString::num_unique_strings();
        assert!(after > before);
        let _b = InternedString::new(a.as_str());
        assert!(InternedString::num_unique_strings() >= after);
    }

    #[test]
    fn test_default_is_empty() {
        assert!(InternedString::default().is_empty());
    }
}
