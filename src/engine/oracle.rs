//! File-change oracle seam.
//!
//! The scoring engine never shells out itself. Callers resolve file changes up
//! front (see [`crate::git::snapshot_changes`]) and hand the engine a
//! [`FileChangeOracle`] that answers from memory.

use std::collections::HashMap;

/// Reports whether a path's content differs from a previously recorded hash.
///
/// Implementations must answer `false` whenever they cannot tell.
pub trait FileChangeOracle {
    fn has_changed(&self, path: &str, recorded_hash: &str) -> bool;
}

/// Treats every file as unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverChanged;

impl FileChangeOracle for NeverChanged {
    fn has_changed(&self, _path: &str, _recorded_hash: &str) -> bool {
        false
    }
}

/// Current content hashes gathered ahead of scoring, keyed by path.
///
/// Paths missing from the snapshot count as unchanged.
#[derive(Debug, Default, Clone)]
pub struct ChangeSnapshot {
    current: HashMap<String, String>,
}

impl ChangeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, current_hash: impl Into<String>) {
        self.current.insert(path.into(), current_hash.into());
    }

    pub fn current_hash(&self, path: &str) -> Option<&str> {
        self.current.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

impl FileChangeOracle for ChangeSnapshot {
    fn has_changed(&self, path: &str, recorded_hash: &str) -> bool {
        match self.current.get(path) {
            Some(current) => current != recorded_hash,
            None => false,
        }
    }
}

impl<T: FileChangeOracle + ?Sized> FileChangeOracle for &T {
    fn has_changed(&self, path: &str, recorded_hash: &str) -> bool {
        (**self).has_changed(path, recorded_hash)
    }
}

/// Whether a finding's scoped file has changed since it was recorded.
/// Findings without both a subject and a recorded hash never count as changed.
pub fn finding_file_changed(
    finding: &crate::model::types::Finding,
    oracle: &dyn FileChangeOracle,
) -> bool {
    match (&finding.subject, &finding.subject_hash) {
        (Some(path), Some(hash)) => oracle.has_changed(path, hash),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::Finding;

    #[test]
    fn snapshot_compares_hashes() {
        let mut snap = ChangeSnapshot::new();
        snap.insert("src/auth.rs", "abc");
        assert!(!snap.has_changed("src/auth.rs", "abc"));
        assert!(snap.has_changed("src/auth.rs", "def"));
    }

    #[test]
    fn unknown_paths_are_unchanged() {
        let snap = ChangeSnapshot::new();
        assert!(!snap.has_changed("nope.rs", "abc"));
        assert!(!NeverChanged.has_changed("nope.rs", "abc"));
    }

    #[test]
    fn findings_without_hash_never_change() {
        let mut snap = ChangeSnapshot::new();
        snap.insert("a.rs", "new");
        let mut f = Finding::new("p", "s", "t", 0.5, 0.0);
        f.subject = Some("a.rs".into());
        assert!(!finding_file_changed(&f, &snap));
        f.subject_hash = Some("old".into());
        assert!(finding_file_changed(&f, &snap));
    }
}
