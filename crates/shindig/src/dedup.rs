//! Track ids known to be in the target playlist.
//!
//! Seeded once at startup from a playlist snapshot, then kept coherent by
//! adding on every confirmed insertion. Nothing removes entries during
//! normal operation; `remove` exists for external correction.

use crate::domain::TrackId;
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct DedupSet {
    ids: RwLock<HashSet<TrackId>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &TrackId) -> bool {
        self.ids.read().unwrap().contains(id)
    }

    pub fn add(&self, id: TrackId) {
        self.ids.write().unwrap().insert(id);
    }

    pub fn remove(&self, id: &TrackId) {
        self.ids.write().unwrap().remove(id);
    }

    /// Replace the whole set with a playlist snapshot.
    pub fn load(&self, ids: impl IntoIterator<Item = TrackId>) {
        let mut set = self.ids.write().unwrap();
        set.clear();
        set.extend(ids);
    }

    pub fn len(&self) -> usize {
        self.ids.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_has() {
        let set = DedupSet::new();
        assert!(!set.has(&TrackId::from("a")));
        set.add(TrackId::from("a"));
        assert!(set.has(&TrackId::from("a")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_load_replaces() {
        let set = DedupSet::new();
        set.add(TrackId::from("old"));
        set.load(vec![TrackId::from("a"), TrackId::from("b")]);
        assert!(!set.has(&TrackId::from("old")));
        assert!(set.has(&TrackId::from("a")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_remove() {
        let set = DedupSet::new();
        set.add(TrackId::from("a"));
        set.remove(&TrackId::from("a"));
        assert!(set.is_empty());
    }
}
