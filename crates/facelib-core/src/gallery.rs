//! In-memory gallery of enrolled encodings, at most one per identity.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::codec::{Codec, SkippedLine};
use crate::encoding::Encoding;
use crate::error::GalleryError;
use crate::matcher::{MatchResult, Matcher};

/// Outcome of [`Gallery::enroll`].
#[derive(Debug, Clone, PartialEq)]
pub enum Enrolled {
    /// The identity was new and was appended.
    Inserted,
    /// The identity existed; its previous encoding is returned.
    Replaced(Encoding),
    /// The encoding had no identity and was not stored.
    Anonymous(Encoding),
}

/// Enrolled encodings in enrollment order.
///
/// Replacing an identity keeps its position, so persisting and reloading a
/// gallery reproduces the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gallery {
    entries: Vec<Encoding>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `encoding`, replacing any encoding already stored under its id.
    pub fn enroll(&mut self, encoding: Encoding) -> Enrolled {
        if encoding.is_anonymous() {
            tracing::warn!("refusing to enroll an anonymous encoding");
            return Enrolled::Anonymous(encoding);
        }
        match self.position(encoding.id()) {
            Some(idx) => {
                tracing::debug!(id = encoding.id(), "replacing enrolled encoding");
                Enrolled::Replaced(std::mem::replace(&mut self.entries[idx], encoding))
            }
            None => {
                tracing::debug!(id = encoding.id(), "enrolling new identity");
                self.entries.push(encoding);
                Enrolled::Inserted
            }
        }
    }

    /// Remove the encoding stored under `id`. Returns whether one existed.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.entries.remove(idx);
                tracing::debug!(id, "removed identity");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Encoding> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Encoding> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Encoding::id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shape of the first enrolled encoding, if any.
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.entries.first().map(Encoding::dimensions)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }
}

impl<'a> IntoIterator for &'a Gallery {
    type Item = &'a Encoding;
    type IntoIter = std::slice::Iter<'a, Encoding>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Encoding> for Gallery {
    fn from_iter<I: IntoIterator<Item = Encoding>>(iter: I) -> Self {
        let mut gallery = Gallery::new();
        for encoding in iter {
            gallery.enroll(encoding);
        }
        gallery
    }
}

/// A gallery shared between threads.
///
/// Matching and saving hold the read lock; enroll, remove and reload hold
/// the write lock, so a scan or a save never observes a half-applied mutation.
#[derive(Debug, Clone, Default)]
pub struct SharedGallery {
    inner: Arc<RwLock<Gallery>>,
}

impl SharedGallery {
    pub fn new(gallery: Gallery) -> Self {
        Self {
            inner: Arc::new(RwLock::new(gallery)),
        }
    }

    pub fn enroll(&self, encoding: Encoding) -> Enrolled {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).enroll(encoding)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `matcher` against the current contents.
    pub fn compare(&self, matcher: &dyn Matcher, probe: &Encoding) -> MatchResult {
        let gallery = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        matcher.compare(probe, &gallery)
    }

    /// Point-in-time copy of the contents.
    pub fn snapshot(&self) -> Gallery {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn save(&self, codec: &Codec, path: &Path) -> Result<(), GalleryError> {
        let gallery = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        codec.save(&gallery, path)
    }

    /// Replace the contents with the gallery stored at `path`.
    ///
    /// The file is read before the write lock is taken; on error the current
    /// contents are left untouched.
    pub fn reload(&self, codec: &Codec, path: &Path) -> Result<Vec<SkippedLine>, GalleryError> {
        let report = codec.load(path)?;
        let mut gallery = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *gallery = report.gallery;
        Ok(report.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::EuclideanMatcher;

    fn enc(id: &str, values: &[f32]) -> Encoding {
        Encoding::from_matrix(values.to_vec(), 1, values.len(), Some(id.to_string())).unwrap()
    }

    #[test]
    fn test_enroll_replace_keeps_single_entry() {
        let mut gallery = Gallery::new();
        assert_eq!(gallery.enroll(enc("alice", &[1.0, 0.0])), Enrolled::Inserted);
        let previous = gallery.enroll(enc("alice", &[0.0, 1.0]));

        assert_eq!(previous, Enrolled::Replaced(enc("alice", &[1.0, 0.0])));
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.get("alice").unwrap().vector(), &[0.0, 1.0]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut gallery = Gallery::new();
        gallery.enroll(enc("a", &[1.0]));
        gallery.enroll(enc("b", &[2.0]));
        gallery.enroll(enc("c", &[3.0]));
        gallery.enroll(enc("a", &[9.0]));
        assert_eq!(gallery.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_anonymous_is_not_stored() {
        let mut gallery = Gallery::new();
        let query = Encoding::from_matrix(vec![1.0], 1, 1, None).unwrap();
        assert!(matches!(gallery.enroll(query), Enrolled::Anonymous(_)));
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut gallery = Gallery::new();
        gallery.enroll(enc("a", &[1.0]));
        assert!(gallery.remove("a"));
        assert!(!gallery.remove("a"));
        assert!(!gallery.contains("a"));
        assert!(gallery.get("a").is_none());
    }

    #[test]
    fn test_iter_is_restartable() {
        let gallery: Gallery = [enc("a", &[1.0]), enc("b", &[2.0])].into_iter().collect();
        let first: Vec<_> = gallery.iter().map(Encoding::id).collect();
        let second: Vec<_> = (&gallery).into_iter().map(Encoding::id).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["a", "b"]);
    }

    #[test]
    fn test_clear_and_dimensions() {
        let mut gallery: Gallery = [enc("a", &[1.0, 2.0])].into_iter().collect();
        assert_eq!(gallery.dimensions(), Some((1, 2)));
        gallery.clear();
        assert!(gallery.is_empty());
        assert_eq!(gallery.dimensions(), None);
    }

    #[test]
    fn test_shared_gallery_across_threads() {
        let shared = SharedGallery::default();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    shared.enroll(enc(&format!("id{i}"), &[i as f32]));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.len(), 4);

        let probe = Encoding::from_matrix(vec![2.0], 1, 1, None).unwrap();
        let result = shared.compare(&EuclideanMatcher::default(), &probe);
        assert_eq!(result.id.as_deref(), Some("id2"));

        assert!(shared.remove("id2"));
        assert_eq!(shared.snapshot().len(), 3);
    }
}
