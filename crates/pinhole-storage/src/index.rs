use parking_lot::RwLock;
use pinhole_core::error::Result;
use pinhole_core::{ShortCode, StorageError};
use std::collections::HashMap;

/// Outcome of storing a URL under its short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The code was free and now maps to the URL.
    Inserted,
    /// The code already mapped to the same URL; nothing changed.
    Existing,
}

/// The short code to URL table shared by the in-memory and file backends.
///
/// The lock is private: every method takes it for exactly the duration of
/// one logical operation, so callers can never hold it across an `.await`.
#[derive(Debug, Default)]
pub struct KeyIndex {
    links: RwLock<HashMap<ShortCode, String>>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &ShortCode) -> Option<String> {
        self.links.read().get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }

    /// Classifies `url` against the current table without modifying it.
    pub fn check(&self, code: &ShortCode, url: &str) -> Result<Insertion> {
        classify(&self.links.read(), code, url)
    }

    /// Atomically checks and stores a single mapping.
    pub fn try_insert(&self, code: ShortCode, url: &str) -> Result<Insertion> {
        let mut links = self.links.write();
        let outcome = classify(&links, &code, url)?;
        if outcome == Insertion::Inserted {
            links.insert(code, url.to_owned());
        }
        Ok(outcome)
    }

    /// Returns the entries of `batch` that are not stored yet.
    ///
    /// Fails with `Conflict` if any entry collides with the table or with an
    /// earlier entry of the same batch.
    pub fn plan_batch(&self, batch: &[(ShortCode, &str)]) -> Result<Vec<(ShortCode, String)>> {
        plan(&self.links.read(), batch)
    }

    /// Atomically checks and stores a whole batch. Nothing is stored on error.
    pub fn try_insert_batch(&self, batch: &[(ShortCode, &str)]) -> Result<()> {
        let mut links = self.links.write();
        let fresh = plan(&links, batch)?;
        links.extend(fresh);
        Ok(())
    }

    /// Stores entries unconditionally.
    ///
    /// Callers must have validated the entries with [`check`](Self::check) or
    /// [`plan_batch`](Self::plan_batch) while excluding other writers.
    pub fn publish(&self, entries: impl IntoIterator<Item = (ShortCode, String)>) {
        self.links.write().extend(entries);
    }
}

impl From<HashMap<ShortCode, String>> for KeyIndex {
    fn from(links: HashMap<ShortCode, String>) -> Self {
        Self {
            links: RwLock::new(links),
        }
    }
}

fn classify(links: &HashMap<ShortCode, String>, code: &ShortCode, url: &str) -> Result<Insertion> {
    match links.get(code) {
        None => Ok(Insertion::Inserted),
        Some(existing) if existing == url => Ok(Insertion::Existing),
        Some(_) => Err(StorageError::Conflict(code.to_string())),
    }
}

fn plan(
    links: &HashMap<ShortCode, String>,
    batch: &[(ShortCode, &str)],
) -> Result<Vec<(ShortCode, String)>> {
    let mut fresh: HashMap<&ShortCode, &str> = HashMap::new();
    let mut ordered = Vec::new();

    for (code, url) in batch {
        if classify(links, code, url)? == Insertion::Existing {
            continue;
        }
        match fresh.get(code) {
            Some(pending) if pending == url => {}
            Some(_) => return Err(StorageError::Conflict(code.to_string())),
            None => {
                fresh.insert(code, *url);
                ordered.push((code.clone(), (*url).to_owned()));
            }
        }
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    #[test]
    fn try_insert_reports_existing_for_same_url() {
        let index = KeyIndex::new();
        assert_eq!(
            index.try_insert(code("aaaaaaaaaa"), "https://a.com").unwrap(),
            Insertion::Inserted
        );
        assert_eq!(
            index.try_insert(code("aaaaaaaaaa"), "https://a.com").unwrap(),
            Insertion::Existing
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn try_insert_rejects_collision() {
        let index = KeyIndex::new();
        index.try_insert(code("aaaaaaaaaa"), "https://a.com").unwrap();

        let err = index
            .try_insert(code("aaaaaaaaaa"), "https://b.com")
            .unwrap_err();
        assert_eq!(err, StorageError::Conflict("aaaaaaaaaa".into()));
        assert_eq!(index.get(&code("aaaaaaaaaa")).unwrap(), "https://a.com");
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let index = KeyIndex::new();
        index.try_insert(code("cccccccccc"), "https://c.com").unwrap();

        let batch = [
            (code("aaaaaaaaaa"), "https://a.com"),
            (code("cccccccccc"), "https://not-c.com"),
        ];
        assert!(index.try_insert_batch(&batch).is_err());
        assert!(index.get(&code("aaaaaaaaaa")).is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn batch_detects_collisions_within_itself() {
        let index = KeyIndex::new();
        let batch = [
            (code("aaaaaaaaaa"), "https://a.com"),
            (code("aaaaaaaaaa"), "https://b.com"),
        ];
        assert!(matches!(
            index.plan_batch(&batch),
            Err(StorageError::Conflict(_))
        ));
    }

    #[test]
    fn plan_batch_skips_known_and_repeated_entries() {
        let index = KeyIndex::new();
        index.try_insert(code("aaaaaaaaaa"), "https://a.com").unwrap();

        let batch = [
            (code("aaaaaaaaaa"), "https://a.com"),
            (code("bbbbbbbbbb"), "https://b.com"),
            (code("bbbbbbbbbb"), "https://b.com"),
        ];
        let fresh = index.plan_batch(&batch).unwrap();
        assert_eq!(
            fresh,
            vec![(code("bbbbbbbbbb"), "https://b.com".to_string())]
        );
        // planning does not store anything
        assert!(index.get(&code("bbbbbbbbbb")).is_none());
    }
}
