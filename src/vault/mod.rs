//! Persistent citation vault.
//!
//! The vault keeps curated [`CanonicalRecord`]s under stable [`VaultId`]s and
//! stores them as a single JSON file:
//!
//! ```json
//! { "version": 1, "next_id": 3, "entries": [ ... ] }
//! ```
//!
//! Every mutation is persisted before it becomes visible. The new state is
//! written to a temporary file in the vault's directory, synced and renamed
//! over the vault file, so a crash leaves either the old or the new file.
//! Writers are serialized; readers work on immutable snapshots and never wait
//! for a write to finish.
//!
//! # Example
//!
//! ```
//! use bibharmony::vault::{Vault, VaultPatch};
//! use bibharmony::{CanonicalRecord, Format};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let vault = Vault::open(dir.path().join("citations.json")).unwrap();
//!
//! let entry = vault
//!     .add(CanonicalRecord {
//!         title: "Example Title".to_string(),
//!         doi: Some("10.1000/example".to_string()),
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//! let patch = VaultPatch { year: Some(Some(2024)), ..Default::default() };
//! vault.update(entry.vault_id, patch).unwrap();
//!
//! assert_eq!(vault.len(), 1);
//! assert!(vault.export(Format::Ris).contains("PY  - 2024"));
//! ```

mod entry;
mod store;

pub use entry::{VaultEntry, VaultId, VaultPatch, format_apa};
pub use store::VAULT_FORMAT_VERSION;

use crate::codec::Format;
use crate::utils::display_doi;
use crate::CanonicalRecord;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::VaultState;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised by vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("DOI '{doi}' is already stored as {existing}")]
    DuplicateIdentifier { doi: String, existing: VaultId },

    #[error("no vault entry with id {0}")]
    NotFound(VaultId),

    #[error("vault entries need a non-empty title")]
    EmptyTitle,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vault serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt vault file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// A persistent, append-friendly store of curated records.
///
/// `Vault` is `Send + Sync`; share it behind an `Arc` to read from several
/// threads while another one writes.
#[derive(Debug)]
pub struct Vault {
    path: PathBuf,
    state: RwLock<Arc<VaultState>>,
    writer: Mutex<()>,
}

impl Vault {
    /// Loads the vault stored at `path`, or starts an empty one if the file
    /// does not exist yet. Nothing is written until the first mutation or
    /// [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Corrupt`] or [`VaultError::Serde`] when the file
    /// cannot be interpreted, and [`VaultError::Io`] when it cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let path = path.as_ref().to_path_buf();
        let state = store::load(&path)?;
        info!(path = %path.display(), entries = state.entries.len(), "Opened vault");
        Ok(Self {
            path,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        })
    }

    /// Location of the vault file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Arc<VaultState> {
        Arc::clone(&self.state.read())
    }

    /// Applies `change` to a copy of the current state, persists the copy and
    /// only then publishes it. Nothing changes if either step fails.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut VaultState) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let _writer = self.writer.lock();
        let mut next = VaultState::clone(&self.snapshot());
        let output = change(&mut next)?;
        store::save(&self.path, &next)?;
        *self.state.write() = Arc::new(next);
        Ok(output)
    }

    /// Adds a record under a fresh id. The DOI is stored in its bare form
    /// (`10.xxxx/...`), without URL or `doi:` prefixes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EmptyTitle`] for a record with a blank title, and
    /// [`VaultError::DuplicateIdentifier`] when an entry with the same DOI
    /// (compared case-insensitively, URL prefixes ignored) already exists.
    /// Records without a DOI are never rejected as duplicates.
    pub fn add(&self, record: CanonicalRecord) -> Result<VaultEntry, VaultError> {
        self.add_with_notes(record, String::new())
    }

    /// Adds a record with curator notes attached.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_with_notes(
        &self,
        mut record: CanonicalRecord,
        notes: impl Into<String>,
    ) -> Result<VaultEntry, VaultError> {
        if record.title.trim().is_empty() {
            return Err(VaultError::EmptyTitle);
        }
        record.doi = record.doi.as_deref().and_then(display_doi);
        let notes = notes.into();
        let entry = self.mutate(|state| {
            let doi_key = record.doi_key();
            if let Some(key) = &doi_key {
                if let Some(&existing) = state.doi_index.get(key) {
                    return Err(VaultError::DuplicateIdentifier {
                        doi: record.doi.clone().unwrap_or_else(|| key.clone()),
                        existing,
                    });
                }
            }
            let now = Utc::now();
            let entry = VaultEntry {
                vault_id: state.allocate_id(),
                record,
                added_at: now,
                updated_at: now,
                notes,
            };
            if let Some(key) = doi_key {
                state.doi_index.insert(key, entry.vault_id);
            }
            state.entries.push(entry.clone());
            Ok(entry)
        })?;
        info!(vault_id = %entry.vault_id, title = %entry.record.title, "Added vault entry");
        Ok(entry)
    }

    /// Overwrites the fields set in `patch` and bumps `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] for an unknown id,
    /// [`VaultError::EmptyTitle`] when the patch blanks the title, and
    /// [`VaultError::DuplicateIdentifier`] when the patch would give the entry
    /// a DOI that another entry already holds.
    pub fn update(&self, id: VaultId, patch: VaultPatch) -> Result<VaultEntry, VaultError> {
        let entry = self.mutate(|state| {
            let index = state.position(id).ok_or(VaultError::NotFound(id))?;
            let old_key = state.entries[index].record.doi_key();

            let mut entry = state.entries[index].clone();
            patch.apply(&mut entry);
            if entry.record.title.trim().is_empty() {
                return Err(VaultError::EmptyTitle);
            }
            entry.updated_at = Utc::now();

            let new_key = entry.record.doi_key();
            if let Some(key) = &new_key {
                if let Some(&existing) = state.doi_index.get(key) {
                    if existing != id {
                        return Err(VaultError::DuplicateIdentifier {
                            doi: entry.record.doi.clone().unwrap_or_else(|| key.clone()),
                            existing,
                        });
                    }
                }
            }
            if old_key != new_key {
                if let Some(key) = old_key {
                    state.doi_index.remove(&key);
                }
                if let Some(key) = new_key {
                    state.doi_index.insert(key, id);
                }
            }
            state.entries[index] = entry.clone();
            Ok(entry)
        })?;
        info!(vault_id = %id, "Updated vault entry");
        Ok(entry)
    }

    /// Deletes an entry. Its id is retired and never handed out again.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] for an unknown id.
    pub fn remove(&self, id: VaultId) -> Result<VaultEntry, VaultError> {
        let entry = self.mutate(|state| {
            let index = state.position(id).ok_or(VaultError::NotFound(id))?;
            let entry = state.entries.remove(index);
            if let Some(key) = entry.record.doi_key() {
                state.doi_index.remove(&key);
            }
            Ok(entry)
        })?;
        info!(vault_id = %id, "Removed vault entry");
        Ok(entry)
    }

    pub fn get(&self, id: VaultId) -> Option<VaultEntry> {
        self.snapshot().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A consistent snapshot of the entries in insertion order.
    ///
    /// Later mutations are not reflected in a listing already taken.
    pub fn list(&self) -> VaultListing {
        VaultListing {
            snapshot: self.snapshot(),
        }
    }

    /// Entries whose title, authors, source title, keywords, DOI or notes
    /// contain `query`, ignoring case. An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<VaultEntry> {
        let needle = query.trim().to_lowercase();
        self.snapshot()
            .entries
            .iter()
            .filter(|entry| needle.is_empty() || entry.matches(&needle))
            .cloned()
            .collect()
    }

    /// Serializes every entry's record in insertion order.
    pub fn export(&self, format: Format) -> String {
        let snapshot = self.snapshot();
        let records: Vec<CanonicalRecord> = snapshot
            .entries
            .iter()
            .map(|entry| entry.record.clone())
            .collect();
        format.encode(&records)
    }

    /// Writes [`export`](Self::export) output to `path`. The format's
    /// extension is added when `path` has none. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] when the file cannot be written.
    pub fn export_to(&self, path: impl AsRef<Path>, format: Format) -> Result<PathBuf, VaultError> {
        let mut path = path.as_ref().to_path_buf();
        if path.extension().is_none() {
            path.set_extension(format.extension());
        }
        let io_error = |source| VaultError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        fs::write(&path, self.export(format)).map_err(io_error)?;
        info!(path = %path.display(), format = %format, entries = self.len(), "Exported vault");
        Ok(path)
    }

    /// Writes a timestamped copy of the current state next to the vault file
    /// (`citations_backup_20250101_120000.json`) and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] when the copy cannot be written.
    pub fn backup(&self) -> Result<PathBuf, VaultError> {
        let snapshot = self.snapshot();
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".to_string());
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");

        let base = self.path.with_file_name(format!("{stem}_backup_{timestamp}"));
        let path = (0..)
            .map(|n| match n {
                0 => base.with_extension("json"),
                n => PathBuf::from(format!("{}_{n}.json", base.display())),
            })
            .find(|candidate| !candidate.exists())
            .unwrap_or_else(|| base.with_extension("json"));

        store::save(&path, &snapshot)?;
        info!(path = %path.display(), "Vault backup written");
        Ok(path)
    }

    /// Rewrites the vault file from the current state, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] when the file cannot be written.
    pub fn flush(&self) -> Result<(), VaultError> {
        let _writer = self.writer.lock();
        store::save(&self.path, &self.snapshot())
    }

    /// Adds each record, skipping DOI duplicates and untitled records with a
    /// warning. Returns the added entries and the number skipped.
    ///
    /// # Errors
    ///
    /// Stops at the first error other than a duplicate identifier.
    pub fn add_all(
        &self,
        records: impl IntoIterator<Item = CanonicalRecord>,
    ) -> Result<(Vec<VaultEntry>, usize), VaultError> {
        let mut added = Vec::new();
        let mut skipped = 0;
        for record in records {
            match self.add(record) {
                Ok(entry) => added.push(entry),
                Err(VaultError::DuplicateIdentifier { doi, existing }) => {
                    warn!(doi = %doi, existing = %existing, "Skipping record already in the vault");
                    skipped += 1;
                }
                Err(VaultError::EmptyTitle) => {
                    warn!("Skipping record without a title");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok((added, skipped))
    }
}

/// A point-in-time view of the vault's entries.
#[derive(Debug, Clone)]
pub struct VaultListing {
    snapshot: Arc<VaultState>,
}

impl VaultListing {
    /// Iterates the entries in insertion order. Can be called repeatedly.
    pub fn iter(&self) -> std::slice::Iter<'_, VaultEntry> {
        self.snapshot.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshot.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a VaultListing {
    type Item = &'a VaultEntry;
    type IntoIter = std::slice::Iter<'a, VaultEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    fn record(title: &str, doi: Option<&str>) -> CanonicalRecord {
        CanonicalRecord {
            title: title.to_string(),
            authors: vec!["Smith, J".to_string()],
            year: Some(2020),
            doi: doi.map(String::from),
            ..Default::default()
        }
    }

    fn open_temp() -> (tempfile::TempDir, Vault) {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path().join("citations.json")).unwrap();
        (dir, vault)
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let (_dir, vault) = open_temp();
        let first = vault.add(record("First", Some("10.1/a"))).unwrap();
        let second = vault.add(record("Second", None)).unwrap();
        assert_eq!(first.vault_id, VaultId(1));
        assert_eq!(second.vault_id, VaultId(2));
        assert_eq!(first.added_at, first.updated_at);
        assert_eq!(vault.len(), 2);
    }

    #[test]
    fn test_duplicate_doi_is_rejected() {
        let (_dir, vault) = open_temp();
        vault.add(record("First", Some("10.1/ABC"))).unwrap();
        let error = vault
            .add(record("Other title", Some("https://doi.org/10.1/abc")))
            .unwrap_err();
        assert!(matches!(
            error,
            VaultError::DuplicateIdentifier { existing: VaultId(1), .. }
        ));
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn test_records_without_doi_may_repeat() {
        let (_dir, vault) = open_temp();
        vault.add(record("Same", None)).unwrap();
        vault.add(record("Same", None)).unwrap();
        assert_eq!(vault.len(), 2);
    }

    #[test]
    fn test_update_unknown_id_changes_nothing() {
        let (_dir, vault) = open_temp();
        vault.add(record("First", None)).unwrap();
        let before: Vec<VaultEntry> = vault.list().iter().cloned().collect();

        let patch = VaultPatch {
            title: Some("Changed".to_string()),
            ..Default::default()
        };
        let error = vault.update(VaultId(99), patch).unwrap_err();
        assert!(matches!(error, VaultError::NotFound(VaultId(99))));

        let after: Vec<VaultEntry> = vault.list().iter().cloned().collect();
        assert_eq!(after, before);
    }

    #[test]
    fn test_update_preserves_identity() {
        let (_dir, vault) = open_temp();
        let original = vault.add(record("First", Some("10.1/a"))).unwrap();
        let patch = VaultPatch {
            title: Some("First, revised".to_string()),
            doi: Some(Some("10.1/b".to_string())),
            ..Default::default()
        };
        let updated = vault.update(original.vault_id, patch).unwrap();
        assert_eq!(updated.vault_id, original.vault_id);
        assert_eq!(updated.added_at, original.added_at);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(updated.record.title, "First, revised");

        // The old DOI is free again, the new one is taken.
        vault.add(record("Reuses old DOI", Some("10.1/a"))).unwrap();
        assert!(matches!(
            vault.add(record("Clashes", Some("10.1/B"))),
            Err(VaultError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn test_update_onto_existing_doi_fails() {
        let (_dir, vault) = open_temp();
        vault.add(record("First", Some("10.1/a"))).unwrap();
        let second = vault.add(record("Second", None)).unwrap();
        let patch = VaultPatch {
            doi: Some(Some("10.1/A".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            vault.update(second.vault_id, patch),
            Err(VaultError::DuplicateIdentifier { existing: VaultId(1), .. })
        ));
        assert_eq!(vault.get(second.vault_id).unwrap().record.doi, None);
    }

    #[test]
    fn test_doi_is_stored_bare() {
        let (_dir, vault) = open_temp();
        let entry = vault
            .add(record("First", Some("https://doi.org/10.1/A")))
            .unwrap();
        assert_eq!(entry.record.doi.as_deref(), Some("10.1/A"));

        let patch = VaultPatch {
            doi: Some(Some("https://doi.org/10.1/X".to_string())),
            ..Default::default()
        };
        let updated = vault.update(entry.vault_id, patch).unwrap();
        assert_eq!(updated.record.doi.as_deref(), Some("10.1/X"));

        let stored: Vec<CanonicalRecord> = vault.list().iter().map(|e| e.record.clone()).collect();
        for format in [Format::Ris, Format::BibTex] {
            let decoded = format.decode(&vault.export(format)).unwrap();
            assert_eq!(decoded[0].doi, stored[0].doi);
        }
    }

    #[test]
    fn test_blank_title_is_rejected() {
        let (_dir, vault) = open_temp();
        assert!(matches!(
            vault.add(CanonicalRecord::default()),
            Err(VaultError::EmptyTitle)
        ));
        assert!(matches!(
            vault.add(record("  ", None)),
            Err(VaultError::EmptyTitle)
        ));
        assert!(vault.is_empty());

        let entry = vault.add(record("Kept", None)).unwrap();
        let patch = VaultPatch {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            vault.update(entry.vault_id, patch),
            Err(VaultError::EmptyTitle)
        ));
        assert_eq!(vault.get(entry.vault_id).unwrap(), entry);
        assert_eq!(Format::BibTex.decode(&vault.export(Format::BibTex)).unwrap().len(), 1);
        assert_eq!(Format::Ris.decode(&vault.export(Format::Ris)).unwrap().len(), 1);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citations.json");
        {
            let vault = Vault::open(&path).unwrap();
            vault
                .add_with_notes(record("Persisted", Some("10.1/p")), "seminal")
                .unwrap();
            vault.add(record("Second", None)).unwrap();
        }
        let vault = Vault::open(&path).unwrap();
        let listing = vault.list();
        let titles: Vec<&str> = listing.iter().map(|e| e.record.title.as_str()).collect();
        assert_eq!(titles, vec!["Persisted", "Second"]);
        assert_eq!(listing.iter().next().unwrap().notes, "seminal");
        assert!(matches!(
            vault.add(record("Again", Some("10.1/P"))),
            Err(VaultError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citations.json");
        let vault = Vault::open(&path).unwrap();
        vault.add(record("One", None)).unwrap();
        let two = vault.add(record("Two", None)).unwrap();
        vault.remove(two.vault_id).unwrap();
        assert!(matches!(vault.remove(two.vault_id), Err(VaultError::NotFound(_))));
        drop(vault);

        let vault = Vault::open(&path).unwrap();
        let three = vault.add(record("Three", None)).unwrap();
        assert_eq!(three.vault_id, VaultId(3));
        assert_eq!(vault.get(two.vault_id), None);
    }

    #[test]
    fn test_listing_is_a_restartable_snapshot() {
        let (_dir, vault) = open_temp();
        vault.add(record("One", None)).unwrap();
        let listing = vault.list();
        vault.add(record("Two", None)).unwrap();

        assert_eq!(listing.iter().count(), 1);
        assert_eq!(listing.iter().count(), 1);
        assert_eq!((&listing).into_iter().count(), 1);
        assert_eq!(vault.list().len(), 2);
    }

    #[test]
    fn test_search() {
        let (_dir, vault) = open_temp();
        vault.add(record("Deep Learning for Traffic", Some("10.1/dl"))).unwrap();
        vault.add(record("Graph Methods", None)).unwrap();
        assert_eq!(vault.search("deep").len(), 1);
        assert_eq!(vault.search("SMITH").len(), 2);
        assert_eq!(vault.search("10.1/DL").len(), 1);
        assert_eq!(vault.search("").len(), 2);
        assert!(vault.search("astronomy").is_empty());
    }

    #[test]
    fn test_export_does_not_mutate() {
        let (_dir, vault) = open_temp();
        vault.add(record("Exported", Some("10.1/e"))).unwrap();
        let bib = vault.export(Format::BibTex);
        assert!(bib.starts_with("@article{smith2020,"));
        assert_eq!(vault.export(Format::BibTex), bib);
        assert_eq!(Format::Ris.decode(&vault.export(Format::Ris)).unwrap().len(), 1);
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn test_export_to_adds_extension() {
        let (dir, vault) = open_temp();
        vault.add(record("Exported", None)).unwrap();
        let written = vault.export_to(dir.path().join("out/citations"), Format::Ris).unwrap();
        assert_eq!(written, dir.path().join("out/citations.ris"));
        assert!(fs::read_to_string(written).unwrap().starts_with("TY  - JOUR"));
    }

    #[test]
    fn test_backup_and_flush() {
        let (dir, vault) = open_temp();
        vault.flush().unwrap();
        assert!(vault.path().exists());
        vault.add(record("Backed up", None)).unwrap();

        let first = vault.backup().unwrap();
        let second = vault.backup().unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with(dir.path()));

        let restored = Vault::open(&first).unwrap();
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citations.json");
        fs::write(&path, r#"{"version": 1, "next_id": 1, "entries": 5}"#).unwrap();
        assert!(Vault::open(&path).is_err());
    }

    #[test]
    fn test_add_all_skips_duplicates() {
        let (_dir, vault) = open_temp();
        let (added, skipped) = vault
            .add_all(vec![
                record("A", Some("10.1/x")),
                record("B", Some("10.1/X")),
                record("C", None),
                record("", None),
            ])
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let (_dir, vault) = open_temp();
        let vault = Arc::new(vault);
        let writer = {
            let vault = Arc::clone(&vault);
            thread::spawn(move || {
                for i in 0..20 {
                    vault.add(record(&format!("Record {i}"), None)).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let vault = Arc::clone(&vault);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let listing = vault.list();
                        let ids: Vec<u64> = listing.iter().map(|e| e.vault_id.0).collect();
                        assert!(ids.windows(2).all(|w| w[0] < w[1]));
                        assert_eq!(ids.len(), listing.len());
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(vault.len(), 20);
    }
}
