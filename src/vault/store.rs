//! On-disk vault layout and atomic persistence.

use crate::vault::VaultError;
use crate::vault::entry::{VaultEntry, VaultId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Version written to the `version` field of the vault file.
pub const VAULT_FORMAT_VERSION: u32 = 1;

/// In-memory vault contents. Entries are kept in insertion order, which is
/// also ascending id order.
#[derive(Debug, Clone)]
pub(crate) struct VaultState {
    pub(crate) next_id: u64,
    pub(crate) entries: Vec<VaultEntry>,
    pub(crate) doi_index: HashMap<String, VaultId>,
}

impl Default for VaultState {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
            doi_index: HashMap::new(),
        }
    }
}

impl VaultState {
    pub(crate) fn position(&self, id: VaultId) -> Option<usize> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.vault_id)
            .ok()
    }

    pub(crate) fn get(&self, id: VaultId) -> Option<&VaultEntry> {
        self.position(id).map(|index| &self.entries[index])
    }

    pub(crate) fn allocate_id(&mut self) -> VaultId {
        let id = VaultId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Rebuilds the DOI index, failing on the first DOI shared by two entries.
    fn index(&mut self) -> Result<(), String> {
        self.doi_index.clear();
        for entry in &self.entries {
            if let Some(key) = entry.record.doi_key() {
                if let Some(existing) = self.doi_index.insert(key.clone(), entry.vault_id) {
                    return Err(format!(
                        "DOI '{key}' is shared by {existing} and {}",
                        entry.vault_id
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct VaultFileRef<'a> {
    version: u32,
    next_id: u64,
    entries: &'a [VaultEntry],
}

#[derive(Deserialize)]
struct VaultFile {
    version: u32,
    next_id: u64,
    entries: Vec<VaultEntry>,
}

pub(crate) fn to_json(state: &VaultState) -> Result<String, VaultError> {
    let file = VaultFileRef {
        version: VAULT_FORMAT_VERSION,
        next_id: state.next_id,
        entries: &state.entries,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Reads a vault file, or returns an empty state when it does not exist.
pub(crate) fn load(path: &Path) -> Result<VaultState, VaultError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No vault file yet, starting empty");
            return Ok(VaultState::default());
        }
        Err(source) => {
            return Err(VaultError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let corrupt = |message: String| VaultError::Corrupt {
        path: path.to_path_buf(),
        message,
    };

    let file: VaultFile = serde_json::from_str(&text)?;
    if file.version > VAULT_FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported vault format version {}",
            file.version
        )));
    }
    if !file
        .entries
        .windows(2)
        .all(|pair| pair[0].vault_id < pair[1].vault_id)
    {
        return Err(corrupt("entry ids are not in ascending order".to_string()));
    }
    if let Some(last) = file.entries.last() {
        if last.vault_id.0 >= file.next_id {
            return Err(corrupt(format!(
                "next_id {} does not exceed existing id {}",
                file.next_id, last.vault_id
            )));
        }
    }

    let mut state = VaultState {
        next_id: file.next_id,
        entries: file.entries,
        doi_index: HashMap::new(),
    };
    state.index().map_err(corrupt)?;
    Ok(state)
}

/// Writes the state next to `path` under a temporary name, syncs it and
/// renames it over `path`.
pub(crate) fn save(path: &Path, state: &VaultState) -> Result<(), VaultError> {
    let json = to_json(state)?;
    let io_error = |source| VaultError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir).map_err(io_error)?;
    }
    let temp_path = temp_path_for(path);
    let written = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();
    if let Err(source) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error(source));
    }
    debug!(path = %path.display(), entries = state.entries.len(), "Vault written");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vault".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", nanoid::nanoid!(10)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CanonicalRecord;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn entry(id: u64, doi: Option<&str>) -> VaultEntry {
        let now = Utc::now();
        VaultEntry {
            vault_id: VaultId(id),
            record: CanonicalRecord {
                title: format!("Title {id}"),
                doi: doi.map(String::from),
                ..Default::default()
            },
            added_at: now,
            updated_at: now,
            notes: String::new(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vault.json");
        let mut state = VaultState::default();
        state.entries = vec![entry(1, Some("10.1/A")), entry(3, None)];
        state.next_id = 4;
        save(&path, &state).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.next_id, 4);
        assert_eq!(loaded.entries, state.entries);
        assert_eq!(loaded.doi_index.get("10.1/a"), Some(&VaultId(1)));
        assert_eq!(loaded.get(VaultId(3)).map(|e| e.record.title.as_str()), Some("Title 3"));
        assert_eq!(loaded.get(VaultId(2)), None);

        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = load(&dir.path().join("absent.json")).unwrap();
        assert!(state.entries.is_empty());
        assert_eq!(state.next_id, 1);
    }

    #[test]
    fn test_duplicate_doi_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let mut state = VaultState::default();
        state.entries = vec![entry(1, Some("10.1/A")), entry(2, Some("https://doi.org/10.1/a"))];
        state.next_id = 3;
        save(&path, &state).unwrap();

        let error = load(&path).unwrap_err();
        assert!(matches!(error, VaultError::Corrupt { .. }));
    }

    #[test]
    fn test_stale_next_id_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let mut state = VaultState::default();
        state.entries = vec![entry(5, None)];
        state.next_id = 5;
        save(&path, &state).unwrap();

        assert!(matches!(load(&path), Err(VaultError::Corrupt { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(VaultError::Serde(_))));
    }
}
