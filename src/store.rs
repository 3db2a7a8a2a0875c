//! Durable per-assignment overrides: dismissed ids and custom display names.
//!
//! Two JSON files live in the data directory:
//! - `dismissed.json`: array of assignment ids, numbers or strings
//! - `customNames.json`: object mapping assignment id to display name
//!
//! Each save writes a uniquely named temp file, syncs it, and renames it over
//! the target, so a concurrent reader sees either the old or the new content
//! and a returned `Ok` means the bytes reached the disk.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::canvas::model::RawId;

pub const DISMISSED_FILE: &str = "dismissed.json";
pub const CUSTOM_NAMES_FILE: &str = "customNames.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("override store I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("override store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-assignment user preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub dismissed: bool,
    pub custom_name: Option<String>,
}

/// In-memory form of both override tables. Entries for ids no longer returned
/// upstream are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideMap {
    dismissed: BTreeSet<String>,
    custom_names: BTreeMap<String, String>,
}

impl OverrideMap {
    pub fn is_dismissed(&self, id: &str) -> bool {
        self.dismissed.contains(id)
    }

    pub fn custom_name(&self, id: &str) -> Option<&str> {
        self.custom_names
            .get(id)
            .map(String::as_str)
            .filter(|n| !n.trim().is_empty())
    }

    pub fn entry(&self, id: &str) -> OverrideEntry {
        OverrideEntry {
            dismissed: self.is_dismissed(id),
            custom_name: self.custom_name(id).map(str::to_string),
        }
    }

    pub fn dismissed_ids(&self) -> impl Iterator<Item = &str> {
        self.dismissed.iter().map(String::as_str)
    }

    pub fn custom_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom_names
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true if the map changed.
    pub fn set_dismissed(&mut self, id: &str, dismissed: bool) -> bool {
        if dismissed {
            self.dismissed.insert(id.to_string())
        } else {
            self.dismissed.remove(id)
        }
    }

    /// `None` or a blank name clears the entry. Returns true if the map changed.
    pub fn set_custom_name(&mut self, id: &str, name: Option<&str>) -> bool {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => self
                .custom_names
                .insert(id.to_string(), name.to_string())
                .as_deref()
                != Some(name),
            None => self.custom_names.remove(id).is_some(),
        }
    }
}

/// File-backed owner of the override map.
#[derive(Debug)]
pub struct OverrideStore {
    dir: PathBuf,
    map: OverrideMap,
}

impl OverrideStore {
    /// Open the store rooted at `dir`, loading whatever state is readable.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let map = load(&dir);
        Self { dir, map }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn map(&self) -> &OverrideMap {
        &self.map
    }

    /// Mutates memory first; a failed write leaves the change in effect.
    pub fn set_dismissed(&mut self, id: &str, dismissed: bool) -> Result<bool, StoreError> {
        if !self.map.set_dismissed(id, dismissed) {
            return Ok(false);
        }
        save(&self.dir, &self.map)?;
        Ok(true)
    }

    /// Mutates memory first; a failed write leaves the change in effect.
    pub fn set_custom_name(&mut self, id: &str, name: Option<&str>) -> Result<bool, StoreError> {
        if !self.map.set_custom_name(id, name) {
            return Ok(false);
        }
        save(&self.dir, &self.map)?;
        Ok(true)
    }

    /// Write the current state, e.g. to retry after an earlier failed save.
    pub fn flush(&self) -> Result<(), StoreError> {
        save(&self.dir, &self.map)
    }
}

/// Load both tables, treating missing or corrupt files as empty.
pub fn load(dir: &Path) -> OverrideMap {
    match try_load(dir) {
        Ok(map) => map,
        Err(err) => {
            warn!(%err, "discarding unreadable override state");
            // Salvage whichever table is still readable.
            OverrideMap {
                dismissed: read_dismissed(&dir.join(DISMISSED_FILE))
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
                custom_names: read_json(&dir.join(CUSTOM_NAMES_FILE))
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
            }
        }
    }
}

/// Strict load that reports corruption instead of masking it.
pub fn try_load(dir: &Path) -> Result<OverrideMap, StoreError> {
    let dismissed = read_dismissed(&dir.join(DISMISSED_FILE))?.unwrap_or_default();
    let custom_names = read_json(&dir.join(CUSTOM_NAMES_FILE))?.unwrap_or_default();
    Ok(OverrideMap {
        dismissed,
        custom_names,
    })
}

/// Persist both tables. Both files are written before this returns `Ok`.
pub fn save(dir: &Path, map: &OverrideMap) -> Result<(), StoreError> {
    let dismissed: Vec<&String> = map.dismissed.iter().collect();
    let dismissed = serde_json::to_vec(&dismissed).map_err(|source| StoreError::Corrupt {
        path: dir.join(DISMISSED_FILE),
        source,
    })?;
    let names = serde_json::to_vec_pretty(&map.custom_names).map_err(|source| {
        StoreError::Corrupt {
            path: dir.join(CUSTOM_NAMES_FILE),
            source,
        }
    })?;
    write_replace(&dir.join(DISMISSED_FILE), &dismissed)?;
    write_replace(&dir.join(CUSTOM_NAMES_FILE), &names)?;
    debug!(
        dismissed = map.dismissed.len(),
        custom_names = map.custom_names.len(),
        "saved override state"
    );
    Ok(())
}

/// Ids written by older installs are bare Canvas numbers.
fn read_dismissed(path: &Path) -> Result<Option<BTreeSet<String>>, StoreError> {
    let ids: Option<Vec<RawId>> = read_json(path)?;
    Ok(ids.map(|ids| ids.into_iter().filter_map(RawId::into_key).collect()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn write_replace(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    sync_dir(dir).map_err(io_err)
}

/// Make the rename itself durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_files_load_empty() {
        let td = tempdir().unwrap();
        let map = load(td.path());
        assert_eq!(map, OverrideMap::default());
    }

    #[test]
    fn corrupt_file_loads_empty_and_try_load_reports_it() {
        let td = tempdir().unwrap();
        fs::write(td.path().join(DISMISSED_FILE), b"{not json").unwrap();
        assert!(matches!(
            try_load(td.path()),
            Err(StoreError::Corrupt { .. })
        ));
        assert_eq!(load(td.path()), OverrideMap::default());
    }

    #[test]
    fn corrupt_names_keep_readable_dismissed() {
        let td = tempdir().unwrap();
        fs::write(td.path().join(DISMISSED_FILE), br#"["1","2"]"#).unwrap();
        fs::write(td.path().join(CUSTOM_NAMES_FILE), b"[").unwrap();
        let map = load(td.path());
        assert!(map.is_dismissed("1"));
        assert!(map.is_dismissed("2"));
        assert_eq!(map.custom_names().count(), 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let td = tempdir().unwrap();
        let mut store = OverrideStore::open(td.path());
        store.set_dismissed("42", true).unwrap();
        store.set_custom_name("7", Some("Midterm")).unwrap();

        let loaded = load(td.path());
        assert_eq!(&loaded, store.map());

        // save(load()) is a fixed point byte for byte
        let before_d = fs::read(td.path().join(DISMISSED_FILE)).unwrap();
        let before_n = fs::read(td.path().join(CUSTOM_NAMES_FILE)).unwrap();
        save(td.path(), &loaded).unwrap();
        assert_eq!(fs::read(td.path().join(DISMISSED_FILE)).unwrap(), before_d);
        assert_eq!(fs::read(td.path().join(CUSTOM_NAMES_FILE)).unwrap(), before_n);
    }

    #[test]
    fn dismiss_is_idempotent_and_restore_of_unknown_is_noop() {
        let td = tempdir().unwrap();
        let mut store = OverrideStore::open(td.path());
        assert!(store.set_dismissed("1", true).unwrap());
        assert!(!store.set_dismissed("1", true).unwrap());
        assert_eq!(store.map().dismissed_ids().collect::<Vec<_>>(), vec!["1"]);

        assert!(!store.set_dismissed("never", false).unwrap());
        assert!(!store.map().is_dismissed("never"));
    }

    #[test]
    fn blank_custom_name_clears_entry() {
        let mut map = OverrideMap::default();
        assert!(map.set_custom_name("1", Some("  Final  ")));
        assert_eq!(map.custom_name("1"), Some("Final"));
        assert!(!map.set_custom_name("1", Some("Final")));
        assert!(map.set_custom_name("1", Some("   ")));
        assert_eq!(map.custom_name("1"), None);
        assert!(!map.set_custom_name("1", None));
    }

    #[test]
    fn legacy_files_from_disk_are_read() {
        let td = tempdir().unwrap();
        fs::write(td.path().join(DISMISSED_FILE), br#"["5"]"#).unwrap();
        fs::write(
            td.path().join(CUSTOM_NAMES_FILE),
            br#"{"5": "Lab report", "6": ""}"#,
        )
        .unwrap();
        let map = load(td.path());
        assert_eq!(
            map.entry("5"),
            OverrideEntry {
                dismissed: true,
                custom_name: Some("Lab report".into())
            }
        );
        assert_eq!(map.entry("6"), OverrideEntry::default());
    }

    #[test]
    fn reads_numeric_ids_and_camel_case_names_file() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("dismissed.json"), b"[123,456]").unwrap();
        fs::write(
            td.path().join("customNames.json"),
            b"{\n  \"123\": \"Midterm\"\n}",
        )
        .unwrap();

        let map = try_load(td.path()).unwrap();
        assert!(map.is_dismissed("123"));
        assert!(map.is_dismissed("456"));
        assert_eq!(map.custom_name("123"), Some("Midterm"));
        assert_eq!(load(td.path()), map);
    }

    #[test]
    fn mixed_id_kinds_survive_salvage() {
        let td = tempdir().unwrap();
        fs::write(td.path().join(DISMISSED_FILE), br#"[7, "8", " "]"#).unwrap();
        fs::write(td.path().join(CUSTOM_NAMES_FILE), b"not json").unwrap();
        let map = load(td.path());
        assert_eq!(map.dismissed_ids().collect::<Vec<_>>(), vec!["7", "8"]);
    }

    #[test]
    fn save_leaves_only_the_two_files() {
        let td = tempdir().unwrap();
        let mut store = OverrideStore::open(td.path());
        store.set_dismissed("1", true).unwrap();
        store.set_custom_name("1", Some("Essay")).unwrap();

        let mut names: Vec<String> = fs::read_dir(td.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![CUSTOM_NAMES_FILE, DISMISSED_FILE]);
    }

    #[test]
    fn concurrent_writers_do_not_clobber_temp_files() {
        let td = tempdir().unwrap();
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let dir = td.path().to_path_buf();
                std::thread::spawn(move || {
                    let mut store = OverrideStore::open(&dir);
                    for i in 0..25 {
                        store
                            .set_dismissed(&format!("{}-{}", worker, i), true)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // Last writer wins, but the files are always whole.
        let map = try_load(td.path()).unwrap();
        assert!(map.dismissed_ids().count() >= 25);
    }

    #[test]
    fn flush_retries_after_failed_save() {
        let td = tempdir().unwrap();
        let blocker = td.path().join("blocked");
        fs::write(&blocker, b"").unwrap();
        let mut store = OverrideStore::open(&blocker);
        assert!(store.set_custom_name("3", Some("Quiz 2")).is_err());

        fs::remove_file(store.dir()).unwrap();
        store.flush().unwrap();
        assert_eq!(load(store.dir()).custom_name("3"), Some("Quiz 2"));
    }

    #[test]
    fn failed_save_keeps_in_memory_change() {
        let td = tempdir().unwrap();
        // A plain file where the store directory should be makes every write fail.
        let blocker = td.path().join("blocked");
        fs::write(&blocker, b"").unwrap();
        let mut store = OverrideStore::open(&blocker);
        let err = store.set_dismissed("9", true).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.map().is_dismissed("9"));
    }
}
