//! ORBAT persistence: the flat snapshot layout and the key-value stores it is
//! written to.
//!
//! The snapshot is a map of id to full unit record plus the ordered root list.
//! Hierarchy is carried entirely by `parent_id` / `child_ids` on the records.
//!
//! ```json
//! {
//!   "units": { "u-1": { "id": "u-1", "parent_id": null, "child_ids": ["u-2"], ... } },
//!   "root_ids": ["u-1"]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Orbat, Unit, UnitId};
use crate::error::{Error, Result};

/// Flat, serializable copy of the unit forest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrbatSnapshot {
    pub units: BTreeMap<UnitId, Unit>,
    pub root_ids: Vec<UnitId>,
}

impl OrbatSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// String key-value storage for persisted state.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    /// Returns whether the key existed.
    fn delete(&mut self, key: &str) -> Result<bool>;
    fn keys(&self) -> Result<Vec<String>>;
    fn clear(&mut self) -> Result<()>;

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Directory-backed store: one `<prefix><key>.json` file per key.
///
/// Only files carrying the prefix belong to the store; `keys` and `clear`
/// leave everything else in the directory alone.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    prefix: String,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{key}.json", self.prefix))
    }

    fn key_of(&self, file_name: &str) -> Option<String> {
        file_name
            .strip_prefix(&self.prefix)?
            .strip_suffix(".json")
            .map(str::to_string)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = entry.file_name().to_str().and_then(|name| self.key_of(name)) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn clear(&mut self) -> Result<()> {
        for key in self.keys()? {
            self.delete(&key)?;
        }
        Ok(())
    }
}

/// Serialize the forest into `store` under `key`.
pub fn save_orbat(store: &mut dyn KeyValueStore, key: &str, orbat: &Orbat) -> Result<()> {
    let json = orbat.snapshot().to_json()?;
    store.set(key, &json)?;
    log::info!("Saved {} unit(s) under '{key}'", orbat.len());
    Ok(())
}

/// Replace the forest with the snapshot stored under `key`.
///
/// A missing key is [`Error::MissingKey`]; unparsable or inconsistent data
/// leaves `orbat` untouched.
pub fn load_orbat(store: &dyn KeyValueStore, key: &str, orbat: &mut Orbat) -> Result<()> {
    let json = store
        .get(key)?
        .ok_or_else(|| Error::MissingKey(key.to_string()))?;
    let snapshot = OrbatSnapshot::from_json(&json)?;
    orbat.restore(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::math::Vec3;
    use crate::orbat::{SymbolCode, UnitSpec};

    fn sample() -> Orbat {
        let mut orbat = Orbat::new(EventBus::new());
        let bn = orbat
            .add_unit(UnitSpec::named("2 Bn").with_id("bn"))
            .unwrap()
            .id
            .clone();
        let mut coy = UnitSpec::named("A Coy").with_id("a").with_parent(&bn);
        coy.move_path = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 5.0)];
        orbat.add_unit(coy).unwrap();
        orbat.add_unit(UnitSpec::named("Recce").with_id("r")).unwrap();
        orbat
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sandtable-{name}-{}", std::process::id()))
    }

    #[test]
    fn snapshot_json_layout() {
        let json = sample().snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["root_ids"], serde_json::json!(["bn", "r"]));
        assert_eq!(value["units"]["a"]["parent_id"], "bn");
        assert_eq!(value["units"]["bn"]["child_ids"], serde_json::json!(["a"]));
        assert_eq!(
            value["units"]["a"]["move_path"],
            serde_json::json!([[0.0, 0.0, 0.0], [10.0, 0.0, 5.0]])
        );
    }

    #[test]
    fn memory_store_round_trip() {
        let orbat = sample();
        let mut store = MemoryStore::new();
        save_orbat(&mut store, "orbat", &orbat).unwrap();
        assert!(store.has("orbat").unwrap());

        let mut loaded = Orbat::new(EventBus::new());
        load_orbat(&store, "orbat", &mut loaded).unwrap();
        assert_eq!(loaded.tree(), orbat.tree());
        assert_eq!(loaded.snapshot(), orbat.snapshot());
        loaded.validate().unwrap();
    }

    #[test]
    fn letter_symbol_code_survives_the_store() {
        let mut orbat = sample();
        let code = SymbolCode::parse("SFGPUCI----D--------").unwrap();
        orbat
            .add_unit(UnitSpec::named("Inf Pl").with_id("p").with_symbol(code.clone()))
            .unwrap();
        let mut store = MemoryStore::new();
        save_orbat(&mut store, "orbat", &orbat).unwrap();

        let mut loaded = Orbat::new(EventBus::new());
        load_orbat(&store, "orbat", &mut loaded).unwrap();
        assert_eq!(loaded.get(&UnitId::new("p")).unwrap().symbol_code, code);
    }

    #[test]
    fn missing_key() {
        let store = MemoryStore::new();
        let mut orbat = sample();
        let err = load_orbat(&store, "nothing", &mut orbat).unwrap_err();
        assert!(matches!(err, Error::MissingKey(ref key) if key == "nothing"));
        assert_eq!(orbat.len(), 3);
    }

    #[test]
    fn garbage_leaves_orbat_alone() {
        let mut store = MemoryStore::new();
        store.set("orbat", "{\"units\": 4").unwrap();
        let mut orbat = sample();
        assert!(matches!(
            load_orbat(&store, "orbat", &mut orbat),
            Err(Error::Json(_))
        ));
        assert_eq!(orbat.len(), 3);
    }

    #[test]
    fn memory_store_ops() {
        let mut store = MemoryStore::new();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = temp_dir("store");
        let mut store = FileStore::open(&dir, "wargame-").unwrap();
        std::fs::write(dir.join("unrelated.txt"), "keep me").unwrap();

        let orbat = sample();
        save_orbat(&mut store, "orbat", &orbat).unwrap();
        assert!(dir.join("wargame-orbat.json").is_file());
        assert_eq!(store.keys().unwrap(), vec!["orbat"]);

        let mut loaded = Orbat::new(EventBus::new());
        load_orbat(&store, "orbat", &mut loaded).unwrap();
        assert_eq!(loaded.tree(), orbat.tree());

        store.clear().unwrap();
        assert!(!store.has("orbat").unwrap());
        assert!(dir.join("unrelated.txt").is_file());
        assert!(!store.delete("orbat").unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
