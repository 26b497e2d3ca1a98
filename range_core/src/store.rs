//! Record store: a single JSON document with atomic, revision-checked
//! commits.
//!
//! The engine only needs three store capabilities: fetch a record by id,
//! list records matching a predicate, and persist a set of mutations
//! atomically. Both are served by snapshotting the whole document, mutating
//! the snapshot, and committing it back. A revision counter carried in the
//! document turns lost updates between snapshot and commit into a
//! `Conflict` the caller can retry.

use crate::{Ammo, Error, Firearm, Maintenance, Result, ShootingSession, User, UserContext};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// The full store document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub guns: Vec<Firearm>,
    #[serde(default)]
    pub ammo: Vec<Ammo>,
    #[serde(default)]
    pub sessions: Vec<ShootingSession>,
    #[serde(default)]
    pub maintenance: Vec<Maintenance>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl Database {
    /// Fetch a firearm by id, honoring caller visibility
    pub fn firearm(&self, id: Uuid, user: &UserContext) -> Option<&Firearm> {
        self.guns
            .iter()
            .find(|g| g.id == id && user.can_see(&g.user_id))
    }

    /// Fetch an ammunition record by id, honoring caller visibility
    pub fn ammo(&self, id: Uuid, user: &UserContext) -> Option<&Ammo> {
        self.ammo
            .iter()
            .find(|a| a.id == id && user.can_see(&a.user_id))
    }

    /// Fetch a session by id, honoring caller visibility
    pub fn session(&self, id: Uuid, user: &UserContext) -> Option<&ShootingSession> {
        self.sessions
            .iter()
            .find(|s| s.id == id && user.can_see(&s.user_id))
    }

    /// Fetch a maintenance record by id, honoring caller visibility
    pub fn maintenance_record(&self, id: Uuid, user: &UserContext) -> Option<&Maintenance> {
        self.maintenance
            .iter()
            .find(|m| m.id == id && user.can_see(&m.user_id))
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    /// Insert or replace a user record
    pub fn upsert_user(&mut self, user: User) {
        if let Some(existing) = self.users.iter_mut().find(|u| u.user_id == user.user_id) {
            *existing = user;
        } else {
            self.users.push(user);
        }
    }

    /// Sessions shot with one firearm by one owner
    pub fn sessions_for_gun<'a>(
        &'a self,
        gun_id: Uuid,
        owner_id: &'a str,
    ) -> impl Iterator<Item = &'a ShootingSession> {
        self.sessions
            .iter()
            .filter(move |s| s.gun_id == gun_id && s.user_id == owner_id)
    }

    /// All sessions logged by one user
    pub fn sessions_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a ShootingSession> {
        self.sessions.iter().filter(move |s| s.user_id == user_id)
    }

    /// Maintenance records for one firearm, sorted by date ascending
    pub fn maintenance_for_gun(&self, gun_id: Uuid, owner_id: &str) -> Vec<&Maintenance> {
        let mut records: Vec<&Maintenance> = self
            .maintenance
            .iter()
            .filter(|m| m.gun_id == gun_id && m.user_id == owner_id)
            .collect();
        records.sort_by_key(|m| m.date);
        records
    }

    /// Add `delta` to an ammunition stock count; unknown stock stays unknown
    pub fn adjust_ammo_stock(&mut self, ammo_id: Uuid, delta: i64) {
        if let Some(ammo) = self.ammo.iter_mut().find(|a| a.id == ammo_id) {
            if let Some(units) = ammo.units_in_package {
                ammo.units_in_package = Some(units + delta);
            }
        }
    }
}

/// Storage the engine runs against.
///
/// `snapshot` hands out an owned copy of the document; `commit` persists a
/// mutated copy atomically, rejecting it with `Conflict` when another
/// writer committed in between.
pub trait RecordStore {
    fn snapshot(&self) -> Result<Database>;
    fn commit(&self, db: Database) -> Result<()>;
}

/// JSON-file-backed store with file locking.
///
/// The whole document is one file, so a single temp-write plus atomic
/// rename covers any multi-record mutation. An exclusive lock is held
/// across the read-verify-write of a commit to serialize local writers.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_current(file: &mut std::fs::File) -> Result<Database> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            return Ok(Database::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }
}

impl RecordStore for JsonStore {
    fn snapshot(&self) -> Result<Database> {
        if !self.path.exists() {
            tracing::debug!("No store file at {:?}, starting empty", self.path);
            return Ok(Database::default());
        }

        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        file.lock_shared()?;
        let result = Self::read_current(&mut file);
        file.unlock()?;
        result
    }

    fn commit(&self, mut db: Database) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            Error::Store(format!("store path {:?} has no parent directory", self.path))
        })?;
        std::fs::create_dir_all(parent)?;

        // Exclusive lock on the live file for the whole read-verify-write
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let verdict = (|| -> Result<()> {
            let current = Self::read_current(&mut file)?;
            if current.revision != db.revision {
                return Err(Error::Conflict(format!(
                    "store revision moved from {} to {} during the transaction",
                    db.revision, current.revision
                )));
            }

            db.revision += 1;

            let temp = NamedTempFile::new_in(parent)?;
            {
                let mut writer = std::io::BufWriter::new(temp.as_file());
                let contents = serde_json::to_string(&db)?;
                writer.write_all(contents.as_bytes())?;
                writer.flush()?;
            }
            temp.as_file().sync_all()?;
            temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

            tracing::debug!("Committed store revision {} to {:?}", db.revision, self.path);
            Ok(())
        })();

        file.unlock()?;
        verdict
    }
}

/// In-memory store for unit tests and embedding
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Database>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(db: Database) -> Self {
        Self {
            inner: Mutex::new(db),
        }
    }
}

impl RecordStore for MemoryStore {
    fn snapshot(&self) -> Result<Database> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| Error::Store("memory store poisoned".into()))?;
        Ok(inner.clone())
    }

    fn commit(&self, mut db: Database) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::Store("memory store poisoned".into()))?;
        if inner.revision != db.revision {
            return Err(Error::Conflict(format!(
                "store revision moved from {} to {} during the transaction",
                db.revision, inner.revision
            )));
        }
        db.revision += 1;
        *inner = db;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_gun(owner: &str) -> Firearm {
        Firearm {
            id: Uuid::new_v4(),
            user_id: owner.into(),
            name: "P-01".into(),
            caliber: Some("9mm".into()),
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_snapshot_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(temp_dir.path().join("db.json"));

        let db = store.snapshot().unwrap();
        assert_eq!(db.revision, 0);
        assert!(db.guns.is_empty());
    }

    #[test]
    fn test_commit_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(temp_dir.path().join("db.json"));

        let mut db = store.snapshot().unwrap();
        db.guns.push(sample_gun("alice"));
        store.commit(db).unwrap();

        let reloaded = store.snapshot().unwrap();
        assert_eq!(reloaded.revision, 1);
        assert_eq!(reloaded.guns.len(), 1);
        assert_eq!(reloaded.guns[0].name, "P-01");
    }

    #[test]
    fn test_stale_commit_is_conflict() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(temp_dir.path().join("db.json"));

        let stale = store.snapshot().unwrap();
        let mut fresh = store.snapshot().unwrap();
        fresh.guns.push(sample_gun("alice"));
        store.commit(fresh).unwrap();

        let result = store.commit(stale);
        assert!(matches!(result, Err(Error::Conflict(_))));

        // The winning commit survives untouched
        let reloaded = store.snapshot().unwrap();
        assert_eq!(reloaded.guns.len(), 1);
    }

    #[test]
    fn test_corrupt_file_surfaces_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("db.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonStore::new(&path);
        assert!(store.snapshot().is_err());
    }

    #[test]
    fn test_memory_store_conflict() {
        let store = MemoryStore::new();
        let stale = store.snapshot().unwrap();
        store.commit(store.snapshot().unwrap()).unwrap();

        assert!(matches!(store.commit(stale), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_visibility_scoping() {
        let mut db = Database::default();
        let gun = sample_gun("alice");
        let gun_id = gun.id;
        db.guns.push(gun);

        assert!(db.firearm(gun_id, &UserContext::user("alice")).is_some());
        assert!(db.firearm(gun_id, &UserContext::user("bob")).is_none());
        assert!(db.firearm(gun_id, &UserContext::admin("root")).is_some());
    }

    #[test]
    fn test_adjust_stock_ignores_unknown() {
        let mut db = Database::default();
        let ammo = Ammo {
            id: Uuid::new_v4(),
            user_id: "alice".into(),
            name: "FMJ".into(),
            caliber: Some("9mm".into()),
            price_per_unit: 2.0,
            units_in_package: None,
        };
        let ammo_id = ammo.id;
        db.ammo.push(ammo);

        db.adjust_ammo_stock(ammo_id, -20);
        assert_eq!(db.ammo[0].units_in_package, None);

        db.ammo[0].units_in_package = Some(100);
        db.adjust_ammo_stock(ammo_id, -20);
        assert_eq!(db.ammo[0].units_in_package, Some(80));
    }
}
