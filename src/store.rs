use std::collections::BTreeMap;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{AppError, AppResult};
use crate::models::{Company, Document, ExcelTemplate, HolidayRequest, Project, Route, User};

const TEMPLATES_DIR: &str = "templates";

/// One JSON document collection
///
/// The whole collection is kept in memory, keyed by id, and written back
/// to `<data_dir>/<collection>.json` after every change.
pub struct Collection<T: Document> {
    path: PathBuf,
    docs: RwLock<BTreeMap<String, T>>,
}

impl<T: Document> Collection<T> {
    /// Loads the collection file, creating an empty one if it does not exist
    pub fn open(dir: &Path) -> AppResult<Self> {
        let path = dir.join(format!("{}.json", T::COLLECTION));
        if !path.exists() {
            fs::write(&path, b"{}")?;
        }

        let contents = fs::read_to_string(&path)?;
        let docs: BTreeMap<String, T> = if contents.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&contents)?
        };
        log::debug!("loaded {} {} from {}", docs.len(), T::COLLECTION, path.display());

        Ok(Collection {
            path,
            docs: RwLock::new(docs),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, T>> {
        self.docs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, T>> {
        self.docs.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Writes to a sibling file first so a crash never leaves half a collection
    fn persist(&self, docs: &BTreeMap<String, T>) -> AppResult<()> {
        let json = serde_json::to_string_pretty(docs)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.read().get(id).cloned()
    }

    /// Like `get`, but a missing record is a `NotFound` error
    pub fn require(&self, id: &str) -> AppResult<T> {
        self.get(id)
            .ok_or_else(|| AppError::not_found(T::COLLECTION, id))
    }

    pub fn list(&self) -> Vec<T> {
        self.read().values().cloned().collect()
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.read().values().filter(|d| predicate(d)).cloned().collect()
    }

    pub fn find<F>(&self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        self.read().values().find(|d| predicate(d)).cloned()
    }

    pub fn any<F>(&self, predicate: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        self.read().values().any(predicate)
    }

    pub fn insert(&self, doc: T) -> AppResult<T> {
        self.insert_checked(doc, |_| Ok(()))
    }

    /// Inserts after `check` accepted the current contents
    ///
    /// The check runs under the write lock, so uniqueness rules cannot be
    /// raced by a concurrent insert.
    pub fn insert_checked<F>(&self, doc: T, check: F) -> AppResult<T>
    where
        F: FnOnce(&BTreeMap<String, T>) -> AppResult<()>,
    {
        let mut docs = self.write();
        check(&docs)?;
        docs.insert(doc.id().to_string(), doc.clone());
        if let Err(e) = self.persist(&docs) {
            docs.remove(doc.id());
            return Err(e);
        }
        log::info!("created {} {}", T::COLLECTION, doc.id());
        Ok(doc)
    }

    /// Applies `change` to one record and persists the result
    ///
    /// `change` sees the other records too, for checks that span the
    /// collection. Nothing is stored when it returns an error.
    pub fn update<F>(&self, id: &str, change: F) -> AppResult<T>
    where
        F: FnOnce(&mut T, &BTreeMap<String, T>) -> AppResult<()>,
    {
        let mut docs = self.write();
        let original = docs
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(T::COLLECTION, id))?;

        let mut updated = original.clone();
        change(&mut updated, &docs)?;
        docs.insert(id.to_string(), updated.clone());
        if let Err(e) = self.persist(&docs) {
            docs.insert(id.to_string(), original);
            return Err(e);
        }
        log::info!("updated {} {}", T::COLLECTION, id);
        Ok(updated)
    }

    pub fn remove(&self, id: &str) -> AppResult<T> {
        self.remove_checked(id, |_| Ok(()))
    }

    /// Removes the record only if `check` accepts it
    ///
    /// The check runs under the write lock, so the record it sees is the
    /// one that gets deleted.
    pub fn remove_checked<F>(&self, id: &str, check: F) -> AppResult<T>
    where
        F: FnOnce(&T) -> AppResult<()>,
    {
        let mut docs = self.write();
        let current = docs
            .get(id)
            .ok_or_else(|| AppError::not_found(T::COLLECTION, id))?;
        check(current)?;
        let removed = docs
            .remove(id)
            .ok_or_else(|| AppError::not_found(T::COLLECTION, id))?;
        if let Err(e) = self.persist(&docs) {
            docs.insert(id.to_string(), removed);
            return Err(e);
        }
        log::info!("deleted {} {}", T::COLLECTION, id);
        Ok(removed)
    }

    /// Swaps the whole collection, used when restoring a snapshot
    pub fn replace_all(&self, records: Vec<T>) -> AppResult<()> {
        let fresh: BTreeMap<String, T> = records
            .into_iter()
            .map(|d| (d.id().to_string(), d))
            .collect();
        let mut docs = self.write();
        self.persist(&fresh)?;
        *docs = fresh;
        Ok(())
    }
}

/// All collections of the application
pub struct Store {
    dir: PathBuf,
    pub users: Collection<User>,
    pub companies: Collection<Company>,
    pub projects: Collection<Project>,
    pub routes: Collection<Route>,
    pub holidays: Collection<HolidayRequest>,
    pub templates: Collection<ExcelTemplate>,
}

impl Store {
    /// Opens (and if needed creates) the database directory
    pub fn open(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir)?;
        create_dir_all(dir.join(TEMPLATES_DIR))?;

        Ok(Store {
            users: Collection::open(&dir)?,
            companies: Collection::open(&dir)?,
            projects: Collection::open(&dir)?,
            routes: Collection::open(&dir)?,
            holidays: Collection::open(&dir)?,
            templates: Collection::open(&dir)?,
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the bytes of a template are kept
    pub fn template_path(&self, template_id: &str) -> PathBuf {
        self.dir.join(TEMPLATES_DIR).join(format!("{}.xlsx", template_id))
    }
}
