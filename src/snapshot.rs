use bincode::{deserialize_from, serialize_into};
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::{Company, ExcelTemplate, HolidayRequest, Project, Route, User};
use crate::store::Store;

const SNAPSHOT_VERSION: u32 = 1;
const BACKUPS_DIR: &str = "backups";

/// Full copy of the database, including template files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub users: Vec<User>,
    pub companies: Vec<Company>,
    pub projects: Vec<Project>,
    pub routes: Vec<Route>,
    pub holidays: Vec<HolidayRequest>,
    pub templates: Vec<ExcelTemplate>,
    /// (template id, file bytes)
    pub template_files: Vec<(String, Vec<u8>)>,
}

impl Snapshot {
    pub fn capture(store: &Store) -> AppResult<Self> {
        let templates = store.templates.list();
        let mut template_files = Vec::with_capacity(templates.len());
        for template in &templates {
            let path = store.template_path(&template.id);
            match fs::read(&path) {
                Ok(bytes) => template_files.push((template.id.clone(), bytes)),
                Err(e) => log::warn!(
                    "template file {} missing from snapshot: {}",
                    path.display(),
                    e
                ),
            }
        }

        Ok(Snapshot {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            users: store.users.list(),
            companies: store.companies.list(),
            projects: store.projects.list(),
            routes: store.routes.list(),
            holidays: store.holidays.list(),
            templates,
            template_files,
        })
    }

    /// Gzip-compressed bincode encoding
    pub fn encode(&self) -> AppResult<Vec<u8>> {
        let mut buffer = Vec::new();
        {
            let encoder = GzEncoder::new(&mut buffer, Compression::default());
            let mut writer = BufWriter::new(encoder);
            serialize_into(&mut writer, self)?;
            writer.flush()?;
            let encoder = writer
                .into_inner()
                .map_err(|e| AppError::Storage(e.into_error()))?;
            encoder.finish()?;
        }
        Ok(buffer)
    }

    pub fn decode(bytes: &[u8]) -> AppResult<Self> {
        let decoder = GzDecoder::new(bytes);
        let mut reader = BufReader::new(decoder);
        let snapshot: Snapshot = deserialize_from(&mut reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AppError::bad_request(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        let file = File::create(path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = BufWriter::new(encoder);
        serialize_into(&mut writer, self)?;
        writer
            .into_inner()
            .map_err(|e| AppError::Storage(e.into_error()))?
            .finish()?;
        Ok(())
    }

    /// Replaces every collection of `store` with the snapshot contents
    ///
    /// The current state is saved under `<data_dir>/backups/` first.
    pub fn restore(self, store: &Store) -> AppResult<PathBuf> {
        if let Some((id, _)) = self
            .template_files
            .iter()
            .find(|(id, _)| uuid::Uuid::parse_str(id).is_err())
        {
            return Err(AppError::bad_request(format!("invalid template id '{}' in snapshot", id)));
        }

        let backup_dir = store.dir().join(BACKUPS_DIR);
        fs::create_dir_all(&backup_dir)?;
        let backup_path = backup_dir.join(format!(
            "before-restore-{}.bin.gz",
            Utc::now().format("%Y%m%d%H%M%S%3f")
        ));
        Snapshot::capture(store)?.save_to(&backup_path)?;

        for (id, bytes) in &self.template_files {
            fs::write(store.template_path(id), bytes)?;
        }
        store.users.replace_all(self.users)?;
        store.companies.replace_all(self.companies)?;
        store.projects.replace_all(self.projects)?;
        store.routes.replace_all(self.routes)?;
        store.holidays.replace_all(self.holidays)?;
        store.templates.replace_all(self.templates)?;

        log::info!("restored snapshot, previous state saved to {}", backup_path.display());
        Ok(backup_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::new_id;

    fn company(name: &str) -> Company {
        Company {
            id: new_id(),
            name: name.to_string(),
            address: Some("Main St 1".to_string()),
            vat_number: None,
            contact_email: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn restore_replaces_collections_and_keeps_a_backup() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = Store::open(source_dir.path()).unwrap();
        source.companies.insert(company("Acme")).unwrap();
        let bytes = Snapshot::capture(&source).unwrap().encode().unwrap();

        let target_dir = tempfile::tempdir().unwrap();
        let target = Store::open(target_dir.path()).unwrap();
        target.companies.insert(company("Old Co")).unwrap();

        let backup = Snapshot::decode(&bytes).unwrap().restore(&target).unwrap();
        let names: Vec<String> = target.companies.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Acme".to_string()]);
        assert!(backup.exists());

        let previous = Snapshot::decode(&fs::read(backup).unwrap()).unwrap();
        assert_eq!(previous.companies[0].name, "Old Co");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Snapshot::decode(b"definitely not gzip").is_err());
    }
}
