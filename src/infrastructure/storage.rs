//! Flat-file persistence for targets, the price ledger and the command cursor
//!
//! Files are rewritten whole through a temporary sibling and a rename, so a
//! crash mid-write leaves the previous version in place.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::domain::{Ledger, TargetList};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt data in {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Contents of `path`, or `None` when it does not exist.
async fn read_optional(path: &Path) -> StorageResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write_atomically(path: &Path, content: &str) -> StorageResult<()> {
    let write_error = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_error)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, content).await.map_err(write_error)?;
    fs::rename(&tmp_path, path).await.map_err(write_error)?;
    debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// Newline-delimited target urls.
#[derive(Debug, Clone)]
pub struct TargetStore {
    path: PathBuf,
}

impl TargetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the list, creating an empty file on first run.
    pub async fn load_or_initialize(&self) -> StorageResult<TargetList> {
        match read_optional(&self.path).await? {
            Some(content) => Ok(TargetList::from_lines(&content)),
            None => {
                info!("Target list {} not found, creating an empty one", self.path.display());
                write_atomically(&self.path, "").await?;
                Ok(TargetList::new())
            }
        }
    }

    pub async fn save(&self, targets: &TargetList) -> StorageResult<()> {
        write_atomically(&self.path, &targets.to_lines()).await
    }
}

/// JSON price ledger.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or blank file is an empty ledger; anything unparsable is an error.
    pub async fn load(&self) -> StorageResult<Ledger> {
        let Some(content) = read_optional(&self.path).await? else {
            info!("Ledger {} not found, starting empty", self.path.display());
            return Ok(Ledger::new());
        };
        if content.trim().is_empty() {
            return Ok(Ledger::new());
        }

        Ledger::from_json(&content).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub async fn save(&self, ledger: &Ledger) -> StorageResult<()> {
        let json = ledger.to_json().map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        write_atomically(&self.path, &json).await
    }
}

/// Highest processed inbound command sequence.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Zero when no cursor was saved yet.
    pub async fn load(&self) -> StorageResult<i64> {
        let Some(content) = read_optional(&self.path).await? else {
            return Ok(0);
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        trimmed.parse::<i64>().map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            reason: format!("'{trimmed}' is not a sequence number: {e}"),
        })
    }

    pub async fn save(&self, cursor: i64) -> StorageResult<()> {
        write_atomically(&self.path, &cursor.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExtractedProduct, PricePolicy};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_target_file_is_created() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path().join("urls.txt"));

        let targets = store.load_or_initialize().await.unwrap();

        assert!(targets.is_empty());
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_targets_round_trip_in_order() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path().join("urls.txt"));
        let targets: TargetList = ["https://b.example/2", "https://a.example/1"].into_iter().collect();

        store.save(&targets).await.unwrap();
        let loaded = store.load_or_initialize().await.unwrap();

        assert_eq!(loaded, targets);
        assert!(!dir.path().join("urls.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_ledger_round_trip() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("state").join("prices.json"));
        let mut ledger = Ledger::new();
        ledger.apply(
            &ExtractedProduct::new("Forma", "https://www.gsstore.org/forma", 1999.0),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            &PricePolicy::default(),
        );

        store.save(&ledger).await.unwrap();
        assert_eq!(store.load().await.unwrap(), ledger);
    }

    #[tokio::test]
    async fn test_missing_or_blank_ledger_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.json");
        let store = LedgerStore::new(&path);

        assert!(store.load().await.unwrap().is_empty());
        std::fs::write(&path, "  \n").unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_ledger_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.json");
        std::fs::write(&path, "{\"https://x\": {\"name\": 1}").unwrap();

        let err = LedgerStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_ledger_accepts_legacy_fractional_timestamps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.json");
        std::fs::write(
            &path,
            r#"{"https://shop.example/a": {"name": "A", "price": 120.5, "image": "", "updated_at": 1732012345.678}}"#,
        )
        .unwrap();

        let ledger = LedgerStore::new(&path).load().await.unwrap();
        let record = ledger.get("https://shop.example/a").unwrap();
        assert_eq!(record.url, "https://shop.example/a");
        assert_eq!(record.updated_at.timestamp(), 1_732_012_345);
    }

    #[tokio::test]
    async fn test_cursor_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telegram_cursor.txt");
        let store = CursorStore::new(&path);

        assert_eq!(store.load().await.unwrap(), 0);
        store.save(812_345_678).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 812_345_678);

        std::fs::write(&path, "abc").unwrap();
        assert!(matches!(store.load().await, Err(StorageError::Corrupt { .. })));
    }
}
