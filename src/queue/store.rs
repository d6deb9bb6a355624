use super::entry::{EntryId, QueueEntry};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("Deserialization error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

const ENTRY_SUFFIX: &str = ".entry";
const SEQUENCE_FILE: &str = "sequence";

/// File-per-entry persistence under a single directory.
///
/// Entry files are named by zero-padded sequence so lexical directory order
/// is enqueue order. Every write is fsynced before the transition is
/// considered durable.
#[derive(Debug)]
pub struct EntryStore {
    dir: PathBuf,
}

impl EntryStore {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn persist(&self, entry: &QueueEntry) -> Result<(), StoreError> {
        let encoded = bincode::serde::encode_to_vec(entry, bincode::config::standard())?;
        let path = self.entry_path(entry.entry_id());
        let mut file = fs::File::create(&path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        Ok(())
    }

    /// Removing an entry that is already gone is not an error.
    pub fn remove(&self, id: EntryId) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Load all persisted entries sorted by entry id. Entries that fail to
    /// decode are skipped with a warning rather than poisoning the queue.
    pub fn load_all(&self) -> Result<Vec<QueueEntry>, StoreError> {
        let mut entries = Vec::new();

        for dirent in fs::read_dir(&self.dir)? {
            let dirent = dirent?;
            let name = dirent.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(ENTRY_SUFFIX) {
                continue;
            }

            let data = fs::read(dirent.path())?;
            match bincode::serde::decode_from_slice::<QueueEntry, _>(
                &data,
                bincode::config::standard(),
            ) {
                Ok((entry, _)) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("skipping undecodable queue entry {name}: {e}");
                }
            }
        }

        entries.sort_by_key(QueueEntry::entry_id);
        Ok(entries)
    }

    /// Next record sequence persisted by `persist_sequence`, or 0 when the
    /// store is fresh.
    pub fn load_sequence(&self) -> Result<u64, StoreError> {
        let path = self.dir.join(SEQUENCE_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text.trim().parse().unwrap_or(0)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    pub fn persist_sequence(&self, next: u64) -> Result<(), StoreError> {
        let path = self.dir.join(SEQUENCE_FILE);
        let mut file = fs::File::create(&path)?;
        file.write_all(next.to_string().as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn entry_path(&self, id: EntryId) -> PathBuf {
        self.dir.join(format!("{id:020}{ENTRY_SUFFIX}"))
    }
}
