//! File-based RecordRepository implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use race_core::EventRecord;

use crate::repository::traits::validate_name;
use crate::repository::{RecordRepository, RepositoryError, Result};

/// On-disk encoding of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordFormat {
    /// Pretty JSON, readable and hand-editable.
    #[default]
    Json,
    /// Compact bincode.
    Bincode,
}

impl RecordFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Bincode => "bin",
        }
    }
}

impl FromStr for RecordFormat {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "bin" | "bincode" => Ok(Self::Bincode),
            other => Err(RepositoryError::Serialization(format!(
                "unknown record format {other:?}"
            ))),
        }
    }
}

/// File-based implementation of RecordRepository.
///
/// Records are stored as `{name}.json` or `{name}.bin`. Writes go to a
/// temporary file first and are renamed into place, so a crash never leaves
/// a half-written record behind.
pub struct FileRecordRepository {
    base_dir: PathBuf,
    format: RecordFormat,
}

impl FileRecordRepository {
    /// Create a new file-based record repository.
    pub fn new(base_dir: impl AsRef<Path>, format: RecordFormat) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(RepositoryError::Io)?;
        Ok(Self { base_dir, format })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// Get the path to a record file.
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", name, self.format.extension()))
    }

    fn encode(&self, record: &EventRecord) -> Result<Vec<u8>> {
        match self.format {
            RecordFormat::Json => {
                serde_json::to_vec_pretty(record).map_err(|e| RepositoryError::Json(e.to_string()))
            }
            RecordFormat::Bincode => bincode::serialize(record)
                .map_err(|e| RepositoryError::Serialization(e.to_string())),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<EventRecord> {
        match self.format {
            RecordFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| RepositoryError::Json(e.to_string()))
            }
            RecordFormat::Bincode => bincode::deserialize(bytes)
                .map_err(|e| RepositoryError::CorruptedData(e.to_string())),
        }
    }
}

impl RecordRepository for FileRecordRepository {
    fn save(&self, name: &str, record: &EventRecord) -> Result<()> {
        validate_name(name)?;
        let path = self.record_path(name);
        let temp_path = path.with_extension(format!("{}.tmp", self.format.extension()));

        let bytes = self.encode(record)?;

        fs::write(&temp_path, bytes).map_err(RepositoryError::Io)?;

        // Atomic rename
        fs::rename(&temp_path, &path).map_err(RepositoryError::Io)?;

        tracing::debug!(target: "runtime::repository", path = %path.display(), "saved record");

        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<EventRecord>> {
        validate_name(name)?;
        let path = self.record_path(name);

        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(RepositoryError::Io)?;
        let record = self.decode(&bytes)?;

        tracing::debug!(target: "runtime::repository", path = %path.display(), "loaded record");

        Ok(Some(record))
    }

    fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.record_path(name).exists()
    }

    fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let path = self.record_path(name);

        if path.exists() {
            fs::remove_file(&path).map_err(RepositoryError::Io)?;
            tracing::debug!(target: "runtime::repository", name, "deleted record");
        }

        Ok(())
    }

    fn list_names(&self) -> Result<Vec<String>> {
        let suffix = format!(".{}", self.format.extension());
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.base_dir).map_err(RepositoryError::Io)? {
            let entry = entry.map_err(RepositoryError::Io)?;
            let path = entry.path();

            if let Some(filename) = path.file_name().and_then(|s| s.to_str())
                && let Some(name) = filename.strip_suffix(&suffix)
                && validate_name(name).is_ok()
            {
                names.push(name.to_owned());
            }
        }

        names.sort_unstable();
        Ok(names)
    }
}
