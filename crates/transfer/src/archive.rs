//! Writing and unpacking assembled archives.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use shutterlink_protocol::constants::ARCHIVE_EXTENSION;

use crate::{TransferError, validate_folder_name};

/// Result of a successful materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedArchive {
    pub archive_path: PathBuf,
    pub extract_dir: PathBuf,
    /// Regular files found under `extract_dir`, recursively.
    pub entry_count: usize,
}

/// Persists assembled payloads under a base directory.
///
/// A payload named `run` lands in `<base>/run.zip` and is unpacked into
/// `<base>/run/`. When either already exists the next free `run_1`,
/// `run_2`, ... stem is used for both, so earlier downloads are never
/// overwritten.
#[derive(Debug, Clone)]
pub struct ArchiveMaterializer {
    base_dir: PathBuf,
}

impl ArchiveMaterializer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes `bytes` as an archive and unpacks it. Blocking.
    pub fn materialize(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> Result<MaterializedArchive, TransferError> {
        validate_folder_name(name)?;

        std::fs::create_dir_all(&self.base_dir).map_err(|source| TransferError::Write {
            path: self.base_dir.clone(),
            archive: None,
            source,
        })?;

        let (archive_path, extract_dir) = self.free_paths(name);
        std::fs::write(&archive_path, bytes).map_err(|source| TransferError::Write {
            path: archive_path.clone(),
            archive: None,
            source,
        })?;
        info!(path = %archive_path.display(), bytes = bytes.len(), "archive saved");

        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|source| {
            TransferError::ArchiveFormat {
                archive: archive_path.clone(),
                source,
            }
        })?;

        std::fs::create_dir_all(&extract_dir).map_err(|source| TransferError::Write {
            path: extract_dir.clone(),
            archive: Some(archive_path.clone()),
            source,
        })?;
        zip.extract(&extract_dir).map_err(|e| match e {
            zip::result::ZipError::Io(source) => TransferError::Write {
                path: extract_dir.clone(),
                archive: Some(archive_path.clone()),
                source,
            },
            source => TransferError::ArchiveFormat {
                archive: archive_path.clone(),
                source,
            },
        })?;

        let entry_count = count_files(&extract_dir);
        info!(dir = %extract_dir.display(), entry_count, "archive extracted");

        Ok(MaterializedArchive {
            archive_path,
            extract_dir,
            entry_count,
        })
    }

    /// First `<stem>.zip` / `<stem>/` pair where neither exists.
    fn free_paths(&self, name: &str) -> (PathBuf, PathBuf) {
        let mut suffix = 0u32;
        loop {
            let stem = if suffix == 0 {
                name.to_string()
            } else {
                format!("{name}_{suffix}")
            };
            let archive = self.base_dir.join(format!("{stem}.{ARCHIVE_EXTENSION}"));
            let dir = self.base_dir.join(&stem);
            if !archive.exists() && !dir.exists() {
                if suffix > 0 {
                    debug!(name, stem = %stem, "archive name taken, using next free name");
                }
                return (archive, dir);
            }
            suffix += 1;
        }
    }
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count()
}
