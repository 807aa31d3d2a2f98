//! Building a selection from a file list, a directory or in-memory buffers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::IngestError;

/// Where a selected file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Disk(PathBuf),
    Memory(Arc<[u8]>),
}

/// One user-chosen file.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    /// Position in the selection as the picker yielded it.
    pub ordinal: usize,
    pub source: FileSource,
}

impl SelectedFile {
    /// Only names ending in the literal, case-sensitive `.csv` are merged.
    pub fn is_csv(&self) -> bool {
        self.name.ends_with(".csv")
    }
}

/// An ordered set of picked files. The order is canonical: it decides
/// which header survives and how bodies are concatenated.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    files: Vec<SelectedFile>,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl Selection {
    /// One entry per path, in the given order.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let files = paths
            .into_iter()
            .enumerate()
            .map(|(ordinal, p)| {
                let path = p.as_ref();
                SelectedFile {
                    name: display_name(path),
                    ordinal,
                    source: FileSource::Disk(path.to_path_buf()),
                }
            })
            .collect();
        Self { files }
    }

    /// Every file under `dir`, recursively, ordered by relative path.
    ///
    /// Hidden entries and `__MACOSX` folders are skipped.
    pub fn from_directory(dir: &Path) -> Result<Self, IngestError> {
        let mut found = Vec::new();
        walk(dir, dir, &mut found)?;
        found.sort_by(|(a, _), (b, _)| a.cmp(b));
        tracing::debug!(dir = %dir.display(), files = found.len(), "scanned directory");
        Ok(Self::from_paths(found.into_iter().map(|(_, path)| path)))
    }

    /// In-memory files, e.g. from an upload or a test fixture.
    pub fn from_memory<I, N, B>(files: I) -> Self
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Vec<u8>>,
    {
        let files = files
            .into_iter()
            .enumerate()
            .map(|(ordinal, (name, bytes))| {
                let bytes: Vec<u8> = bytes.into();
                SelectedFile {
                    name: name.into(),
                    ordinal,
                    source: FileSource::Memory(Arc::from(bytes)),
                }
            })
            .collect();
        Self { files }
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The CSV files that take part in the merge, in selection order.
    pub fn accepted(&self) -> Vec<&SelectedFile> {
        self.files.iter().filter(|f| f.is_csv()).collect()
    }

    pub fn accepted_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_csv()).count()
    }

    /// Names that were picked but are not CSV files.
    pub fn skipped_names(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| !f.is_csv())
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Fail with [`IngestError::NoValidFiles`] when nothing would be merged.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.accepted_count() == 0 {
            return Err(IngestError::NoValidFiles);
        }
        Ok(())
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, PathBuf)>) -> Result<(), IngestError> {
    let listing_error = |source: std::io::Error| IngestError::Directory {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(listing_error)? {
        let entry = entry.map_err(listing_error)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "__MACOSX" {
            continue;
        }
        let path = entry.path();
        // `file_type` does not follow symlinks.
        let file_type = entry.file_type().map_err(listing_error)?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_symlink() && path.is_dir() {
            tracing::debug!(path = %path.display(), "skipping symlinked directory");
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            out.push((relative, path));
        }
    }
    Ok(())
}
