use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Opaque document identifier. Doubles as the object-store key prefix and
/// the local directory name under the download root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Normalize a raw id by trimming surrounding `/`. Returns `None` when
    /// nothing is left.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a piece of indexed text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Chunk,
    Picture,
    Table,
}

impl TextKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Picture => "picture",
            Self::Table => "table",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualKind {
    Table,
    Picture,
}

impl From<VisualKind> for TextKind {
    fn from(kind: VisualKind) -> Self {
        match kind {
            VisualKind::Table => Self::Table,
            VisualKind::Picture => Self::Picture,
        }
    }
}

/// Artifacts of one parsed PDF on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub id: DocumentId,
    pub output_dir: PathBuf,
    pub markdown_path: PathBuf,
    pub table_images: Vec<PathBuf>,
    pub picture_images: Vec<PathBuf>,
    pub csv_files: Vec<PathBuf>,
}

impl ParsedDocument {
    pub const TABLES_DIR: &'static str = "tables";
    pub const IMAGES_DIR: &'static str = "images";
    pub const CSV_DIR: &'static str = "csv_files";

    #[must_use]
    pub fn tables_dir(&self) -> PathBuf {
        self.output_dir.join(Self::TABLES_DIR)
    }

    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join(Self::IMAGES_DIR)
    }

    #[must_use]
    pub fn csv_dir(&self) -> PathBuf {
        self.output_dir.join(Self::CSV_DIR)
    }

    /// Directory of the visual assets of the given kind.
    #[must_use]
    pub fn visual_dir(&self, kind: VisualKind) -> PathBuf {
        match kind {
            VisualKind::Table => self.tables_dir(),
            VisualKind::Picture => self.images_dir(),
        }
    }

    /// Rebuild the record from an existing `parsed_documents` directory.
    ///
    /// Returns `None` if the directory holds no markdown file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a directory cannot be read.
    pub fn from_dir(id: DocumentId, output_dir: &Path) -> std::io::Result<Option<Self>> {
        let Some(markdown_path) = files_with_extension(output_dir, "md")?.into_iter().next() else {
            return Ok(None);
        };
        let doc = Self {
            id,
            output_dir: output_dir.to_path_buf(),
            markdown_path,
            table_images: files_with_extension(&output_dir.join(Self::TABLES_DIR), "png")?,
            picture_images: files_with_extension(&output_dir.join(Self::IMAGES_DIR), "png")?,
            csv_files: files_with_extension(&output_dir.join(Self::CSV_DIR), "csv")?,
        };
        Ok(Some(doc))
    }
}

/// Visible regular files in `dir` with the given extension, sorted by name.
/// A missing directory yields an empty list.
pub(crate) fn files_with_extension(dir: &Path, ext: &str) -> std::io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if is_hidden(&path) || !entry.file_type()?.is_file() {
            continue;
        }
        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Bounded slice of one markdown element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub element_index: usize,
    pub chunk_index: usize,
}

/// A text queued for embedding, with the metadata stored next to its vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub text: String,
    pub document_id: Option<DocumentId>,
    pub kind: TextKind,
}

impl SourceText {
    #[must_use]
    pub fn new(text: impl Into<String>, document_id: Option<DocumentId>, kind: TextKind) -> Self {
        Self {
            text: text.into(),
            document_id,
            kind,
        }
    }
}
