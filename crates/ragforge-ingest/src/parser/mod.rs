//! PDF to markdown, table/picture PNGs and CSV tables.

mod docling;
#[cfg(feature = "pdf")]
mod pdf;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

pub use docling::DoclingConverter;
#[cfg(feature = "pdf")]
pub use pdf::PdfTextConverter;

use crate::types::{DocumentId, ParsedDocument, is_hidden};

/// Name of the per-document output directory created by [`DocumentParser::parse_all`].
pub const PARSED_DIR: &str = "parsed_documents";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("conversion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("malformed converter response: {0}")]
    Decode(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParserConfig {
    pub do_ocr: bool,
    pub do_table_structure: bool,
    pub table_cell_matching: bool,
    pub images_scale: f32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            do_ocr: true,
            do_table_structure: true,
            table_cell_matching: true,
            images_scale: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub text: String,
    pub row: usize,
    pub col: usize,
    pub column_header: bool,
}

/// Table structure in grid coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableData {
    pub num_rows: usize,
    pub num_cols: usize,
    pub cells: Vec<TableCell>,
}

impl TableData {
    /// Render as CSV: a leading unnamed index column, one header row, then
    /// one row per body row. Header rows are the leading rows made only of
    /// column-header cells; when there are none the header is `0..num_cols`.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV writer fails.
    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut grid = vec![vec![String::new(); self.num_cols]; self.num_rows];
        // (has any cell, every cell is a column header)
        let mut rows = vec![(false, true); self.num_rows];
        for cell in &self.cells {
            if cell.row < self.num_rows && cell.col < self.num_cols {
                grid[cell.row][cell.col].clone_from(&cell.text);
                rows[cell.row].0 = true;
                rows[cell.row].1 &= cell.column_header;
            }
        }
        let header_count = rows
            .iter()
            .take_while(|(has_cells, all_header)| *has_cells && *all_header)
            .count();

        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec![String::new()];
        if header_count == 0 {
            header.extend((0..self.num_cols).map(|c| c.to_string()));
        } else {
            for col in 0..self.num_cols {
                let parts: Vec<&str> = grid[..header_count]
                    .iter()
                    .map(|row| row[col].as_str())
                    .filter(|s| !s.is_empty())
                    .collect();
                header.push(parts.join("."));
            }
        }
        writer.write_record(&header)?;

        for (i, row) in grid[header_count..].iter().enumerate() {
            let mut record = Vec::with_capacity(self.num_cols + 1);
            record.push(i.to_string());
            record.extend(row.iter().cloned());
            writer.write_record(&record)?;
        }

        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedTable {
    pub data: TableData,
    /// Rendered PNG, when the converter produced one.
    pub image: Option<Vec<u8>>,
}

/// Converter output, held in memory until every artifact is ready to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedDocument {
    pub markdown: String,
    pub tables: Vec<ConvertedTable>,
    /// Picture PNGs in document order; `None` where no image was rendered.
    pub pictures: Vec<Option<Vec<u8>>>,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait DocumentConverter: Send + Sync {
    fn convert(&self, pdf: &Path) -> BoxFuture<'_, Result<ConvertedDocument, ParseError>>;

    fn name(&self) -> &str;
}

#[derive(Clone)]
pub struct DocumentParser {
    converter: Arc<dyn DocumentConverter>,
}

impl std::fmt::Debug for DocumentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentParser")
            .field("converter", &self.converter.name())
            .finish()
    }
}

impl DocumentParser {
    #[must_use]
    pub fn new(converter: Arc<dyn DocumentConverter>) -> Self {
        Self { converter }
    }

    /// Convert `pdf` and write its artifacts under `output_dir`. The document
    /// id is the name of the PDF's directory, or its stem at the top level.
    ///
    /// Nothing is written if conversion fails. The `tables`, `images` and
    /// `csv_files` subdirectories are always created.
    ///
    /// # Errors
    ///
    /// Returns an error if conversion fails or an artifact cannot be written.
    pub async fn parse(&self, pdf: &Path, output_dir: &Path) -> Result<ParsedDocument, ParseError> {
        let id = pdf
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .and_then(DocumentId::new)
            .or_else(|| pdf.file_stem().and_then(|s| s.to_str()).and_then(DocumentId::new))
            .ok_or_else(|| ParseError::Conversion(format!("no id for {}", pdf.display())))?;
        self.parse_as(id, pdf, output_dir).await
    }

    /// Writes `{id}.md` last so its presence marks a complete parse.
    async fn parse_as(
        &self,
        id: DocumentId,
        pdf: &Path,
        output_dir: &Path,
    ) -> Result<ParsedDocument, ParseError> {
        let converted = self.converter.convert(pdf).await.inspect_err(|e| {
            tracing::error!(pdf = %pdf.display(), converter = self.converter.name(), "conversion failed: {e}");
        })?;

        let tables_dir = output_dir.join(ParsedDocument::TABLES_DIR);
        let images_dir = output_dir.join(ParsedDocument::IMAGES_DIR);
        let csv_dir = output_dir.join(ParsedDocument::CSV_DIR);
        for dir in [&tables_dir, &images_dir, &csv_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut table_images = Vec::new();
        let mut csv_files = Vec::new();
        for (i, table) in converted.tables.iter().enumerate() {
            let n = i + 1;
            if let Some(png) = &table.image {
                let path = tables_dir.join(format!("table-{n}.png"));
                tokio::fs::write(&path, png).await?;
                table_images.push(path);
            } else {
                tracing::warn!(document_id = %id, table = n, "table has no rendered image");
            }
            let path = csv_dir.join(format!("table-{n}.csv"));
            tokio::fs::write(&path, table.data.to_csv()?).await?;
            csv_files.push(path);
        }

        let mut picture_images = Vec::new();
        for (i, picture) in converted.pictures.iter().enumerate() {
            let n = i + 1;
            let Some(png) = picture else {
                tracing::warn!(document_id = %id, picture = n, "picture has no rendered image");
                continue;
            };
            let path = images_dir.join(format!("picture-{n}.png"));
            tokio::fs::write(&path, png).await?;
            picture_images.push(path);
        }

        let markdown_path = output_dir.join(format!("{}.md", markdown_stem(&id)));
        tokio::fs::write(&markdown_path, &converted.markdown).await?;

        tracing::info!(
            document_id = %id,
            tables = converted.tables.len(),
            pictures = picture_images.len(),
            "parsed document"
        );

        Ok(ParsedDocument {
            id,
            output_dir: output_dir.to_path_buf(),
            markdown_path,
            table_images,
            picture_images,
            csv_files,
        })
    }

    /// Reuse `{dir}/parsed_documents/` when it already holds markdown,
    /// otherwise parse the first PDF (by name) in `dir`. `None` when there
    /// is neither.
    async fn parse_dir(
        &self,
        id: DocumentId,
        dir: &Path,
    ) -> Result<Option<ParsedDocument>, ParseError> {
        let output_dir = dir.join(PARSED_DIR);
        if let Some(existing) = ParsedDocument::from_dir(id.clone(), &output_dir)? {
            tracing::info!(document_id = %id, "already parsed, reusing output");
            return Ok(Some(existing));
        }
        let Some(pdf) = crate::types::files_with_extension(dir, "pdf")?
            .into_iter()
            .next()
        else {
            tracing::warn!(document_id = %id, "no PDF found, skipping");
            return Ok(None);
        };
        self.parse_as(id, &pdf, &output_dir).await.map(Some)
    }

    /// Parse every document directory under `download_root`. Documents
    /// parsed by an earlier run are loaded from disk, not converted again.
    ///
    /// # Errors
    ///
    /// Returns the first conversion or IO error.
    pub async fn parse_all(&self, download_root: &Path) -> Result<Vec<ParsedDocument>, ParseError> {
        let mut parsed = Vec::new();
        for (id, dir) in document_dirs(download_root)? {
            parsed.extend(self.parse_dir(id, &dir).await?);
        }
        Ok(parsed)
    }

    /// Like [`parse_all`](Self::parse_all), restricted to `ids` in the given
    /// order. Ids without a local directory are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first conversion or IO error.
    pub async fn parse_documents(
        &self,
        download_root: &Path,
        ids: &[DocumentId],
    ) -> Result<Vec<ParsedDocument>, ParseError> {
        let mut parsed = Vec::new();
        for id in ids {
            let dir = download_root.join(id.as_str());
            if !tokio::fs::try_exists(&dir).await? {
                tracing::warn!(document_id = %id, "no local directory, skipping");
                continue;
            }
            parsed.extend(self.parse_dir(id.clone(), &dir).await?);
        }
        Ok(parsed)
    }
}

/// Ids may contain `/` (nested key prefixes); the markdown file name uses the last segment.
fn markdown_stem(id: &DocumentId) -> &str {
    id.as_str().rsplit('/').next().unwrap_or(id.as_str())
}

/// Visible subdirectories of `root`, sorted by name.
///
/// # Errors
///
/// Returns an IO error if `root` cannot be read. A missing root is empty.
pub fn document_dirs(root: &Path) -> std::io::Result<Vec<(DocumentId, PathBuf)>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if is_hidden(&path) || !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(id) = path.file_name().and_then(|n| n.to_str()).and_then(DocumentId::new) {
            dirs.push((id, path));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Load every previously parsed document under `download_root`.
///
/// # Errors
///
/// Returns an IO error if a directory cannot be read.
pub fn load_parsed(download_root: &Path) -> std::io::Result<Vec<ParsedDocument>> {
    let mut docs = Vec::new();
    for (id, dir) in document_dirs(download_root)? {
        match ParsedDocument::from_dir(id.clone(), &dir.join(PARSED_DIR))? {
            Some(doc) => docs.push(doc),
            None => tracing::debug!(document_id = %id, "no parsed output"),
        }
    }
    Ok(docs)
}
