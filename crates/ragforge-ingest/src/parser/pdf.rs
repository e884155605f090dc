use std::path::Path;

use super::{BoxFuture, ConvertedDocument, DocumentConverter, ParseError};

/// Default maximum PDF size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Local text extraction. Produces markdown only; no tables or pictures.
#[derive(Debug, Clone)]
pub struct PdfTextConverter {
    pub max_file_size: u64,
}

impl Default for PdfTextConverter {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentConverter for PdfTextConverter {
    fn convert(&self, pdf: &Path) -> BoxFuture<'_, Result<ConvertedDocument, ParseError>> {
        let path = pdf.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(ParseError::Conversion(format!(
                    "file too large: {} bytes",
                    meta.len()
                )));
            }

            let markdown = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text(&path).map_err(|e| ParseError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| ParseError::Io(std::io::Error::other(e)))??;

            Ok(ConvertedDocument {
                markdown,
                ..ConvertedDocument::default()
            })
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "pdf-extract"
    }
}
