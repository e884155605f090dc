//! docling-serve client: layout analysis, OCR and table structure run remotely.

use std::path::Path;
use std::sync::LazyLock;

use base64::Engine as _;
use regex::Regex;
use serde::Deserialize;

use super::{
    BoxFuture, ConvertedDocument, ConvertedTable, DocumentConverter, ParseError, ParserConfig,
    TableCell, TableData,
};

static EMBEDDED_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[[^\]]*\]\(data:image/[^)]*\)").expect("static regex is valid")
});

const IMAGE_PLACEHOLDER: &str = "<!-- image -->";

/// Error bodies are cut to this many characters before being reported.
const ERROR_BODY_CHARS: usize = 500;

#[derive(Clone)]
pub struct DoclingConverter {
    client: reqwest::Client,
    base_url: String,
    config: ParserConfig,
}

impl std::fmt::Debug for DoclingConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoclingConverter")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DoclingConverter {
    #[must_use]
    pub fn new(base_url: &str, config: ParserConfig) -> Self {
        Self {
            client: ragforge_llm::http::default_client(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            config,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn convert_file(&self, pdf: &Path) -> Result<ConvertedDocument, ParseError> {
        let bytes = tokio::fs::read(pdf).await?;
        let fname = pdf
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_owned();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(fname)
            .mime_str("application/pdf")?;

        let form = reqwest::multipart::Form::new()
            .part("files", part)
            .text("to_formats", "md")
            .text("to_formats", "json")
            .text("do_ocr", self.config.do_ocr.to_string())
            .text("do_table_structure", self.config.do_table_structure.to_string())
            .text("table_cell_matching", self.config.table_cell_matching.to_string())
            .text("images_scale", self.config.images_scale.to_string())
            .text("include_images", "true")
            .text("image_export_mode", "embedded");

        let url = format!("{}/v1/convert/file", self.base_url);
        tracing::debug!(pdf = %pdf.display(), %url, "sending document to docling");
        let resp = self.client.post(&url).multipart(form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_CHARS).collect();
            return Err(ParseError::Conversion(format!("{status}: {body}")));
        }

        let text = resp.text().await?;
        decode_response(&text)
    }
}

impl DocumentConverter for DoclingConverter {
    fn convert(&self, pdf: &Path) -> BoxFuture<'_, Result<ConvertedDocument, ParseError>> {
        let pdf = pdf.to_path_buf();
        Box::pin(async move { self.convert_file(&pdf).await })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "docling"
    }
}

#[derive(Deserialize)]
struct ConvertResponse {
    document: ExportDocument,
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ExportDocument {
    #[serde(default)]
    md_content: Option<String>,
    #[serde(default)]
    json_content: Option<DoclingDocument>,
}

#[derive(Deserialize, Default)]
struct DoclingDocument {
    #[serde(default)]
    tables: Vec<DoclingTable>,
    #[serde(default)]
    pictures: Vec<DoclingPicture>,
}

#[derive(Deserialize)]
struct DoclingTable {
    #[serde(default)]
    data: DoclingTableData,
    #[serde(default)]
    image: Option<DoclingImage>,
}

#[derive(Deserialize, Default)]
struct DoclingTableData {
    #[serde(default)]
    table_cells: Vec<DoclingCell>,
    #[serde(default)]
    num_rows: usize,
    #[serde(default)]
    num_cols: usize,
}

#[derive(Deserialize)]
struct DoclingCell {
    #[serde(default)]
    text: String,
    start_row_offset_idx: usize,
    start_col_offset_idx: usize,
    #[serde(default)]
    column_header: bool,
}

#[derive(Deserialize)]
struct DoclingPicture {
    #[serde(default)]
    image: Option<DoclingImage>,
}

#[derive(Deserialize)]
struct DoclingImage {
    uri: String,
}

fn decode_response(body: &str) -> Result<ConvertedDocument, ParseError> {
    let resp: ConvertResponse =
        serde_json::from_str(body).map_err(|e| ParseError::Decode(e.to_string()))?;

    if resp.status != "success" {
        return Err(ParseError::Conversion(format!(
            "status {:?}, errors: {}",
            resp.status,
            serde_json::Value::Array(resp.errors)
        )));
    }

    let markdown = resp
        .document
        .md_content
        .ok_or_else(|| ParseError::Decode("missing md_content".into()))?;
    let markdown = EMBEDDED_IMAGE_RE
        .replace_all(&markdown, IMAGE_PLACEHOLDER)
        .into_owned();

    let doc = resp.document.json_content.unwrap_or_default();

    let tables = doc
        .tables
        .into_iter()
        .map(|t| {
            Ok(ConvertedTable {
                data: TableData {
                    num_rows: t.data.num_rows,
                    num_cols: t.data.num_cols,
                    cells: t
                        .data
                        .table_cells
                        .into_iter()
                        .map(|c| TableCell {
                            text: c.text,
                            row: c.start_row_offset_idx,
                            col: c.start_col_offset_idx,
                            column_header: c.column_header,
                        })
                        .collect(),
                },
                image: t.image.map(|i| decode_data_uri(&i.uri)).transpose()?,
            })
        })
        .collect::<Result<Vec<_>, ParseError>>()?;

    let pictures = doc
        .pictures
        .into_iter()
        .map(|p| p.image.map(|i| decode_data_uri(&i.uri)).transpose())
        .collect::<Result<Vec<_>, ParseError>>()?;

    Ok(ConvertedDocument {
        markdown,
        tables,
        pictures,
    })
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ParseError> {
    let (meta, data) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| ParseError::Decode("image is not an inline data URI".into()))?;
    if !meta.ends_with(";base64") {
        return Err(ParseError::Decode(format!("unsupported image encoding: {meta}")));
    }
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| ParseError::Decode(format!("invalid base64 image: {e}")))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn png_uri(bytes: &[u8]) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    fn two_tables_three_pictures() -> serde_json::Value {
        serde_json::json!({
            "status": "success",
            "errors": [],
            "document": {
                "md_content": "# Title\n\n![Image](data:image/png;base64,AAAA)\n\nBody text.",
                "json_content": {
                    "tables": [
                        {
                            "data": {
                                "num_rows": 2,
                                "num_cols": 2,
                                "table_cells": [
                                    {"text": "Year", "start_row_offset_idx": 0, "start_col_offset_idx": 0, "column_header": true},
                                    {"text": "Sales", "start_row_offset_idx": 0, "start_col_offset_idx": 1, "column_header": true},
                                    {"text": "2024", "start_row_offset_idx": 1, "start_col_offset_idx": 0},
                                    {"text": "7", "start_row_offset_idx": 1, "start_col_offset_idx": 1}
                                ]
                            },
                            "image": {"uri": png_uri(b"t1"), "mimetype": "image/png"}
                        },
                        {
                            "data": {"num_rows": 1, "num_cols": 1, "table_cells": [
                                {"text": "x", "start_row_offset_idx": 0, "start_col_offset_idx": 0}
                            ]},
                            "image": {"uri": png_uri(b"t2")}
                        }
                    ],
                    "pictures": [
                        {"image": {"uri": png_uri(b"p1")}},
                        {"image": {"uri": png_uri(b"p2")}},
                        {"image": {"uri": png_uri(b"p3")}}
                    ]
                }
            }
        })
    }

    #[test]
    fn decodes_tables_and_pictures() {
        let doc = decode_response(&two_tables_three_pictures().to_string()).unwrap();
        assert_eq!(doc.tables.len(), 2);
        assert_eq!(doc.pictures.len(), 3);
        assert_eq!(doc.tables[0].image.as_deref(), Some(&b"t1"[..]));
        assert_eq!(doc.tables[0].data.cells[1].text, "Sales");
        assert!(doc.tables[0].data.cells[0].column_header);
        assert!(!doc.tables[0].data.cells[2].column_header);
        assert_eq!(doc.pictures[2].as_deref(), Some(&b"p3"[..]));
    }

    #[test]
    fn strips_embedded_images_from_markdown() {
        let doc = decode_response(&two_tables_three_pictures().to_string()).unwrap();
        assert_eq!(doc.markdown, "# Title\n\n<!-- image -->\n\nBody text.");
    }

    #[test]
    fn failure_status_is_conversion_error() {
        let body = serde_json::json!({
            "status": "failure",
            "errors": [{"error_message": "bad pdf"}],
            "document": {"md_content": null, "json_content": null}
        });
        let err = decode_response(&body.to_string()).unwrap_err();
        assert!(matches!(err, ParseError::Conversion(msg) if msg.contains("bad pdf")));
    }

    #[test]
    fn missing_json_content_yields_text_only() {
        let body = serde_json::json!({
            "status": "success",
            "document": {"md_content": "just text"}
        });
        let doc = decode_response(&body.to_string()).unwrap();
        assert_eq!(doc.markdown, "just text");
        assert!(doc.tables.is_empty());
        assert!(doc.pictures.is_empty());
    }

    #[test]
    fn rejects_non_data_uri() {
        assert!(matches!(
            decode_data_uri("https://example.com/a.png"),
            Err(ParseError::Decode(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png,plain"),
            Err(ParseError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn posts_pdf_to_convert_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/convert/file"))
            .respond_with(ResponseTemplate::new(200).set_body_json(two_tables_three_pictures()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();

        let converter = DoclingConverter::new(&format!("{}/", server.uri()), ParserConfig::default());
        let doc = converter.convert(&pdf).await.unwrap();
        assert_eq!(doc.tables.len(), 2);

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"files\"; filename=\"report.pdf\""));
        assert!(body.contains("%PDF-1.7"));
        assert!(body.contains("name=\"images_scale\""));
    }

    #[tokio::test]
    async fn server_error_is_conversion_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/convert/file"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("x.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();

        let converter = DoclingConverter::new(&server.uri(), ParserConfig::default());
        let err = converter.convert(&pdf).await.unwrap_err();
        assert!(matches!(err, ParseError::Conversion(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn long_multibyte_error_body_is_cut_on_char_boundary() {
        let server = MockServer::start().await;
        let body = format!("{}é tail", "a".repeat(ERROR_BODY_CHARS - 1));
        Mock::given(method("POST"))
            .and(path("/v1/convert/file"))
            .respond_with(ResponseTemplate::new(500).set_body_string(body))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("x.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();

        let converter = DoclingConverter::new(&server.uri(), ParserConfig::default());
        let err = converter.convert(&pdf).await.unwrap_err();
        let ParseError::Conversion(msg) = err else {
            panic!("expected conversion error");
        };
        assert!(msg.starts_with("500"));
        assert!(msg.ends_with('é'));
        assert!(!msg.contains("tail"));
    }

    #[tokio::test]
    async fn missing_pdf_is_io_error() {
        let converter = DoclingConverter::new("http://127.0.0.1:1", ParserConfig::default());
        let err = converter
            .convert(Path::new("/nonexistent/doc.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }
}
