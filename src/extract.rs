//! Text extraction for uploaded documents.
//!
//! Ingestion supplies raw bytes plus the original filename; this module
//! returns plain UTF-8 text. Dispatch is by file extension: PDFs go through
//! `pdf-extract`, plain text and markdown are decoded as UTF-8. Extraction
//! never panics the pipeline; a failed file returns an error and the batch
//! reports it alongside its siblings.

/// Extraction error. One variant per failure class so ingestion summaries
/// carry a useful message for each failed file.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedFileType(String),
    Empty(String),
    Pdf(String),
    InvalidUtf8(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFileType(name) => {
                write!(f, "unsupported file type: {}", name)
            }
            ExtractError::Empty(name) => write!(f, "empty file: {}", name),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::InvalidUtf8(name) => {
                write!(f, "file is not valid UTF-8: {}", name)
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts plain text from an uploaded file's bytes.
///
/// `.pdf` is parsed with `pdf-extract`; `.txt` and `.md` are decoded as
/// UTF-8. Anything else is rejected. A PDF with no extractable text yields
/// an empty string (the ingestion layer treats that as zero chunks, not an
/// error).
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    match extension_of(filename).as_deref() {
        Some("pdf") => {
            if bytes.is_empty() {
                return Err(ExtractError::Empty(filename.to_string()));
            }
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
        Some("txt") | Some("md") => String::from_utf8(bytes.to_vec())
            .map_err(|_| ExtractError::InvalidUtf8(filename.to_string())),
        _ => Err(ExtractError::UnsupportedFileType(filename.to_string())),
    }
}

fn extension_of(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
