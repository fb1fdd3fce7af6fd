//! CV text extraction — dispatches on the uploaded file's extension.
//!
//! Only plain text is actually decoded. PDF and DOCX are recognised but
//! yield a fixed placeholder so the rest of the pipeline still runs.

use std::io::Read;
use std::path::Path;

use bytes::Bytes;
use thiserror::Error;

pub const PDF_PLACEHOLDER: &str =
    "PDF parsing not yet implemented. Please use .txt or .docx files for now.";
pub const DOCX_PLACEHOLDER: &str =
    "DOCX parsing not yet implemented. Please use .txt files for now.";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file format: {0:?}")]
    UnsupportedFormat(String),

    #[error("failed to read text file: {0}")]
    ReadFailure(#[from] std::io::Error),

    #[error("document contains no text")]
    Empty,
}

/// Formats accepted for upload. Adding one means adding a variant here and
/// an arm in [`DocumentFormat::extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Resolves the format from a filename's extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "txt" => Ok(Self::PlainText),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            _ => Err(ExtractError::UnsupportedFormat(ext)),
        }
    }

    fn extract<R: Read>(self, mut content: R) -> Result<String, ExtractError> {
        match self {
            Self::PlainText => {
                let mut raw = Vec::new();
                content.read_to_end(&mut raw)?;
                // Non-UTF-8 uploads (e.g. Windows-1252) are decoded lossily, never rejected.
                Ok(String::from_utf8(raw)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
            }
            Self::Pdf => Ok(PDF_PLACEHOLDER.to_string()),
            Self::Docx => Ok(DOCX_PLACEHOLDER.to_string()),
        }
    }
}

/// An uploaded CV, held only until its text has been extracted.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Bytes,
    pub filename: String,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }

    pub fn extract(&self) -> Result<ExtractedText, ExtractError> {
        extract_text(self.bytes.as_ref(), &self.filename)
    }
}

/// Plain text extracted from a CV. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Extracts text from `content` according to the extension of `filename`.
///
/// The format is resolved before `content` is touched, so an unsupported
/// extension never reads from the source.
pub fn extract_text<R: Read>(content: R, filename: &str) -> Result<ExtractedText, ExtractError> {
    let format = DocumentFormat::from_filename(filename)?;
    let text = format.extract(content)?;
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(ExtractedText(text))
}
