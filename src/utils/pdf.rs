// PDF text extraction behind a narrow trait so the parser crate stays an
// implementation detail of this module.

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::utils::content_guard::{describe_head, find_pdf_header, safe_truncate_utf8};

/// Upper bound on how much of a parser message is carried into `details`.
const MAX_PARSER_MESSAGE: usize = 512;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turns a byte buffer into the document's native text layer.
///
/// Implementations must not retain the buffer. An empty string is a valid
/// result (image-only documents have no text layer).
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ParseError>;
}

/// [`TextExtractor`] backed by the `pdf-extract` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ParseError> {
        if find_pdf_header(bytes).is_none() {
            return Err(ParseError::new(format!(
                "not a PDF document (missing %PDF- header, {})",
                describe_head(bytes)
            )));
        }
        extract_text_from_pdf_mem(bytes)
    }
}

/// Extracts text from a PDF stored fully in memory.
pub fn extract_text_from_pdf_mem(bytes: &[u8]) -> Result<String, ParseError> {
    guard_parser(|| pdf_extract::extract_text_from_mem(bytes))
}

/// `pdf-extract` can panic on malformed input instead of returning an error,
/// so parser calls run under `catch_unwind` and both failure shapes become a
/// [`ParseError`].
fn guard_parser<F, E>(parse: F) -> Result<String, ParseError>
where
    F: FnOnce() -> Result<String, E>,
    E: std::fmt::Display,
{
    match panic::catch_unwind(AssertUnwindSafe(parse)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ParseError::new(safe_truncate_utf8(
            &e.to_string(),
            MAX_PARSER_MESSAGE,
            "...",
        ))),
        Err(_) => Err(ParseError::new(
            "PDF parser panicked on malformed document",
        )),
    }
}
