//! Uploaded file → plain text.
//!
//! Supported: `.txt` (UTF-8, lossy) and `.pdf` (text per page, blank pages
//! skipped). Anything else is rejected.

use crate::error::InputError;

/// Upload formats we can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Text,
    Pdf,
}

impl UploadKind {
    /// Detect from the file extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Result<Self, InputError> {
        let lowered = filename.to_lowercase();
        if lowered.ends_with(".txt") {
            Ok(Self::Text)
        } else if lowered.ends_with(".pdf") {
            Ok(Self::Pdf)
        } else {
            Err(InputError::UnsupportedFormat {
                filename: filename.to_string(),
            })
        }
    }
}

/// Extract text from an uploaded file. PDF parsing is CPU-bound; call this
/// from the blocking pool.
pub fn extract_text(filename: &str, data: &[u8]) -> Result<String, InputError> {
    match UploadKind::from_filename(filename)? {
        UploadKind::Text => Ok(String::from_utf8_lossy(data).into_owned()),
        UploadKind::Pdf => {
            let pages = pdf_extract::extract_text_from_mem_by_pages(data).map_err(|e| {
                InputError::Unreadable {
                    filename: filename.to_string(),
                    reason: e.to_string(),
                }
            })?;
            Ok(join_pages(pages))
        }
    }
}

/// Each non-blank page followed by a newline.
fn join_pages(pages: Vec<String>) -> String {
    pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .map(|page| page + "\n")
        .collect()
}
